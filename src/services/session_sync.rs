//! Session sync manager.
//!
//! Decides, per cart, whether to create a gateway session, patch the bound
//! one, or reuse it untouched, then keeps the cart's binding custom field
//! pointing at the live session. The binding write is optimistic: on a
//! version conflict the cart is re-read with a fresh version and the write is
//! retried, unless the re-read shows another worker already bound the same
//! session.

use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::gateway::client::{GatewayApi, GatewayError};
use crate::gateway::types::{BriqSession, CreateSessionRequest, SessionItem, UpdateSessionRequest};
use crate::platform::client::{CommercePlatform, PlatformError};
use crate::platform::types::{Cart, LineItem, SESSION_BINDING_FIELD, SESSION_BINDING_TYPE};

const BIND_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Session creation cannot proceed without a locale; the gateway requires
    /// one and there is nothing sensible to guess.
    #[error("cart {cart_id} has no locale")]
    MissingLocale { cart_id: String },
    /// The binding write kept losing the version race.
    #[error("could not bind session to cart {cart_id} after {attempts} attempts")]
    BindingConflict { cart_id: String, attempts: u32 },
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

pub struct SessionSyncManager {
    gateway: Arc<dyn GatewayApi>,
    platform: Arc<dyn CommercePlatform>,
}

impl SessionSyncManager {
    pub fn new(gateway: Arc<dyn GatewayApi>, platform: Arc<dyn CommercePlatform>) -> Self {
        Self { gateway, platform }
    }

    /// The live gateway session for a cart, creating or patching as needed.
    pub async fn resolve_for_cart(&self, cart_id: &str) -> Result<BriqSession, SyncError> {
        let cart = self.platform.get_cart(cart_id).await?;
        self.resolve(cart).await
    }

    pub async fn resolve(&self, cart: Cart) -> Result<BriqSession, SyncError> {
        let locale = cart
            .locale
            .clone()
            .ok_or_else(|| SyncError::MissingLocale {
                cart_id: cart.id.clone(),
            })?;
        let expected = build_session_request(&cart, &locale);

        if let Some(bound) = cart.session_binding().map(str::to_string) {
            match self.gateway.get_session(&bound).await {
                Ok(session) => {
                    if session_matches(&session, &expected) {
                        info!(cart_id = %cart.id, session_id = %bound, "bound session up to date, reusing");
                        return Ok(session);
                    }
                    let update = UpdateSessionRequest {
                        amount_inc_vat: expected.amount_inc_vat,
                        currency: expected.currency.clone(),
                        locale: expected.locale.clone(),
                        items: expected.items.clone(),
                    };
                    match self.gateway.update_session(&bound, update).await {
                        Ok(session) => return Ok(session),
                        Err(err) => {
                            warn!(
                                cart_id = %cart.id,
                                session_id = %bound,
                                error = %err,
                                "session update failed, creating a replacement session"
                            );
                        }
                    }
                }
                Err(GatewayError::SessionNotFound(_)) => {
                    warn!(cart_id = %cart.id, session_id = %bound, "bound session gone at gateway");
                }
                // A transient fetch failure is not grounds for abandoning the
                // bound session.
                Err(err) => return Err(err.into()),
            }
        }

        let session = self.gateway.create_session(expected).await?;
        self.bind_session(&cart, &session.session_id).await?;
        info!(cart_id = %cart.id, session_id = %session.session_id, "session created and bound");
        Ok(session)
    }

    /// Write the binding custom field, rebinding on version conflicts.
    async fn bind_session(&self, cart: &Cart, session_id: &str) -> Result<(), SyncError> {
        let mut current = cart.clone();
        for _ in 0..BIND_ATTEMPTS {
            let has_binding_type = current
                .custom
                .as_ref()
                .map(|custom| custom.type_key == SESSION_BINDING_TYPE)
                .unwrap_or(false);

            let result = if has_binding_type {
                self.platform
                    .set_cart_custom_field(
                        &current.id,
                        current.version,
                        SESSION_BINDING_FIELD,
                        json!(session_id),
                    )
                    .await
            } else {
                self.platform
                    .set_cart_custom_type(
                        &current.id,
                        current.version,
                        SESSION_BINDING_TYPE,
                        json!({ SESSION_BINDING_FIELD: session_id }),
                    )
                    .await
            };

            match result {
                Ok(_) => return Ok(()),
                Err(PlatformError::VersionConflict { .. }) => {
                    current = self.platform.get_cart(&current.id).await?;
                    if current.session_binding() == Some(session_id) {
                        // Another worker won the race with the same session.
                        return Ok(());
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(SyncError::BindingConflict {
            cart_id: cart.id.clone(),
            attempts: BIND_ATTEMPTS,
        })
    }
}

/// The session contents a cart calls for. The order total is the line item
/// total plus the dedicated sales tax line, when the cart carries tax.
fn build_session_request(cart: &Cart, locale: &str) -> CreateSessionRequest {
    let mut items: Vec<SessionItem> = cart
        .line_items
        .iter()
        .map(|line| line_to_item(line, locale))
        .collect();

    let tax_cents = cart
        .total_tax
        .as_ref()
        .map(|tax| tax.cent_amount)
        .filter(|cents| *cents != 0);
    if let Some(cents) = tax_cents {
        items.push(SessionItem {
            reference: None,
            name: "Sales Tax".to_string(),
            quantity: 1,
            unit_price: cents,
            tax_rate: None,
            total_tax_amount: Some(cents),
            item_type: Some("sales_tax".to_string()),
        });
    }

    CreateSessionRequest {
        amount_inc_vat: cart.total_price.cent_amount + tax_cents.unwrap_or(0),
        currency: cart.total_price.currency_code.clone(),
        locale: locale.to_string(),
        reference: cart.id.clone(),
        items,
    }
}

fn line_to_item(line: &LineItem, locale: &str) -> SessionItem {
    let name = line
        .name
        .get(locale)
        .map(str::to_string)
        .or_else(|| line.sku.clone())
        .unwrap_or_else(|| line.id.clone());
    SessionItem {
        reference: line.sku.clone().or_else(|| Some(line.id.clone())),
        name,
        quantity: line.quantity,
        unit_price: line.unit_price.cent_amount,
        tax_rate: line.tax_rate,
        total_tax_amount: None,
        item_type: None,
    }
}

/// Whether the gateway session already reflects the cart. Regular lines are
/// compared by reference, name, quantity, unit price and tax rate; the sales
/// tax line by its tax amount. Lines are paired one-to-one, so a duplicated
/// line cannot stand in for a differing one.
fn session_matches(session: &BriqSession, expected: &CreateSessionRequest) -> bool {
    let order = &session.order;
    if order.amount_inc_vat != Some(expected.amount_inc_vat) {
        return false;
    }
    if order.currency.as_deref() != Some(expected.currency.as_str()) {
        return false;
    }
    if order.items.len() != expected.items.len() {
        return false;
    }
    let mut unmatched: Vec<&SessionItem> = order.items.iter().collect();
    expected.items.iter().all(|want| {
        match unmatched.iter().position(|have| item_matches(want, have)) {
            Some(index) => {
                unmatched.swap_remove(index);
                true
            }
            None => false,
        }
    })
}

fn item_matches(want: &SessionItem, have: &SessionItem) -> bool {
    if want.is_sales_tax() || have.is_sales_tax() {
        return want.is_sales_tax()
            && have.is_sales_tax()
            && want.total_tax_amount == have.total_tax_amount;
    }
    want.reference == have.reference
        && want.name == have.name
        && want.quantity == have.quantity
        && want.unit_price == have.unit_price
        && want.tax_rate == have.tax_rate
}
