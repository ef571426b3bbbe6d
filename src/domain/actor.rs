use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity acting on an operation, always passed explicitly.
///
/// `System` covers triggers with no human behind them, such as payment
/// gateway callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "lowercase")]
pub enum Actor {
    Customer(Uuid),
    Vendor(Uuid),
    Admin,
    System,
}

impl Actor {
    pub fn is_privileged(&self) -> bool {
        matches!(self, Actor::Admin | Actor::System)
    }

    pub fn role(&self) -> &'static str {
        match self {
            Actor::Customer(_) => "customer",
            Actor::Vendor(_) => "vendor",
            Actor::Admin => "admin",
            Actor::System => "system",
        }
    }
}
