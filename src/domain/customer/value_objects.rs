use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Customer Value Objects
// ============================================================================

/// Identity of the purchasing user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shipping destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub recipient: String,
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// Customer tier for loyalty pricing and pipeline selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CustomerTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

/// Risk classification returned by the risk scorer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

/// Payment instrument chosen for the order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    BankAccount,
    DigitalWallet,
}

/// What the engine knows about the buyer at order time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub user_id: UserId,
    pub tier: CustomerTier,
    /// Number of orders this user has previously completed
    pub completed_orders: u32,
}

impl CustomerProfile {
    pub fn new(user_id: UserId, tier: CustomerTier) -> Self {
        Self {
            user_id,
            tier,
            completed_orders: 0,
        }
    }

    pub fn with_completed_orders(mut self, completed_orders: u32) -> Self {
        self.completed_orders = completed_orders;
        self
    }

    pub fn is_first_order(&self) -> bool {
        self.completed_orders == 0
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_order_detection() {
        let profile = CustomerProfile::new(UserId::new(), CustomerTier::Bronze);
        assert!(profile.is_first_order());

        let returning = profile.with_completed_orders(3);
        assert!(!returning.is_first_order());
    }

    #[test]
    fn test_tier_ordering() {
        assert!(CustomerTier::Bronze < CustomerTier::Silver);
        assert!(CustomerTier::Gold < CustomerTier::Platinum);
    }

    #[test]
    fn test_nil_user() {
        assert!(UserId::nil().is_nil());
        assert!(!UserId::new().is_nil());
    }
}
