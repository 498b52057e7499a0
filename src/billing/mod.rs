//! Credit Billing
//!
//! Pricing, the credit ledger gateway and its two implementations, and the
//! billing intent that guarantees every paid attempt is recorded.

pub mod intent;
pub mod ledger;
pub mod local;
pub mod pricing;
pub mod remote;

pub use intent::BillingIntent;
pub use ledger::{CreditLedger, SharedLedger, SubscriptionInfo, UsageRecord};
pub use local::{LocalLedger, UsageEntry};
pub use pricing::{
    CostBreakdown, CostCalculation, FeaturePricing, LengthMultipliers, LengthTier, PricingTable,
};
pub use remote::RemoteLedger;
