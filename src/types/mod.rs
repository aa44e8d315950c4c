//! Type definitions for generated and scored transactions

pub mod category;
pub mod score;
pub mod transaction;

pub use category::{Categorical, DeviceLang, DeviceOs, IpCountry, IpIsp, MerchantCategory};
pub use score::{RiskLevel, RiskLevelThresholds, ScoredTransaction};
pub use transaction::{RawTransaction, TransactionRecord};
