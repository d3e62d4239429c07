pub mod catalog;
pub mod estimate;

pub use catalog::{PricingRule, PricingTable};
pub use estimate::{estimate, format_currency, parse_sqft, EstimateRange};
