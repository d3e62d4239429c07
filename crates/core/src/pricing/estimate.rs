use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::pricing::catalog::PricingRule;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateRange {
    pub low: Decimal,
    pub high: Decimal,
    pub within_typical_range: bool,
}

impl EstimateRange {
    pub fn display(&self) -> String {
        format!("{} to {}", format_currency(self.low), format_currency(self.high))
    }

    /// `$22,500–$52,500`, the compact form used in booking notes.
    pub fn compact(&self) -> String {
        format!("{}–{}", format_currency(self.low), format_currency(self.high))
    }
}

/// `sqft × (low, high)` price per square foot, each floored to whole dollars.
/// `None` when the square footage is too large to price.
pub fn estimate(rule: &PricingRule, sqft: Decimal) -> Option<EstimateRange> {
    let sqft = sqft.max(Decimal::ZERO);
    let (price_low, price_high) = rule.price_per_sqft;
    let (min_sqft, max_sqft) = rule.sqft_range;

    Some(EstimateRange {
        low: floor_dollars(sqft.checked_mul(Decimal::from(price_low))?),
        high: floor_dollars(sqft.checked_mul(Decimal::from(price_high))?),
        within_typical_range: sqft >= Decimal::from(min_sqft) && sqft <= Decimal::from(max_sqft),
    })
}

fn floor_dollars(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::ToNegativeInfinity)
}

/// Reads the leading number out of free text such as `"1,200 sq ft"`.
/// Zero, negative and non-numeric input yield `None`.
pub fn parse_sqft(text: &str) -> Option<Decimal> {
    let token: String = text
        .trim()
        .chars()
        .take_while(|ch| ch.is_ascii_digit() || *ch == '.' || *ch == ',')
        .filter(|ch| *ch != ',')
        .collect();
    let token = token.trim_end_matches('.');
    if token.is_empty() {
        return None;
    }

    token.parse::<Decimal>().ok().filter(|value| *value > Decimal::ZERO).map(|value| value.normalize())
}

/// Whole-dollar amount with thousands separators: `$22,500`.
pub fn format_currency(amount: Decimal) -> String {
    let whole = floor_dollars(amount);
    let negative = whole.is_sign_negative() && !whole.is_zero();
    let digits = whole.abs().trunc().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if negative {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}
