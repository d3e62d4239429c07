use leadline_core::pricing::{estimate, parse_sqft, PricingTable};
use serde_json::json;

use crate::commands::CommandResult;

/// Prices one project from the static table. Needs no config or database.
pub fn run(project: &str, sqft: &str) -> CommandResult {
    let Some(rule) =
        PricingTable.find(project.trim()).or_else(|| PricingTable.match_text(&project.to_lowercase()))
    else {
        let known: Vec<&str> = PricingTable.rules().iter().map(|rule| rule.key).collect();
        return CommandResult::failure(
            "estimate",
            "unknown_project",
            format!("unknown project type `{project}`; expected one of {}", known.join(", ")),
            2,
        );
    };

    let Some(sqft) = parse_sqft(sqft) else {
        return CommandResult::failure(
            "estimate",
            "invalid_sqft",
            format!("square footage must be a positive number (got `{sqft}`)"),
            2,
        );
    };

    let Some(range) = estimate(rule, sqft) else {
        return CommandResult::failure(
            "estimate",
            "invalid_sqft",
            format!("square footage `{sqft}` is too large to price"),
            2,
        );
    };
    let (typical_min, typical_max) = rule.sqft_range;
    let mut message = format!("{} at {sqft} sq ft: {}", rule.label_en, range.display());
    if !range.within_typical_range {
        message.push_str(&format!(
            " (outside the typical {typical_min}-{typical_max} sq ft for this project)"
        ));
    }

    CommandResult::success_with(
        "estimate",
        message,
        Some(json!({
            "project": rule.key,
            "sqft": sqft,
            "low": range.low,
            "high": range.high,
            "within_typical_range": range.within_typical_range,
            "display": range.compact(),
        })),
    )
}
