use serde::Serialize;

use crate::i18n::Language;

/// Static square-footage and price-per-square-foot bounds for one project type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PricingRule {
    pub key: &'static str,
    pub label_en: &'static str,
    pub label_es: &'static str,
    pub sqft_range: (u32, u32),
    pub price_per_sqft: (u32, u32),
}

impl PricingRule {
    pub fn label(&self, language: Language) -> &'static str {
        match language {
            Language::En => self.label_en,
            Language::Es => self.label_es,
        }
    }

    fn matches_text(&self, normalized: &str) -> bool {
        normalized == self.key
            || normalized.contains(&self.label_en.to_lowercase())
            || normalized.contains(&self.label_es.to_lowercase())
            || self.key.split('-').all(|part| normalized.contains(part))
    }
}

const RULES: [PricingRule; 6] = [
    PricingRule {
        key: "kitchen",
        label_en: "Kitchen Renovation",
        label_es: "Renovación de Cocina",
        sqft_range: (80, 200),
        price_per_sqft: (150, 350),
    },
    PricingRule {
        key: "bathroom",
        label_en: "Bathroom Remodel",
        label_es: "Remodelación de Baño",
        sqft_range: (40, 100),
        price_per_sqft: (200, 450),
    },
    PricingRule {
        key: "full-home",
        label_en: "Full Home Renovation",
        label_es: "Renovación Completa",
        sqft_range: (800, 3000),
        price_per_sqft: (100, 250),
    },
    PricingRule {
        key: "flooring",
        label_en: "Flooring Installation",
        label_es: "Instalación de Pisos",
        sqft_range: (200, 2000),
        price_per_sqft: (8, 25),
    },
    PricingRule {
        key: "sidewalk",
        label_en: "Sidewalk/Concrete",
        label_es: "Aceras/Concreto",
        sqft_range: (50, 500),
        price_per_sqft: (15, 40),
    },
    PricingRule {
        key: "exterior",
        label_en: "Exterior Work",
        label_es: "Trabajo Exterior",
        sqft_range: (200, 1000),
        price_per_sqft: (50, 150),
    },
];

#[derive(Clone, Copy, Debug, Default)]
pub struct PricingTable;

impl PricingTable {
    pub fn rules(&self) -> &'static [PricingRule] {
        &RULES
    }

    pub fn find(&self, key: &str) -> Option<&'static PricingRule> {
        RULES.iter().find(|rule| rule.key == key)
    }

    /// Resolves a typed answer ("the kitchen", "Baño") to a rule.
    pub fn match_text(&self, text: &str) -> Option<&'static PricingRule> {
        let normalized = text.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }
        RULES.iter().find(|rule| rule.matches_text(&normalized)).or_else(|| {
            RULES.iter().find(|rule| {
                let stem = rule.label_en.split_whitespace().next().unwrap_or(rule.key);
                normalized.contains(&stem.to_lowercase())
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::i18n::Language;

    use super::PricingTable;

    #[test]
    fn finds_rules_by_key() {
        let table = PricingTable;
        let kitchen = table.find("kitchen").expect("kitchen rule");
        assert_eq!(kitchen.price_per_sqft, (150, 350));
        assert_eq!(kitchen.label(Language::Es), "Renovación de Cocina");
        assert!(table.find("pool").is_none());
    }

    #[test]
    fn every_rule_has_ordered_bounds() {
        for rule in PricingTable.rules() {
            assert!(rule.sqft_range.0 <= rule.sqft_range.1, "{}", rule.key);
            assert!(rule.price_per_sqft.0 <= rule.price_per_sqft.1, "{}", rule.key);
        }
    }

    #[test]
    fn matches_free_text_answers() {
        let table = PricingTable;
        assert_eq!(table.match_text("Bathroom Remodel").map(|rule| rule.key), Some("bathroom"));
        assert_eq!(table.match_text("it's the kitchen").map(|rule| rule.key), Some("kitchen"));
        assert_eq!(table.match_text("full home").map(|rule| rule.key), Some("full-home"));
        assert_eq!(table.match_text("aceras/concreto").map(|rule| rule.key), Some("sidewalk"));
        assert!(table.match_text("a swimming pool").is_none());
    }
}
