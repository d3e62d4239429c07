/// Top-level intent inferred from typed text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    Emergency,
    Estimate,
}

/// Matched as whole words; inflections are listed explicitly.
const EMERGENCY_VOCABULARY: &[&str] = &[
    "emergency",
    "emergencies",
    "urgent",
    "leak",
    "leaks",
    "leaking",
    "leaked",
    "leaky",
    "flood",
    "floods",
    "flooding",
    "flooded",
    "burst",
    "bursting",
    "collapse",
    "collapsed",
    "collapsing",
    "gas",
    "fire",
    "fires",
    "smoke",
    "smoking",
    "spark",
    "sparks",
    "sparking",
    "violation",
    "violations",
    "stop work",
    "unsafe",
    "dob",
    "emergencia",
    "emergencias",
    "urgente",
    "fuga",
    "fugas",
    "inundación",
    "inundacion",
    "inundado",
    "colapso",
    "incendio",
    "violación",
];

/// Matched as word prefixes ("renovat" covers "renovation").
const ESTIMATE_VOCABULARY: &[&str] = &[
    "estimate",
    "quote",
    "price",
    "pricing",
    "cost",
    "how much",
    "budget",
    "remodel",
    "renovat",
    "kitchen",
    "bathroom",
    "floor",
    "sidewalk",
    "concrete",
    "exterior",
    "presupuesto",
    "cotiza",
    "precio",
    "costo",
    "cuánto",
    "renova",
    "cocina",
    "baño",
    "piso",
];

/// Keyword matcher used when the visitor types instead of picking an option.
/// Emergency vocabulary is checked before estimate vocabulary.
#[derive(Clone, Debug)]
pub struct IntentClassifier {
    emergency: Vec<String>,
    estimate: Vec<String>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(EMERGENCY_VOCABULARY, ESTIMATE_VOCABULARY)
    }
}

impl IntentClassifier {
    pub fn new(emergency: &[&str], estimate: &[&str]) -> Self {
        let lower = |words: &[&str]| words.iter().map(|word| word.to_lowercase()).collect();
        Self { emergency: lower(emergency), estimate: lower(estimate) }
    }

    pub fn classify(&self, text: &str) -> Option<Intent> {
        let normalized = text.to_lowercase();
        let words: Vec<&str> = normalized
            .split(|ch: char| !ch.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .collect();

        if matches_any(&self.emergency, &normalized, &words, WordMatch::Whole) {
            return Some(Intent::Emergency);
        }
        if matches_any(&self.estimate, &normalized, &words, WordMatch::Prefix) {
            return Some(Intent::Estimate);
        }
        None
    }
}

#[derive(Clone, Copy)]
enum WordMatch {
    Whole,
    Prefix,
}

/// Phrases match anywhere in the text; single words per `mode`.
fn matches_any(vocabulary: &[String], normalized: &str, words: &[&str], mode: WordMatch) -> bool {
    vocabulary.iter().any(|keyword| {
        if keyword.contains(' ') {
            return normalized.contains(keyword.as_str());
        }
        words.iter().any(|word| match mode {
            WordMatch::Whole => *word == keyword.as_str(),
            WordMatch::Prefix => word.starts_with(keyword.as_str()),
        })
    })
}
