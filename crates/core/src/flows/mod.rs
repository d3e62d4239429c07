pub mod classifier;
pub mod engine;
pub mod states;

pub use classifier::{Intent, IntentClassifier};
pub use engine::{greeting, DialogDefinition, DialogEngine, DialogError, LeadCaptureFlow};
pub use states::{BotReply, ChatPath, DialogEffect, DialogInput, TransitionOutcome};
