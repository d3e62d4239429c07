use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::contact::{ContactDetails, ContactForm};
use crate::domain::message::{ChatOption, MessageId};
use crate::i18n::Language;
use crate::pricing::EstimateRange;

/// Named stage of the guided dialog.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChatPath {
    #[default]
    Initial,
    Estimate,
    EstimateDetails,
    EstimateContact,
    Emergency,
    EmergencyContact,
    Question,
    Complete,
}

impl ChatPath {
    pub fn progress(self) -> u8 {
        match self {
            Self::Initial => 0,
            Self::Estimate => 25,
            Self::EstimateDetails => 50,
            Self::EstimateContact => 75,
            Self::Emergency => 40,
            Self::EmergencyContact => 70,
            Self::Question => 30,
            Self::Complete => 100,
        }
    }

    pub fn contact_form(self) -> Option<ContactForm> {
        match self {
            Self::EstimateContact => Some(ContactForm::Estimate),
            Self::Emergency | Self::EmergencyContact => Some(ContactForm::Emergency),
            Self::Initial
            | Self::Estimate
            | Self::EstimateDetails
            | Self::Question
            | Self::Complete => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Estimate => "estimate",
            Self::EstimateDetails => "estimate-details",
            Self::EstimateContact => "estimate-contact",
            Self::Emergency => "emergency",
            Self::EmergencyContact => "emergency-contact",
            Self::Question => "question",
            Self::Complete => "complete",
        }
    }
}

/// Anything the visitor (or a settled timer) can feed into the dialog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DialogInput {
    Open,
    SelectOption {
        #[serde(default)]
        message_id: Option<MessageId>,
        value: String,
    },
    FreeText {
        text: String,
    },
    EditSqft {
        text: String,
    },
    SubmitSqft {
        text: String,
    },
    SubmitContact {
        contact: ContactDetails,
    },
    SubmissionSettled,
    SwitchLanguage {
        #[serde(default)]
        language: Option<Language>,
    },
    Restart,
    ExitIntent,
}

impl DialogInput {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::SelectOption { .. } => "select_option",
            Self::FreeText { .. } => "free_text",
            Self::EditSqft { .. } => "edit_sqft",
            Self::SubmitSqft { .. } => "submit_sqft",
            Self::SubmitContact { .. } => "submit_contact",
            Self::SubmissionSettled => "submission_settled",
            Self::SwitchLanguage { .. } => "switch_language",
            Self::Restart => "restart",
            Self::ExitIntent => "exit_intent",
        }
    }
}

/// A bot message that has been decided but not yet shown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotReply {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ChatOption>,
}

impl BotReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), options: Vec::new() }
    }

    pub fn with_options(text: impl Into<String>, options: Vec<ChatOption>) -> Self {
        Self { text: text.into(), options }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogEffect {
    MarkInteracted,
    MarkExitIntent,
    ConsumeOptions,
    SelectProject { key: String, label: String },
    RecordSqft { raw: String, sqft: Option<Decimal>, estimate: Option<EstimateRange> },
    StoreContact(ContactDetails),
    BeginSubmission,
    CompleteSubmission,
    ResetConversation { language: Language },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: ChatPath,
    pub to: ChatPath,
    /// Path entered once every reply has been delivered.
    pub settle: Option<ChatPath>,
    pub echo: Option<String>,
    pub replies: Vec<BotReply>,
    pub effects: Vec<DialogEffect>,
}

impl TransitionOutcome {
    pub fn unchanged(path: ChatPath) -> Self {
        Self {
            from: path,
            to: path,
            settle: None,
            echo: None,
            replies: Vec::new(),
            effects: Vec::new(),
        }
    }

    pub fn final_path(&self) -> ChatPath {
        self.settle.unwrap_or(self.to)
    }

    pub fn resets_conversation(&self) -> bool {
        self.effects.iter().any(|effect| matches!(effect, DialogEffect::ResetConversation { .. }))
    }

    pub fn begins_submission(&self) -> bool {
        self.effects.contains(&DialogEffect::BeginSubmission)
    }

    pub fn completes_submission(&self) -> bool {
        self.effects.contains(&DialogEffect::CompleteSubmission)
    }

    pub fn is_noop(&self) -> bool {
        self.from == self.to
            && self.settle.is_none()
            && self.echo.is_none()
            && self.replies.is_empty()
            && self.effects.is_empty()
    }
}
