use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sequence-based identifier; ids grow with creation order inside a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "m{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionIcon {
    Calculator,
    Alert,
    Help,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatOption {
    pub label: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<OptionIcon>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub urgent: bool,
}

impl ChatOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self { label: label.into(), value: value.into(), icon: None, urgent: false }
    }

    pub fn with_icon(mut self, icon: OptionIcon) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn urgent(mut self) -> Self {
        self.urgent = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageBody {
    Bot,
    User,
    Options { options: Vec<ChatOption> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub body: MessageBody,
}

impl Message {
    pub fn options(&self) -> &[ChatOption] {
        match &self.body {
            MessageBody::Options { options } => options,
            MessageBody::Bot | MessageBody::User => &[],
        }
    }

    pub fn is_from_user(&self) -> bool {
        matches!(self.body, MessageBody::User)
    }

    pub fn has_options(&self) -> bool {
        matches!(self.body, MessageBody::Options { .. })
    }
}
