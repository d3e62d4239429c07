use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::contact::FormFields;
use crate::domain::message::{Message, MessageBody, MessageId};
use crate::flows::states::{BotReply, ChatPath, DialogEffect, TransitionOutcome};
use crate::i18n::Language;
use crate::pricing::{estimate, EstimateRange, PricingTable};

/// Project selection and sizing gathered on the estimate path.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateData {
    pub project_type: Option<String>,
    pub sqft: Option<Decimal>,
    pub range: Option<EstimateRange>,
}

/// Everything the chat widget knows about one conversation.
///
/// The path and progress move together through [`DialogState::set_path`];
/// messages are append-only outside of a conversation reset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogState {
    #[serde(default)]
    language: Language,
    #[serde(rename = "currentPath")]
    path: ChatPath,
    messages: Vec<Message>,
    #[serde(default)]
    form_data: FormFields,
    #[serde(default)]
    estimate_data: EstimateData,
    progress: u8,
    #[serde(default)]
    has_interacted: bool,
    #[serde(default)]
    exit_intent_fired: bool,
    #[serde(default)]
    submitting: bool,
    #[serde(default)]
    awaiting_choice: Option<MessageId>,
    #[serde(default)]
    next_message_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pending_settle: Option<ChatPath>,
    #[serde(skip)]
    pending_replies: usize,
}

impl DialogState {
    pub fn new(language: Language) -> Self {
        Self { language, ..Self::default() }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn path(&self) -> ChatPath {
        self.path
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn form_data(&self) -> &FormFields {
        &self.form_data
    }

    pub fn estimate(&self) -> &EstimateData {
        &self.estimate_data
    }

    pub fn has_interacted(&self) -> bool {
        self.has_interacted
    }

    pub fn exit_intent_fired(&self) -> bool {
        self.exit_intent_fired
    }

    pub fn submitting(&self) -> bool {
        self.submitting
    }

    pub fn awaiting_choice(&self) -> Option<MessageId> {
        self.awaiting_choice
    }

    pub fn pending_replies(&self) -> usize {
        self.pending_replies
    }

    pub fn pending_settle(&self) -> Option<ChatPath> {
        self.pending_settle
    }

    /// Range for the current project and square footage, recomputed from the
    /// pricing table rather than trusted from storage.
    pub fn current_estimate(&self) -> Option<EstimateRange> {
        let key = self.estimate_data.project_type.as_deref()?;
        let sqft = self.estimate_data.sqft?;
        PricingTable.find(key).and_then(|rule| estimate(rule, sqft))
    }

    fn set_path(&mut self, path: ChatPath) {
        self.path = path;
        self.progress = path.progress();
    }

    /// Applies the state-changing half of an outcome: effects, the user echo
    /// and the path change. Bot replies are counted as pending until each one
    /// is handed to [`deliver`](Self::deliver).
    pub fn apply(&mut self, outcome: &TransitionOutcome, now: DateTime<Utc>) -> Option<Message> {
        for effect in &outcome.effects {
            self.apply_effect(effect);
        }

        let echo = outcome.echo.as_ref().map(|text| self.push(text.clone(), MessageBody::User, now));

        self.set_path(outcome.to);
        self.pending_replies += outcome.replies.len();
        if outcome.settle.is_some() {
            self.pending_settle = outcome.settle;
        }
        if self.pending_replies == 0 {
            self.settle();
        }

        echo
    }

    /// Appends one bot reply, tracking the option message that now awaits a choice.
    pub fn deliver(&mut self, reply: &BotReply, now: DateTime<Utc>) -> Message {
        let body = if reply.options.is_empty() {
            MessageBody::Bot
        } else {
            MessageBody::Options { options: reply.options.clone() }
        };
        let message = self.push(reply.text.clone(), body, now);
        if message.has_options() {
            self.awaiting_choice = Some(message.id);
        }

        self.pending_replies = self.pending_replies.saturating_sub(1);
        if self.pending_replies == 0 {
            self.settle();
        }
        message
    }

    /// Applies an outcome and delivers its replies at once, for callers that
    /// do their own pacing.
    pub fn apply_and_deliver(
        &mut self,
        outcome: &TransitionOutcome,
        now: DateTime<Utc>,
    ) -> Vec<Message> {
        let mut delivered = Vec::with_capacity(outcome.replies.len() + 1);
        delivered.extend(self.apply(outcome, now));
        for reply in &outcome.replies {
            delivered.push(self.deliver(reply, now));
        }
        delivered
    }

    /// Brings a restored snapshot to rest: replies that were in flight when it
    /// was saved are gone, so any deferred path change happens now.
    pub fn resumed(mut self) -> Self {
        self.pending_replies = 0;
        self.settle();
        self.progress = self.path.progress();
        self
    }

    /// Drops any scheduled-but-undelivered replies, e.g. after their delivery
    /// task was aborted.
    pub fn abandon_pending(&mut self) {
        self.pending_replies = 0;
        self.settle();
    }

    fn settle(&mut self) {
        if let Some(path) = self.pending_settle.take() {
            self.set_path(path);
        }
    }

    fn push(&mut self, text: String, body: MessageBody, now: DateTime<Utc>) -> Message {
        self.next_message_id += 1;
        let message =
            Message { id: MessageId(self.next_message_id), text, timestamp: now, body };
        self.messages.push(message.clone());
        message
    }

    fn apply_effect(&mut self, effect: &DialogEffect) {
        match effect {
            DialogEffect::MarkInteracted => self.has_interacted = true,
            DialogEffect::MarkExitIntent => self.exit_intent_fired = true,
            DialogEffect::ConsumeOptions => self.awaiting_choice = None,
            DialogEffect::SelectProject { key, label } => {
                self.estimate_data =
                    EstimateData { project_type: Some(key.clone()), sqft: None, range: None };
                self.form_data.project_type = label.clone();
                self.form_data.sqft.clear();
            }
            DialogEffect::RecordSqft { raw, sqft, estimate } => {
                self.form_data.sqft = raw.trim().to_string();
                self.estimate_data.sqft = *sqft;
                self.estimate_data.range = estimate.clone();
            }
            DialogEffect::StoreContact(contact) => self.form_data.apply_contact(contact),
            DialogEffect::BeginSubmission => self.submitting = true,
            DialogEffect::CompleteSubmission => self.submitting = false,
            DialogEffect::ResetConversation { language } => self.reset(*language),
        }
    }

    /// Starts the conversation over in `language`, keeping the visitor's
    /// contact details but nothing tied to the abandoned path.
    fn reset(&mut self, language: Language) {
        let form_data = self.form_data.clone();
        *self = Self {
            language,
            form_data,
            has_interacted: self.has_interacted,
            exit_intent_fired: self.exit_intent_fired,
            next_message_id: self.next_message_id,
            ..Self::default()
        };
        self.form_data.clear_project();
        self.set_path(ChatPath::Initial);
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::DialogState;
    use crate::domain::contact::ContactDetails;
    use crate::flows::states::{BotReply, ChatPath, DialogEffect, TransitionOutcome};
    use crate::i18n::Language;

    fn outcome(from: ChatPath, to: ChatPath) -> TransitionOutcome {
        TransitionOutcome { to, ..TransitionOutcome::unchanged(from) }
    }

    #[test]
    fn progress_follows_path() {
        let mut state = DialogState::new(Language::En);
        state.apply(&outcome(ChatPath::Initial, ChatPath::EstimateDetails), Utc::now());
        assert_eq!(state.path(), ChatPath::EstimateDetails);
        assert_eq!(state.progress(), 50);
    }

    #[test]
    fn settle_waits_for_the_last_reply() {
        let now = Utc::now();
        let mut state = DialogState::new(Language::En);
        let mut chain = outcome(ChatPath::Initial, ChatPath::Emergency);
        chain.settle = Some(ChatPath::EmergencyContact);
        chain.replies = vec![BotReply::text("one"), BotReply::text("two")];

        state.apply(&chain, now);
        assert_eq!(state.path(), ChatPath::Emergency);
        assert_eq!(state.pending_replies(), 2);

        state.deliver(&chain.replies[0], now);
        assert_eq!(state.path(), ChatPath::Emergency);
        state.deliver(&chain.replies[1], now);
        assert_eq!(state.path(), ChatPath::EmergencyContact);
        assert_eq!(state.progress(), 70);
    }

    #[test]
    fn message_ids_increase_and_options_await_a_choice() {
        let now = Utc::now();
        let mut state = DialogState::new(Language::En);
        let mut greet = outcome(ChatPath::Initial, ChatPath::Initial);
        greet.echo = Some("hello".into());
        greet.replies = vec![BotReply::with_options(
            "pick one",
            vec![crate::domain::message::ChatOption::new("A", "a")],
        )];

        let delivered = state.apply_and_deliver(&greet, now);
        assert_eq!(delivered.len(), 2);
        assert!(delivered[0].id < delivered[1].id);
        assert!(delivered[0].is_from_user());
        assert_eq!(state.awaiting_choice(), Some(delivered[1].id));
    }

    #[test]
    fn reset_keeps_contact_details_and_drops_the_project() {
        let now = Utc::now();
        let mut state = DialogState::new(Language::En);
        let mut picked = outcome(ChatPath::Estimate, ChatPath::EstimateContact);
        picked.echo = Some("150".into());
        picked.effects = vec![
            DialogEffect::SelectProject { key: "kitchen".into(), label: "Kitchen Renovation".into() },
            DialogEffect::RecordSqft { raw: "150".into(), sqft: Some(Decimal::from(150)), estimate: None },
            DialogEffect::StoreContact(ContactDetails {
                name: "Ana".into(),
                phone: "555".into(),
                email: Some("ana@example.com".into()),
                ..ContactDetails::default()
            }),
        ];
        state.apply(&picked, now);
        assert!(state.current_estimate().is_some());

        let mut reset = outcome(ChatPath::EstimateContact, ChatPath::Initial);
        reset.effects = vec![DialogEffect::ResetConversation { language: Language::Es }];
        state.apply(&reset, now);

        assert_eq!(state.language(), Language::Es);
        assert_eq!(state.path(), ChatPath::Initial);
        assert!(state.messages().is_empty());
        assert_eq!(state.form_data().name, "Ana");
        assert_eq!(state.form_data().email, "ana@example.com");
        assert!(state.form_data().project_type.is_empty());
        assert!(state.form_data().sqft.is_empty());
        assert_eq!(state.estimate().project_type, None);
        assert_eq!(state.current_estimate(), None);
    }

    #[test]
    fn snapshot_uses_cache_field_names_and_resumes_at_rest() {
        let now = Utc::now();
        let mut state = DialogState::new(Language::En);
        let mut chain = outcome(ChatPath::Initial, ChatPath::Emergency);
        chain.settle = Some(ChatPath::EmergencyContact);
        chain.replies = vec![BotReply::text("one"), BotReply::text("two")];
        state.apply(&chain, now);
        state.deliver(&chain.replies[0], now);

        let json = serde_json::to_value(&state).expect("serialize");
        for key in ["messages", "formData", "currentPath", "estimateData", "progress", "hasInteracted"]
        {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["currentPath"], "emergency");

        let restored: DialogState = serde_json::from_value(json).expect("deserialize");
        let restored = restored.resumed();
        assert_eq!(restored.path(), ChatPath::EmergencyContact);
        assert_eq!(restored.pending_replies(), 0);
        assert_eq!(restored.messages().len(), 1);
    }
}
