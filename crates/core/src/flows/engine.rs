use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::business::BusinessInfo;
use crate::domain::contact::ContactDetails;
use crate::domain::message::{ChatOption, MessageId, OptionIcon};
use crate::flows::classifier::{Intent, IntentClassifier};
use crate::flows::states::{BotReply, ChatPath, DialogEffect, DialogInput, TransitionOutcome};
use crate::i18n::{Language, QuestionTopic};
use crate::pricing::{estimate, parse_sqft, EstimateRange, PricingRule, PricingTable};
use crate::session::state::DialogState;

const OPTION_ESTIMATE: &str = "estimate";
const OPTION_EMERGENCY: &str = "emergency";
const OPTION_QUESTION: &str = "question";
const OPTION_DONE: &str = "done";

pub trait DialogDefinition {
    fn initial_path(&self) -> ChatPath;
    fn transition(
        &self,
        state: &DialogState,
        input: &DialogInput,
    ) -> Result<TransitionOutcome, DialogError>;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DialogError {
    #[error("missing required fields before submitting from {path:?}: {missing_fields:?}")]
    MissingRequiredFields { path: ChatPath, missing_fields: Vec<String> },
    #[error("option selection {message_id:?} does not match a pending choice")]
    StaleSelection { message_id: Option<MessageId> },
    #[error("a contact submission is already in flight")]
    SubmissionInFlight,
}

/// The guided lead-capture conversation: estimate, emergency and question
/// branches off a shared greeting.
#[derive(Clone, Debug)]
pub struct LeadCaptureFlow {
    business: BusinessInfo,
    pricing: PricingTable,
    classifier: IntentClassifier,
}

impl LeadCaptureFlow {
    pub fn new(business: BusinessInfo) -> Self {
        Self { business, pricing: PricingTable, classifier: IntentClassifier::default() }
    }

    pub fn business(&self) -> &BusinessInfo {
        &self.business
    }
}

impl Default for LeadCaptureFlow {
    fn default() -> Self {
        Self::new(BusinessInfo::default())
    }
}

impl DialogDefinition for LeadCaptureFlow {
    fn initial_path(&self) -> ChatPath {
        ChatPath::Initial
    }

    fn transition(
        &self,
        state: &DialogState,
        input: &DialogInput,
    ) -> Result<TransitionOutcome, DialogError> {
        transition_lead_capture(self, state, input)
    }
}

pub struct DialogEngine<F = LeadCaptureFlow> {
    flow: F,
}

impl<F> DialogEngine<F>
where
    F: DialogDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_path(&self) -> ChatPath {
        self.flow.initial_path()
    }

    pub fn apply(
        &self,
        state: &DialogState,
        input: &DialogInput,
    ) -> Result<TransitionOutcome, DialogError> {
        self.flow.transition(state, input)
    }

    /// Same as [`apply`](Self::apply), emitting a structured log line for the
    /// accepted or rejected transition.
    pub fn apply_logged(
        &self,
        state: &DialogState,
        input: &DialogInput,
        correlation_id: &str,
    ) -> Result<TransitionOutcome, DialogError> {
        let result = self.apply(state, input);
        match &result {
            Ok(outcome) if outcome.is_noop() => {
                debug!(
                    event_name = "dialog.transition_ignored",
                    correlation_id = %correlation_id,
                    path = outcome.from.as_str(),
                    input = input.kind(),
                    "input has no effect on the current path"
                );
            }
            Ok(outcome) => {
                info!(
                    event_name = "dialog.transition_applied",
                    correlation_id = %correlation_id,
                    from = outcome.from.as_str(),
                    to = outcome.to.as_str(),
                    settle = outcome.settle.map(ChatPath::as_str).unwrap_or("none"),
                    input = input.kind(),
                    replies = outcome.replies.len(),
                    "dialog transition applied"
                );
            }
            Err(error) => {
                warn!(
                    event_name = "dialog.transition_rejected",
                    correlation_id = %correlation_id,
                    path = state.path().as_str(),
                    input = input.kind(),
                    error = %error,
                    "dialog transition rejected"
                );
            }
        }
        result
    }
}

impl Default for DialogEngine<LeadCaptureFlow> {
    fn default() -> Self {
        Self::new(LeadCaptureFlow::default())
    }
}

/// Greeting with the three top-level branches.
pub fn greeting(language: Language) -> BotReply {
    BotReply::with_options(language.copy().greeting, top_level_options(language))
}

fn top_level_options(language: Language) -> Vec<ChatOption> {
    let copy = language.copy();
    vec![
        ChatOption::new(copy.estimate_btn, OPTION_ESTIMATE).with_icon(OptionIcon::Calculator),
        ChatOption::new(copy.emergency_btn, OPTION_EMERGENCY).with_icon(OptionIcon::Alert).urgent(),
        ChatOption::new(copy.question_btn, OPTION_QUESTION).with_icon(OptionIcon::Help),
    ]
}

fn project_options(flow: &LeadCaptureFlow, language: Language) -> Vec<ChatOption> {
    flow.pricing.rules().iter().map(|rule| ChatOption::new(rule.label(language), rule.key)).collect()
}

fn topic_options(language: Language) -> Vec<ChatOption> {
    QuestionTopic::ALL
        .into_iter()
        .map(|topic| ChatOption::new(topic.label(language), topic.value()))
        .collect()
}

fn transition_lead_capture(
    flow: &LeadCaptureFlow,
    state: &DialogState,
    input: &DialogInput,
) -> Result<TransitionOutcome, DialogError> {
    use ChatPath::{
        Complete, Emergency, EmergencyContact, Estimate, EstimateContact, EstimateDetails,
        Initial, Question,
    };

    let path = state.path();
    let language = state.language();
    let copy = language.copy();

    if let DialogInput::SelectOption { message_id, .. } = input {
        check_selection(state, *message_id)?;
    }

    let mut outcome = match (path, input) {
        (_, DialogInput::SwitchLanguage { language: requested }) => {
            reset(path, requested.unwrap_or_else(|| language.toggled()))
        }
        (_, DialogInput::Restart) => reset(path, language),
        (_, DialogInput::Open) => {
            let mut outcome = TransitionOutcome::unchanged(path);
            if !state.has_interacted() {
                outcome.effects.push(DialogEffect::MarkInteracted);
            }
            if state.messages().is_empty() && state.pending_replies() == 0 {
                outcome.replies.push(greeting(language));
            }
            outcome
        }
        (_, DialogInput::ExitIntent) => {
            let mut outcome = TransitionOutcome::unchanged(path);
            if !state.exit_intent_fired() {
                outcome.effects.push(DialogEffect::MarkExitIntent);
                if !state.has_interacted() {
                    outcome.replies.push(BotReply::with_options(
                        copy.exit_intent_promo,
                        top_level_options(language),
                    ));
                }
            }
            outcome
        }
        (_, DialogInput::SubmissionSettled) => {
            if !state.submitting() {
                TransitionOutcome::unchanged(path)
            } else {
                TransitionOutcome {
                    from: path,
                    to: Complete,
                    settle: None,
                    echo: None,
                    replies: vec![BotReply::text(format!(
                        "{} {}",
                        copy.thank_you, flow.business.phone
                    ))],
                    effects: vec![DialogEffect::CompleteSubmission],
                }
            }
        }
        (Complete, _) => TransitionOutcome::unchanged(path),

        (Initial, DialogInput::SelectOption { value, .. }) => match value.as_str() {
            OPTION_ESTIMATE => start_estimate(flow, path, language, copy.estimate_btn),
            OPTION_EMERGENCY => start_emergency(flow, path, language, copy.emergency_btn),
            OPTION_QUESTION => start_question(path, language, copy.question_btn),
            OPTION_DONE => TransitionOutcome {
                from: path,
                to: Complete,
                settle: None,
                echo: Some(copy.no_thanks.to_string()),
                replies: vec![BotReply::text(copy.farewell)],
                effects: Vec::new(),
            },
            _ => fallback_menu(path, language, None),
        },
        (Initial, DialogInput::FreeText { text }) => {
            match flow.classifier.classify(text) {
                Some(Intent::Emergency) => start_emergency(flow, path, language, text),
                Some(Intent::Estimate) => start_estimate(flow, path, language, text),
                None => fallback_menu(path, language, Some(text.as_str())),
            }
        }

        (Estimate, DialogInput::SelectOption { value, .. }) => match flow.pricing.find(value) {
            Some(rule) => choose_project(path, language, rule, rule.label(language)),
            None => reprompt_projects(flow, path, language, None),
        },
        (Estimate, DialogInput::FreeText { text }) => match flow.pricing.match_text(text) {
            Some(rule) => choose_project(path, language, rule, text),
            None => reprompt_projects(flow, path, language, Some(text.as_str())),
        },

        (EstimateDetails, DialogInput::EditSqft { text }) => TransitionOutcome {
            effects: vec![record_sqft(flow, state, text)],
            ..TransitionOutcome::unchanged(path)
        },
        (EstimateDetails, DialogInput::SubmitSqft { text })
        | (EstimateDetails, DialogInput::FreeText { text }) => {
            submit_sqft(flow, state, language, text)
        }

        (Question, DialogInput::SelectOption { value, .. }) => {
            match QuestionTopic::from_value(value) {
                Some(topic) => answer_topic(path, language, topic, topic.label(language)),
                None => reprompt_topics(path, language, None),
            }
        }
        (Question, DialogInput::FreeText { text }) => match QuestionTopic::match_text(text) {
            Some(topic) => answer_topic(path, language, topic, text),
            None => match flow.classifier.classify(text) {
                Some(Intent::Emergency) => start_emergency(flow, path, language, text),
                Some(Intent::Estimate) => start_estimate(flow, path, language, text),
                None => reprompt_topics(path, language, Some(text.as_str())),
            },
        },

        (EstimateContact | Emergency | EmergencyContact, DialogInput::SubmitContact { contact }) => {
            submit_contact(state, contact)?
        }
        (EstimateContact | Emergency | EmergencyContact, DialogInput::FreeText { text }) => {
            TransitionOutcome {
                echo: Some(text.clone()),
                replies: vec![BotReply::text(copy.use_contact_form)],
                ..TransitionOutcome::unchanged(path)
            }
        }

        (
            Initial | Estimate | EstimateDetails | EstimateContact | Emergency | EmergencyContact
            | Question,
            DialogInput::SelectOption { .. }
            | DialogInput::EditSqft { .. }
            | DialogInput::SubmitSqft { .. }
            | DialogInput::SubmitContact { .. },
        ) => TransitionOutcome::unchanged(path),
    };

    if matches!(input, DialogInput::SelectOption { .. } | DialogInput::FreeText { .. })
        && !outcome.is_noop()
    {
        outcome.effects.insert(0, DialogEffect::ConsumeOptions);
    }

    Ok(outcome)
}

fn check_selection(
    state: &DialogState,
    message_id: Option<MessageId>,
) -> Result<(), DialogError> {
    match (state.awaiting_choice(), message_id) {
        (None, _) => Err(DialogError::StaleSelection { message_id }),
        (Some(awaiting), Some(selected)) if awaiting != selected => {
            Err(DialogError::StaleSelection { message_id })
        }
        (Some(_), _) => Ok(()),
    }
}

fn reset(from: ChatPath, language: Language) -> TransitionOutcome {
    TransitionOutcome {
        from,
        to: ChatPath::Initial,
        settle: None,
        echo: None,
        replies: vec![greeting(language)],
        effects: vec![DialogEffect::ResetConversation { language }],
    }
}

fn start_estimate(
    flow: &LeadCaptureFlow,
    from: ChatPath,
    language: Language,
    echo: &str,
) -> TransitionOutcome {
    TransitionOutcome {
        from,
        to: ChatPath::Estimate,
        settle: None,
        echo: Some(echo.to_string()),
        replies: vec![BotReply::with_options(
            language.copy().estimate_q1,
            project_options(flow, language),
        )],
        effects: Vec::new(),
    }
}

fn start_emergency(
    flow: &LeadCaptureFlow,
    from: ChatPath,
    language: Language,
    echo: &str,
) -> TransitionOutcome {
    let copy = language.copy();
    TransitionOutcome {
        from,
        to: ChatPath::Emergency,
        settle: Some(ChatPath::EmergencyContact),
        echo: Some(echo.to_string()),
        replies: vec![
            BotReply::text(copy.emergency_alert),
            BotReply::text(copy.emergency_info),
            BotReply::text(format!(
                "{} {} {}",
                copy.emergency_warning, flow.business.phone, copy.emergency_warning2
            )),
        ],
        effects: Vec::new(),
    }
}

fn start_question(from: ChatPath, language: Language, echo: &str) -> TransitionOutcome {
    TransitionOutcome {
        from,
        to: ChatPath::Question,
        settle: None,
        echo: Some(echo.to_string()),
        replies: vec![BotReply::with_options(
            language.copy().question_prompt,
            topic_options(language),
        )],
        effects: Vec::new(),
    }
}

fn fallback_menu(from: ChatPath, language: Language, echo: Option<&str>) -> TransitionOutcome {
    TransitionOutcome {
        from,
        to: ChatPath::Initial,
        settle: None,
        echo: echo.map(str::to_string),
        replies: vec![BotReply::with_options(
            language.copy().fallback_prompt,
            top_level_options(language),
        )],
        effects: Vec::new(),
    }
}

fn reprompt_projects(
    flow: &LeadCaptureFlow,
    from: ChatPath,
    language: Language,
    echo: Option<&str>,
) -> TransitionOutcome {
    TransitionOutcome {
        echo: echo.map(str::to_string),
        replies: vec![BotReply::with_options(
            language.copy().estimate_q1,
            project_options(flow, language),
        )],
        ..TransitionOutcome::unchanged(from)
    }
}

fn reprompt_topics(from: ChatPath, language: Language, echo: Option<&str>) -> TransitionOutcome {
    TransitionOutcome {
        echo: echo.map(str::to_string),
        replies: vec![BotReply::with_options(
            language.copy().question_prompt,
            topic_options(language),
        )],
        ..TransitionOutcome::unchanged(from)
    }
}

fn choose_project(
    from: ChatPath,
    language: Language,
    rule: &PricingRule,
    echo: &str,
) -> TransitionOutcome {
    TransitionOutcome {
        from,
        to: ChatPath::EstimateDetails,
        settle: None,
        echo: Some(echo.to_string()),
        replies: vec![BotReply::text(language.copy().estimate_q2)],
        effects: vec![DialogEffect::SelectProject {
            key: rule.key.to_string(),
            label: rule.label(language).to_string(),
        }],
    }
}

fn record_sqft(flow: &LeadCaptureFlow, state: &DialogState, raw: &str) -> DialogEffect {
    let (sqft, range) = measure(flow, state, raw);
    DialogEffect::RecordSqft { raw: raw.to_string(), sqft, estimate: range }
}

fn measure(
    flow: &LeadCaptureFlow,
    state: &DialogState,
    raw: &str,
) -> (Option<Decimal>, Option<EstimateRange>) {
    let sqft = parse_sqft(raw);
    let rule = state.estimate().project_type.as_deref().and_then(|key| flow.pricing.find(key));
    match (rule, sqft) {
        (Some(rule), Some(value)) => match estimate(rule, value) {
            Some(range) => (Some(value), Some(range)),
            None => (None, None),
        },
        _ => (sqft, None),
    }
}

fn submit_sqft(
    flow: &LeadCaptureFlow,
    state: &DialogState,
    language: Language,
    raw: &str,
) -> TransitionOutcome {
    let path = state.path();
    let copy = language.copy();

    if state.estimate().project_type.is_none() {
        return TransitionOutcome {
            to: ChatPath::Estimate,
            ..reprompt_projects(flow, path, language, None)
        };
    }

    let (Some(sqft), Some(range)) = measure(flow, state, raw) else {
        return TransitionOutcome {
            echo: Some(raw.to_string()),
            replies: vec![BotReply::text(copy.estimate_invalid_sqft)],
            effects: vec![record_sqft(flow, state, raw)],
            ..TransitionOutcome::unchanged(path)
        };
    };

    TransitionOutcome {
        from: path,
        to: ChatPath::EstimateContact,
        settle: None,
        echo: Some(format!("{sqft} sq ft")),
        replies: vec![BotReply::text(format!(
            "{} {}. {}",
            copy.estimate_result,
            range.display(),
            copy.estimate_follow
        ))],
        effects: vec![DialogEffect::RecordSqft {
            raw: raw.to_string(),
            sqft: Some(sqft),
            estimate: Some(range),
        }],
    }
}

fn answer_topic(
    from: ChatPath,
    language: Language,
    topic: QuestionTopic,
    echo: &str,
) -> TransitionOutcome {
    let copy = language.copy();
    TransitionOutcome {
        from,
        to: ChatPath::Question,
        settle: Some(ChatPath::Initial),
        echo: Some(echo.to_string()),
        replies: vec![
            BotReply::text(topic.answer(language)),
            BotReply::with_options(
                copy.anything_else,
                vec![
                    ChatOption::new(copy.estimate_btn, OPTION_ESTIMATE)
                        .with_icon(OptionIcon::Calculator),
                    ChatOption::new(copy.no_thanks, OPTION_DONE),
                ],
            ),
        ],
        effects: Vec::new(),
    }
}

fn submit_contact(
    state: &DialogState,
    contact: &ContactDetails,
) -> Result<TransitionOutcome, DialogError> {
    let path = state.path();
    if state.submitting() {
        return Err(DialogError::SubmissionInFlight);
    }

    let missing_fields =
        path.contact_form().map(|form| form.missing_fields(contact)).unwrap_or_default();
    if !missing_fields.is_empty() {
        return Err(DialogError::MissingRequiredFields { path, missing_fields });
    }

    Ok(TransitionOutcome {
        effects: vec![
            DialogEffect::StoreContact(contact.clone()),
            DialogEffect::BeginSubmission,
        ],
        ..TransitionOutcome::unchanged(path)
    })
}
