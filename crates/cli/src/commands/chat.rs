//! Terminal rendition of the chat widget: numbered options, a contact form
//! prompted field by field and the same resume offer the site shows.

use std::sync::Arc;
use std::time::Duration;

use leadline_core::config::AppConfig;
use leadline_core::domain::contact::ContactForm;
use leadline_core::flows::{ChatPath, DialogInput};
use leadline_core::session::{
    RandomTypingDelay, RuntimeEvent, RuntimeOptions, SessionStore, TypingDelay,
};
use leadline_core::{
    BusinessInfo, ContactDetails, DialogEngine, DialogRuntime, DialogState, Language,
    LeadCaptureFlow, Message, MessageBody, SessionCache,
};
use leadline_db::{connect_with_settings, migrations, SqlSessionStore};
use serde_json::json;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::commands::{current_thread_runtime, load_config, CommandResult};

const REPLY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("timed out waiting for the next reply")]
    ReplyTimeout,
    #[error("dialog runtime stopped publishing events")]
    EventsClosed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatSummary {
    pub path: ChatPath,
    pub language: Language,
    pub messages: usize,
    pub resumed: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ChatArgs {
    pub language: Language,
    /// Discard any saved conversation instead of offering to resume it.
    pub fresh: bool,
}

enum Action {
    Quit,
    Skip,
    Input(DialogInput),
}

pub fn run(args: ChatArgs) -> CommandResult {
    let config = match load_config("chat") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match current_thread_runtime("chat") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let chat = start_runtime(
            &config,
            Arc::new(SqlSessionStore::new(pool.clone())),
            Arc::new(RandomTypingDelay::from_config(&config.dialog)),
            args.language,
        );
        if args.fresh {
            chat.resume(false).await;
        }

        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        let summary = converse(&chat, stdin, &mut stdout)
            .await
            .map_err(|error| ("terminal", error.to_string(), 6u8))?;

        pool.close().await;
        Ok::<ChatSummary, (&'static str, String, u8)>(summary)
    });

    match result {
        Ok(summary) => CommandResult::success_with(
            "chat",
            format!("conversation ended on `{}`", summary.path.as_str()),
            Some(json!({
                "path": summary.path,
                "language": summary.language,
                "messages": summary.messages,
                "resumed": summary.resumed,
            })),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("chat", error_class, message, exit_code)
        }
    }
}

pub fn start_runtime(
    config: &AppConfig,
    store: Arc<dyn SessionStore>,
    typing: Arc<dyn TypingDelay>,
    language: Language,
) -> DialogRuntime {
    let engine = DialogEngine::new(LeadCaptureFlow::new(BusinessInfo::from(&config.business)));
    let cache = SessionCache::new(store, config.dialog.session_cache_key.clone());
    let options = RuntimeOptions::from_config(&config.dialog, format!("cli-{}", Uuid::new_v4()));
    DialogRuntime::new(engine, cache, typing, options, DialogState::new(language))
}

/// Runs the conversation until it completes, the visitor quits or input ends.
pub async fn converse<R, W>(
    runtime: &DialogRuntime,
    input: R,
    output: &mut W,
) -> Result<ChatSummary, ShellError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut events = runtime.subscribe();
    let mut lines = input.lines();
    let mut resumed = false;

    if let Some(offer) = runtime.recovery_offer().await {
        write(
            output,
            &format!(
                "Resume your previous conversation ({} messages)? [y/N] ",
                offer.message_count()
            ),
        )
        .await?;
        let answer = lines.next_line().await?.unwrap_or_default();
        resumed = runtime.resume(answer.trim().to_ascii_lowercase().starts_with('y')).await;
        if resumed {
            let restored = runtime.snapshot().await;
            for message in restored.messages() {
                render(output, message).await?;
            }
        }
    }

    if !resumed {
        step(runtime, &mut events, output, DialogInput::Open).await?;
    }

    loop {
        let state = runtime.snapshot().await;
        if state.path().is_terminal() {
            break;
        }

        let action = match state.path().contact_form() {
            Some(form) => prompt_contact(&mut lines, output, &state, form).await?,
            None => {
                write(output, "> ").await?;
                match lines.next_line().await? {
                    Some(line) => interpret(&state, line.trim()),
                    None => Action::Quit,
                }
            }
        };

        match action {
            Action::Quit => break,
            Action::Skip => continue,
            Action::Input(input) => step(runtime, &mut events, output, input).await?,
        }
    }

    let state = runtime.snapshot().await;
    Ok(ChatSummary {
        path: state.path(),
        language: state.language(),
        messages: state.messages().len(),
        resumed,
    })
}

async fn step<W>(
    runtime: &DialogRuntime,
    events: &mut broadcast::Receiver<RuntimeEvent>,
    output: &mut W,
    input: DialogInput,
) -> Result<(), ShellError>
where
    W: AsyncWrite + Unpin,
{
    let outcome = match runtime.dispatch(input).await {
        Ok(outcome) => outcome,
        Err(error) => return write(output, &format!("! {error}\n")).await,
    };

    let mut expected = outcome.replies.len();
    if outcome.begins_submission() {
        write(output, "... sending\n").await?;
        expected += 1;
    }

    let mut received = 0;
    while received < expected {
        let event = tokio::time::timeout(REPLY_TIMEOUT, events.recv())
            .await
            .map_err(|_| ShellError::ReplyTimeout)?;
        match event {
            Ok(RuntimeEvent::Message { message }) if message.body != MessageBody::User => {
                render(output, &message).await?;
                received += 1;
            }
            Ok(_) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => return Err(ShellError::EventsClosed),
        }
    }
    Ok(())
}

fn interpret(state: &DialogState, line: &str) -> Action {
    if line.is_empty() {
        return Action::Skip;
    }

    if let Some(command) = line.strip_prefix('/') {
        let mut parts = command.split_whitespace();
        return match (parts.next(), parts.next()) {
            (Some("quit" | "exit"), _) => Action::Quit,
            (Some("restart"), _) => Action::Input(DialogInput::Restart),
            (Some("lang"), requested) => Action::Input(DialogInput::SwitchLanguage {
                language: requested.and_then(|code| code.parse().ok()),
            }),
            _ => Action::Skip,
        };
    }

    if let Some((message_id, value)) = numbered_choice(state, line) {
        return Action::Input(DialogInput::SelectOption { message_id: Some(message_id), value });
    }

    let text = line.to_string();
    match state.path() {
        ChatPath::EstimateDetails => Action::Input(DialogInput::SubmitSqft { text }),
        _ => Action::Input(DialogInput::FreeText { text }),
    }
}

fn numbered_choice(state: &DialogState, line: &str) -> Option<(leadline_core::MessageId, String)> {
    let index = line.parse::<usize>().ok()?.checked_sub(1)?;
    let awaiting = state.awaiting_choice()?;
    let message = state.messages().iter().find(|message| message.id == awaiting)?;
    let option = message.options().get(index)?;
    Some((awaiting, option.value.clone()))
}

async fn prompt_contact<R, W>(
    lines: &mut Lines<R>,
    output: &mut W,
    state: &DialogState,
    form: ContactForm,
) -> Result<Action, ShellError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let third = match form {
        ContactForm::Estimate => "Email",
        ContactForm::Emergency => "Address",
    };

    let mut answers = Vec::with_capacity(4);
    for label in ["Name", "Phone", third, "Message (optional)"] {
        write(output, &format!("{label}: ")).await?;
        let Some(line) = lines.next_line().await? else {
            return Ok(Action::Quit);
        };
        let line = line.trim().to_string();
        if line.starts_with('/') {
            return Ok(interpret(state, &line));
        }
        answers.push(line);
    }

    let optional = |value: &String| (!value.is_empty()).then(|| value.clone());
    let mut contact = ContactDetails {
        name: answers[0].clone(),
        phone: answers[1].clone(),
        message: optional(&answers[3]),
        ..ContactDetails::default()
    };
    match form {
        ContactForm::Estimate => contact.email = optional(&answers[2]),
        ContactForm::Emergency => contact.address = optional(&answers[2]),
    }

    Ok(Action::Input(DialogInput::SubmitContact { contact }))
}

async fn render<W>(output: &mut W, message: &Message) -> Result<(), ShellError>
where
    W: AsyncWrite + Unpin,
{
    let speaker = match message.body {
        MessageBody::User => "you",
        MessageBody::Bot | MessageBody::Options { .. } => "bot",
    };
    let mut text = format!("{speaker}: {}\n", message.text);
    for (index, option) in message.options().iter().enumerate() {
        text.push_str(&format!("  {}) {}\n", index + 1, option.label));
    }
    write(output, &text).await
}

async fn write<W>(output: &mut W, text: &str) -> Result<(), ShellError>
where
    W: AsyncWrite + Unpin,
{
    output.write_all(text.as_bytes()).await?;
    output.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use leadline_core::config::AppConfig;
    use leadline_core::flows::ChatPath;
    use leadline_core::session::FixedTypingDelay;
    use leadline_core::Language;
    use leadline_db::InMemorySessionStore;

    use super::{converse, start_runtime, ChatSummary};

    async fn talk(store: Arc<InMemorySessionStore>, script: &str) -> (ChatSummary, String) {
        let runtime = start_runtime(
            &AppConfig::default(),
            store,
            Arc::new(FixedTypingDelay(Duration::ZERO)),
            Language::En,
        );
        let mut output = Vec::new();
        let summary =
            converse(&runtime, script.as_bytes(), &mut output).await.expect("conversation");
        (summary, String::from_utf8(output).expect("utf8"))
    }

    #[tokio::test(start_paused = true)]
    async fn estimate_conversation_runs_to_completion() {
        let store = Arc::new(InMemorySessionStore::default());

        let (summary, transcript) =
            talk(store.clone(), "1\n1\n150\nAna\n555-0100\nana@example.com\n\n").await;

        assert_eq!(summary.path, ChatPath::Complete);
        assert!(transcript.contains("  1) "), "{transcript}");
        assert!(transcript.contains("$22,500 to $52,500"), "{transcript}");
        assert!(transcript.contains("Email: "));
        assert!(store.is_empty().await, "completed conversations are not kept");
    }

    #[tokio::test(start_paused = true)]
    async fn missing_contact_fields_are_reported_and_reprompted() {
        let store = Arc::new(InMemorySessionStore::default());

        let (summary, transcript) = talk(store, "1\n1\n150\nAna\n\n\n\n/quit\n").await;

        assert_eq!(summary.path, ChatPath::EstimateContact);
        assert!(transcript.contains("! missing required fields"), "{transcript}");
        assert_eq!(transcript.matches("Name: ").count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn leak_goes_straight_to_emergency_contact() {
        let store = Arc::new(InMemorySessionStore::default());

        let (summary, transcript) = talk(store, "water is leaking everywhere\n/quit\n").await;

        assert_eq!(summary.path, ChatPath::EmergencyContact);
        assert!(transcript.contains("(347) 986 4284"), "{transcript}");
        assert!(transcript.ends_with("Name: "), "{transcript}");
    }

    #[tokio::test(start_paused = true)]
    async fn saved_conversation_can_be_resumed() {
        let store = Arc::new(InMemorySessionStore::default());
        let (first, _) = talk(store.clone(), "1\n/quit\n").await;
        assert_eq!(first.path, ChatPath::Estimate);

        let (second, transcript) = talk(store, "y\n/quit\n").await;

        assert!(second.resumed);
        assert_eq!(second.path, ChatPath::Estimate);
        assert_eq!(second.messages, first.messages);
        assert!(transcript.starts_with("Resume your previous conversation (3 messages)? [y/N] "));
    }

    #[tokio::test(start_paused = true)]
    async fn declining_resume_starts_over() {
        let store = Arc::new(InMemorySessionStore::default());
        talk(store.clone(), "1\n/quit\n").await;

        let (summary, _) = talk(store, "n\n/quit\n").await;

        assert!(!summary.resumed);
        assert_eq!(summary.path, ChatPath::Initial);
        assert_eq!(summary.messages, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn language_command_switches_to_spanish() {
        let store = Arc::new(InMemorySessionStore::default());

        let (summary, _) = talk(store, "/lang\n/quit\n").await;

        assert_eq!(summary.language, Language::Es);
        assert_eq!(summary.messages, 1);
    }
}
