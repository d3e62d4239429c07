use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::DialogConfig;
use crate::domain::message::Message;
use crate::flows::engine::{DialogEngine, DialogError};
use crate::flows::states::{BotReply, ChatPath, DialogInput, TransitionOutcome};
use crate::session::cache::{RecoveryOffer, SessionCache};
use crate::session::state::DialogState;

const EVENT_CAPACITY: usize = 64;

/// Source of the pause shown before each bot message.
pub trait TypingDelay: Send + Sync {
    fn next_delay(&self) -> Duration;
}

/// Uniformly random delay inside `[min, max]`.
#[derive(Clone, Copy, Debug)]
pub struct RandomTypingDelay {
    min: Duration,
    max: Duration,
}

impl RandomTypingDelay {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min: min.min(max), max: max.max(min) }
    }

    pub fn from_config(config: &DialogConfig) -> Self {
        Self::new(
            Duration::from_millis(config.typing_delay_min_ms),
            Duration::from_millis(config.typing_delay_max_ms),
        )
    }
}

impl TypingDelay for RandomTypingDelay {
    fn next_delay(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FixedTypingDelay(pub Duration);

impl TypingDelay for FixedTypingDelay {
    fn next_delay(&self) -> Duration {
        self.0
    }
}

/// What a presentation shell renders as the conversation moves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RuntimeEvent {
    Typing,
    Message { message: Message },
    PathChanged { from: ChatPath, to: ChatPath, progress: u8 },
    SubmissionSettled,
}

#[derive(Clone, Debug)]
pub struct RuntimeOptions {
    pub submission_delay: Duration,
    pub correlation_id: String,
}

impl RuntimeOptions {
    pub fn from_config(config: &DialogConfig, correlation_id: impl Into<String>) -> Self {
        Self {
            submission_delay: Duration::from_millis(config.submission_delay_ms),
            correlation_id: correlation_id.into(),
        }
    }
}

enum Job {
    Deliver { generation: u64, replies: Vec<BotReply> },
    SettleSubmission { generation: u64 },
}

struct Inner {
    engine: DialogEngine,
    cache: SessionCache,
    typing: Arc<dyn TypingDelay>,
    options: RuntimeOptions,
    state: Mutex<DialogState>,
    generation: AtomicU64,
    timers: StdMutex<Vec<JoinHandle<()>>>,
    events: broadcast::Sender<RuntimeEvent>,
}

/// Drives one conversation: applies inputs immediately and paces bot replies
/// on a background worker so input is never blocked by a typing delay.
///
/// Every queued delivery and timer is tagged with a generation; resets and
/// resumes bump it so superseded work can never touch the new conversation.
/// Must be created inside a tokio runtime.
#[derive(Clone)]
pub struct DialogRuntime {
    inner: Arc<Inner>,
    jobs: mpsc::UnboundedSender<Job>,
}

impl DialogRuntime {
    pub fn new(
        engine: DialogEngine,
        cache: SessionCache,
        typing: Arc<dyn TypingDelay>,
        options: RuntimeOptions,
        state: DialogState,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let inner = Arc::new(Inner {
            engine,
            cache,
            typing,
            options,
            state: Mutex::new(state),
            generation: AtomicU64::new(0),
            timers: StdMutex::new(Vec::new()),
            events,
        });

        let (jobs, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(inner.clone(), receiver));

        Self { inner, jobs }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.inner.events.subscribe()
    }

    pub async fn snapshot(&self) -> DialogState {
        self.inner.state.lock().await.clone()
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Applies one visitor input. The echo and path change are visible as soon
    /// as this returns; bot replies follow on the worker.
    pub async fn dispatch(&self, input: DialogInput) -> Result<TransitionOutcome, DialogError> {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;
        let outcome =
            inner.engine.apply_logged(&state, &input, &inner.options.correlation_id)?;

        if outcome.resets_conversation() {
            self.supersede();
        }

        let generation = self.generation();
        apply_outcome(inner, &mut state, &outcome).await;

        if !outcome.replies.is_empty() {
            self.enqueue(Job::Deliver { generation, replies: outcome.replies.clone() });
        }
        if outcome.begins_submission() {
            self.schedule_settlement(generation);
        }

        Ok(outcome)
    }

    /// The saved conversation waiting to be resumed, if any.
    pub async fn recovery_offer(&self) -> Option<RecoveryOffer> {
        self.inner.cache.offer().await
    }

    /// Accepting swaps the saved conversation in verbatim; declining deletes
    /// it. Returns whether a conversation was restored.
    pub async fn resume(&self, accept: bool) -> bool {
        let Some(offer) = self.inner.cache.offer().await else {
            return false;
        };

        if !accept {
            self.inner.cache.decline().await;
            return false;
        }

        let mut state = self.inner.state.lock().await;
        self.supersede();
        let before = state.path();
        *state = self.inner.cache.accept(offer);
        info!(
            event_name = "session.resumed",
            correlation_id = %self.inner.options.correlation_id,
            path = state.path().as_str(),
            messages = state.messages().len(),
            "dialog resumed from saved snapshot"
        );
        publish(&self.inner, RuntimeEvent::PathChanged {
            from: before,
            to: state.path(),
            progress: state.progress(),
        });
        if state.submitting() {
            self.schedule_settlement(self.generation());
        }
        true
    }

    /// Invalidates queued deliveries and aborts pending timers.
    fn supersede(&self) {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let timers = match self.inner.timers.lock() {
            Ok(mut timers) => std::mem::take(&mut *timers),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for timer in timers {
            timer.abort();
        }
        debug!(
            event_name = "session.generation_bumped",
            correlation_id = %self.inner.options.correlation_id,
            generation,
            "pending dialog work superseded"
        );
    }

    fn enqueue(&self, job: Job) {
        if self.jobs.send(job).is_err() {
            debug!(
                event_name = "session.worker_stopped",
                correlation_id = %self.inner.options.correlation_id,
                "delivery worker is gone; dropping job"
            );
        }
    }

    fn schedule_settlement(&self, generation: u64) {
        let jobs = self.jobs.clone();
        let delay = self.inner.options.submission_delay;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = jobs.send(Job::SettleSubmission { generation });
        });
        match self.inner.timers.lock() {
            Ok(mut timers) => {
                timers.retain(|timer| !timer.is_finished());
                timers.push(timer);
            }
            Err(poisoned) => poisoned.into_inner().push(timer),
        }
    }
}

fn publish(inner: &Inner, event: RuntimeEvent) {
    // No subscribers is fine: events are advisory.
    let _ = inner.events.send(event);
}

fn is_current(inner: &Inner, generation: u64) -> bool {
    inner.generation.load(Ordering::SeqCst) == generation
}

async fn apply_outcome(inner: &Inner, state: &mut DialogState, outcome: &TransitionOutcome) {
    let before = state.path();
    if let Some(echo) = state.apply(outcome, Utc::now()) {
        publish(inner, RuntimeEvent::Message { message: echo });
    }
    if state.path() != before {
        publish(inner, RuntimeEvent::PathChanged {
            from: before,
            to: state.path(),
            progress: state.progress(),
        });
    }
    if outcome.completes_submission() {
        publish(inner, RuntimeEvent::SubmissionSettled);
    }
    inner.cache.persist(state).await;
}

async fn run_worker(inner: Arc<Inner>, mut receiver: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = receiver.recv().await {
        match job {
            Job::Deliver { generation, replies } => deliver(&inner, generation, replies).await,
            Job::SettleSubmission { generation } => settle(&inner, generation).await,
        }
    }
}

async fn deliver(inner: &Inner, generation: u64, replies: Vec<BotReply>) {
    for reply in replies {
        if !is_current(inner, generation) {
            return;
        }
        publish(inner, RuntimeEvent::Typing);
        tokio::time::sleep(inner.typing.next_delay()).await;

        let mut state = inner.state.lock().await;
        if !is_current(inner, generation) {
            return;
        }
        let before = state.path();
        let message = state.deliver(&reply, Utc::now());
        publish(inner, RuntimeEvent::Message { message });
        if state.path() != before {
            publish(inner, RuntimeEvent::PathChanged {
                from: before,
                to: state.path(),
                progress: state.progress(),
            });
        }
        inner.cache.persist(&state).await;
    }
}

async fn settle(inner: &Inner, generation: u64) {
    let replies = {
        let mut state = inner.state.lock().await;
        if !is_current(inner, generation) {
            return;
        }
        let outcome = match inner.engine.apply_logged(
            &state,
            &DialogInput::SubmissionSettled,
            &inner.options.correlation_id,
        ) {
            Ok(outcome) => outcome,
            Err(_) => return,
        };
        apply_outcome(inner, &mut state, &outcome).await;
        outcome.replies
    };
    deliver(inner, generation, replies).await;
}
