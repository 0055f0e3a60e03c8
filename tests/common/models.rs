//! Behaviors shared by the integration tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use reducer_rs::{ActionItem, Behavior, Mutator};

pub const WORK_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Count {
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountAction {
    Increase,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountMutation {
    Increase,
    SetCount(i64),
}

pub type CountMutator = Mutator<Count, CountAction, CountMutation>;

pub fn reduce_count(state: Count, mutation: CountMutation) -> Count {
    match mutation {
        CountMutation::Increase => Count {
            count: state.count + 1,
        },
        CountMutation::SetCount(count) => Count { count },
    }
}

// ---------------------------------------------------------------------------
// Increase after a short delay; no cancellation policy
// ---------------------------------------------------------------------------

pub struct CountIncrease {
    pub initial: Count,
}

impl CountIncrease {
    pub fn new(count: i64) -> Self {
        Self {
            initial: Count { count },
        }
    }
}

#[async_trait]
impl Behavior for CountIncrease {
    type State = Count;
    type Action = CountAction;
    type Mutation = CountMutation;

    fn initial_state(&self) -> Count {
        self.initial
    }

    async fn mutate(
        &self,
        _state: Count,
        action: CountAction,
        mutator: CountMutator,
    ) -> anyhow::Result<()> {
        match action {
            CountAction::Increase => {
                tokio::time::sleep(WORK_DELAY).await;
                mutator.mutate(CountMutation::Increase)?;
            }
        }
        Ok(())
    }

    fn reduce(&self, state: Count, mutation: CountMutation) -> Count {
        reduce_count(state, mutation)
    }
}

// ---------------------------------------------------------------------------
// Set count from the latest state; a repeated action cancels the older one
// ---------------------------------------------------------------------------

pub struct CountSet;

#[async_trait]
impl Behavior for CountSet {
    type State = Count;
    type Action = CountAction;
    type Mutation = CountMutation;

    fn initial_state(&self) -> Count {
        Count { count: 0 }
    }

    async fn mutate(
        &self,
        _state: Count,
        action: CountAction,
        mutator: CountMutator,
    ) -> anyhow::Result<()> {
        match action {
            CountAction::Increase => {
                tokio::time::sleep(WORK_DELAY).await;
                mutator.mutate(CountMutation::SetCount(mutator.state().count + 1))?;
            }
        }
        Ok(())
    }

    fn reduce(&self, state: Count, mutation: CountMutation) -> Count {
        reduce_count(state, mutation)
    }

    fn should_cancel(
        &self,
        current: &ActionItem<Count, CountAction>,
        upcoming: &ActionItem<Count, CountAction>,
    ) -> bool {
        current.action == upcoming.action
    }
}

// ---------------------------------------------------------------------------
// Start hooks
// ---------------------------------------------------------------------------

/// Emits one increase from `start` after a delay.
pub struct AwaitStart;

#[async_trait]
impl Behavior for AwaitStart {
    type State = Count;
    type Action = CountAction;
    type Mutation = CountMutation;

    fn initial_state(&self) -> Count {
        Count { count: 0 }
    }

    async fn start(&self, mutator: CountMutator) -> anyhow::Result<()> {
        tokio::time::sleep(WORK_DELAY).await;
        mutator.mutate(CountMutation::Increase)?;
        Ok(())
    }

    fn reduce(&self, state: Count, mutation: CountMutation) -> Count {
        reduce_count(state, mutation)
    }
}

/// Starts a ticker that lives as long as the engine.
pub struct Ticker {
    pub every: Duration,
}

#[async_trait]
impl Behavior for Ticker {
    type State = Count;
    type Action = CountAction;
    type Mutation = CountMutation;

    fn initial_state(&self) -> Count {
        Count { count: 0 }
    }

    async fn start(&self, mutator: CountMutator) -> anyhow::Result<()> {
        let every = self.every;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = mutator.closed() => break,
                    _ = interval.tick() => {
                        if mutator.mutate(CountMutation::Increase).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        Ok(())
    }

    fn reduce(&self, state: Count, mutation: CountMutation) -> Count {
        reduce_count(state, mutation)
    }
}

/// `start` fails outright.
pub struct FailingStart;

#[async_trait]
impl Behavior for FailingStart {
    type State = Count;
    type Action = CountAction;
    type Mutation = CountMutation;

    fn initial_state(&self) -> Count {
        Count { count: 0 }
    }

    async fn start(&self, _mutator: CountMutator) -> anyhow::Result<()> {
        Err(anyhow!("subscription refused"))
    }

    fn reduce(&self, state: Count, mutation: CountMutation) -> Count {
        reduce_count(state, mutation)
    }
}

// ---------------------------------------------------------------------------
// Errors routed to on_error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
#[error("test error: {0}")]
pub struct TestError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorState {
    pub count: i64,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorAction {
    OccurError(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorMutation {
    Recovered { count: i64, error: String },
}

pub struct ErrorBehavior;

#[async_trait]
impl Behavior for ErrorBehavior {
    type State = ErrorState;
    type Action = ErrorAction;
    type Mutation = ErrorMutation;

    fn initial_state(&self) -> ErrorState {
        ErrorState::default()
    }

    async fn mutate(
        &self,
        _state: ErrorState,
        action: ErrorAction,
        _mutator: Mutator<ErrorState, ErrorAction, ErrorMutation>,
    ) -> anyhow::Result<()> {
        match action {
            ErrorAction::OccurError(message) => Err(TestError(message).into()),
        }
    }

    fn reduce(&self, _state: ErrorState, mutation: ErrorMutation) -> ErrorState {
        match mutation {
            ErrorMutation::Recovered { count, error } => ErrorState {
                count,
                last_error: Some(error),
            },
        }
    }

    async fn on_error(
        &self,
        error: anyhow::Error,
        action: ErrorAction,
        mutator: Mutator<ErrorState, ErrorAction, ErrorMutation>,
    ) {
        let ErrorAction::OccurError(message) = action;
        let recovered = match error.downcast_ref::<TestError>() {
            Some(TestError(inner)) if *inner == message => inner.clone(),
            _ => format!("unexpected: {error}"),
        };
        let _ = mutator.mutate(ErrorMutation::Recovered {
            count: mutator.state().count + 1,
            error: recovered,
        });
    }
}

/// `mutate` sleeps, then fails; a repeated action cancels the older one.
/// Counts how often the engine consults `should_cancel` and `on_error`.
#[derive(Default)]
pub struct FailAfterDelay {
    pub should_cancel_calls: Arc<AtomicUsize>,
    pub on_error_calls: Arc<AtomicUsize>,
}

impl FailAfterDelay {
    pub fn counters(&self) -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        (
            Arc::clone(&self.should_cancel_calls),
            Arc::clone(&self.on_error_calls),
        )
    }
}

#[async_trait]
impl Behavior for FailAfterDelay {
    type State = Count;
    type Action = CountAction;
    type Mutation = CountMutation;

    fn initial_state(&self) -> Count {
        Count { count: 0 }
    }

    async fn mutate(
        &self,
        _state: Count,
        _action: CountAction,
        _mutator: CountMutator,
    ) -> anyhow::Result<()> {
        tokio::time::sleep(Duration::from_millis(30)).await;
        Err(anyhow!("upstream timed out"))
    }

    fn reduce(&self, state: Count, mutation: CountMutation) -> Count {
        reduce_count(state, mutation)
    }

    fn should_cancel(
        &self,
        current: &ActionItem<Count, CountAction>,
        upcoming: &ActionItem<Count, CountAction>,
    ) -> bool {
        self.should_cancel_calls.fetch_add(1, Ordering::SeqCst);
        current.action == upcoming.action
    }

    async fn on_error(&self, _error: anyhow::Error, _action: CountAction, mutator: CountMutator) {
        self.on_error_calls.fetch_add(1, Ordering::SeqCst);
        let _ = mutator.mutate(CountMutation::Increase);
    }
}

// ---------------------------------------------------------------------------
// Arrival-order log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogAction {
    /// Push `value` after waiting `delay_ms`.
    Push { value: u32, delay_ms: u64 },
    /// Re-dispatch as a `Push` with no delay.
    Forward(u32),
}

pub struct ArrivalLog;

#[async_trait]
impl Behavior for ArrivalLog {
    type State = Vec<u32>;
    type Action = LogAction;
    type Mutation = u32;

    fn initial_state(&self) -> Vec<u32> {
        Vec::new()
    }

    async fn mutate(
        &self,
        _state: Vec<u32>,
        action: LogAction,
        mutator: Mutator<Vec<u32>, LogAction, u32>,
    ) -> anyhow::Result<()> {
        match action {
            LogAction::Push { value, delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                mutator.mutate(value)?;
            }
            LogAction::Forward(value) => {
                mutator.dispatch(LogAction::Push { value, delay_ms: 0 })?;
            }
        }
        Ok(())
    }

    fn reduce(&self, mut state: Vec<u32>, mutation: u32) -> Vec<u32> {
        state.push(mutation);
        state
    }
}
