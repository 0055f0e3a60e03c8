//! The engine: actions in, work out, mutations serialized into state.
//!
//! [`Engine`] is a cheap handle. The state, the behavior's shared instance
//! and the work registry are owned by a private main domain task; every
//! dispatch, mutation and registry update is a message to that task and is
//! handled one at a time, in arrival order. Work units run concurrently on
//! the tokio runtime and reach back in only through a weak [`Mutator`].
//!
//! Dropping the engine stops the main domain immediately. Queued commands
//! are discarded, the registry is dropped, and every in-flight work unit is
//! cancelled.

use std::sync::Arc;

use opentelemetry::KeyValue;
use tokio::sync::{Notify, broadcast, mpsc, oneshot, watch};
use tracing::{Instrument, debug, error, info, warn};

use crate::behavior::{ActionItem, Behavior};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::mutator::{Command, Mutator};
use crate::registry::{WorkId, WorkRegistry};
use crate::revision::Revision;
use crate::telemetry::metrics;
use crate::telemetry::work::{record_work_outcome, start_work_span};

type CommandOf<B> = Command<<B as Behavior>::Action, <B as Behavior>::Mutation>;
type MutatorOf<B> =
    Mutator<<B as Behavior>::State, <B as Behavior>::Action, <B as Behavior>::Mutation>;

/// Outcome of the behavior's `start` hook.
#[derive(Debug, Clone)]
enum Startup {
    Pending,
    Ready,
    Failed(String),
}

/// Registry key: the start hook, or a dispatched action with the state it
/// was dispatched against.
#[derive(Debug, Clone)]
enum WorkKey<S, A> {
    Start,
    Action(ActionItem<S, A>),
}

/// Handle to a running engine.
pub struct Engine<B: Behavior> {
    commands: mpsc::UnboundedSender<CommandOf<B>>,
    state: watch::Receiver<B::State>,
    changes: broadcast::Sender<Revision<B::State>>,
    startup: watch::Receiver<Startup>,
    shutdown: Arc<Notify>,
    initial_state: B::State,
    config: EngineConfig,
}

impl<B: Behavior> Engine<B> {
    /// Build an engine with the default [`EngineConfig`].
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn new(behavior: B) -> Self {
        Self::with_config(behavior, EngineConfig::default())
    }

    /// Build an engine and schedule the behavior's `start` hook. Returns
    /// without waiting for `start`; see [`Engine::started`].
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn with_config(behavior: B, config: EngineConfig) -> Self {
        let behavior = Arc::new(behavior);
        let initial_state = behavior.initial_state();

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(initial_state.clone());
        let (changes, _) = broadcast::channel(config.change_buffer.max(1));
        let (startup_tx, startup_rx) = watch::channel(Startup::Pending);
        let shutdown = Arc::new(Notify::new());

        let mut domain = MainDomain {
            behavior,
            state: Revision::new(initial_state.clone()),
            initial_state: initial_state.clone(),
            registry: WorkRegistry::new(),
            commands: commands_rx,
            mutator_commands: commands_tx.downgrade(),
            state_tx,
            changes: changes.clone(),
            name: config.name.clone(),
        };
        domain.start(startup_tx);
        tokio::spawn(domain.run(Arc::clone(&shutdown)));

        info!(engine = %config.name, "engine started");

        Self {
            commands: commands_tx,
            state: state_rx,
            changes,
            startup: startup_rx,
            shutdown,
            initial_state,
            config,
        }
    }

    /// Fire off an action. Returns immediately; the work runs in the
    /// background and reports errors to the behavior's `on_error`.
    pub fn dispatch(&self, action: B::Action) {
        if self.commands.send(Command::Dispatch(action)).is_err() {
            warn!(engine = %self.config.name, "dispatch on a stopped engine ignored");
        }
    }

    /// Queue a mutation, the same way a work unit does through its mutator.
    pub fn apply(&self, mutation: B::Mutation) {
        if self.commands.send(Command::Apply(mutation)).is_err() {
            warn!(engine = %self.config.name, "mutation on a stopped engine ignored");
        }
    }

    /// Latest applied state.
    pub fn state(&self) -> B::State {
        self.state.borrow().clone()
    }

    pub fn initial_state(&self) -> &B::State {
        &self.initial_state
    }

    /// Latest-value observation. Intermediate states may be coalesced; use
    /// [`Engine::subscribe`] to see every change.
    pub fn watch(&self) -> watch::Receiver<B::State> {
        self.state.clone()
    }

    /// One notification per applied mutation, in apply order, starting with
    /// the next one applied after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Revision<B::State>> {
        self.changes.subscribe()
    }

    /// A weak handle into this engine, like the one every hook receives.
    pub fn mutator(&self) -> MutatorOf<B> {
        Mutator::new(
            self.commands.downgrade(),
            self.state.clone(),
            self.initial_state.clone(),
        )
    }

    /// Wait for the behavior's `start` hook to finish.
    ///
    /// # Errors
    ///
    /// [`Error::Start`] if `start` returned an error, [`Error::Closed`] if
    /// the engine stopped before `start` finished.
    pub async fn started(&self) -> Result<()> {
        let mut startup = self.startup.clone();
        let outcome = startup
            .wait_for(|startup| !matches!(startup, Startup::Pending))
            .await
            .map_err(|_| Error::Closed)?
            .clone();

        match outcome {
            Startup::Failed(message) => Err(Error::Start(message)),
            Startup::Pending | Startup::Ready => Ok(()),
        }
    }

    /// Number of work units currently tracked by the registry, including an
    /// unfinished `start`.
    pub async fn in_flight(&self) -> Result<usize> {
        let (reply, count) = oneshot::channel();
        self.commands
            .send(Command::InFlight(reply))
            .map_err(|_| Error::Closed)?;
        count.await.map_err(|_| Error::Closed)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl<B: Behavior> Drop for Engine<B> {
    fn drop(&mut self) {
        self.shutdown.notify_one();
    }
}

/// Sole owner of the state and the work registry. Runs as one task; every
/// method here executes on that task.
struct MainDomain<B: Behavior> {
    behavior: Arc<B>,
    state: Revision<B::State>,
    initial_state: B::State,
    registry: WorkRegistry<WorkKey<B::State, B::Action>>,
    commands: mpsc::UnboundedReceiver<CommandOf<B>>,
    mutator_commands: mpsc::WeakUnboundedSender<CommandOf<B>>,
    state_tx: watch::Sender<B::State>,
    changes: broadcast::Sender<Revision<B::State>>,
    name: String,
}

impl<B: Behavior> MainDomain<B> {
    async fn run(mut self, shutdown: Arc<Notify>) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.notified() => break,
                Some(id) = self.registry.finished() => {
                    self.registry.remove(id);
                }
                command = self.commands.recv() => match command {
                    Some(Command::Dispatch(action)) => self.dispatch(action),
                    Some(Command::Apply(mutation)) => self.apply(mutation),
                    Some(Command::InFlight(reply)) => {
                        let _ = reply.send(self.registry.len());
                    }
                    None => break,
                },
            }
        }

        let cancelled = self.registry.cancel_all();
        info!(
            engine = %self.name,
            cancelled,
            revision = self.state.revision(),
            "engine stopped"
        );
    }

    fn mutator(&self) -> MutatorOf<B> {
        Mutator::new(
            self.mutator_commands.clone(),
            self.state_tx.subscribe(),
            self.initial_state.clone(),
        )
    }

    fn start(&mut self, startup: watch::Sender<Startup>) {
        let id = WorkId::new();
        let behavior = Arc::clone(&self.behavior);
        let mutator = self.mutator();
        let engine = KeyValue::new("engine", self.name.clone());
        let span = start_work_span(&self.name, "start", &id);

        let task = tokio::spawn(
            async move {
                let span = tracing::Span::current();
                match behavior.start(mutator).await {
                    Ok(()) => {
                        record_work_outcome(&span, "completed");
                        startup.send_replace(Startup::Ready);
                    }
                    Err(e) => {
                        record_work_outcome(&span, "failed");
                        error!(error = %e, "start failed");
                        metrics::behavior_errors()
                            .add(1, &[engine, KeyValue::new("hook", "start")]);
                        startup.send_replace(Startup::Failed(format!("{e:#}")));
                    }
                }
            }
            .instrument(span),
        );

        self.registry.store(id, WorkKey::Start, task);
    }

    fn dispatch(&mut self, action: B::Action) {
        let upcoming = ActionItem::new(self.state.value().clone(), action);

        // Decide cancellations before the new item is registered, so it is
        // never compared against itself.
        let behavior = &self.behavior;
        let cancelled = self.registry.cancel_where(|key| match key {
            WorkKey::Action(current) => behavior.should_cancel(current, &upcoming),
            WorkKey::Start => false,
        });
        if cancelled > 0 {
            debug!(engine = %self.name, cancelled, "superseded work cancelled");
            metrics::work_cancelled().add(
                cancelled as u64,
                &[KeyValue::new("engine", self.name.clone())],
            );
        }

        let id = WorkId::new();
        let behavior = Arc::clone(&self.behavior);
        let mutator = self.mutator();
        let engine = KeyValue::new("engine", self.name.clone());
        let ActionItem { state, action } = upcoming.clone();
        let span = start_work_span(&self.name, "action", &id);

        let task = tokio::spawn(
            async move {
                let span = tracing::Span::current();
                match behavior.mutate(state, action.clone(), mutator.clone()).await {
                    Ok(()) => record_work_outcome(&span, "completed"),
                    Err(e) => {
                        record_work_outcome(&span, "failed");
                        warn!(error = %e, "mutate failed");
                        metrics::behavior_errors()
                            .add(1, &[engine, KeyValue::new("hook", "mutate")]);
                        behavior.on_error(e, action, mutator).await;
                    }
                }
            }
            .instrument(span),
        );

        self.registry.store(id, WorkKey::Action(upcoming), task);
        debug!(engine = %self.name, work_id = %id, in_flight = self.registry.len(), "action dispatched");
        metrics::actions_dispatched().add(1, &[KeyValue::new("engine", self.name.clone())]);
    }

    fn apply(&mut self, mutation: B::Mutation) {
        let next = self.behavior.reduce(self.state.value().clone(), mutation);
        self.state.set(next);

        self.state_tx.send_replace(self.state.value().clone());
        // No subscribers is fine.
        let _ = self.changes.send(self.state.clone());

        debug!(engine = %self.name, revision = self.state.revision(), "mutation applied");
        metrics::mutations_applied().add(1, &[KeyValue::new("engine", self.name.clone())]);
    }
}
