//! The behavior's way back into the engine.
//!
//! A [`Mutator`] is handed to every behavior hook. It holds only a weak
//! sender into the engine's main domain, so a behavior (or a timer it
//! spawned) that keeps a mutator around never keeps the engine alive.

use tokio::sync::{mpsc, oneshot, watch};

use crate::error::{Error, Result};

/// Messages handled by the engine's main domain, in arrival order.
pub(crate) enum Command<A, M> {
    Dispatch(A),
    Apply(M),
    InFlight(oneshot::Sender<usize>),
}

/// Non-owning handle to a running engine.
pub struct Mutator<S, A, M> {
    commands: mpsc::WeakUnboundedSender<Command<A, M>>,
    state: watch::Receiver<S>,
    initial_state: S,
}

impl<S, A, M> Mutator<S, A, M> {
    pub(crate) fn new(
        commands: mpsc::WeakUnboundedSender<Command<A, M>>,
        state: watch::Receiver<S>,
        initial_state: S,
    ) -> Self {
        Self {
            commands,
            state,
            initial_state,
        }
    }

    /// Queue a mutation for the main domain. Mutations are reduced one at a
    /// time, in the order they arrive.
    pub fn mutate(&self, mutation: M) -> Result<()> {
        self.send(Command::Apply(mutation))
    }

    /// Dispatch a follow-up action, exactly as an external caller would.
    pub fn dispatch(&self, action: A) -> Result<()> {
        self.send(Command::Dispatch(action))
    }

    pub fn initial_state(&self) -> &S {
        &self.initial_state
    }

    /// True once the engine handle is dropped or its main domain has stopped.
    pub fn is_closed(&self) -> bool {
        self.commands.upgrade().is_none() || self.state.has_changed().is_err()
    }

    /// Resolves when the engine's main domain stops. Behaviors use this to
    /// scope timers and subscriptions to the engine's lifetime.
    pub async fn closed(&self) {
        let mut state = self.state.clone();
        while state.changed().await.is_ok() {}
    }

    fn send(&self, command: Command<A, M>) -> Result<()> {
        let commands = self.commands.upgrade().ok_or(Error::Closed)?;
        commands.send(command).map_err(|_| Error::Closed)
    }
}

impl<S: Clone, A, M> Mutator<S, A, M> {
    /// Latest applied state. Keeps returning the final state after the
    /// engine is gone.
    pub fn state(&self) -> S {
        self.state.borrow().clone()
    }
}

impl<S: Clone, A, M> Clone for Mutator<S, A, M> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            state: self.state.clone(),
            initial_state: self.initial_state.clone(),
        }
    }
}

impl<S: std::fmt::Debug, A, M> std::fmt::Debug for Mutator<S, A, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mutator")
            .field("state", &*self.state.borrow())
            .field("closed", &self.is_closed())
            .finish()
    }
}
