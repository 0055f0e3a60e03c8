//! The behavior contract.
//!
//! A behavior decides how an action becomes asynchronous work, which
//! mutations that work emits, how a mutation changes state, and when newer
//! work supersedes older work. Everything except [`Behavior::reduce`] has a
//! default.

use async_trait::async_trait;

use crate::mutator::Mutator;

/// The cancellation key of a dispatched action: the state at dispatch time
/// plus the action itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionItem<S, A> {
    pub state: S,
    pub action: A,
}

impl<S, A> ActionItem<S, A> {
    pub fn new(state: S, action: A) -> Self {
        Self { state, action }
    }
}

/// Policy for one engine.
///
/// `reduce` must be a pure, total function over the mutation type. The async
/// hooks run as tracked work units on the engine's registry and may be
/// cancelled at any await point.
#[async_trait]
pub trait Behavior: Send + Sync + 'static {
    type State: Clone + Send + Sync + 'static;
    type Action: Clone + Send + Sync + 'static;
    type Mutation: Send + 'static;

    fn initial_state(&self) -> Self::State;

    /// Runs once when the engine is built, concurrently with any early
    /// dispatches. An error here is reported by `Engine::started`.
    async fn start(
        &self,
        _mutator: Mutator<Self::State, Self::Action, Self::Mutation>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Handle one dispatched action. `state` is the snapshot taken when the
    /// action was dispatched; `mutator.state()` gives the latest one.
    async fn mutate(
        &self,
        _state: Self::State,
        _action: Self::Action,
        _mutator: Mutator<Self::State, Self::Action, Self::Mutation>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn reduce(&self, state: Self::State, mutation: Self::Mutation) -> Self::State;

    /// Asked once per in-flight item, before `upcoming` is registered.
    /// Returning `true` cancels `current`.
    fn should_cancel(
        &self,
        _current: &ActionItem<Self::State, Self::Action>,
        _upcoming: &ActionItem<Self::State, Self::Action>,
    ) -> bool {
        false
    }

    /// Called with the error `mutate` returned for `action`. May emit a
    /// corrective mutation. Not called for cancelled work.
    async fn on_error(
        &self,
        _error: anyhow::Error,
        _action: Self::Action,
        _mutator: Mutator<Self::State, Self::Action, Self::Mutation>,
    ) {
    }
}
