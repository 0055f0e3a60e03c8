//! Behaviors assembled from plain functions.
//!
//! A [`ProxyBehavior`] stores each hook as an optional function value. A
//! missing hook falls back to the [`Behavior`] default (no-op start and
//! mutate, identity reduce, never cancel, swallow errors).
//!
//! [`ProxyBehavior::wrap`] fills every hook with a closure that delegates to
//! an existing behavior; the `with_*` methods then replace individual hooks.
//! That is how a behavior is specialised without subclassing:
//!
//! ```ignore
//! let tenfold = ProxyBehavior::wrap(Counter::new(0))
//!     .with_reduce(|state: CounterState, _mutation| CounterState { count: state.count + 10 });
//! let engine = Engine::new(tenfold);
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::behavior::{ActionItem, Behavior};
use crate::mutator::Mutator;

type StartFn<S, A, M> =
    Arc<dyn Fn(Mutator<S, A, M>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;
type MutateFn<S, A, M> =
    Arc<dyn Fn(S, A, Mutator<S, A, M>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;
type ReduceFn<S, M> = Arc<dyn Fn(S, M) -> S + Send + Sync>;
type ShouldCancelFn<S, A> = Arc<dyn Fn(&ActionItem<S, A>, &ActionItem<S, A>) -> bool + Send + Sync>;
type OnErrorFn<S, A, M> =
    Arc<dyn Fn(anyhow::Error, A, Mutator<S, A, M>) -> BoxFuture<'static, ()> + Send + Sync>;

/// A behavior built from independent hook functions.
pub struct ProxyBehavior<S, A, M> {
    initial_state: S,
    start: Option<StartFn<S, A, M>>,
    mutate: Option<MutateFn<S, A, M>>,
    reduce: Option<ReduceFn<S, M>>,
    should_cancel: Option<ShouldCancelFn<S, A>>,
    on_error: Option<OnErrorFn<S, A, M>>,
}

impl<S, A, M> ProxyBehavior<S, A, M>
where
    S: Clone + Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
    M: Send + 'static,
{
    /// A proxy with every hook defaulted.
    pub fn new(initial_state: S) -> Self {
        Self {
            initial_state,
            start: None,
            mutate: None,
            reduce: None,
            should_cancel: None,
            on_error: None,
        }
    }

    /// A proxy whose hooks all delegate to `behavior`.
    pub fn wrap<B>(behavior: B) -> Self
    where
        B: Behavior<State = S, Action = A, Mutation = M>,
    {
        let inner = Arc::new(behavior);
        let initial_state = inner.initial_state();

        let start: StartFn<S, A, M> = {
            let inner = Arc::clone(&inner);
            Arc::new(move |mutator| {
                let inner = Arc::clone(&inner);
                async move { inner.start(mutator).await }.boxed()
            })
        };
        let mutate: MutateFn<S, A, M> = {
            let inner = Arc::clone(&inner);
            Arc::new(move |state, action, mutator| {
                let inner = Arc::clone(&inner);
                async move { inner.mutate(state, action, mutator).await }.boxed()
            })
        };
        let reduce: ReduceFn<S, M> = {
            let inner = Arc::clone(&inner);
            Arc::new(move |state, mutation| inner.reduce(state, mutation))
        };
        let should_cancel: ShouldCancelFn<S, A> = {
            let inner = Arc::clone(&inner);
            Arc::new(
                move |current: &ActionItem<S, A>, upcoming: &ActionItem<S, A>| {
                    inner.should_cancel(current, upcoming)
                },
            )
        };
        let on_error: OnErrorFn<S, A, M> = Arc::new(move |error, action, mutator| {
            let inner = Arc::clone(&inner);
            async move { inner.on_error(error, action, mutator).await }.boxed()
        });

        Self {
            initial_state,
            start: Some(start),
            mutate: Some(mutate),
            reduce: Some(reduce),
            should_cancel: Some(should_cancel),
            on_error: Some(on_error),
        }
    }

    pub fn with_initial_state(mut self, initial_state: S) -> Self {
        self.initial_state = initial_state;
        self
    }

    pub fn with_start<F, Fut>(mut self, start: F) -> Self
    where
        F: Fn(Mutator<S, A, M>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.start = Some(Arc::new(move |mutator| start(mutator).boxed()));
        self
    }

    pub fn with_mutate<F, Fut>(mut self, mutate: F) -> Self
    where
        F: Fn(S, A, Mutator<S, A, M>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.mutate = Some(Arc::new(move |state, action, mutator| {
            mutate(state, action, mutator).boxed()
        }));
        self
    }

    pub fn with_reduce<F>(mut self, reduce: F) -> Self
    where
        F: Fn(S, M) -> S + Send + Sync + 'static,
    {
        self.reduce = Some(Arc::new(reduce));
        self
    }

    pub fn with_should_cancel<F>(mut self, should_cancel: F) -> Self
    where
        F: Fn(&ActionItem<S, A>, &ActionItem<S, A>) -> bool + Send + Sync + 'static,
    {
        self.should_cancel = Some(Arc::new(should_cancel));
        self
    }

    pub fn with_on_error<F, Fut>(mut self, on_error: F) -> Self
    where
        F: Fn(anyhow::Error, A, Mutator<S, A, M>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_error = Some(Arc::new(move |error, action, mutator| {
            on_error(error, action, mutator).boxed()
        }));
        self
    }
}

impl<S: Clone, A, M> Clone for ProxyBehavior<S, A, M> {
    fn clone(&self) -> Self {
        Self {
            initial_state: self.initial_state.clone(),
            start: self.start.clone(),
            mutate: self.mutate.clone(),
            reduce: self.reduce.clone(),
            should_cancel: self.should_cancel.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

#[async_trait]
impl<S, A, M> Behavior for ProxyBehavior<S, A, M>
where
    S: Clone + Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
    M: Send + 'static,
{
    type State = S;
    type Action = A;
    type Mutation = M;

    fn initial_state(&self) -> S {
        self.initial_state.clone()
    }

    async fn start(&self, mutator: Mutator<S, A, M>) -> anyhow::Result<()> {
        match &self.start {
            Some(start) => start(mutator).await,
            None => Ok(()),
        }
    }

    async fn mutate(&self, state: S, action: A, mutator: Mutator<S, A, M>) -> anyhow::Result<()> {
        match &self.mutate {
            Some(mutate) => mutate(state, action, mutator).await,
            None => Ok(()),
        }
    }

    fn reduce(&self, state: S, mutation: M) -> S {
        match &self.reduce {
            Some(reduce) => reduce(state, mutation),
            None => state,
        }
    }

    fn should_cancel(&self, current: &ActionItem<S, A>, upcoming: &ActionItem<S, A>) -> bool {
        self.should_cancel
            .as_ref()
            .is_some_and(|should_cancel| should_cancel(current, upcoming))
    }

    async fn on_error(&self, error: anyhow::Error, action: A, mutator: Mutator<S, A, M>) {
        if let Some(on_error) = &self.on_error {
            on_error(error, action, mutator).await;
        }
    }
}
