//! Cancellation context with an optional cause.
//!
//! A [`CancelToken`] is cancelled at most once. The first cancellation wins and
//! fixes the cause: [`CancelToken::cancel`] records none, while
//! [`CancelToken::cancel_with_cause`] records the error that triggered it so a
//! waiter can report that error instead of a generic "cancelled". Cancelling a
//! token cancels its children with the same cause; children never propagate
//! upwards.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::watch;

/// Error that cancelled a token.
pub type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Clone)]
enum State {
    Active,
    Cancelled(Option<Cause>),
}

impl State {
    fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

#[derive(Debug)]
struct Inner {
    state: watch::Sender<State>,
    children: Mutex<Vec<Weak<Inner>>>,
}

impl Inner {
    fn new() -> Self {
        let (state, _) = watch::channel(State::Active);
        Self {
            state,
            children: Mutex::new(Vec::new()),
        }
    }

    fn transition(&self, cause: Option<Cause>) {
        let changed = self.state.send_if_modified(|state| {
            if state.is_cancelled() {
                return false;
            }
            *state = State::Cancelled(cause.clone());
            true
        });
        if !changed {
            return;
        }
        let children = std::mem::take(
            &mut *self
                .children
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for child in children.iter().filter_map(Weak::upgrade) {
            child.transition(cause.clone());
        }
    }

    fn cause(&self) -> Option<Cause> {
        match &*self.state.borrow() {
            State::Cancelled(cause) => cause.clone(),
            State::Active => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner::new()),
        }
    }

    /// A token cancelled whenever `self` is, and independently cancellable.
    pub fn child(&self) -> Self {
        let child = Arc::new(Inner::new());
        let mut children = self
            .inner
            .children
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.inner.state.borrow().is_cancelled() {
            child.transition(self.inner.cause());
        } else {
            children.retain(|weak| weak.strong_count() > 0);
            children.push(Arc::downgrade(&child));
        }
        Self { inner: child }
    }

    pub fn cancel(&self) {
        self.inner.transition(None);
    }

    pub fn cancel_with_cause<E>(&self, cause: E)
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.inner.transition(Some(Arc::new(cause)));
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.state.borrow().is_cancelled()
    }

    /// The error this token was cancelled with. `None` while active or when
    /// cancelled without a cause.
    pub fn cause(&self) -> Option<Cause> {
        self.inner.cause()
    }

    /// Resolves once this token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.inner.state.subscribe();
        if rx.wait_for(State::is_cancelled).await.is_err() {
            // Sender lives in `self`, so this is unreachable while borrowed.
            std::future::pending::<()>().await;
        }
    }
}
