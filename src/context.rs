//! Hierarchical cancellation for supervisor threads.
//!
//! A [`Context`] is shared by every thread that works on behalf of one scope
//! (the whole process, or a single game session). Cancelling it:
//! - disconnects the [`Context::done`] channel, waking every waiter at once
//! - cancels every child created from it
//! - records why it ended ([`CancelReason`])
//!
//! Waiting on `done()` instead of polling a flag lets background threads stop
//! within one tick of the cancel.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;

/// Why a context stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Cancelled explicitly (stop request, watchdog kill, parent shutdown).
    Cancelled,
    /// A deadline attached with [`Context::child_with_timeout`] expired.
    DeadlineExceeded,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Cancelled => write!(f, "context cancelled"),
            CancelReason::DeadlineExceeded => write!(f, "context deadline exceeded"),
        }
    }
}

struct State {
    // Dropping the only sender disconnects `done`.
    sender: Option<Sender<()>>,
    reason: Option<CancelReason>,
    children: Vec<Weak<Inner>>,
}

struct Inner {
    state: Mutex<State>,
    done: Receiver<()>,
}

/// Cloneable cancellation handle. Clones observe the same cancellation.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    /// Create a root context that is only cancelled explicitly.
    pub fn background() -> Self {
        let (sender, done) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    sender: Some(sender),
                    reason: None,
                    children: Vec::new(),
                }),
                done,
            }),
        }
    }

    /// Create a child that is cancelled together with `self`.
    ///
    /// A child of an already cancelled context starts out cancelled with the
    /// parent's reason.
    pub fn child(&self) -> Context {
        let child = Context::background();
        let inherited = {
            let mut state = self.lock();
            match state.reason {
                Some(reason) => Some(reason),
                None => {
                    state.children.retain(|weak| weak.strong_count() > 0);
                    state.children.push(Arc::downgrade(&child.inner));
                    None
                }
            }
        };
        if let Some(reason) = inherited {
            child.cancel_with(reason);
        }
        child
    }

    /// Create a child that cancels itself with
    /// [`CancelReason::DeadlineExceeded`] once `timeout` has elapsed.
    pub fn child_with_timeout(&self, timeout: Duration) -> Context {
        let child = self.child();
        let timer = child.clone();
        thread::spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = timer.done().recv_timeout(timeout) {
                timer.cancel_with(CancelReason::DeadlineExceeded);
            }
        });
        child
    }

    /// Cancel this context and all of its children. Idempotent.
    pub fn cancel(&self) {
        self.cancel_with(CancelReason::Cancelled);
    }

    fn cancel_with(&self, reason: CancelReason) {
        let children = {
            let mut state = self.lock();
            if state.reason.is_some() {
                return;
            }
            state.reason = Some(reason);
            state.sender = None;
            std::mem::take(&mut state.children)
        };
        for child in children.iter().filter_map(Weak::upgrade) {
            Context { inner: child }.cancel_with(reason);
        }
    }

    /// True once the context has been cancelled for any reason.
    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// The reason this context stopped, if it has.
    pub fn reason(&self) -> Option<CancelReason> {
        self.lock().reason
    }

    /// Channel that disconnects when the context is cancelled.
    ///
    /// Nothing is ever sent on it; `recv()` returning `Err` is the signal.
    pub fn done(&self) -> &Receiver<()> {
        &self.inner.done
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns `true` when the full duration elapsed and `false` when the
    /// context was cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        matches!(
            self.inner.done.recv_timeout(duration),
            Err(RecvTimeoutError::Timeout)
        )
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("reason", &self.reason())
            .finish()
    }
}
