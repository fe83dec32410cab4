//! Synchronous fan-out of committed transitions.
//!
//! Listeners run after the store write, in registration order, on the mutating
//! thread. A failing or panicking listener is logged and skipped; it never undoes
//! the committed transition or stops later listeners from running.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use conduit_types::{Process, ProcessState};

/// Threshold above which a listener invocation is reported as slow.
pub const DEFAULT_SLOW_THRESHOLD: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ListenerError(String);

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub trait ProcessListener: Send + Sync {
    /// Name used in log lines.
    fn name(&self) -> &str;

    fn on_transition(&self, process: &Process, new_state: ProcessState)
    -> Result<(), ListenerError>;
}

pub struct ListenerHub {
    listeners: Vec<Arc<dyn ProcessListener>>,
    slow_threshold: Duration,
}

impl Default for ListenerHub {
    fn default() -> Self {
        Self::new(DEFAULT_SLOW_THRESHOLD)
    }
}

impl ListenerHub {
    #[must_use]
    pub fn new(slow_threshold: Duration) -> Self {
        Self {
            listeners: Vec::new(),
            slow_threshold,
        }
    }

    pub fn register(&mut self, listener: Arc<dyn ProcessListener>) {
        tracing::debug!(listener = listener.name(), "Listener registered");
        self.listeners.push(listener);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Invoke every listener with the committed `process` and its `new_state`.
    pub fn notify(&self, process: &Process, new_state: ProcessState) {
        for listener in &self.listeners {
            let started = Instant::now();
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                listener.on_transition(process, new_state)
            }));
            let elapsed = started.elapsed();

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => tracing::warn!(
                    listener = listener.name(),
                    process_id = %process.id(),
                    state = %new_state,
                    error = %err,
                    "Listener failed"
                ),
                Err(panic) => tracing::warn!(
                    listener = listener.name(),
                    process_id = %process.id(),
                    state = %new_state,
                    panic = panic_message(panic.as_ref()),
                    "Listener panicked"
                ),
            }

            if elapsed > self.slow_threshold {
                tracing::warn!(
                    listener = listener.name(),
                    process_id = %process.id(),
                    elapsed_ms = elapsed.as_millis(),
                    "Slow listener"
                );
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
