//! Call-recording fakes for listener and outbound-dispatch seams.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use conduit_types::{Process, ProcessId, ProcessState};

use crate::error::DispatchError;
use crate::listener::{ListenerError, ProcessListener};
use crate::remote::{RemoteMessage, RemoteMessageDispatcher};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Records every `(process snapshot, new state)` it is notified with.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<(Process, ProcessState)>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<(Process, ProcessState)> {
        locked(&self.events).clone()
    }

    /// New states notified for `id`, in order.
    pub fn states_for(&self, id: &ProcessId) -> Vec<ProcessState> {
        locked(&self.events)
            .iter()
            .filter(|(process, _)| process.id() == id)
            .map(|(_, state)| *state)
            .collect()
    }
}

impl ProcessListener for RecordingListener {
    fn name(&self) -> &str {
        "recording"
    }

    fn on_transition(
        &self,
        process: &Process,
        new_state: ProcessState,
    ) -> Result<(), ListenerError> {
        locked(&self.events).push((process.clone(), new_state));
        Ok(())
    }
}

/// Records outbound messages; optionally fails every send.
#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<RemoteMessage>>,
    failing: AtomicBool,
}

impl RecordingDispatcher {
    pub fn fail_all(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Acknowledged messages, in send order.
    pub fn sent(&self) -> Vec<RemoteMessage> {
        locked(&self.sent).clone()
    }
}

impl RemoteMessageDispatcher for RecordingDispatcher {
    fn dispatch(&self, message: &RemoteMessage) -> Result<(), DispatchError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DispatchError::Transport(format!(
                "{} unreachable",
                message.counter_party_address
            )));
        }
        locked(&self.sent).push(message.clone());
        Ok(())
    }
}
