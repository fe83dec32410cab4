//! Startup composition: builds every collaborator from config and wires them by
//! hand.

use std::sync::Arc;

use anyhow::{Context, Result};

use conduit_config::ConduitConfig;
use conduit_engine::{
    Clock, CommandDispatcher, ListenerError, ListenerHub, LoggingDispatcher, NegotiationService,
    ProcessListener, StateMachine, StateMachineContext, StateMachineSettings, SystemClock,
    TransferService,
};
use conduit_store::{InMemoryProcessStore, ProcessStore, SqliteProcessStore};
use conduit_types::{Process, ProcessState};

/// Writes every committed transition to the log.
struct TransitionLog;

impl ProcessListener for TransitionLog {
    fn name(&self) -> &str {
        "transition-log"
    }

    fn on_transition(
        &self,
        process: &Process,
        new_state: ProcessState,
    ) -> Result<(), ListenerError> {
        tracing::info!(
            process_id = %process.id(),
            process_type = %process.process_type(),
            role = %process.role(),
            state = %new_state,
            error_detail = process.error_detail().unwrap_or(""),
            "Process transition"
        );
        Ok(())
    }
}

pub struct Conduit {
    pub store: Arc<dyn ProcessStore>,
    pub commands: CommandDispatcher,
    pub negotiations: NegotiationService,
    pub transfers: TransferService,
    pub machines: Vec<Arc<StateMachine>>,
}

impl Conduit {
    pub fn build(config: &ConduitConfig) -> Result<Self> {
        let store = open_store(config)?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let mut hub = ListenerHub::new(config.listeners.slow_threshold());
        hub.register(Arc::new(TransitionLog));
        let listeners = Arc::new(hub);

        let retries = config.dispatch.max_conflict_retries;
        let commands = CommandDispatcher::with_default_handlers(
            Arc::clone(&store),
            Arc::clone(&listeners),
            Arc::clone(&clock),
        )
        .with_max_conflict_retries(retries);
        let negotiations =
            NegotiationService::new(Arc::clone(&store), Arc::clone(&listeners), Arc::clone(&clock))
                .with_max_conflict_retries(retries);
        let transfers =
            TransferService::new(Arc::clone(&store), Arc::clone(&listeners), Arc::clone(&clock))
                .with_max_conflict_retries(retries);

        let context = StateMachineContext {
            store: Arc::clone(&store),
            listeners,
            clock,
            dispatcher: Arc::new(LoggingDispatcher),
        };
        let settings = StateMachineSettings {
            batch_size: config.state_machine.batch_size,
            max_send_attempts: config.state_machine.max_send_attempts,
        };
        let machines = vec![
            Arc::new(StateMachine::negotiation(context.clone(), settings)),
            Arc::new(StateMachine::transfer(context, settings)),
        ];

        Ok(Self {
            store,
            commands,
            negotiations,
            transfers,
            machines,
        })
    }
}

fn open_store(config: &ConduitConfig) -> Result<Arc<dyn ProcessStore>> {
    let holder = config.store.lease_holder();
    let lease_ms = config.store.lease_duration_ms;

    match config.store.resolved_path() {
        Some(path) => {
            let store = SqliteProcessStore::open(&path, holder.as_str(), lease_ms)
                .with_context(|| format!("opening process store {}", path.display()))?;
            tracing::info!(path = %path.display(), holder = %holder, "Using SQLite process store");
            Ok(Arc::new(store))
        }
        None => {
            tracing::info!(holder = %holder, "Using in-memory process store");
            Ok(Arc::new(InMemoryProcessStore::new(holder, lease_ms)))
        }
    }
}
