use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use drift_logging::{drift_debug, drift_error};
use serde_json::Value;
use thiserror::Error;

use crate::{Invocation, JobError, JobRunner, OrchestratorError, QueueOrchestrator, Trigger, TriggerError, TriggerTargets};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no handler registered for target {0}")]
    UnknownTarget(String),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error("could not encode result: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("could not start dispatcher: {0}")]
    Startup(#[source] io::Error),
}

/// Emitted once per handled invocation.
#[derive(Debug)]
pub enum EngineEvent {
    Completed {
        target: String,
        result: Result<Value, DispatchError>,
    },
}

/// The handlers invocations are routed to.
pub struct Services {
    pub orchestrator: Arc<QueueOrchestrator>,
    pub jobs: Arc<JobRunner>,
    pub targets: TriggerTargets,
}

/// In-process trigger service: queues invocations for the dispatcher and
/// counts those not yet finished.
#[derive(Clone)]
pub struct ChannelTrigger {
    tx: mpsc::Sender<Invocation>,
    in_flight: Arc<AtomicUsize>,
}

pub struct InvocationQueue {
    rx: mpsc::Receiver<Invocation>,
}

impl ChannelTrigger {
    pub fn channel() -> (Self, InvocationQueue) {
        let (tx, rx) = mpsc::channel();
        let trigger = Self {
            tx,
            in_flight: Arc::new(AtomicUsize::new(0)),
        };
        (trigger, InvocationQueue { rx })
    }

    pub fn submit(&self, invocation: Invocation) -> Result<(), TriggerError> {
        // Counted before sending so the dispatcher can never observe idle
        // between a handler's own trigger and its completion.
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if let Err(err) = self.tx.send(invocation) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            return Err(TriggerError::Unavailable(err.to_string()));
        }
        Ok(())
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Trigger for ChannelTrigger {
    async fn fire(&self, invocation: Invocation) -> Result<(), TriggerError> {
        drift_debug!("Queued invocation of {}", invocation.target);
        self.submit(invocation)
    }
}

/// Runs invocations on a background runtime and reports their results.
pub struct EngineHandle {
    trigger: ChannelTrigger,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn spawn(
        trigger: ChannelTrigger,
        queue: InvocationQueue,
        services: Services,
    ) -> Result<Self, DispatchError> {
        let (event_tx, event_rx) = mpsc::channel();
        let runtime = tokio::runtime::Runtime::new().map_err(DispatchError::Startup)?;
        let services = Arc::new(services);
        let in_flight = trigger.in_flight.clone();

        thread::Builder::new()
            .name("drift-dispatch".into())
            .spawn(move || {
                while let Ok(invocation) = queue.rx.recv() {
                    let services = services.clone();
                    let event_tx = event_tx.clone();
                    let in_flight = in_flight.clone();
                    runtime.spawn(async move {
                        let target = invocation.target.clone();
                        let result = dispatch(&services, invocation).await;
                        if let Err(err) = &result {
                            drift_error!("{} failed: {}", target, err);
                        }
                        let _ = event_tx.send(EngineEvent::Completed { target, result });
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                    });
                }
            })
            .map_err(DispatchError::Startup)?;

        Ok(Self { trigger, event_rx })
    }

    pub fn submit(&self, invocation: Invocation) -> Result<(), TriggerError> {
        self.trigger.submit(invocation)
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    /// True once every submitted invocation, and everything they triggered,
    /// has finished and reported.
    pub fn is_idle(&self) -> bool {
        self.trigger.in_flight() == 0
    }
}

async fn dispatch(services: &Services, invocation: Invocation) -> Result<Value, DispatchError> {
    let Invocation { target, payload } = invocation;
    if target == services.targets.orchestrator {
        let outcome = services.orchestrator.handle(&payload).await?;
        return Ok(serde_json::to_value(outcome)?);
    }
    if target == services.targets.workflow {
        let report = services.jobs.handle(&payload).await?;
        return Ok(serde_json::to_value(report)?);
    }
    Err(DispatchError::UnknownTarget(target))
}
