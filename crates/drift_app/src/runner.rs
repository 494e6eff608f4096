use std::sync::Arc;
use std::thread;
use std::time::Duration;

use drift_core::OrchestratorEvent;
use drift_engine::{
    submit_cicd_log, system_clock, ArtifactPublisher, BacklogStore, BackoffRetrier,
    ChannelTrigger, EngineEvent, EngineHandle, FsArtifactStore, HttpAgentClient, Invocation,
    JobRunner, PipelineRunner, QueueOrchestrator, Services, TriggerTargets,
};
use drift_logging::{drift_info, drift_warn};
use serde_json::{json, Value};

use crate::config::Settings;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs invocations in-process until the chain they start has finished.
pub struct Runner {
    engine: EngineHandle,
    trigger: ChannelTrigger,
    targets: TriggerTargets,
}

/// One finished invocation, as printed on stdout.
pub struct Completion {
    pub target: String,
    pub result: Result<Value, String>,
}

impl Completion {
    pub fn to_json(&self) -> Value {
        match &self.result {
            Ok(value) => json!({ "target": self.target, "ok": value }),
            Err(message) => json!({ "target": self.target, "error": message }),
        }
    }
}

impl Runner {
    pub fn start(settings: &Settings, store: Arc<dyn BacklogStore>) -> anyhow::Result<Self> {
        let clock = system_clock();
        let targets = settings.targets();
        let (trigger, queue) = ChannelTrigger::channel();

        let orchestrator = Arc::new(QueueOrchestrator::new(
            store,
            Arc::new(trigger.clone()),
            targets.clone(),
            clock.clone(),
        ));
        let client = HttpAgentClient::new(settings.agent())?;
        let retrier = BackoffRetrier::new(Arc::new(client), settings.identity(), settings.retry());
        let artifacts = settings.artifacts();
        let blob_store = FsArtifactStore::new(&settings.artifact_dir, &artifacts.bucket);
        let jobs = Arc::new(JobRunner::new(
            PipelineRunner::new(Arc::new(retrier), clock.clone()),
            ArtifactPublisher::new(Arc::new(blob_store), artifacts, clock),
            orchestrator.clone(),
        ));

        let engine = EngineHandle::spawn(
            trigger.clone(),
            queue,
            Services {
                orchestrator,
                jobs,
                targets: targets.clone(),
            },
        )?;
        Ok(Self {
            engine,
            trigger,
            targets,
        })
    }

    pub fn reset(&self) -> anyhow::Result<Vec<Completion>> {
        self.run(Invocation::new(
            &self.targets.orchestrator,
            OrchestratorEvent::Reset.to_payload(),
        ))
    }

    pub fn drain(&self) -> anyhow::Result<Vec<Completion>> {
        self.run(Invocation::new(
            &self.targets.orchestrator,
            OrchestratorEvent::Scan.to_payload(),
        ))
    }

    pub fn job(&self, payload: Value) -> anyhow::Result<Vec<Completion>> {
        self.run(Invocation::new(&self.targets.workflow, payload))
    }

    pub fn cicd(&self, log_text: &str) -> anyhow::Result<Vec<Completion>> {
        let runtime = tokio::runtime::Builder::new_current_thread().build()?;
        runtime.block_on(submit_cicd_log(&self.trigger, &self.targets, log_text))?;
        Ok(self.wait_until_idle())
    }

    fn run(&self, invocation: Invocation) -> anyhow::Result<Vec<Completion>> {
        drift_info!("Submitting {} {}", invocation.target, invocation.payload);
        self.engine.submit(invocation)?;
        Ok(self.wait_until_idle())
    }

    fn wait_until_idle(&self) -> Vec<Completion> {
        let mut completions = Vec::new();
        loop {
            let idle = self.engine.is_idle();
            while let Some(event) = self.engine.try_recv() {
                completions.push(completion_of(event));
            }
            if idle {
                return completions;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn completion_of(event: EngineEvent) -> Completion {
    match event {
        EngineEvent::Completed { target, result } => {
            let result = result.map_err(|err| {
                drift_warn!("{} failed: {}", target, err);
                err.to_string()
            });
            Completion { target, result }
        }
    }
}
