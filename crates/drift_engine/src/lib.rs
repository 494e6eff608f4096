//! Drift engine: agent calls, the report pipeline and the queue's IO seams.
mod agent;
mod aggregate;
mod engine;
mod job;
mod orchestrator;
mod persist;
mod pipeline;
mod retry;
mod store;
mod trigger;
mod types;

pub use agent::{AgentClient, AgentSettings, ChunkStream, HttpAgentClient};
pub use aggregate::aggregate_chunks;
pub use engine::{ChannelTrigger, DispatchError, EngineEvent, EngineHandle, InvocationQueue, Services};
pub use job::{submit_cicd_log, JobError, JobReport, JobRunner};
pub use orchestrator::{OrchestratorError, QueueOrchestrator};
pub use persist::{
    ensure_output_dir, Artifact, ArtifactPublisher, ArtifactSettings, ArtifactStore,
    AtomicFileWriter, FsArtifactStore, PersistError,
};
pub use pipeline::{PipelineError, PipelineOutput, PipelineRunner};
pub use retry::{session_id, BackoffRetrier, RetrySettings, Sleeper, TokioSleeper};
pub use store::{BacklogStore, InMemoryBacklogStore, StoreError};
pub use trigger::{Invocation, Trigger, TriggerError, TriggerTargets};
pub use types::{
    key_timestamp, store_timestamp, system_clock, AgentChunk, AgentError, AgentErrorKind,
    AgentIdentity, AgentRequest, Clock, InvokeError,
};
