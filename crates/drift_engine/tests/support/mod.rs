#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use drift_engine::{
    AgentChunk, AgentClient, AgentError, AgentRequest, ArtifactStore, ChunkStream, Clock,
    Invocation, PersistError, Sleeper, Trigger, TriggerError,
};
use futures_util::stream::{self, StreamExt};

static INIT: Once = Once::new();

pub fn init_logging() {
    INIT.call_once(drift_logging::initialize_for_tests);
}

pub fn fixed_clock() -> Clock {
    Arc::new(|| Utc.with_ymd_and_hms(2024, 5, 17, 9, 30, 0).unwrap())
}

/// One scripted reply of the fake agent.
#[derive(Clone)]
pub enum Reply {
    Text(Vec<&'static str>),
    FailOpen(AgentError),
    FailMidStream(&'static str, AgentError),
    /// Echoes the prompt back as the completion.
    Echo,
}

/// Agent that answers from a script and records every request.
#[derive(Default)]
pub struct ScriptedAgent {
    script: Mutex<VecDeque<Reply>>,
    fallback: Option<Reply>,
    pub requests: Mutex<Vec<AgentRequest>>,
}

impl ScriptedAgent {
    pub fn new(script: Vec<Reply>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    /// Every call past the script gets `reply`.
    pub fn always(reply: Reply) -> Self {
        Self {
            fallback: Some(reply),
            ..Self::default()
        }
    }

    pub fn then_always(mut self, reply: Reply) -> Self {
        self.fallback = Some(reply);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.session_id.clone())
            .collect()
    }
}

#[async_trait]
impl AgentClient for ScriptedAgent {
    async fn invoke(&self, request: AgentRequest) -> Result<ChunkStream, AgentError> {
        let prompt = request.prompt.clone();
        self.requests.lock().unwrap().push(request);
        let reply = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.clone())
            .expect("agent script exhausted");
        match reply {
            Reply::Text(parts) => {
                let chunks: Vec<Result<AgentChunk, AgentError>> =
                    parts.into_iter().map(|p| Ok(AgentChunk::new(p))).collect();
                Ok(stream::iter(chunks).boxed())
            }
            Reply::FailOpen(err) => Err(err),
            Reply::FailMidStream(first, err) => {
                Ok(stream::iter(vec![Ok(AgentChunk::new(first)), Err(err)]).boxed())
            }
            Reply::Echo => Ok(stream::iter(vec![Ok(AgentChunk::new(prompt))]).boxed()),
        }
    }
}

/// Records requested waits without sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    pub waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }
}

/// Trigger that only records what it was asked to fire.
#[derive(Default)]
pub struct RecordingTrigger {
    pub fired: Mutex<Vec<Invocation>>,
}

impl RecordingTrigger {
    pub fn fired(&self) -> Vec<Invocation> {
        self.fired.lock().unwrap().clone()
    }

    pub fn targets(&self) -> Vec<String> {
        self.fired().into_iter().map(|i| i.target).collect()
    }
}

#[async_trait]
impl Trigger for RecordingTrigger {
    async fn fire(&self, invocation: Invocation) -> Result<(), TriggerError> {
        self.fired.lock().unwrap().push(invocation);
        Ok(())
    }
}

/// Artifact store kept in memory.
#[derive(Default)]
pub struct MemoryArtifacts {
    pub objects: Mutex<Vec<(String, String, String)>>,
}

impl MemoryArtifacts {
    pub fn objects(&self) -> Vec<(String, String, String)> {
        self.objects.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifacts {
    async fn put(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), PersistError> {
        self.objects.lock().unwrap().push((
            key.to_string(),
            String::from_utf8_lossy(body).into_owned(),
            content_type.to_string(),
        ));
        Ok(())
    }
}
