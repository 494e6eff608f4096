use std::fmt;

use serde_json::{json, Value};

/// Entry points of the orchestrator, selected by the `eventName` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorEvent {
    Reset,
    Scan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEvent(pub Option<String>);

impl fmt::Display for UnknownEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(name) => write!(f, "Unknown eventName: {name}"),
            None => f.write_str("Unknown eventName: <missing>"),
        }
    }
}

impl std::error::Error for UnknownEvent {}

impl OrchestratorEvent {
    pub fn from_payload(payload: &Value) -> Result<Self, UnknownEvent> {
        let name = payload.get("eventName").and_then(Value::as_str);
        match name {
            Some("reset") => Ok(OrchestratorEvent::Reset),
            // `ScanNextRepo` is what older completion paths emit.
            Some("scan") | Some("ScanNextRepo") => Ok(OrchestratorEvent::Scan),
            other => Err(UnknownEvent(other.map(ToOwned::to_owned))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            OrchestratorEvent::Reset => "reset",
            OrchestratorEvent::Scan => "scan",
        }
    }

    pub fn to_payload(self) -> Value {
        json!({ "eventName": self.name() })
    }
}
