use std::sync::Arc;

use drift_core::{analysis_prompt, render_prompt, report_payload, RecoveredDocument, RecoveryParser};
use drift_logging::{drift_info, drift_warn};
use thiserror::Error;

use crate::types::store_timestamp;
use crate::{BackoffRetrier, Clock, InvokeError};

const ANALYSIS_SESSION: &str = "report";
const RENDER_SESSION: &str = "render";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("render stage failed: {0}")]
    Render(#[from] InvokeError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    /// Structured report recovered from the analysis stage; empty when nothing usable came back.
    pub report: RecoveredDocument,
    /// Rendered document body.
    pub body: String,
}

/// Two-stage agent pipeline: analyze remediation text, then render the report.
pub struct PipelineRunner {
    retrier: Arc<BackoffRetrier>,
    parser: RecoveryParser,
    clock: Clock,
}

impl PipelineRunner {
    pub fn new(retrier: Arc<BackoffRetrier>, clock: Clock) -> Self {
        Self {
            retrier,
            parser: RecoveryParser::default(),
            clock,
        }
    }

    pub fn with_parser(mut self, parser: RecoveryParser) -> Self {
        self.parser = parser;
        self
    }

    /// Stage 1 never fails the run: its errors leave an empty report, which
    /// stage 2 receives as the fixed throttling message. Stage 2 errors do fail it.
    pub async fn run(
        &self,
        update_remediation: &str,
        remove_remediation: &str,
    ) -> Result<PipelineOutput, PipelineError> {
        let date = store_timestamp((self.clock)());
        let prompt = analysis_prompt(update_remediation, remove_remediation, &date);
        drift_info!("Analysis stage: prompt of {} chars", prompt.len());

        let report = match self.retrier.invoke(&prompt, ANALYSIS_SESSION).await {
            Ok(raw) => self.parser.recover(&raw),
            Err(err) => {
                drift_warn!("Analysis stage failed: {}", err);
                RecoveredDocument::empty()
            }
        };
        if report.is_empty() {
            drift_warn!("No structured report recovered; rendering the fallback message");
        }

        let payload = report_payload(&report);
        let body = self
            .retrier
            .invoke(&render_prompt(&payload), RENDER_SESSION)
            .await?;
        drift_info!("Render stage: {} chars", body.len());
        Ok(PipelineOutput { report, body })
    }
}
