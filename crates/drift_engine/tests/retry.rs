mod support;

use std::sync::Arc;
use std::time::Duration;

use drift_engine::{AgentError, AgentIdentity, BackoffRetrier, InvokeError, RetrySettings};
use pretty_assertions::assert_eq;
use support::{init_logging, RecordingSleeper, Reply, ScriptedAgent};

fn retrier(agent: Arc<ScriptedAgent>, sleeper: Arc<RecordingSleeper>) -> BackoffRetrier {
    BackoffRetrier::new(agent, AgentIdentity::default(), RetrySettings::default())
        .with_sleeper(sleeper)
}

#[tokio::test]
async fn returns_concatenated_stream_on_first_success() {
    init_logging();
    let agent = Arc::new(ScriptedAgent::new(vec![Reply::Text(vec!["{\"a\":", " 1}"])]));
    let sleeper = Arc::new(RecordingSleeper::default());

    let text = retrier(agent.clone(), sleeper.clone())
        .invoke("prompt", "report")
        .await
        .unwrap();

    assert_eq!(text, "{\"a\": 1}");
    assert_eq!(agent.calls(), 1);
    assert!(sleeper.waits().is_empty());
}

#[tokio::test]
async fn throttling_is_retried_with_growing_waits() {
    init_logging();
    let agent = Arc::new(ScriptedAgent::new(vec![
        Reply::FailOpen(AgentError::throttling("slow down")),
        Reply::FailOpen(AgentError::throttling("slow down")),
        Reply::FailOpen(AgentError::throttling("slow down")),
        Reply::Text(vec!["done"]),
    ]));
    let sleeper = Arc::new(RecordingSleeper::default());

    let text = retrier(agent.clone(), sleeper.clone())
        .invoke("prompt", "report")
        .await
        .unwrap();

    assert_eq!(text, "done");
    assert_eq!(agent.calls(), 4);
    let waits = sleeper.waits();
    assert_eq!(waits.len(), 3);
    for (k, wait) in waits.iter().enumerate() {
        let floor = Duration::from_secs(1 << k);
        assert!(*wait >= floor, "wait {k} was {wait:?}");
        assert!(*wait <= floor + Duration::from_millis(500), "wait {k} was {wait:?}");
    }
}

#[tokio::test]
async fn throttling_mid_stream_counts_as_throttling() {
    init_logging();
    let agent = Arc::new(ScriptedAgent::new(vec![
        Reply::FailMidStream("partial", AgentError::throttling("slow down")),
        Reply::Text(vec!["whole"]),
    ]));
    let sleeper = Arc::new(RecordingSleeper::default());

    let text = retrier(agent.clone(), sleeper.clone())
        .invoke("prompt", "report")
        .await
        .unwrap();

    assert_eq!(text, "whole");
    assert_eq!(sleeper.waits().len(), 1);
}

#[tokio::test]
async fn every_attempt_gets_its_own_session() {
    init_logging();
    let agent = Arc::new(ScriptedAgent::always(Reply::FailOpen(AgentError::throttling(
        "slow down",
    ))));
    let sleeper = Arc::new(RecordingSleeper::default());

    let _ = retrier(agent.clone(), sleeper).invoke("prompt", "report").await;

    let mut ids = agent.session_ids();
    assert_eq!(ids.len(), 5);
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 5);
}

#[tokio::test]
async fn other_errors_fail_after_one_attempt() {
    init_logging();
    let agent = Arc::new(ScriptedAgent::always(Reply::FailOpen(AgentError::service(
        "AccessDeniedException",
        "not allowed",
    ))));
    let sleeper = Arc::new(RecordingSleeper::default());

    let err = retrier(agent.clone(), sleeper.clone())
        .invoke("prompt", "report")
        .await
        .unwrap_err();

    assert_eq!(agent.calls(), 1);
    assert!(sleeper.waits().is_empty());
    assert!(matches!(err, InvokeError::Fatal(_)));
    let text = err.to_string();
    assert!(text.starts_with("Agent invoke error: "));
    assert!(text.contains("not allowed"));
}

#[tokio::test]
async fn exhausted_retries_report_throttling() {
    init_logging();
    let agent = Arc::new(ScriptedAgent::always(Reply::FailOpen(AgentError::throttling(
        "slow down",
    ))));
    let sleeper = Arc::new(RecordingSleeper::default());

    let err = retrier(agent.clone(), sleeper.clone())
        .invoke("prompt", "report")
        .await
        .unwrap_err();

    assert_eq!(agent.calls(), 5);
    // No wait after the final attempt.
    assert_eq!(sleeper.waits().len(), 4);
    assert_eq!(err, InvokeError::RetriesExhausted { attempts: 5 });
    assert_eq!(
        err.to_string(),
        "Agent invoke error: Max retries reached due to throttling."
    );
}

#[tokio::test]
async fn explicit_retry_limit_overrides_settings() {
    init_logging();
    let agent = Arc::new(ScriptedAgent::always(Reply::FailOpen(AgentError::throttling(
        "slow down",
    ))));
    let sleeper = Arc::new(RecordingSleeper::default());

    let err = retrier(agent.clone(), sleeper)
        .invoke_with_retries("prompt", "report", 2)
        .await
        .unwrap_err();

    assert_eq!(agent.calls(), 2);
    assert!(err.is_throttling());
}
