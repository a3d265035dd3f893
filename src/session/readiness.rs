use serde::Serialize;
use std::future::Future;
use std::time::Duration;

use super::loader::{LoadError, LoadedScene};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadyReason {
    /// The loader reported content and the settle period passed.
    Loaded,
    /// The deadline passed first; content may still be streaming in.
    Forced,
}

#[derive(Debug, Clone, Copy)]
pub struct ReadyPolicy {
    pub settle: Duration,
    pub force_after: Duration,
}

/// Wait until the model may be declared ready.
///
/// One deadline covers the whole wait: whichever of "loaded + settled" or
/// "deadline" happens first decides the reason. Loader failures never surface;
/// they simply leave the deadline to fire.
pub async fn await_model_ready<F>(load: F, policy: ReadyPolicy) -> ReadyReason
where
    F: Future<Output = Result<LoadedScene, LoadError>>,
{
    let deadline = tokio::time::sleep(policy.force_after);
    tokio::pin!(deadline);
    tokio::pin!(load);

    let outcome = tokio::select! {
        result = &mut load => Some(result),
        _ = &mut deadline => None,
    };

    match outcome {
        Some(Ok(scene)) if scene.has_content() => {
            tokio::select! {
                _ = tokio::time::sleep(policy.settle) => ReadyReason::Loaded,
                _ = &mut deadline => ReadyReason::Forced,
            }
        }
        Some(Ok(_)) => {
            log::warn!("Model loaded without content, waiting for forced readiness");
            deadline.await;
            ReadyReason::Forced
        }
        Some(Err(err)) => {
            log::warn!("Model load failed ({err}), waiting for forced readiness");
            deadline.await;
            ReadyReason::Forced
        }
        None => {
            log::warn!(
                "Model not confirmed after {}ms, forcing readiness",
                policy.force_after.as_millis()
            );
            ReadyReason::Forced
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    const POLICY: ReadyPolicy = ReadyPolicy {
        settle: Duration::from_millis(200),
        force_after: Duration::from_millis(1_000),
    };

    fn scene() -> LoadedScene {
        LoadedScene {
            node_count: 3,
            animations: Vec::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fast_load_settles_then_reports_loaded() {
        let start = Instant::now();
        let reason = await_model_ready(
            async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(scene())
            },
            POLICY,
        )
        .await;
        assert_eq!(reason, ReadyReason::Loaded);
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_loader_is_forced_at_deadline() {
        let start = Instant::now();
        let reason = await_model_ready(futures::future::pending(), POLICY).await;
        assert_eq!(reason, ReadyReason::Forced);
        assert_eq!(start.elapsed(), Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn late_load_loses_to_deadline_during_settle() {
        let reason = await_model_ready(
            async {
                tokio::time::sleep(Duration::from_millis(900)).await;
                Ok(scene())
            },
            POLICY,
        )
        .await;
        assert_eq!(reason, ReadyReason::Forced);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_load_is_masked() {
        let start = Instant::now();
        let reason = await_model_ready(
            async { Err(LoadError::Fetch("404".into())) },
            POLICY,
        )
        .await;
        assert_eq!(reason, ReadyReason::Forced);
        assert_eq!(start.elapsed(), Duration::from_millis(1_000));
    }
}
