use futures::future::{select_all, BoxFuture};
use serde::Serialize;
use std::time::Duration;

/// Signals a video surface emits once frames can be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum VideoReadiness {
    LoadedMetadata,
    CanPlay,
    Playing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessOutcome {
    Signalled(VideoReadiness),
    /// Nothing fired in time; callers continue anyway.
    TimedOut,
    /// The platform offered no readiness signals to wait on.
    Unobservable,
}

/// Resolve on whichever readiness signal fires first, bounded by `timeout`.
///
/// The losing futures are dropped on return, which detaches their listeners.
pub async fn wait_for_video_ready(
    signals: Vec<BoxFuture<'static, VideoReadiness>>,
    timeout: Duration,
) -> ReadinessOutcome {
    if signals.is_empty() {
        return ReadinessOutcome::Unobservable;
    }

    match tokio::time::timeout(timeout, select_all(signals)).await {
        Ok((signal, _index, _rest)) => {
            log::debug!("Video surface ready via {:?}", signal);
            ReadinessOutcome::Signalled(signal)
        }
        Err(_) => {
            log::warn!(
                "Video surface gave no readiness signal within {}ms, continuing",
                timeout.as_millis()
            );
            ReadinessOutcome::TimedOut
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[tokio::test(start_paused = true)]
    async fn first_signal_wins() {
        let signals = vec![
            async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                VideoReadiness::Playing
            }
            .boxed(),
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                VideoReadiness::LoadedMetadata
            }
            .boxed(),
        ];
        let outcome = wait_for_video_ready(signals, Duration::from_secs(3)).await;
        assert_eq!(
            outcome,
            ReadinessOutcome::Signalled(VideoReadiness::LoadedMetadata)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn silence_times_out() {
        let signals = vec![futures::future::pending::<VideoReadiness>().boxed()];
        let outcome = wait_for_video_ready(signals, Duration::from_secs(3)).await;
        assert_eq!(outcome, ReadinessOutcome::TimedOut);
    }

    #[tokio::test]
    async fn no_signals_is_unobservable() {
        let outcome = wait_for_video_ready(Vec::new(), Duration::from_secs(3)).await;
        assert_eq!(outcome, ReadinessOutcome::Unobservable);
    }
}
