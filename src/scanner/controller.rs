use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::{
    catalog::Catalog,
    error::ArError,
    media::{MediaAcquirer, StreamConstraints},
    navigation::{Navigator, Route},
};

use super::{
    decoder::QrDecoder,
    frame::{FrameSource, LumaFrame},
};

// Set to false to silence the scan loop
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// What the scanning page shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ScanStatus {
    Idle,
    Scanning,
    /// A code was read but names no known site. Live scanning keeps going.
    Invalid { payload: String },
    Matched { site_id: String },
    Stopped,
}

/// Trim the decoded text and look it up by exact id.
pub fn match_payload(catalog: &dyn Catalog, raw: &str) -> Result<String, ArError> {
    let candidate = raw.trim();
    if catalog.contains_site(candidate) {
        Ok(candidate.to_string())
    } else {
        Err(ArError::DecodeMismatch {
            payload: candidate.to_string(),
        })
    }
}

#[derive(Clone)]
struct ScanContext {
    catalog: Arc<dyn Catalog>,
    decoder: Arc<dyn QrDecoder>,
    navigator: Arc<dyn Navigator>,
    status: Arc<watch::Sender<ScanStatus>>,
    navigated: Arc<AtomicBool>,
    camera: Option<Arc<Mutex<MediaAcquirer>>>,
}

impl ScanContext {
    /// Navigate unless this scan session already did.
    fn complete(&self, site_id: String) -> bool {
        if self.navigated.swap(true, Ordering::SeqCst) {
            return false;
        }
        log_info!("QR code matched site {}", site_id);
        self.status.send_replace(ScanStatus::Matched {
            site_id: site_id.clone(),
        });
        self.navigator.navigate(Route::ArViewer(site_id));
        true
    }

    fn reject(&self, payload: String) {
        log_info!("QR payload '{}' is not a known site", payload);
        self.status.send_replace(ScanStatus::Invalid { payload });
    }

    async fn release_camera(&self) {
        if let Some(camera) = &self.camera {
            camera.lock().await.release();
        }
    }
}

/// Owns the periodic scan job for one scanning page. At most one loop runs
/// at a time.
pub struct ScanController {
    ctx: ScanContext,
    interval: Duration,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl ScanController {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        decoder: Arc<dyn QrDecoder>,
        navigator: Arc<dyn Navigator>,
        interval: Duration,
    ) -> Self {
        let (status, _rx) = watch::channel(ScanStatus::Idle);
        Self {
            ctx: ScanContext {
                catalog,
                decoder,
                navigator,
                status: Arc::new(status),
                navigated: Arc::new(AtomicBool::new(false)),
                camera: None,
            },
            interval,
            handle: None,
            cancel_token: None,
        }
    }

    /// Give the scanner its own camera stream, released on match or stop.
    pub fn with_camera(mut self, camera: MediaAcquirer) -> Self {
        self.ctx.camera = Some(Arc::new(Mutex::new(camera)));
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<ScanStatus> {
        self.ctx.status.subscribe()
    }

    pub fn status(&self) -> ScanStatus {
        self.ctx.status.borrow().clone()
    }

    pub fn is_scanning(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub async fn live_tracks(&self) -> usize {
        match &self.ctx.camera {
            Some(camera) => camera.lock().await.active_tracks(),
            None => 0,
        }
    }

    pub async fn open_camera(&self, timeout: Duration) -> Result<(), ArError> {
        let camera = self.ctx.camera.as_ref().ok_or(ArError::UnsupportedPlatform {
            capability: "camera".into(),
        })?;
        camera
            .lock()
            .await
            .request_stream(StreamConstraints::default(), timeout)
            .await
            .map(|_| ())
    }

    /// Start sampling `frames` on the fixed interval. A loop that is already
    /// running is replaced.
    pub fn start_live(&mut self, frames: Arc<dyn FrameSource>) {
        self.abort_loop();
        self.ctx.navigated.store(false, Ordering::SeqCst);
        self.ctx.status.send_replace(ScanStatus::Scanning);

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(scan_loop(
            self.ctx.clone(),
            frames,
            self.interval,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        log_info!("QR scan loop started ({}ms)", self.interval.as_millis());
    }

    /// Decode one uploaded image. Every outcome is reported; only a match
    /// navigates.
    pub async fn scan_image(&mut self, bytes: Vec<u8>) -> Result<String, ArError> {
        let decoder = self.ctx.decoder.clone();
        let decoded = tokio::task::spawn_blocking(move || {
            let frame = LumaFrame::from_image_bytes(&bytes)?;
            decoder.decode(&frame).map_err(|err| {
                log_warn!("Uploaded QR image unreadable: {err:#}");
                ArError::NoCodeFound
            })
        })
        .await
        .map_err(|err| ArError::InvalidImage {
            reason: format!("decoder task failed: {err}"),
        })??;

        let raw = decoded.ok_or(ArError::NoCodeFound)?;
        match match_payload(self.ctx.catalog.as_ref(), &raw) {
            Ok(site_id) => {
                if let Err(err) = self.stop().await {
                    log_warn!("Live scan did not stop cleanly: {err:#}");
                }
                self.ctx.navigated.store(false, Ordering::SeqCst);
                self.ctx.complete(site_id.clone());
                Ok(site_id)
            }
            Err(err) => {
                self.ctx.reject(raw.trim().to_string());
                Err(err)
            }
        }
    }

    /// Stop the loop and release the scanner's camera.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        let joined = match self.handle.take() {
            Some(handle) => handle.await.context("QR scan loop failed to join"),
            None => Ok(()),
        };
        self.ctx.release_camera().await;

        self.ctx.status.send_if_modified(|status| {
            if matches!(status, ScanStatus::Matched { .. }) {
                return false;
            }
            *status = ScanStatus::Stopped;
            true
        });
        joined
    }

    fn abort_loop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for ScanController {
    fn drop(&mut self) {
        self.abort_loop();
    }
}

async fn scan_loop(
    ctx: ScanContext,
    frames: Arc<dyn FrameSource>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match scan_frame(&ctx, frames.as_ref()).await {
                    Ok(Some(site_id)) => {
                        ctx.release_camera().await;
                        ctx.complete(site_id);
                        break;
                    }
                    Ok(None) => {}
                    Err(err) => log_debug!("QR frame skipped: {err:#}"),
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("QR scan loop shutting down");
                break;
            }
        }
    }
}

/// One tick. `Ok(Some)` only for a catalog match.
async fn scan_frame(ctx: &ScanContext, frames: &dyn FrameSource) -> Result<Option<String>> {
    let Some(frame) = frames.grab()? else {
        return Ok(None);
    };

    let decoder = ctx.decoder.clone();
    let decoded = tokio::task::spawn_blocking(move || decoder.decode(&frame))
        .await
        .context("QR decode task panicked")??;

    let Some(raw) = decoded else {
        return Ok(None);
    };
    match match_payload(ctx.catalog.as_ref(), &raw) {
        Ok(site_id) => Ok(Some(site_id)),
        Err(_) => {
            ctx.reject(raw.trim().to_string());
            Ok(None)
        }
    }
}
