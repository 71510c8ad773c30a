//! Camera and landmark model lifecycle.
//!
//! A [`Session`] owns the open stream and the loaded landmarker and is the single holder
//! of the [`StoreWriter`]. Dropping it releases both, so every exit path frees the camera.

use crate::config::{CaptureConfig, ModelAsset};
use crate::events::AppEvent;
use crate::gesture::{Gesture, Hand, Thresholds, classify};
use crate::store::StoreWriter;
use async_channel::Sender;
use std::future::Future;
use std::time::Duration;
use strum::{Display, EnumString};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoFrame {
    /// Presentation time of the frame in seconds.
    pub media_time: f64,
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Facing {
    #[default]
    User,
    Environment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    pub facing: Facing,
    pub width: u32,
    pub height: u32,
}

impl Default for CaptureRequest {
    fn default() -> Self {
        Self::from(&CaptureConfig::default())
    }
}

impl From<&CaptureConfig> for CaptureRequest {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            facing: Facing::User,
            width: config.width,
            height: config.height,
        }
    }
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Camera permission denied")]
    PermissionDenied,
    #[error("No camera device available")]
    NoDevice,
    #[error("Capture I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to load model {asset}: {reason}")]
    Load { asset: ModelAsset, reason: String },
    #[error("Failed to load recording: {0}")]
    Replay(#[from] crate::sys::replay::ReplayError),
}

pub trait CaptureDevice: Send {
    fn open(&mut self, request: &CaptureRequest) -> Result<Box<dyn CaptureStream>, CaptureError>;
}

pub trait CaptureStream: Send {
    /// Latest frame the device has produced, if any.
    fn current_frame(&mut self) -> Option<VideoFrame>;
    fn active_tracks(&self) -> usize;
    fn stop(&mut self);

    /// Whether the source has no more frames to give.
    fn ended(&self) -> bool {
        false
    }
}

pub trait HandLandmarker: Send {
    fn detect(&mut self, frame: &VideoFrame, timestamp_ms: f64) -> Vec<Hand>;
    fn close(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SessionStatus {
    Unloaded,
    Loaded,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Unloaded,
    NoFrame,
    Duplicate,
    NoHand,
    Detected(Gesture),
    Ended,
}

pub struct Session {
    status: SessionStatus,
    stream: Option<Box<dyn CaptureStream>>,
    landmarker: Option<Box<dyn HandLandmarker>>,
    writer: StoreWriter,
    thresholds: Thresholds,
    last_media_time: Option<f64>,
}

impl Session {
    /// Loads the model, then opens the camera. Failures are logged and leave the session
    /// unloaded; the scene keeps running on the default gesture.
    pub async fn start<F>(
        loader: F,
        device: &mut dyn CaptureDevice,
        writer: StoreWriter,
        thresholds: Thresholds,
        request: CaptureRequest,
    ) -> Self
    where
        F: Future<Output = Result<Box<dyn HandLandmarker>, ModelError>>,
    {
        let mut session = Self {
            status: SessionStatus::Unloaded,
            stream: None,
            landmarker: None,
            writer,
            thresholds,
            last_media_time: None,
        };

        let mut landmarker = match loader.await {
            Ok(l) => l,
            Err(e) => {
                log::error!("Failed to load hand landmarker: {}", e);
                return session;
            }
        };

        match device.open(&request) {
            Ok(stream) => {
                log::info!(
                    "Camera opened {}x{} facing {}",
                    request.width,
                    request.height,
                    request.facing
                );
                session.stream = Some(stream);
                session.landmarker = Some(landmarker);
                session.status = SessionStatus::Loaded;
            }
            Err(e) => {
                log::error!("Failed to open camera: {}", e);
                landmarker.close();
            }
        }

        session
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_loaded(&self) -> bool {
        self.status == SessionStatus::Loaded
    }

    pub fn set_thresholds(&mut self, thresholds: Thresholds) {
        self.thresholds = thresholds;
    }

    /// Runs one detection step against the stream's current frame.
    pub fn on_frame(&mut self, now_ms: f64) -> FrameOutcome {
        let (Some(stream), Some(landmarker)) = (self.stream.as_mut(), self.landmarker.as_mut())
        else {
            return FrameOutcome::Unloaded;
        };

        if stream.ended() {
            return FrameOutcome::Ended;
        }

        let Some(frame) = stream.current_frame() else {
            return FrameOutcome::NoFrame;
        };
        if self.last_media_time == Some(frame.media_time) {
            return FrameOutcome::Duplicate;
        }
        self.last_media_time = Some(frame.media_time);

        let hands = landmarker.detect(&frame, now_ms);
        let Some(hand) = hands.first() else {
            return FrameOutcome::NoHand;
        };

        let gesture = classify(Some(hand.as_slice()), &self.thresholds);
        self.writer.apply_detection(gesture, hand);
        FrameOutcome::Detected(gesture)
    }

    /// Stops every track and closes the model. Safe to call more than once.
    pub fn teardown(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
        if let Some(mut landmarker) = self.landmarker.take() {
            landmarker.close();
        }
        if self.status != SessionStatus::Closed {
            log::info!("Detection session closed");
            self.status = SessionStatus::Closed;
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

pub struct DetectionLoop;

impl DetectionLoop {
    /// Calls [`Session::on_frame`] every `period` until cancelled or the stream ends.
    pub fn spawn(
        mut session: Session,
        period: Duration,
        events: Option<Sender<AppEvent>>,
    ) -> DetectionHandle {
        let (thresholds, mut thresholds_rx) = watch::channel(session.thresholds);

        let task = tokio::spawn(async move {
            if !session.is_loaded() {
                log::warn!("Detection disabled, session is {}", session.status());
                return;
            }

            let started = Instant::now();
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;

                if thresholds_rx.has_changed().unwrap_or(false) {
                    session.set_thresholds(*thresholds_rx.borrow_and_update());
                }

                let now_ms = started.elapsed().as_secs_f64() * 1000.0;
                if session.on_frame(now_ms) == FrameOutcome::Ended {
                    log::info!("Capture stream ended");
                    session.teardown();
                    if let Some(tx) = &events {
                        let _ = tx.send(AppEvent::SourceEnded).await;
                    }
                    break;
                }
            }
        });

        DetectionHandle { task, thresholds }
    }
}

/// Owns the pending detection task. Dropping it cancels the next request.
pub struct DetectionHandle {
    task: JoinHandle<()>,
    thresholds: watch::Sender<Thresholds>,
}

impl DetectionHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn set_thresholds(&self, thresholds: Thresholds) {
        self.thresholds.send_replace(thresholds);
    }

    /// Cancels the task and waits until the session has been released.
    pub async fn shutdown(mut self) {
        self.task.abort();
        let _ = (&mut self.task).await;
    }
}

impl Drop for DetectionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
