pub mod capture;
pub mod replay;
pub mod runtime;
pub mod server;

use crate::config::Config;
use crate::store::StoreWriter;
use capture::{CaptureRequest, HandLandmarker, ModelError, Session};
use replay::{Recording, ReplayDevice, ReplayLandmarker};
use server::SocketDevice;
use std::path::PathBuf;
use std::sync::Arc;

/// Where landmark frames come from.
#[derive(Debug, Clone)]
pub enum FrameSource {
    Replay { path: PathBuf, looping: bool },
    Socket { path: PathBuf },
}

impl FrameSource {
    pub async fn start(self, config: &Config, writer: StoreWriter) -> Session {
        let request = CaptureRequest::from(&config.capture);

        match self {
            Self::Replay { path, looping } => {
                let recording = Recording::load(&path).map(Arc::new);
                let recorded = recording.as_ref().ok().cloned().unwrap_or_default();
                let mut device = ReplayDevice::new(recorded, looping);
                let loader = std::future::ready(
                    recording
                        .map(|r| Box::new(ReplayLandmarker::new(r)) as Box<dyn HandLandmarker>)
                        .map_err(ModelError::from),
                );
                Session::start(loader, &mut device, writer, config.gesture, request).await
            }
            Self::Socket { path } => {
                let mut device = SocketDevice::new(path, config.capture.model.clone());
                let landmarker: Box<dyn HandLandmarker> = Box::new(device.landmarker());
                let loader = std::future::ready(Ok::<_, ModelError>(landmarker));
                Session::start(loader, &mut device, writer, config.gesture, request).await
            }
        }
    }
}
