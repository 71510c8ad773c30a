//! Unix socket feed for an external hand tracker.
//!
//! On connect the client receives one JSON line describing the requested capture, then
//! streams frames in the same line format as a recording. The latest frame wins.
//! Frame times must increase; a frame whose time does not advance is treated as a
//! repeat of the previous one and skipped by detection.

use super::capture::{
    CaptureDevice, CaptureError, CaptureRequest, CaptureStream, HandLandmarker, VideoFrame,
};
use super::replay::RecordedFrame;
use crate::config::ModelAsset;
use crate::gesture::Hand;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::{JoinHandle, JoinSet};

#[derive(Debug, Default)]
struct FeedState {
    latest: Option<RecordedFrame>,
    sequence: u64,
    clients: usize,
    /// Set once the stream is stopped; frames arriving afterwards are dropped.
    closed: bool,
    stalled: bool,
}

type SharedFeed = Arc<Mutex<FeedState>>;

pub struct SocketDevice {
    path: PathBuf,
    model: ModelAsset,
    feed: SharedFeed,
}

impl SocketDevice {
    pub fn new(path: impl Into<PathBuf>, model: ModelAsset) -> Self {
        Self {
            path: path.into(),
            model,
            feed: SharedFeed::default(),
        }
    }

    /// Landmarker that reads the hands of the most recent frame on this feed.
    pub fn landmarker(&self) -> FeedLandmarker {
        FeedLandmarker {
            feed: self.feed.clone(),
        }
    }
}

impl CaptureDevice for SocketDevice {
    fn open(&mut self, request: &CaptureRequest) -> Result<Box<dyn CaptureStream>, CaptureError> {
        // Cleanup old socket if it exists
        if fs_err::metadata(&self.path).is_ok() {
            let _ = fs_err::remove_file(&self.path);
        }

        let listener = UnixListener::bind(&self.path)?;
        log::info!("Listening for landmark frames on {}", self.path.display());

        let hello = serde_json::json!({
            "model": self.model,
            "width": request.width,
            "height": request.height,
            "facing": request.facing.to_string(),
        })
        .to_string();

        self.feed.lock().closed = false;
        let task = tokio::spawn(run_server(listener, self.feed.clone(), hello));

        Ok(Box::new(FeedStream {
            feed: self.feed.clone(),
            path: self.path.clone(),
            width: request.width,
            height: request.height,
            task: Some(task),
        }))
    }
}

async fn run_server(listener: UnixListener, feed: SharedFeed, hello: String) {
    // dropped with this task, which aborts every tracker connection
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    let feed = feed.clone();
                    let hello = hello.clone();
                    connections.spawn(async move {
                        let clients = {
                            let mut state = feed.lock();
                            state.clients += 1;
                            state.clients
                        };
                        log::info!("Tracker connected ({} active)", clients);

                        if let Err(e) = handle_client(stream, &feed, &hello).await {
                            log::warn!("Tracker connection failed: {}", e);
                        }
                        let mut state = feed.lock();
                        state.clients = state.clients.saturating_sub(1);
                        log::info!("Tracker disconnected");
                    });
                }
                Err(e) => {
                    log::error!("Failed to accept connection: {}", e);
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

async fn handle_client(stream: UnixStream, feed: &SharedFeed, hello: &str) -> std::io::Result<()> {
    let (read, mut write) = stream.into_split();
    write.write_all(hello.as_bytes()).await?;
    write.write_all(b"\n").await?;

    let mut lines = BufReader::new(read).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<RecordedFrame>(line) {
            Ok(frame) => {
                let mut state = feed.lock();
                if state.closed {
                    break;
                }

                let advancing = state
                    .latest
                    .as_ref()
                    .is_none_or(|previous| frame.time > previous.time);
                if !advancing && !state.stalled {
                    log::warn!(
                        "Tracker frame time {} did not advance, detection skips repeated times",
                        frame.time
                    );
                }
                state.stalled = !advancing;
                state.latest = Some(frame);
                state.sequence += 1;
            }
            Err(e) => log::warn!("Skipping tracker line: {}", e),
        }
    }
    Ok(())
}

pub struct FeedStream {
    feed: SharedFeed,
    path: PathBuf,
    width: u32,
    height: u32,
    task: Option<JoinHandle<()>>,
}

impl CaptureStream for FeedStream {
    fn current_frame(&mut self) -> Option<VideoFrame> {
        self.task.as_ref()?;
        let state = self.feed.lock();
        state.latest.as_ref().map(|frame| VideoFrame {
            media_time: frame.time,
            sequence: state.sequence,
            width: self.width,
            height: self.height,
        })
    }

    fn active_tracks(&self) -> usize {
        usize::from(self.task.is_some())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            {
                let mut state = self.feed.lock();
                state.closed = true;
                state.clients = 0;
            }
            let _ = fs_err::remove_file(&self.path);
            log::info!("Closed tracker socket {}", self.path.display());
        }
    }
}

impl Drop for FeedStream {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct FeedLandmarker {
    feed: SharedFeed,
}

impl HandLandmarker for FeedLandmarker {
    fn detect(&mut self, _frame: &VideoFrame, _timestamp_ms: f64) -> Vec<Hand> {
        self.feed
            .lock()
            .latest
            .as_ref()
            .map(|frame| frame.hands.clone())
            .unwrap_or_default()
    }

    fn close(&mut self) {
        log::debug!("Feed landmarker closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::fixtures::hand;
    use std::path::Path;
    use std::time::Duration;
    use tokio::io::Lines;
    use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};

    fn socket_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tinsel-{}-{}.sock", name, std::process::id()))
    }

    #[tokio::test]
    async fn test_feed_exposes_latest_frame() {
        let path = socket_path("feed");
        let mut device = SocketDevice::new(&path, ModelAsset::new("hand.task"));
        let mut landmarker = device.landmarker();
        let mut stream = device.open(&CaptureRequest::default()).unwrap();
        assert_eq!(stream.active_tracks(), 1);
        assert!(stream.current_frame().is_none());

        let client = UnixStream::connect(&path).await.unwrap();
        let (read, mut write) = client.into_split();
        let mut lines = BufReader::new(read).lines();
        let hello: serde_json::Value =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(hello["model"], "hand.task");
        assert_eq!(hello["width"], 640);
        assert_eq!(hello["facing"], "user");

        let frame = RecordedFrame {
            time: 1.5,
            hands: vec![hand(1.0, 0.5)],
        };
        let line = format!("bad line\n{}\n", serde_json::to_string(&frame).unwrap());
        write.write_all(line.as_bytes()).await.unwrap();

        let mut latest = None;
        for _ in 0..100 {
            latest = stream.current_frame();
            if latest.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let latest = latest.unwrap();
        assert_eq!(latest.media_time, 1.5);
        assert_eq!(latest.sequence, 1);
        assert_eq!(landmarker.detect(&latest, 0.0).len(), 1);

        stream.stop();
        assert_eq!(stream.active_tracks(), 0);
        assert!(stream.current_frame().is_none());
        assert!(!path.exists());
    }

    async fn connect(path: &Path) -> (Lines<BufReader<OwnedReadHalf>>, OwnedWriteHalf) {
        let client = UnixStream::connect(path).await.unwrap();
        let (read, write) = client.into_split();
        let mut lines = BufReader::new(read).lines();
        lines.next_line().await.unwrap().unwrap();
        (lines, write)
    }

    async fn send(write: &mut OwnedWriteHalf, time: f64) {
        let frame = RecordedFrame {
            time,
            hands: vec![hand(1.0, 0.5)],
        };
        let line = format!("{}\n", serde_json::to_string(&frame).unwrap());
        let _ = write.write_all(line.as_bytes()).await;
    }

    #[tokio::test]
    async fn test_stop_disconnects_trackers() {
        let path = socket_path("stop");
        let mut device = SocketDevice::new(&path, ModelAsset::new("hand.task"));
        let mut landmarker = device.landmarker();
        let mut stream = device.open(&CaptureRequest::default()).unwrap();

        let (mut lines, mut write) = connect(&path).await;
        assert_eq!(device.feed.lock().clients, 1);

        stream.stop();
        send(&mut write, 9.0).await;

        let read = tokio::time::timeout(Duration::from_secs(2), lines.next_line()).await;
        assert!(matches!(read, Ok(Ok(None)) | Ok(Err(_))), "{read:?}");

        let state = device.feed.lock();
        assert_eq!(state.clients, 0);
        assert!(state.latest.is_none());
        drop(state);

        let frame = VideoFrame {
            media_time: 9.0,
            sequence: 1,
            width: 640,
            height: 480,
        };
        assert!(landmarker.detect(&frame, 0.0).is_empty());
    }

    #[tokio::test]
    async fn test_repeated_times_mark_feed_stalled() {
        let path = socket_path("stall");
        let mut device = SocketDevice::new(&path, ModelAsset::new("hand.task"));
        let mut stream = device.open(&CaptureRequest::default()).unwrap();
        let (_lines, mut write) = connect(&path).await;

        send(&mut write, 1.0).await;
        send(&mut write, 1.0).await;
        for _ in 0..100 {
            if device.feed.lock().sequence == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(device.feed.lock().sequence, 2);
        assert!(device.feed.lock().stalled);

        send(&mut write, 1.1).await;
        for _ in 0..100 {
            if device.feed.lock().sequence == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!device.feed.lock().stalled);
        assert_eq!(stream.current_frame().map(|f| f.media_time), Some(1.1));
        stream.stop();
    }

    #[tokio::test]
    async fn test_open_replaces_stale_socket() {
        let path = socket_path("stale");
        fs_err::write(&path, "").unwrap();

        let mut device = SocketDevice::new(&path, ModelAsset::new("hand.task"));
        let stream = device.open(&CaptureRequest::default()).unwrap();
        assert!(UnixStream::connect(&path).await.is_ok());
        drop(stream);
        assert!(!path.exists());
    }
}
