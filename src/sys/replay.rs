//! Recorded landmark feeds played back as camera and model.
//!
//! A recording is newline-delimited JSON, one video frame per line:
//! `{"time": 0.033, "hands": [[{"x": 0.5, "y": 0.5, "z": 0.0}, ...]]}`.

use super::capture::{
    CaptureDevice, CaptureError, CaptureRequest, CaptureStream, HandLandmarker, VideoFrame,
};
use crate::gesture::Hand;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Hold time for a recording with a single frame.
pub const SINGLE_FRAME_HOLD: f64 = 1.0 / 30.0;

const TIME_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    /// Seconds since the start of the recording.
    pub time: f64,
    #[serde(default)]
    pub hands: Vec<Hand>,
}

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Failed to read recording: {0}")]
    Io(#[from] std::io::Error),
    #[error("Recording {0} contains no frames")]
    Empty(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct Recording {
    frames: Vec<RecordedFrame>,
}

impl Recording {
    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        let text = fs_err::read_to_string(path)?;
        let recording = Self::parse(&text);
        if recording.is_empty() {
            return Err(ReplayError::Empty(path.to_path_buf()));
        }
        log::info!(
            "Loaded {} frames ({:.1}s) from {}",
            recording.len(),
            recording.duration(),
            path.display()
        );
        Ok(recording)
    }

    /// Parses every well-formed line; malformed lines are skipped.
    pub fn parse(text: &str) -> Self {
        let mut frames: Vec<RecordedFrame> = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
            .filter_map(|(n, line)| match serde_json::from_str(line) {
                Ok(frame) => Some(frame),
                Err(e) => {
                    log::warn!("Skipping recording line {}: {}", n + 1, e);
                    None
                }
            })
            .collect();
        frames.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { frames }
    }

    pub fn frames(&self) -> &[RecordedFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn duration(&self) -> f64 {
        match (self.frames.first(), self.frames.last()) {
            (Some(first), Some(last)) => last.time - first.time,
            _ => 0.0,
        }
    }

    /// Playback length of one pass. The last frame is held for the interval that
    /// preceded it, or [`SINGLE_FRAME_HOLD`] when the recording has one frame.
    pub fn span(&self) -> f64 {
        let hold = match self.frames.as_slice() {
            [.., before, last] => last.time - before.time,
            _ => SINGLE_FRAME_HOLD,
        };
        self.duration() + hold.max(0.0)
    }

    /// Index of the frame on screen `elapsed` seconds into playback, or `None` once a
    /// non-looping recording has run out.
    pub fn index_at(&self, elapsed: f64, looping: bool) -> Option<usize> {
        let first = self.frames.first()?.time;
        let span = self.span();

        let t = if looping && span > 0.0 {
            elapsed.rem_euclid(span)
        } else {
            elapsed.max(0.0)
        };
        if !looping && t >= span {
            return None;
        }

        let after = self
            .frames
            .partition_point(|f| f.time - first <= t + TIME_EPSILON);
        Some(after.saturating_sub(1))
    }
}

pub struct ReplayDevice {
    recording: Arc<Recording>,
    looping: bool,
}

impl ReplayDevice {
    pub fn new(recording: Arc<Recording>, looping: bool) -> Self {
        Self { recording, looping }
    }
}

impl CaptureDevice for ReplayDevice {
    fn open(&mut self, request: &CaptureRequest) -> Result<Box<dyn CaptureStream>, CaptureError> {
        if self.recording.is_empty() {
            return Err(CaptureError::NoDevice);
        }
        Ok(Box::new(ReplayStream {
            recording: self.recording.clone(),
            looping: self.looping,
            width: request.width,
            height: request.height,
            started: Instant::now(),
            stopped: false,
        }))
    }
}

pub struct ReplayStream {
    recording: Arc<Recording>,
    looping: bool,
    width: u32,
    height: u32,
    started: Instant,
    stopped: bool,
}

impl ReplayStream {
    fn frame_at(&self, elapsed: f64) -> Option<VideoFrame> {
        if self.stopped {
            return None;
        }
        let index = self.recording.index_at(elapsed, self.looping)?;
        let frame = self.recording.frames.get(index)?;

        let span = self.recording.span();
        let cycle = if self.looping && span > 0.0 {
            (elapsed / span).floor()
        } else {
            0.0
        };

        Some(VideoFrame {
            media_time: frame.time + cycle * span,
            sequence: index as u64,
            width: self.width,
            height: self.height,
        })
    }
}

impl CaptureStream for ReplayStream {
    fn current_frame(&mut self) -> Option<VideoFrame> {
        self.frame_at(self.started.elapsed().as_secs_f64())
    }

    fn active_tracks(&self) -> usize {
        if self.stopped { 0 } else { 1 }
    }

    fn stop(&mut self) {
        self.stopped = true;
    }

    fn ended(&self) -> bool {
        !self.looping && self.started.elapsed().as_secs_f64() >= self.recording.span()
    }
}

/// Returns the hands recorded for the frame the stream handed out.
pub struct ReplayLandmarker {
    recording: Arc<Recording>,
}

impl ReplayLandmarker {
    pub fn new(recording: Arc<Recording>) -> Self {
        Self { recording }
    }
}

impl HandLandmarker for ReplayLandmarker {
    fn detect(&mut self, frame: &VideoFrame, _timestamp_ms: f64) -> Vec<Hand> {
        if self.recording.is_empty() {
            return Vec::new();
        }
        let index = frame.sequence as usize % self.recording.len();
        self.recording.frames[index].hands.clone()
    }

    fn close(&mut self) {
        log::debug!("Replay landmarker closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::fixtures::hand;
    use crate::gesture::{Gesture, Thresholds, classify};

    fn recording(times: &[f64]) -> Recording {
        Recording {
            frames: times
                .iter()
                .map(|&time| RecordedFrame {
                    time,
                    hands: Vec::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_parse_skips_malformed_lines() {
        let fist = serde_json::to_string(&RecordedFrame {
            time: 0.5,
            hands: vec![hand(0.0, 0.5)],
        })
        .unwrap();
        let text = format!(
            "{{\"time\": 0.0}}\n\n# comment\nnot json\n{fist}\n{{\"time\": 0.25, \"hands\": []}}\n"
        );

        let recording = Recording::parse(&text);
        assert_eq!(recording.len(), 3);
        let times: Vec<f64> = recording.frames().iter().map(|f| f.time).collect();
        assert_eq!(times, vec![0.0, 0.25, 0.5]);

        let last = &recording.frames()[2];
        let gesture = classify(last.hands.first().map(Vec::as_slice), &Thresholds::default());
        assert_eq!(gesture, Gesture::Fist);
    }

    #[test]
    fn test_missing_z_defaults_to_zero() {
        let recording = Recording::parse(r#"{"time": 1.0, "hands": [[{"x": 0.2, "y": 0.4}]]}"#);
        assert_eq!(recording.frames()[0].hands[0][0].z, 0.0);
    }

    #[test]
    fn test_index_at_plays_once() {
        let rec = recording(&[1.0, 1.1, 1.3]);
        assert_eq!(rec.index_at(0.0, false), Some(0));
        assert_eq!(rec.index_at(0.05, false), Some(0));
        assert_eq!(rec.index_at(0.15, false), Some(1));
        // 1.3 - 1.0 is not exactly 0.3 in binary
        assert_eq!(rec.index_at(0.3, false), Some(2));
        // the last frame is held as long as the gap before it
        assert_eq!(rec.index_at(0.49, false), Some(2));
        assert_eq!(rec.index_at(0.51, false), None);

        let single = recording(&[2.0]);
        assert_eq!(single.index_at(0.0, false), Some(0));
        assert_eq!(single.index_at(SINGLE_FRAME_HOLD * 2.0, false), None);
    }

    #[test]
    fn test_index_at_wraps_when_looping() {
        let rec = recording(&[0.0, 0.1, 0.2]);
        assert_eq!(rec.index_at(0.25, true), Some(2));
        assert_eq!(rec.index_at(0.35, true), Some(0));
        assert_eq!(rec.index_at(0.45, true), Some(1));
        assert_eq!(rec.index_at(10.0, true).map(|i| i < 3), Some(true));

        let single = recording(&[0.0]);
        assert_eq!(single.index_at(5.0, true), Some(0));
        assert_eq!(Recording::default().index_at(0.0, true), None);
    }

    #[test]
    fn test_every_frame_plays_in_each_pass() {
        let rec = recording(&[0.0, 0.1, 0.2]);
        for looping in [false, true] {
            let mut seen = [0usize; 3];
            for step in 0..3_000 {
                if let Some(i) = rec.index_at(step as f64 * 0.0001, looping) {
                    seen[i] += 1;
                }
            }
            // each frame holds for roughly a third of the 0.3s pass
            for (i, count) in seen.iter().enumerate() {
                assert!((990..=1_010).contains(count), "looping={looping} frame {i}: {count}");
            }
        }
    }

    #[test]
    fn test_stream_ends_after_last_frame_hold() {
        let rec = Arc::new(recording(&[0.0, 0.1, 0.2]));
        let mut replay = ReplayStream {
            recording: rec,
            looping: false,
            width: 640,
            height: 480,
            started: Instant::now(),
            stopped: false,
        };
        assert!(!replay.ended());
        assert_eq!(replay.frame_at(0.25).map(|f| f.sequence), Some(2));
        assert!(replay.frame_at(0.31).is_none());

        replay.started = Instant::now() - std::time::Duration::from_millis(310);
        assert!(replay.ended());
    }

    #[test]
    fn test_looping_media_time_keeps_advancing() {
        let rec = Arc::new(recording(&[0.0, 0.1, 0.2]));
        let mut device = ReplayDevice::new(rec.clone(), true);
        let mut stream = device.open(&CaptureRequest::default()).unwrap();
        assert_eq!(stream.active_tracks(), 1);

        let replay = ReplayStream {
            recording: rec,
            looping: true,
            width: 640,
            height: 480,
            started: Instant::now(),
            stopped: false,
        };
        let first = replay.frame_at(0.05).unwrap();
        let wrapped = replay.frame_at(0.35).unwrap();
        assert_eq!(first.sequence, wrapped.sequence);
        assert!(wrapped.media_time > first.media_time);

        stream.stop();
        assert_eq!(stream.active_tracks(), 0);
        assert!(stream.current_frame().is_none());
    }

    #[test]
    fn test_landmarker_returns_recorded_hands() {
        let rec = Arc::new(Recording {
            frames: vec![
                RecordedFrame {
                    time: 0.0,
                    hands: vec![hand(1.0, 0.5)],
                },
                RecordedFrame {
                    time: 0.1,
                    hands: Vec::new(),
                },
            ],
        });
        let mut landmarker = ReplayLandmarker::new(rec);
        let frame = |sequence| VideoFrame {
            media_time: 0.0,
            sequence,
            width: 1,
            height: 1,
        };

        assert_eq!(landmarker.detect(&frame(0), 0.0).len(), 1);
        assert!(landmarker.detect(&frame(1), 0.0).is_empty());
        assert_eq!(landmarker.detect(&frame(2), 0.0).len(), 1);
    }

    #[test]
    fn test_load_rejects_empty_file() {
        let name = format!("tinsel-empty-{}.ndjson", std::process::id());
        let path = std::env::temp_dir().join(name);
        fs_err::write(&path, "garbage\n").unwrap();
        let result = Recording::load(&path);
        let _ = fs_err::remove_file(&path);
        assert!(matches!(result, Err(ReplayError::Empty(_))));
    }
}
