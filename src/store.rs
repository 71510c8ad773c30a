//! Process-wide interaction record shared between the detection loop and the scene.
//!
//! There is exactly one [`StoreWriter`]; it is handed to the detection session and is
//! the only way to change the record. Every visual consumer holds a [`StoreReader`] and
//! reads the latest whole record on its own tick.

use crate::gesture::{ANCHOR, Gesture, HandLandmark};
use glam::Vec2;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionState {
    pub gesture: Gesture,
    /// Normalized, already mirrored for the front-facing camera.
    pub hand_position: Vec2,
    pub is_pinching: bool,
}

impl Default for InteractionState {
    fn default() -> Self {
        Self {
            gesture: Gesture::OpenPalm,
            hand_position: Vec2::new(0.5, 0.5),
            is_pinching: false,
        }
    }
}

impl InteractionState {
    pub fn is_tree_mode(&self) -> bool {
        self.gesture == Gesture::Fist
    }

    pub fn with_gesture(gesture: Gesture) -> Self {
        Self {
            gesture,
            is_pinching: gesture == Gesture::Pinch,
            ..Self::default()
        }
    }
}

pub fn channel() -> (StoreWriter, StoreReader) {
    let (tx, rx) = watch::channel(InteractionState::default());
    (StoreWriter { tx }, StoreReader { rx })
}

#[derive(Debug)]
pub struct StoreWriter {
    tx: watch::Sender<InteractionState>,
}

impl StoreWriter {
    pub fn set_gesture(&self, gesture: Gesture) {
        self.tx.send_modify(|s| s.gesture = gesture);
    }

    pub fn set_hand_position(&self, position: Vec2) {
        self.tx.send_modify(|s| s.hand_position = position);
    }

    pub fn set_pinching(&self, is_pinching: bool) {
        self.tx.send_modify(|s| s.is_pinching = is_pinching);
    }

    /// Writes the result of one detected hand as a single replacement.
    pub fn apply_detection(&self, gesture: Gesture, landmarks: &[HandLandmark]) {
        let mut next = *self.tx.borrow();
        next.gesture = gesture;
        next.is_pinching = gesture == Gesture::Pinch;
        if let Some(anchor) = landmarks.get(ANCHOR) {
            next.hand_position = Vec2::new(1.0 - anchor.x, anchor.y);
        }

        let previous = self.tx.send_replace(next);
        if previous.gesture != next.gesture {
            log::info!("Gesture {} -> {}", previous.gesture, next.gesture);
        }
    }

    pub fn reader(&self) -> StoreReader {
        StoreReader {
            rx: self.tx.subscribe(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreReader {
    rx: watch::Receiver<InteractionState>,
}

impl StoreReader {
    pub fn snapshot(&self) -> InteractionState {
        *self.rx.borrow()
    }

    /// Resolves once the writer replaced the record after this reader last looked.
    /// Returns `false` when the writer is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    pub fn mark_seen(&mut self) -> InteractionState {
        *self.rx.borrow_and_update()
    }
}
