use crate::config::{CarouselConfig, MotionConfig};
use crate::gesture::Gesture;
use crate::store::InteractionState;
use std::f32::consts::TAU;

/// Inertial ring of photo cards spun by horizontal palm swipes.
#[derive(Debug, Clone)]
pub struct Carousel {
    /// Radians about the vertical axis, unbounded.
    pub rotation: f32,
    /// Radians added to `rotation` per tick.
    pub velocity: f32,
    pub focused: Option<usize>,
    last_hand_x: f32,
    base_angles: Vec<f32>,
}

impl Carousel {
    pub fn new(card_count: usize) -> Self {
        Self {
            rotation: 0.0,
            velocity: 0.0,
            focused: None,
            last_hand_x: 0.5,
            base_angles: (0..card_count).map(|i| Self::base_angle(i, card_count)).collect(),
        }
    }

    pub fn base_angle(index: usize, count: usize) -> f32 {
        index as f32 / count.max(1) as f32 * TAU
    }

    pub fn len(&self) -> usize {
        self.base_angles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base_angles.is_empty()
    }

    pub fn update(
        &mut self,
        dt: f32,
        state: &InteractionState,
        carousel: &CarouselConfig,
        motion: &MotionConfig,
    ) {
        let tree = state.is_tree_mode();
        let pinching = state.is_pinching || state.gesture == Gesture::Pinch;
        let hand_x = state.hand_position.x;

        if !tree && !pinching && state.gesture == Gesture::OpenPalm {
            self.velocity += (hand_x - self.last_hand_x) * carousel.swipe_gain * dt;
        }

        self.velocity *= motion.timing.decay(carousel.friction, dt);

        if self.velocity.abs() < carousel.drift_threshold && !pinching && !tree {
            self.velocity = carousel.drift_speed * dt;
        }

        // hold the ring still while a photo is zoomed
        if pinching {
            self.velocity = 0.0;
        }

        self.rotation += self.velocity;
        self.last_hand_x = hand_x;

        if tree {
            self.focused = None;
            let alpha = motion.timing.alpha(motion.tree_return_rate, dt);
            self.rotation += (0.0 - self.rotation) * alpha;
        } else {
            self.focused = self.facing_camera();
        }
    }

    /// Card whose world angle points most directly at the camera; ties go to the lower index.
    pub fn facing_camera(&self) -> Option<usize> {
        self.base_angles
            .iter()
            .enumerate()
            .map(|(i, base)| (i, (base + self.rotation).cos()))
            .fold(None, |best: Option<(usize, f32)>, (i, c)| match best {
                Some((_, max)) if c <= max => best,
                _ => Some((i, c)),
            })
            .map(|(i, _)| i)
    }
}
