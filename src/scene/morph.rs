use glam::{Quat, Vec3};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use strum::{Display as StrumDisplay, EnumIter, EnumString};

/// Frame rate the per-frame constants were tuned against.
pub const REFERENCE_HZ: f32 = 60.0;

/// How smoothing rates and friction relate to elapsed time.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    SerializeDisplay,
    DeserializeFromStr,
    EnumString,
    EnumIter,
    StrumDisplay,
)]
#[strum(ascii_case_insensitive)]
pub enum Timing {
    /// Exponential approach and friction scaled by `dt`; frame-rate independent.
    #[default]
    #[strum(to_string = "continuous", serialize = "time")]
    Continuous,
    /// `lerp(rate * dt)` and friction once per tick, as tuned at 60 Hz.
    #[strum(to_string = "per-frame", serialize = "frame")]
    PerFrame,
}

impl Timing {
    /// Interpolation weight for one tick. Always within `[0, 1]`.
    pub fn alpha(&self, rate: f32, dt: f32) -> f32 {
        let step = (rate * dt).max(0.0);
        match self {
            Self::Continuous => 1.0 - (-step).exp(),
            Self::PerFrame => step.min(1.0),
        }
    }

    /// Multiplier for a value that loses `1 - per_frame` of itself every reference frame.
    pub fn decay(&self, per_frame: f32, dt: f32) -> f32 {
        match self {
            Self::Continuous => per_frame.powf(dt.max(0.0) * REFERENCE_HZ),
            Self::PerFrame => per_frame,
        }
    }
}

pub trait Lerp: Copy {
    fn lerp_to(self, target: Self, t: f32) -> Self;
}

impl Lerp for f32 {
    fn lerp_to(self, target: Self, t: f32) -> Self {
        self + (target - self) * t
    }
}

impl Lerp for Vec3 {
    fn lerp_to(self, target: Self, t: f32) -> Self {
        self.lerp(target, t)
    }
}

impl Lerp for Quat {
    fn lerp_to(self, target: Self, t: f32) -> Self {
        self.slerp(target, t)
    }
}

/// A value chasing a target that is reassigned every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Morph<T> {
    pub current: T,
    pub target: T,
}

impl<T: Lerp> Morph<T> {
    pub fn new(initial: T) -> Self {
        Self {
            current: initial,
            target: initial,
        }
    }

    pub fn set_target(&mut self, target: T) {
        self.target = target;
    }

    pub fn advance(&mut self, rate: f32, dt: f32, timing: Timing) -> T {
        self.current = self.current.lerp_to(self.target, timing.alpha(rate, dt));
        self.current
    }

    pub fn value(&self) -> T {
        self.current
    }
}
