use glam::Vec3;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use strum::{Display as StrumDisplay, EnumIter, EnumString};

pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

/// Fingertips measured against the wrist for fist / open palm detection.
pub const CURL_TIPS: [usize; 4] = [INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];

/// Joint used for the hand cursor; steadier than any fingertip.
pub const ANCHOR: usize = MIDDLE_MCP;

/// One normalized hand joint as emitted by the pose model.
/// `x`/`y` are in image space `[0, 1]`, `z` is relative depth.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HandLandmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl HandLandmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    pub fn distance(&self, other: &HandLandmark) -> f32 {
        self.to_vec3().distance(other.to_vec3())
    }
}

pub type Hand = Vec<HandLandmark>;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    SerializeDisplay,
    DeserializeFromStr,
    EnumString,
    EnumIter,
    StrumDisplay,
)]
#[strum(ascii_case_insensitive)]
pub enum Gesture {
    #[default]
    #[strum(to_string = "NONE")]
    None,
    #[strum(to_string = "FIST", serialize = "tree")]
    Fist,
    #[strum(to_string = "OPEN_PALM", serialize = "open", serialize = "palm")]
    OpenPalm,
    #[strum(to_string = "PINCH", serialize = "zoom")]
    Pinch,
}

impl Gesture {
    pub fn from_landmarks(landmarks: &[HandLandmark]) -> Self {
        classify(Some(landmarks), &Thresholds::default())
    }

    pub fn caption(&self) -> &'static str {
        match self {
            Self::Fist => "Tree Mode",
            Self::OpenPalm => "Swipe to Rotate",
            Self::Pinch => "Zooming Photo",
            Self::None => "Waiting for hand...",
        }
    }
}

/// Empirical distances in normalized landmark units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub pinch: f32,
    pub fist: f32,
    pub open_palm: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            pinch: 0.05,
            fist: 0.25,
            open_palm: 0.4,
        }
    }
}

/// Classifies a single frame. Order matters: pinch is checked before the whole-hand
/// poses because a pinching hand can also satisfy the fist or open palm test.
pub fn classify(landmarks: Option<&[HandLandmark]>, thresholds: &Thresholds) -> Gesture {
    let Some(lm) = landmarks.filter(|lm| lm.len() >= LANDMARK_COUNT) else {
        return Gesture::None;
    };

    if lm[THUMB_TIP].distance(&lm[INDEX_TIP]) < thresholds.pinch {
        return Gesture::Pinch;
    }

    let reach = mean_tip_reach(lm);
    if reach < thresholds.fist {
        Gesture::Fist
    } else if reach > thresholds.open_palm {
        Gesture::OpenPalm
    } else {
        Gesture::None
    }
}

fn mean_tip_reach(lm: &[HandLandmark]) -> f32 {
    let wrist = lm[WRIST];
    CURL_TIPS
        .iter()
        .map(|&i| lm[i].distance(&wrist))
        .sum::<f32>()
        / CURL_TIPS.len() as f32
}
