//! Per-frame pose snapshots.
//!
//! Landmark indices follow the 33-point BlazePose body model produced by the
//! upstream pose estimator. The indices are a wire contract: a sample is an
//! ordered list and `BodyPart as usize` is the position in that list.

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const LANDMARK_COUNT: usize = 33;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
    #[serde(default = "full_visibility")]
    pub visibility: f32,
}

fn full_visibility() -> f32 {
    1.0
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self { x, y, z, visibility }
    }

    /// Fully visible landmark in the image plane.
    pub fn at(x: f32, y: f32) -> Self {
        Self::new(x, y, 0.0, 1.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.visibility.is_finite()
    }
}

impl Default for Landmark {
    fn default() -> Self {
        Self::at(0.5, 0.5)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum BodyPart {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

/// Left/right selector for limb checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn shoulder(self) -> BodyPart {
        match self {
            Side::Left => BodyPart::LeftShoulder,
            Side::Right => BodyPart::RightShoulder,
        }
    }
    pub fn elbow(self) -> BodyPart {
        match self {
            Side::Left => BodyPart::LeftElbow,
            Side::Right => BodyPart::RightElbow,
        }
    }
    pub fn wrist(self) -> BodyPart {
        match self {
            Side::Left => BodyPart::LeftWrist,
            Side::Right => BodyPart::RightWrist,
        }
    }
    pub fn hip(self) -> BodyPart {
        match self {
            Side::Left => BodyPart::LeftHip,
            Side::Right => BodyPart::RightHip,
        }
    }
    pub fn knee(self) -> BodyPart {
        match self {
            Side::Left => BodyPart::LeftKnee,
            Side::Right => BodyPart::RightKnee,
        }
    }
    pub fn ankle(self) -> BodyPart {
        match self {
            Side::Left => BodyPart::LeftAnkle,
            Side::Right => BodyPart::RightAnkle,
        }
    }
}

/// One frame's full set of landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Landmark>", into = "Vec<Landmark>")]
pub struct PoseSample {
    landmarks: [Landmark; LANDMARK_COUNT],
}

impl PoseSample {
    pub fn new(landmarks: [Landmark; LANDMARK_COUNT]) -> Self {
        Self { landmarks }
    }

    pub fn get(&self, part: BodyPart) -> &Landmark {
        &self.landmarks[part as usize]
    }

    pub fn set(&mut self, part: BodyPart, lm: Landmark) {
        self.landmarks[part as usize] = lm;
    }

    /// Builder-style variant of [`PoseSample::set`].
    pub fn with(mut self, part: BodyPart, lm: Landmark) -> Self {
        self.set(part, lm);
        self
    }

    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }
}

impl Default for PoseSample {
    fn default() -> Self {
        Self::new([Landmark::default(); LANDMARK_COUNT])
    }
}

impl TryFrom<Vec<Landmark>> for PoseSample {
    type Error = Error;

    fn try_from(v: Vec<Landmark>) -> Result<Self, Self::Error> {
        let len = v.len();
        let landmarks: [Landmark; LANDMARK_COUNT] = v.try_into().map_err(|_| Error::InvalidFrame {
            line: 0,
            reason: format!("expected {LANDMARK_COUNT} landmarks, got {len}"),
        })?;
        if let Some(i) = landmarks.iter().position(|l| !l.is_finite()) {
            return Err(Error::InvalidFrame {
                line: 0,
                reason: format!("landmark {i} has a non-finite coordinate"),
            });
        }
        Ok(Self { landmarks })
    }
}

impl From<PoseSample> for Vec<Landmark> {
    fn from(s: PoseSample) -> Self {
        s.landmarks.to_vec()
    }
}

/// A sample stamped with the capture time of its source frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseFrame {
    pub timestamp_ms: u64,
    pub sample: PoseSample,
}

impl PoseFrame {
    pub fn new(timestamp_ms: u64, sample: PoseSample) -> Self {
        Self {
            timestamp_ms,
            sample,
        }
    }
}

/// Neutral standing pose facing the camera: arms down, feet level and
/// hip-width apart, knees straight. Handy for building test frames.
pub fn standing_pose() -> PoseSample {
    use BodyPart::*;
    PoseSample::default()
        .with(Nose, Landmark::at(0.50, 0.15))
        .with(LeftEye, Landmark::at(0.48, 0.13))
        .with(RightEye, Landmark::at(0.52, 0.13))
        .with(LeftShoulder, Landmark::at(0.45, 0.30))
        .with(RightShoulder, Landmark::at(0.55, 0.30))
        .with(LeftElbow, Landmark::at(0.44, 0.42))
        .with(RightElbow, Landmark::at(0.56, 0.42))
        .with(LeftWrist, Landmark::at(0.44, 0.52))
        .with(RightWrist, Landmark::at(0.56, 0.52))
        .with(LeftHip, Landmark::at(0.46, 0.55))
        .with(RightHip, Landmark::at(0.54, 0.55))
        .with(LeftKnee, Landmark::at(0.46, 0.70))
        .with(RightKnee, Landmark::at(0.54, 0.70))
        .with(LeftAnkle, Landmark::at(0.46, 0.85))
        .with(RightAnkle, Landmark::at(0.54, 0.85))
}
