//! Timed-motion measurements: scalar body metrics, wrist speed and ankle
//! excursion over the active part of an attempt.

use serde::{Deserialize, Serialize};

use crate::geometry::planar_distance;
use crate::pose::{BodyPart, Landmark, PoseSample};

/// Scalar read off a sample, used by threshold-crossing transitions.
/// Heights are image y, so a rising body part has a decreasing value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Mean of both ankles.
    AnkleHeight,
    /// The lower of the two ankles; it only rises once both feet leave the
    /// ground.
    LowerAnkleHeight,
    /// The higher of the two ankles; it only drops back once both feet are
    /// down.
    UpperAnkleHeight,
    HipHeight,
    WristHeight,
    /// x of the wrist nearest the left image edge.
    LeadWristX,
}

impl Metric {
    pub fn value(self, s: &PoseSample) -> f32 {
        use BodyPart::*;
        match self {
            Metric::AnkleHeight => (s.get(LeftAnkle).y + s.get(RightAnkle).y) / 2.0,
            Metric::LowerAnkleHeight => s.get(LeftAnkle).y.max(s.get(RightAnkle).y),
            Metric::UpperAnkleHeight => s.get(LeftAnkle).y.min(s.get(RightAnkle).y),
            Metric::HipHeight => (s.get(LeftHip).y + s.get(RightHip).y) / 2.0,
            Metric::WristHeight => (s.get(LeftWrist).y + s.get(RightWrist).y) / 2.0,
            Metric::LeadWristX => s.get(LeftWrist).x.min(s.get(RightWrist).x),
        }
    }

    /// Landmarks the metric reads.
    pub fn parts(self) -> &'static [BodyPart] {
        use BodyPart::*;
        match self {
            Metric::AnkleHeight | Metric::LowerAnkleHeight | Metric::UpperAnkleHeight => {
                &[LeftAnkle, RightAnkle]
            }
            Metric::HipHeight => &[LeftHip, RightHip],
            Metric::WristHeight | Metric::LeadWristX => &[LeftWrist, RightWrist],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MotionSummary {
    /// Baseline ankle height minus the highest point reached (positive = up).
    pub jump_height: f32,
    /// Fastest wrist movement between consecutive samples, normalized units/s.
    pub peak_wrist_speed: f32,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy)]
struct WristFix {
    left: Landmark,
    right: Landmark,
    at_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct MotionTracker {
    started_at_ms: Option<u64>,
    last_ms: u64,
    baseline_ankle: f32,
    highest_ankle: f32,
    last_wrists: Option<WristFix>,
    peak_wrist_speed: f32,
}

impl MotionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.started_at_ms.is_some()
    }

    /// Starts tracking with `s` as the baseline frame.
    pub fn begin(&mut self, s: &PoseSample, now_ms: u64) {
        let ankle = Metric::AnkleHeight.value(s);
        *self = Self {
            started_at_ms: Some(now_ms),
            last_ms: now_ms,
            baseline_ankle: ankle,
            highest_ankle: ankle,
            last_wrists: Some(Self::wrists(s, now_ms)),
            peak_wrist_speed: 0.0,
        };
    }

    pub fn update(&mut self, s: &PoseSample, now_ms: u64) {
        if !self.is_active() {
            return;
        }
        self.highest_ankle = self.highest_ankle.min(Metric::AnkleHeight.value(s));

        let fix = Self::wrists(s, now_ms);
        if let Some(prev) = self.last_wrists {
            let dt_ms = now_ms.saturating_sub(prev.at_ms);
            // Same-timestamp frames carry no speed information.
            if dt_ms > 0 {
                let secs = dt_ms as f32 / 1000.0;
                let left = planar_distance(&prev.left, &fix.left) / secs;
                let right = planar_distance(&prev.right, &fix.right) / secs;
                self.peak_wrist_speed = self.peak_wrist_speed.max(left).max(right);
            }
        }
        self.last_wrists = Some(fix);
        self.last_ms = self.last_ms.max(now_ms);
    }

    pub fn summary(&self) -> Option<MotionSummary> {
        let started = self.started_at_ms?;
        Some(MotionSummary {
            jump_height: self.baseline_ankle - self.highest_ankle,
            peak_wrist_speed: self.peak_wrist_speed,
            duration_ms: self.last_ms.saturating_sub(started),
        })
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn wrists(s: &PoseSample, at_ms: u64) -> WristFix {
        WristFix {
            left: *s.get(BodyPart::LeftWrist),
            right: *s.get(BodyPart::RightWrist),
            at_ms,
        }
    }
}
