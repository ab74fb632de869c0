//! Body sway during a hold, measured against a reference pose.

use crate::geometry::planar_distance;
use crate::pose::{BodyPart, Landmark, PoseSample};

/// Points whose drift defines trunk stability.
pub const TRACKED_POINTS: [BodyPart; 5] = [
    BodyPart::Nose,
    BodyPart::LeftShoulder,
    BodyPart::RightShoulder,
    BodyPart::LeftHip,
    BodyPart::RightHip,
];

/// Snapshot of the tracked points taken when a hold begins.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencePose {
    points: [Landmark; TRACKED_POINTS.len()],
}

impl ReferencePose {
    pub fn capture(s: &PoseSample) -> Self {
        Self {
            points: TRACKED_POINTS.map(|p| *s.get(p)),
        }
    }

    /// Largest planar drift of any tracked point in `s`.
    pub fn displacement(&self, s: &PoseSample) -> f32 {
        TRACKED_POINTS
            .iter()
            .zip(self.points.iter())
            .map(|(&part, reference)| planar_distance(reference, s.get(part)))
            .fold(0.0, f32::max)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StabilityAccumulator {
    reference: Option<ReferencePose>,
    max_displacement: f32,
    frames: u32,
}

impl StabilityAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a hold: new reference, displacement back to zero.
    pub fn capture(&mut self, s: &PoseSample) {
        self.reference = Some(ReferencePose::capture(s));
        self.max_displacement = 0.0;
        self.frames = 1;
    }

    /// Folds one held frame into the running maximum. No-op outside a hold.
    pub fn update(&mut self, s: &PoseSample) -> f32 {
        if let Some(reference) = &self.reference {
            self.max_displacement = self.max_displacement.max(reference.displacement(s));
            self.frames += 1;
        }
        self.max_displacement
    }

    /// The hold broke; forget the reference.
    pub fn discard(&mut self) {
        self.reference = None;
        self.max_displacement = 0.0;
        self.frames = 0;
    }

    /// The hold completed; returns its maximum displacement.
    pub fn finish(&mut self) -> Option<f32> {
        let out = self.reference.take().map(|_| self.max_displacement);
        self.frames = 0;
        out
    }

    pub fn is_holding(&self) -> bool {
        self.reference.is_some()
    }

    pub fn max_displacement(&self) -> f32 {
        self.max_displacement
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }
}
