//! Named pose conditions built from geometry.
//!
//! Every check is a pure function of one sample and the exercise thresholds;
//! frame-to-frame memory lives in the phase machine and the trackers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{self, depth_gap, horizontal_gap, midpoint, try_angle};
use crate::pose::{BodyPart, PoseSample, Side};
use crate::scale::StepScale;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Minimum ankle height difference for "one foot raised".
    pub foot_raise: f32,
    /// An arm counts as raised when its graded score exceeds this.
    pub arm_raise_min_score: f32,
    /// `shoulder.y - wrist.y` to height sub-score.
    pub arm_height_tiers: StepScale,
    /// Elbow angle (degrees) to extension sub-score.
    pub arm_extension_tiers: StepScale,
    /// Knee angle below which a knee counts as bent.
    pub knee_bend_deg: f32,
    /// Knee angle above which a leg counts as straight.
    pub leg_straight_deg: f32,
    pub feet_apart_min: f32,
    pub feet_apart_max: f32,
    /// Shoulder and hip depth separation for a side-on stance.
    pub side_on_depth: f32,
    pub head_forward_tol: f32,
    pub look_ahead_depth: f32,
    pub trunk_tol: f32,
    /// Landmarks less visible than this are not trusted.
    pub min_visibility: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            foot_raise: 0.1,
            arm_raise_min_score: 0.0,
            arm_height_tiers: StepScale::at_least(&[(0.0, 10.0), (-0.1, 8.0), (-0.2, 6.0)], 4.0),
            arm_extension_tiers: StepScale::at_least(
                &[(170.0, 10.0), (150.0, 8.0), (120.0, 6.0)],
                4.0,
            ),
            knee_bend_deg: 150.0,
            leg_straight_deg: 160.0,
            feet_apart_min: 0.1,
            feet_apart_max: 0.3,
            side_on_depth: 0.1,
            head_forward_tol: 0.1,
            look_ahead_depth: 0.1,
            trunk_tol: 0.05,
            min_visibility: 0.5,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<(), String> {
        let unit = [
            ("foot_raise", self.foot_raise),
            ("feet_apart_min", self.feet_apart_min),
            ("feet_apart_max", self.feet_apart_max),
            ("side_on_depth", self.side_on_depth),
            ("head_forward_tol", self.head_forward_tol),
            ("look_ahead_depth", self.look_ahead_depth),
            ("trunk_tol", self.trunk_tol),
        ];
        for (name, v) in unit {
            if !(v > 0.0 && v < 1.0) {
                return Err(format!("thresholds.{name} must be in (0,1) normalized units, got {v}"));
            }
        }
        if !(0.0..=1.0).contains(&self.min_visibility) {
            return Err(format!(
                "thresholds.min_visibility must be in [0,1], got {}",
                self.min_visibility
            ));
        }
        // The graded raise tops out at 10, so a floor of 10 rejects every arm.
        if !(0.0..10.0).contains(&self.arm_raise_min_score) {
            return Err(format!(
                "thresholds.arm_raise_min_score must be in [0,10), got {}",
                self.arm_raise_min_score
            ));
        }
        for (name, v) in [
            ("knee_bend_deg", self.knee_bend_deg),
            ("leg_straight_deg", self.leg_straight_deg),
        ] {
            if !(v > 0.0 && v <= 180.0) {
                return Err(format!("thresholds.{name} must be in (0,180], got {v}"));
            }
        }
        if self.feet_apart_min >= self.feet_apart_max {
            return Err("thresholds.feet_apart_min must be below feet_apart_max".into());
        }
        self.arm_height_tiers
            .validate()
            .map_err(|e| format!("thresholds.arm_height_tiers: {e}"))?;
        self.arm_extension_tiers
            .validate()
            .map_err(|e| format!("thresholds.arm_extension_tiers: {e}"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    OneFootRaised,
    AnyArmRaised,
    BothArmsRaised,
    KneesBent,
    LegsStraight,
    FeetApart,
    SideOnStance,
    HeadForward,
    LookAhead,
    TrunkStable,
    ArmBehindHead,
    ArmExtended,
    WristsPastNose,
}

impl ConditionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConditionKind::OneFootRaised => "one_foot_raised",
            ConditionKind::AnyArmRaised => "any_arm_raised",
            ConditionKind::BothArmsRaised => "both_arms_raised",
            ConditionKind::KneesBent => "knees_bent",
            ConditionKind::LegsStraight => "legs_straight",
            ConditionKind::FeetApart => "feet_apart",
            ConditionKind::SideOnStance => "side_on_stance",
            ConditionKind::HeadForward => "head_forward",
            ConditionKind::LookAhead => "look_ahead",
            ConditionKind::TrunkStable => "trunk_stable",
            ConditionKind::ArmBehindHead => "arm_behind_head",
            ConditionKind::ArmExtended => "arm_extended",
            ConditionKind::WristsPastNose => "wrists_past_nose",
        }
    }

    /// Corrective instruction shown while the condition is not met.
    pub fn hint(self) -> &'static str {
        match self {
            ConditionKind::OneFootRaised => "Raise one foot higher.",
            ConditionKind::AnyArmRaised => "Raise at least one arm.",
            ConditionKind::BothArmsRaised => "Raise both arms above your shoulders.",
            ConditionKind::KneesBent => "Bend your knees slightly.",
            ConditionKind::LegsStraight => "Straighten your legs more.",
            ConditionKind::FeetApart => "Stand with your feet slightly apart.",
            ConditionKind::SideOnStance => "Turn sideways to the camera.",
            ConditionKind::HeadForward => "Look straight ahead.",
            ConditionKind::LookAhead => "Keep looking ahead, eyes on something in front of you.",
            ConditionKind::TrunkStable => "Keep your trunk steady.",
            ConditionKind::ArmBehindHead => "Place one hand behind your head.",
            ConditionKind::ArmExtended => "Extend your arm from behind your head.",
            ConditionKind::WristsPastNose => "Throw! Bring your arm forward past your head.",
        }
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single condition check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Met,
    Unmet,
    /// A landmark the check depends on is below the visibility threshold.
    Hidden,
}

impl Verdict {
    pub fn is_met(self) -> bool {
        self == Verdict::Met
    }

    fn from_bool(b: bool) -> Self {
        if b { Verdict::Met } else { Verdict::Unmet }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmStatus {
    Raised,
    Lowered,
}

/// Graded arm raise for one side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArmRaise {
    pub status: ArmStatus,
    /// Mean of the height and extension sub-scores, 0..=10.
    pub score: f32,
    pub height_score: f32,
    pub extension_score: f32,
}

#[derive(Debug, Clone)]
pub struct ConditionEvaluator {
    th: Thresholds,
}

impl ConditionEvaluator {
    pub fn new(th: Thresholds) -> Self {
        Self { th }
    }

    pub fn check(&self, kind: ConditionKind, s: &PoseSample) -> Verdict {
        use BodyPart::*;
        match kind {
            ConditionKind::OneFootRaised => self.gated(s, &[LeftAnkle, RightAnkle], || {
                geometry::vertical_gap(s.get(LeftAnkle), s.get(RightAnkle)).abs() > self.th.foot_raise
            }),
            ConditionKind::AnyArmRaised => self.either_side(
                s,
                |side| [side.shoulder(), side.elbow(), side.wrist()],
                |side| self.arm_raise(side, s).status == ArmStatus::Raised,
            ),
            ConditionKind::BothArmsRaised => self.gated(
                s,
                &[LeftShoulder, RightShoulder, LeftWrist, RightWrist],
                || {
                    s.get(LeftWrist).y < s.get(LeftShoulder).y
                        && s.get(RightWrist).y < s.get(RightShoulder).y
                },
            ),
            ConditionKind::KneesBent => self.gated(s, &LEGS, || {
                [Side::Left, Side::Right]
                    .iter()
                    .all(|&side| self.knee_angle(side, s).is_some_and(|a| a < self.th.knee_bend_deg))
            }),
            ConditionKind::LegsStraight => self.gated(s, &LEGS, || {
                [Side::Left, Side::Right].iter().all(|&side| {
                    self.knee_angle(side, s)
                        .is_some_and(|a| a > self.th.leg_straight_deg)
                })
            }),
            ConditionKind::FeetApart => self.gated(s, &[LeftAnkle, RightAnkle], || {
                let d = horizontal_gap(s.get(LeftAnkle), s.get(RightAnkle));
                d > self.th.feet_apart_min && d < self.th.feet_apart_max
            }),
            ConditionKind::SideOnStance => {
                self.gated(s, &[LeftShoulder, RightShoulder, LeftHip, RightHip], || {
                    depth_gap(s.get(LeftShoulder), s.get(RightShoulder)) > self.th.side_on_depth
                        && depth_gap(s.get(LeftHip), s.get(RightHip)) > self.th.side_on_depth
                })
            }
            ConditionKind::HeadForward => self.gated(s, &[Nose, LeftShoulder, RightShoulder], || {
                let mid = midpoint(s.get(LeftShoulder), s.get(RightShoulder));
                horizontal_gap(s.get(Nose), &mid) < self.th.head_forward_tol
            }),
            ConditionKind::LookAhead => self.gated(s, &[Nose, LeftEye, RightEye], || {
                depth_gap(s.get(Nose), s.get(LeftEye)) < self.th.look_ahead_depth
                    && depth_gap(s.get(Nose), s.get(RightEye)) < self.th.look_ahead_depth
            }),
            ConditionKind::TrunkStable => {
                self.gated(s, &[LeftShoulder, RightShoulder, LeftHip, RightHip], || {
                    let shoulders = midpoint(s.get(LeftShoulder), s.get(RightShoulder));
                    let hips = midpoint(s.get(LeftHip), s.get(RightHip));
                    horizontal_gap(&shoulders, &hips) < self.th.trunk_tol
                })
            }
            ConditionKind::ArmBehindHead => {
                if !self.is_visible(s, &[Nose]) {
                    return Verdict::Hidden;
                }
                let nose = s.get(Nose);
                self.either_side(
                    s,
                    |side| [side.wrist()],
                    |side| {
                        let w = s.get(side.wrist());
                        w.x < nose.x && w.y < nose.y
                    },
                )
            }
            ConditionKind::ArmExtended => {
                if !self.is_visible(s, &[Nose]) {
                    return Verdict::Hidden;
                }
                let nose = s.get(Nose);
                self.either_side(
                    s,
                    |side| [side.elbow(), side.wrist()],
                    |side| {
                        let w = s.get(side.wrist());
                        let e = s.get(side.elbow());
                        let outward = match side {
                            Side::Left => w.x < nose.x && e.x > w.x,
                            Side::Right => w.x > nose.x && e.x < w.x,
                        };
                        outward && w.y < nose.y && e.y > w.y
                    },
                )
            }
            ConditionKind::WristsPastNose => self.gated(s, &[Nose, LeftWrist, RightWrist], || {
                let nose = s.get(Nose);
                s.get(LeftWrist).x > nose.x && s.get(RightWrist).x > nose.x
            }),
        }
    }

    /// Graded raise for one arm. Not visibility gated; callers decide.
    pub fn arm_raise(&self, side: Side, s: &PoseSample) -> ArmRaise {
        let shoulder = s.get(side.shoulder());
        let elbow = s.get(side.elbow());
        let wrist = s.get(side.wrist());

        let height_score = self.th.arm_height_tiers.score(shoulder.y - wrist.y);
        // A collapsed elbow gives no extension reading; grade it as the weakest tier.
        let extension_score = try_angle(shoulder, elbow, wrist)
            .map_or(self.th.arm_extension_tiers.otherwise, |a| {
                self.th.arm_extension_tiers.score(a)
            });
        let score = (height_score + extension_score) / 2.0;
        let status = if score > self.th.arm_raise_min_score {
            ArmStatus::Raised
        } else {
            ArmStatus::Lowered
        };
        ArmRaise {
            status,
            score,
            height_score,
            extension_score,
        }
    }

    /// The better of the two arms.
    pub fn best_arm_raise(&self, s: &PoseSample) -> ArmRaise {
        let left = self.arm_raise(Side::Left, s);
        let right = self.arm_raise(Side::Right, s);
        if right.score > left.score { right } else { left }
    }

    fn knee_angle(&self, side: Side, s: &PoseSample) -> Option<f32> {
        try_angle(s.get(side.hip()), s.get(side.knee()), s.get(side.ankle()))
    }

    /// Every part in `parts` is at or above `min_visibility`.
    pub fn is_visible(&self, s: &PoseSample, parts: &[BodyPart]) -> bool {
        parts
            .iter()
            .all(|&p| s.get(p).visibility >= self.th.min_visibility)
    }

    fn gated(&self, s: &PoseSample, parts: &[BodyPart], check: impl FnOnce() -> bool) -> Verdict {
        if !self.is_visible(s, parts) {
            return Verdict::Hidden;
        }
        Verdict::from_bool(check())
    }

    /// Met if either visible side passes; hidden only when no side is visible.
    fn either_side<const N: usize>(
        &self,
        s: &PoseSample,
        parts: impl Fn(Side) -> [BodyPart; N],
        check: impl Fn(Side) -> bool,
    ) -> Verdict {
        let mut any_visible = false;
        for side in [Side::Left, Side::Right] {
            if !self.is_visible(s, &parts(side)) {
                continue;
            }
            any_visible = true;
            if check(side) {
                return Verdict::Met;
            }
        }
        if any_visible {
            Verdict::Unmet
        } else {
            Verdict::Hidden
        }
    }
}

const LEGS: [BodyPart; 6] = [
    BodyPart::LeftHip,
    BodyPart::RightHip,
    BodyPart::LeftKnee,
    BodyPart::RightKnee,
    BodyPart::LeftAnkle,
    BodyPart::RightAnkle,
];
