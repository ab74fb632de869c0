//! Final score for a completed attempt.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::conditions::ConditionEvaluator;
use crate::error::{Error, Result};
use crate::geometry::horizontal_gap;
use crate::motion::MotionSummary;
use crate::pose::{BodyPart, PoseSample};
use crate::scale::{LinearScale, StepScale};

/// Feedback text for scores at or above `min`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackBand {
    pub min: f32,
    pub text: String,
}

/// Where a component's raw value comes from and how it is scaled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComponentSource {
    /// Better arm's graded raise at completion, times `multiplier`.
    ArmRaise {
        #[serde(default = "default_multiplier")]
        multiplier: f32,
    },
    /// Maximum displacement over the completed hold.
    Stability { scale: StepScale },
    /// Ankle excursion over the tracked motion.
    JumpHeight { scale: LinearScale },
    /// Ankle x separation at completion.
    FootSpread { scale: LinearScale },
    /// Peak wrist speed over the tracked motion.
    WristSpeed { scale: StepScale },
}

fn default_multiplier() -> f32 {
    10.0
}

impl ComponentSource {
    pub fn needs_stability(&self) -> bool {
        matches!(self, ComponentSource::Stability { .. })
    }

    pub fn needs_motion(&self) -> bool {
        matches!(
            self,
            ComponentSource::JumpHeight { .. } | ComponentSource::WristSpeed { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub name: String,
    pub source: ComponentSource,
    /// Ordered from best to worst; the last band catches everything.
    pub feedback: Vec<FeedbackBand>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringSpec {
    pub components: Vec<ComponentSpec>,
    /// Optional feedback on the total score.
    #[serde(default)]
    pub summary: Vec<FeedbackBand>,
}

/// Everything an attempt gathered by the time it completed.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs<'a> {
    pub final_sample: &'a PoseSample,
    pub max_displacement: Option<f32>,
    pub motion: Option<MotionSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    pub component_scores: BTreeMap<String, f32>,
    pub total_score: f32,
    pub feedback: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_displacement: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct ScoringEngine {
    spec: ScoringSpec,
}

impl ScoringEngine {
    pub fn new(spec: ScoringSpec) -> Result<Self> {
        validate_scoring(&spec).map_err(Error::Config)?;
        Ok(Self { spec })
    }

    pub fn score(&self, inputs: &ScoreInputs<'_>, eval: &ConditionEvaluator) -> Result<ScoreResult> {
        let mut component_scores = BTreeMap::new();
        let mut feedback = BTreeMap::new();
        let mut sum = 0.0;

        for c in &self.spec.components {
            let score = component_score(c, inputs, eval)?;
            sum += score;
            component_scores.insert(c.name.clone(), score);
            if let Some(text) = pick_band(&c.feedback, score) {
                feedback.insert(c.name.clone(), text.to_string());
            }
        }

        let total_score = sum / self.spec.components.len() as f32;
        Ok(ScoreResult {
            component_scores,
            total_score,
            feedback,
            summary: pick_band(&self.spec.summary, total_score).map(str::to_string),
            max_displacement: inputs.max_displacement,
        })
    }
}

fn component_score(c: &ComponentSpec, inputs: &ScoreInputs<'_>, eval: &ConditionEvaluator) -> Result<f32> {
    let missing = |input: &'static str| Error::MissingScoreInput {
        component: c.name.clone(),
        input,
    };
    let score = match &c.source {
        ComponentSource::ArmRaise { multiplier } => {
            eval.best_arm_raise(inputs.final_sample).score * multiplier
        }
        ComponentSource::Stability { scale } => {
            let d = inputs
                .max_displacement
                .ok_or_else(|| missing("completed hold"))?;
            scale.score(d)
        }
        ComponentSource::JumpHeight { scale } => {
            let m = inputs.motion.ok_or_else(|| missing("tracked motion"))?;
            scale.score(m.jump_height)
        }
        ComponentSource::FootSpread { scale } => {
            let s = inputs.final_sample;
            scale.score(horizontal_gap(
                s.get(BodyPart::LeftAnkle),
                s.get(BodyPart::RightAnkle),
            ))
        }
        ComponentSource::WristSpeed { scale } => {
            let m = inputs.motion.ok_or_else(|| missing("tracked motion"))?;
            scale.score(m.peak_wrist_speed)
        }
    };
    Ok(score)
}

/// First band whose floor the score reaches; the last band otherwise.
fn pick_band(bands: &[FeedbackBand], score: f32) -> Option<&str> {
    bands
        .iter()
        .find(|b| score >= b.min)
        .or(bands.last())
        .map(|b| b.text.as_str())
}

fn validate_bands(what: &str, bands: &[FeedbackBand]) -> std::result::Result<(), String> {
    for w in bands.windows(2) {
        if w[1].min >= w[0].min {
            return Err(format!(
                "{what}: feedback floors must be strictly descending ({} then {})",
                w[0].min, w[1].min
            ));
        }
    }
    if let Some(last) = bands.last() {
        if last.min > 0.0 {
            return Err(format!(
                "{what}: last feedback band must catch every score (min <= 0, got {})",
                last.min
            ));
        }
    }
    if bands.iter().any(|b| b.text.trim().is_empty()) {
        return Err(format!("{what}: empty feedback text"));
    }
    Ok(())
}

pub fn validate_scoring(spec: &ScoringSpec) -> std::result::Result<(), String> {
    if spec.components.is_empty() {
        return Err("scoring needs at least one component".into());
    }
    for (i, c) in spec.components.iter().enumerate() {
        if c.name.trim().is_empty() {
            return Err(format!("scoring component #{i} has an empty name"));
        }
        if spec.components[..i].iter().any(|d| d.name == c.name) {
            return Err(format!("duplicate scoring component '{}'", c.name));
        }
        if c.feedback.is_empty() {
            return Err(format!("component '{}' has no feedback bands", c.name));
        }
        validate_bands(&format!("component '{}'", c.name), &c.feedback)?;
        let scale_check = match &c.source {
            ComponentSource::ArmRaise { multiplier } if *multiplier <= 0.0 => {
                Err("multiplier must be positive".to_string())
            }
            ComponentSource::ArmRaise { .. } => Ok(()),
            ComponentSource::Stability { scale } | ComponentSource::WristSpeed { scale } => {
                scale.validate()
            }
            ComponentSource::JumpHeight { scale } | ComponentSource::FootSpread { scale } => {
                scale.validate()
            }
        };
        scale_check.map_err(|e| format!("component '{}': {e}", c.name))?;
    }
    validate_bands("summary", &spec.summary)
}
