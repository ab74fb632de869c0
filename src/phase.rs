//! Ordered exercise phases with time-gated and threshold-gated transitions.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::conditions::{ConditionEvaluator, ConditionKind, Verdict};
use crate::error::{Error, Result};
use crate::motion::Metric;
use crate::pose::PoseSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Metric must drop below `baseline - delta` (image y: moving up).
    Decrease,
    /// Metric must exceed `baseline + delta` (image y: moving down).
    Increase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutAction {
    /// Treat the timeout as a completed transition.
    Advance,
    /// Abandon the attempt and start over from the first phase.
    #[default]
    Reset,
}

/// What must happen for the machine to leave a phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Guard {
    /// Every condition holds continuously for `dwell_ms`. Zero dwell is a
    /// single-frame edge.
    #[serde(rename = "held")]
    HeldForDuration {
        conditions: Vec<ConditionKind>,
        #[serde(default)]
        dwell_ms: u64,
    },
    /// `metric` moves past its baseline by `delta` in `direction`. The
    /// baseline is read from the sample that entered `baseline` (a phase
    /// name; defaults to the current phase).
    #[serde(rename = "crossed")]
    CrossedThreshold {
        metric: Metric,
        direction: Direction,
        delta: f32,
        #[serde(default)]
        baseline: Option<String>,
        #[serde(default)]
        timeout_ms: Option<u64>,
        #[serde(default)]
        on_timeout: TimeoutAction,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSpec {
    pub name: String,
    /// Instruction shown while the phase waits for its guard.
    #[serde(default)]
    pub prompt: String,
    /// Shown while a dwell is running; `{secs}` becomes the seconds left.
    #[serde(default = "default_hold_prompt")]
    pub hold_prompt: String,
    /// Absent on the terminal phase only.
    #[serde(default)]
    pub guard: Option<Guard>,
    #[serde(default)]
    pub track_stability: bool,
    #[serde(default)]
    pub track_motion: bool,
}

fn default_hold_prompt() -> String {
    "Hold steady for {secs} more seconds!".to_string()
}

impl PhaseSpec {
    pub fn hold_text(&self, remaining_ms: u64) -> String {
        let secs = remaining_ms.div_ceil(1000);
        self.hold_prompt.replace("{secs}", &secs.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhaseState {
    pub current: usize,
    /// Timestamp of the frame that entered `current`; `None` before the
    /// first frame of an attempt.
    pub entered_at_ms: Option<u64>,
    /// Start of the running dwell clock. Only set while a held guard is
    /// satisfied; never set in the terminal phase.
    pub dwell_started_at: Option<u64>,
}

/// Result of feeding one sample to the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// A guard condition failed; any dwell clock was cleared.
    Unmet {
        condition: ConditionKind,
        verdict: Verdict,
        broke_hold: bool,
    },
    /// All guard conditions hold and the dwell clock is running.
    Holding { just_started: bool, remaining_ms: u64 },
    /// Waiting for a metric to cross its target.
    Watching { value: f32, target: f32 },
    /// A landmark the crossing metric reads is below the visibility
    /// threshold; the sample cannot cross.
    Hidden,
    Advanced {
        from: usize,
        to: usize,
        /// The dwell clock started on this same frame (zero-dwell edge).
        just_started: bool,
    },
    TimedOut { from: usize, to: usize },
    /// Terminal phase reached; nothing more to do until a reset.
    Finished,
}

#[derive(Debug, Clone)]
pub struct PhaseMachine {
    phases: Vec<PhaseSpec>,
    baselines: Vec<Option<usize>>,
    state: PhaseState,
    entry_samples: Vec<Option<PoseSample>>,
}

impl PhaseMachine {
    pub fn new(phases: Vec<PhaseSpec>) -> Result<Self> {
        validate_phases(&phases).map_err(Error::Config)?;
        let baselines = phases
            .iter()
            .enumerate()
            .map(|(i, p)| match &p.guard {
                Some(Guard::CrossedThreshold { baseline, .. }) => Some(
                    baseline
                        .as_deref()
                        .and_then(|name| phases.iter().position(|q| q.name == name))
                        .unwrap_or(i),
                ),
                _ => None,
            })
            .collect();
        let n = phases.len();
        Ok(Self {
            phases,
            baselines,
            state: PhaseState::default(),
            entry_samples: vec![None; n],
        })
    }

    pub fn phases(&self) -> &[PhaseSpec] {
        &self.phases
    }

    pub fn state(&self) -> &PhaseState {
        &self.state
    }

    pub fn current(&self) -> &PhaseSpec {
        &self.phases[self.state.current]
    }

    pub fn is_finished(&self) -> bool {
        self.state.current + 1 == self.phases.len()
    }

    pub fn reset(&mut self) {
        self.state = PhaseState::default();
        self.entry_samples.iter_mut().for_each(|s| *s = None);
    }

    pub fn step(&mut self, s: &PoseSample, now_ms: u64, eval: &ConditionEvaluator) -> Step {
        if self.is_finished() {
            return Step::Finished;
        }
        if self.state.entered_at_ms.is_none() {
            self.enter(self.state.current, s, now_ms);
        }

        let cur = self.state.current;
        let Some(guard) = self.phases[cur].guard.clone() else {
            return Step::Finished;
        };

        match guard {
            Guard::HeldForDuration {
                conditions,
                dwell_ms,
            } => {
                for condition in conditions {
                    let verdict = eval.check(condition, s);
                    if !verdict.is_met() {
                        let broke_hold = self.state.dwell_started_at.take().is_some();
                        if broke_hold {
                            debug!("phase '{}': hold broken by {condition}", self.phases[cur].name);
                        }
                        return Step::Unmet {
                            condition,
                            verdict,
                            broke_hold,
                        };
                    }
                }

                let just_started = self.state.dwell_started_at.is_none();
                let started = *self.state.dwell_started_at.get_or_insert(now_ms);
                let elapsed = now_ms.saturating_sub(started);
                if elapsed >= dwell_ms {
                    let to = self.advance(s, now_ms);
                    Step::Advanced {
                        from: cur,
                        to,
                        just_started,
                    }
                } else {
                    Step::Holding {
                        just_started,
                        remaining_ms: dwell_ms - elapsed,
                    }
                }
            }
            Guard::CrossedThreshold {
                metric,
                direction,
                delta,
                timeout_ms,
                on_timeout,
                ..
            } => {
                let baseline_idx = self.baselines[cur].unwrap_or(cur);
                let baseline = self.entry_samples[baseline_idx]
                    .as_ref()
                    .map_or_else(|| metric.value(s), |b| metric.value(b));
                let visible = eval.is_visible(s, metric.parts());
                let value = metric.value(s);
                let (crossed, target) = match direction {
                    Direction::Decrease => (value < baseline - delta, baseline - delta),
                    Direction::Increase => (value > baseline + delta, baseline + delta),
                };
                if visible && crossed {
                    let to = self.advance(s, now_ms);
                    return Step::Advanced {
                        from: cur,
                        to,
                        just_started: false,
                    };
                }

                // The timeout keeps running while the metric is hidden.
                let entered = self.state.entered_at_ms.unwrap_or(now_ms);
                if let Some(limit) = timeout_ms {
                    if now_ms.saturating_sub(entered) >= limit {
                        debug!(
                            "phase '{}': timed out after {limit}ms ({on_timeout:?})",
                            self.phases[cur].name
                        );
                        let to = match on_timeout {
                            TimeoutAction::Advance => self.advance(s, now_ms),
                            TimeoutAction::Reset => {
                                self.reset();
                                0
                            }
                        };
                        return Step::TimedOut { from: cur, to };
                    }
                }
                if !visible {
                    return Step::Hidden;
                }
                Step::Watching { value, target }
            }
        }
    }

    fn enter(&mut self, idx: usize, s: &PoseSample, now_ms: u64) {
        self.state.current = idx;
        self.state.entered_at_ms = Some(now_ms);
        self.state.dwell_started_at = None;
        self.entry_samples[idx] = Some(s.clone());
    }

    fn advance(&mut self, s: &PoseSample, now_ms: u64) -> usize {
        let from = self.state.current;
        let to = from + 1;
        debug!(
            "phase '{}' -> '{}' at {now_ms}ms",
            self.phases[from].name, self.phases[to].name
        );
        self.enter(to, s, now_ms);
        to
    }
}

/// Structural checks on a phase list.
pub fn validate_phases(phases: &[PhaseSpec]) -> std::result::Result<(), String> {
    if phases.len() < 2 {
        return Err("an exercise needs at least two phases".into());
    }
    for (i, p) in phases.iter().enumerate() {
        if p.name.trim().is_empty() {
            return Err(format!("phase #{i} has an empty name"));
        }
        if phases[..i].iter().any(|q| q.name == p.name) {
            return Err(format!("duplicate phase name '{}'", p.name));
        }
        let terminal = i + 1 == phases.len();
        match (&p.guard, terminal) {
            (Some(_), true) => {
                return Err(format!("terminal phase '{}' must not have a guard", p.name));
            }
            (None, false) => return Err(format!("phase '{}' has no guard", p.name)),
            _ => {}
        }
        match &p.guard {
            Some(Guard::HeldForDuration { conditions, .. }) if conditions.is_empty() => {
                return Err(format!("phase '{}' holds on no conditions", p.name));
            }
            Some(Guard::CrossedThreshold {
                delta, baseline, ..
            }) => {
                if !(delta.is_finite() && *delta >= 0.0) {
                    return Err(format!("phase '{}': delta must be >= 0", p.name));
                }
                if let Some(b) = baseline {
                    match phases.iter().position(|q| &q.name == b) {
                        Some(j) if j <= i => {}
                        Some(_) => {
                            return Err(format!(
                                "phase '{}': baseline phase '{b}' comes later",
                                p.name
                            ));
                        }
                        None => {
                            return Err(format!(
                                "phase '{}': unknown baseline phase '{b}'",
                                p.name
                            ));
                        }
                    }
                }
            }
            _ => {}
        }
        if terminal && (p.track_stability || p.track_motion) {
            return Err(format!("terminal phase '{}' cannot track anything", p.name));
        }
    }
    Ok(())
}
