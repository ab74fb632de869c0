//! One coaching attempt: feeds frames through the phase machine, keeps the
//! stability and motion trackers in step with it and scores the attempt when
//! the terminal phase is reached.

use log::{debug, info};
use serde::Serialize;

use crate::conditions::{ConditionEvaluator, Verdict};
use crate::config::{Profile, validate_profile};
use crate::error::Result;
use crate::motion::MotionTracker;
use crate::phase::{PhaseMachine, PhaseState, Step};
use crate::pose::{PoseFrame, PoseSample};
use crate::scoring::{ScoreInputs, ScoreResult, ScoringEngine};
use crate::stability::StabilityAccumulator;

pub const NOT_VISIBLE_PROMPT: &str = "Make sure your whole body is visible to the camera.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition {
    pub from: String,
    pub to: String,
    /// The phase gave up waiting rather than seeing its guard pass.
    pub timed_out: bool,
}

/// What a driver needs to show after one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameOutcome {
    pub timestamp_ms: u64,
    pub phase: String,
    pub instruction: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<Transition>,
    /// Present only on the frame that completed the attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ScoreResult>,
}

#[derive(Debug, Clone)]
pub struct Session {
    profile: Profile,
    eval: ConditionEvaluator,
    machine: PhaseMachine,
    scoring: ScoringEngine,
    stability: StabilityAccumulator,
    motion: MotionTracker,
    hold_displacement: Option<f32>,
    result: Option<ScoreResult>,
    last_ts: Option<u64>,
}

impl Session {
    pub fn new(profile: Profile) -> Result<Self> {
        validate_profile(&profile)?;
        let eval = ConditionEvaluator::new(profile.thresholds.clone());
        let machine = PhaseMachine::new(profile.phases.clone())?;
        let scoring = ScoringEngine::new(profile.scoring.clone())?;
        Ok(Self {
            profile,
            eval,
            machine,
            scoring,
            stability: StabilityAccumulator::new(),
            motion: MotionTracker::new(),
            hold_displacement: None,
            result: None,
            last_ts: None,
        })
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn phase(&self) -> &str {
        &self.machine.current().name
    }

    pub fn state(&self) -> &PhaseState {
        self.machine.state()
    }

    pub fn is_finished(&self) -> bool {
        self.machine.is_finished()
    }

    /// Score of the completed attempt, if any.
    pub fn result(&self) -> Option<&ScoreResult> {
        self.result.as_ref()
    }

    /// Abandons the attempt and starts over from the first phase.
    pub fn reset(&mut self) {
        self.machine.reset();
        self.stability.discard();
        self.motion.reset();
        self.hold_displacement = None;
        self.result = None;
        self.last_ts = None;
    }

    /// Swaps in a new profile. The current attempt is dropped.
    pub fn reconfigure(&mut self, profile: Profile) -> Result<()> {
        *self = Session::new(profile)?;
        info!("session reconfigured for '{}'", self.profile.meta.name);
        Ok(())
    }

    pub fn process_frame(&mut self, frame: &PoseFrame) -> Result<FrameOutcome> {
        // A frame stamped before its predecessor counts as no elapsed time.
        let now = self
            .last_ts
            .map_or(frame.timestamp_ms, |last| last.max(frame.timestamp_ms));
        self.last_ts = Some(now);
        let sample = &frame.sample;

        if self.machine.is_finished() {
            return Ok(self.outcome(now, self.machine.current().prompt.clone(), None));
        }

        let cur = self.machine.state().current;
        let step = self.machine.step(sample, now, &self.eval);
        let phases = self.machine.phases();

        let mut remaining_secs = None;
        let mut transition = None;
        let instruction = match step {
            Step::Unmet {
                condition,
                verdict,
                broke_hold,
            } => {
                if broke_hold && self.stability.is_holding() {
                    debug!(
                        "hold in '{}' broken after {} frames, max displacement {:.4}",
                        phases[cur].name,
                        self.stability.frames(),
                        self.stability.max_displacement()
                    );
                    self.stability.discard();
                }
                if verdict == Verdict::Hidden {
                    NOT_VISIBLE_PROMPT.to_string()
                } else {
                    condition.hint().to_string()
                }
            }
            Step::Holding {
                just_started,
                remaining_ms,
            } => {
                if phases[cur].track_stability {
                    if just_started {
                        self.stability.capture(sample);
                    } else {
                        self.stability.update(sample);
                    }
                }
                remaining_secs = Some(remaining_ms.div_ceil(1000));
                phases[cur].hold_text(remaining_ms)
            }
            Step::Watching { .. } => phases[cur].prompt.clone(),
            Step::Hidden => NOT_VISIBLE_PROMPT.to_string(),
            Step::Advanced {
                from,
                to,
                just_started,
            } => {
                if phases[from].track_stability {
                    if just_started {
                        self.stability.capture(sample);
                    } else {
                        self.stability.update(sample);
                    }
                    let frames = self.stability.frames();
                    if let Some(d) = self.stability.finish() {
                        debug!(
                            "hold in '{}' finished after {frames} frames, max displacement {d:.4}",
                            phases[from].name
                        );
                        self.hold_displacement = Some(d);
                    }
                }
                transition = Some(Transition {
                    from: phases[from].name.clone(),
                    to: phases[to].name.clone(),
                    timed_out: false,
                });
                phases[to].prompt.clone()
            }
            Step::TimedOut { from, to } => {
                if to == 0 {
                    self.stability.discard();
                    self.motion.reset();
                    self.hold_displacement = None;
                }
                transition = Some(Transition {
                    from: phases[from].name.clone(),
                    to: phases[to].name.clone(),
                    timed_out: true,
                });
                phases[to].prompt.clone()
            }
            Step::Finished => phases[cur].prompt.clone(),
        };

        self.track_motion(cur, &step, sample, now);

        let mut outcome = self.outcome(now, instruction, transition);
        outcome.remaining_secs = remaining_secs;
        if self.machine.is_finished() {
            let result = self.scoring.score(
                &ScoreInputs {
                    final_sample: sample,
                    max_displacement: self.hold_displacement,
                    motion: self.motion.summary(),
                },
                &self.eval,
            )?;
            info!(
                "'{}' complete: total score {:.1}",
                self.profile.meta.name, result.total_score
            );
            self.result = Some(result.clone());
            outcome.result = Some(result);
        }
        Ok(outcome)
    }

    /// Motion is measured from the frame that enters the first motion phase
    /// through the frame that leaves the last one. Frames whose metric
    /// landmarks are hidden are left out.
    fn track_motion(&mut self, before: usize, step: &Step, sample: &PoseSample, now: u64) {
        if matches!(step, Step::Hidden) {
            return;
        }
        let phases = self.machine.phases();
        let now_in_motion = phases[self.machine.state().current].track_motion;
        let left_motion = match step {
            Step::Advanced { .. } => phases[before].track_motion,
            // A reset abandons the measurement instead of closing it.
            Step::TimedOut { to, .. } => *to != 0 && phases[before].track_motion,
            _ => false,
        };
        if !(now_in_motion || left_motion) {
            return;
        }
        if self.motion.is_active() {
            self.motion.update(sample, now);
        } else {
            self.motion.begin(sample, now);
        }
    }

    fn outcome(&self, now: u64, instruction: String, transition: Option<Transition>) -> FrameOutcome {
        FrameOutcome {
            timestamp_ms: now,
            phase: self.machine.current().name.clone(),
            instruction,
            remaining_secs: None,
            transition,
            result: None,
        }
    }
}
