//! Score scales: bucketed step functions and clamped linear maps.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRule {
    /// First step whose `limit` is strictly greater than the value wins.
    /// Smaller inputs score higher (e.g. displacement).
    Below,
    /// First step whose `limit` is less than or equal to the value wins.
    /// Larger inputs score higher (e.g. joint extension).
    AtLeast,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub limit: f32,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepScale {
    pub rule: StepRule,
    pub steps: Vec<Step>,
    /// Score when no step matches.
    pub otherwise: f32,
}

impl StepScale {
    pub fn at_least(steps: &[(f32, f32)], otherwise: f32) -> Self {
        Self::build(StepRule::AtLeast, steps, otherwise)
    }

    pub fn below(steps: &[(f32, f32)], otherwise: f32) -> Self {
        Self::build(StepRule::Below, steps, otherwise)
    }

    fn build(rule: StepRule, steps: &[(f32, f32)], otherwise: f32) -> Self {
        Self {
            rule,
            steps: steps
                .iter()
                .map(|&(limit, score)| Step { limit, score })
                .collect(),
            otherwise,
        }
    }

    pub fn score(&self, value: f32) -> f32 {
        let hit = self.steps.iter().find(|s| match self.rule {
            StepRule::Below => value < s.limit,
            StepRule::AtLeast => value >= s.limit,
        });
        hit.map_or(self.otherwise, |s| s.score)
    }

    /// Highest score the scale can produce.
    pub fn best(&self) -> f32 {
        self.steps.first().map_or(self.otherwise, |s| s.score)
    }

    /// Checks the scale is a monotonic step function.
    pub fn validate(&self) -> Result<(), String> {
        if self.steps.is_empty() {
            return Err("scale needs at least one step".into());
        }
        for w in self.steps.windows(2) {
            let ordered = match self.rule {
                StepRule::Below => w[0].limit < w[1].limit,
                StepRule::AtLeast => w[0].limit > w[1].limit,
            };
            if !ordered {
                return Err(format!(
                    "step limits must be strictly {} ({} then {})",
                    match self.rule {
                        StepRule::Below => "ascending",
                        StepRule::AtLeast => "descending",
                    },
                    w[0].limit,
                    w[1].limit
                ));
            }
            if w[1].score > w[0].score {
                return Err(format!(
                    "step scores must not increase ({} then {})",
                    w[0].score, w[1].score
                ));
            }
        }
        let last = self.steps[self.steps.len() - 1].score;
        if self.otherwise > last {
            return Err(format!(
                "fallback score {} exceeds the last step score {last}",
                self.otherwise
            ));
        }
        Ok(())
    }
}

/// Linear map from `[in_min, in_max]` onto `[out_min, out_max]`, clamped at
/// both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearScale {
    pub in_min: f32,
    pub in_max: f32,
    pub out_min: f32,
    pub out_max: f32,
}

impl LinearScale {
    pub fn score(&self, value: f32) -> f32 {
        let t = (value - self.in_min) / (self.in_max - self.in_min);
        (self.out_min + t * (self.out_max - self.out_min)).clamp(self.out_min, self.out_max)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.in_max > self.in_min) {
            return Err(format!(
                "in_max ({}) must exceed in_min ({})",
                self.in_max, self.in_min
            ));
        }
        if self.out_max < self.out_min {
            return Err(format!(
                "out_max ({}) must not be below out_min ({})",
                self.out_max, self.out_min
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn displacement_scale() -> StepScale {
        StepScale::below(
            &[
                (0.01, 100.0),
                (0.02, 90.0),
                (0.03, 80.0),
                (0.04, 70.0),
                (0.05, 60.0),
                (0.06, 50.0),
                (0.08, 40.0),
                (0.10, 30.0),
                (0.15, 20.0),
                (0.20, 10.0),
            ],
            0.0,
        )
    }

    #[test]
    fn below_rule_buckets() {
        let s = displacement_scale();
        assert!(s.validate().is_ok());
        assert_eq!(s.score(0.0), 100.0);
        assert_eq!(s.score(0.015), 90.0);
        assert_eq!(s.score(0.07), 40.0);
        assert_eq!(s.score(0.2), 0.0);
        assert_eq!(s.best(), 100.0);
    }

    #[test]
    fn below_rule_is_monotonic() {
        let s = displacement_scale();
        let mut prev = f32::INFINITY;
        for i in 0..300 {
            let score = s.score(i as f32 * 0.001);
            assert!(score <= prev);
            prev = score;
        }
    }

    #[test]
    fn at_least_rule_buckets() {
        let s = StepScale::at_least(&[(170.0, 10.0), (150.0, 8.0), (120.0, 6.0)], 4.0);
        assert!(s.validate().is_ok());
        assert_eq!(s.score(175.0), 10.0);
        assert_eq!(s.score(170.0), 10.0);
        assert_eq!(s.score(151.0), 8.0);
        assert_eq!(s.score(90.0), 4.0);
    }

    #[test]
    fn rejects_unordered_steps() {
        let s = StepScale::below(&[(0.05, 60.0), (0.01, 100.0)], 0.0);
        assert!(s.validate().unwrap_err().contains("ascending"));
        let s = StepScale::at_least(&[(170.0, 8.0), (150.0, 10.0)], 4.0);
        assert!(s.validate().unwrap_err().contains("must not increase"));
        let s = StepScale::at_least(&[(170.0, 10.0)], 12.0);
        assert!(s.validate().is_err());
        let empty = StepScale::below(&[], 0.0);
        assert!(empty.validate().is_err());
    }

    #[test]
    fn linear_scale_clamps() {
        let s = LinearScale {
            in_min: 0.0,
            in_max: 0.1,
            out_min: 60.0,
            out_max: 100.0,
        };
        assert!(s.validate().is_ok());
        assert_eq!(s.score(-0.5), 60.0);
        assert!((s.score(0.05) - 80.0).abs() < 1e-3);
        assert_eq!(s.score(0.3), 100.0);
    }
}
