//! Result Aggregator
//!
//! Collapses either judge's verdict list into one reporting contract:
//! a pass count, a `passed/total` score string and the full ordered
//! verdict list for detail display.
//!
//! **Pass predicate:**
//! - Program verdicts pass when `status == ACCEPTED`
//! - UI verdicts pass when the result trims to the pass marker

use crate::types::{ExerciseType, JudgeRun};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreReport {
    pub exercise_id: i64,
    pub exercise_type: ExerciseType,
    pub score: String,
    pub passed: usize,
    pub total: usize,
    pub details: JudgeRun,
}

impl ScoreReport {
    pub fn all_passed(&self) -> bool {
        self.total > 0 && self.passed == self.total
    }
}

/// Build the uniform response for a finished run
pub fn aggregate(exercise_id: i64, exercise_type: ExerciseType, run: JudgeRun) -> ScoreReport {
    let passed = run.passed_count();
    let total = run.len();

    ScoreReport {
        exercise_id,
        exercise_type,
        score: format!("{}/{}", passed, total),
        passed,
        total,
        details: run,
    }
}
