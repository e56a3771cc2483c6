//! Test Evaluator - Verdicts from Raw Execution Outputs
//!
//! **Core Responsibility:**
//! Turn what the process engine observed into a program verdict.
//!
//! **Critical Properties:**
//! - Knows nothing about processes or toolchains
//! - Pure function: (execution outcome, test case) → verdict
//!
//! **Normalization Rules:**
//! - Trim trailing whitespace on both sides: YES
//! - Trim leading whitespace: NO
//! - Case sensitivity: YES (exact match required)
//!
//! **Priority:**
//! timeout, then runtime error, then output comparison.

use crate::error::{JudgeError, JudgeResult};
use proctor_common::types::{BackendTestCase, ProgramStatus, ProgramVerdict};

/// Raw execution output for a single test case
/// Produced by the process engine, consumed by the evaluator
#[derive(Debug, Clone)]
pub struct TestExecutionOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub execution_time_ms: u64,
}

/// Compilation step result
#[derive(Debug, Clone)]
pub struct CompilationResult {
    pub success: bool,
    pub stderr: String,
    pub compilation_time_ms: u64,
}

impl CompilationResult {
    pub fn success(compilation_time_ms: u64) -> Self {
        Self {
            success: true,
            stderr: String::new(),
            compilation_time_ms,
        }
    }

    pub fn failure(stderr: String, compilation_time_ms: u64) -> Self {
        Self {
            success: false,
            stderr,
            compilation_time_ms,
        }
    }
}

fn normalize_output(output: &str) -> &str {
    output.trim_end()
}

/// Exact comparison after trailing-whitespace normalization
pub fn compare(actual: &str, expected: &str) -> JudgeResult<()> {
    let actual = normalize_output(actual);
    let expected = normalize_output(expected);

    if actual == expected {
        Ok(())
    } else {
        Err(JudgeError::ComparisonMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}

/// Judge one test case from its execution outcome
pub fn evaluate_test(
    outcome: &JudgeResult<TestExecutionOutput>,
    test_case: &BackendTestCase,
) -> ProgramVerdict {
    let output = match outcome {
        Ok(output) => output,
        Err(e) => return verdict_for_error(test_case.id, e),
    };

    if output.exit_code != Some(0) {
        let err = JudgeError::Runtime {
            exit_code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        };
        return verdict_for_error(test_case.id, &err);
    }

    let actual = output.stdout.trim().to_string();
    match compare(&output.stdout, &test_case.expected_stdout) {
        Ok(()) => ProgramVerdict::new(test_case.id, ProgramStatus::Accepted).with_output(actual),
        Err(JudgeError::ComparisonMismatch { .. }) => {
            ProgramVerdict::new(test_case.id, ProgramStatus::WrongAnswer)
                .with_output(actual)
                .with_expected(test_case.expected_stdout.clone())
        }
        Err(e) => verdict_for_error(test_case.id, &e),
    }
}

/// Verdict carrying a failure's status and message
pub fn verdict_for_error(test_id: i64, err: &JudgeError) -> ProgramVerdict {
    let verdict = ProgramVerdict::new(test_id, err.program_status());
    match err {
        JudgeError::Timeout(_) => verdict,
        JudgeError::Runtime { exit_code, stderr } => {
            if stderr.is_empty() {
                let code = exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string());
                verdict.with_detail(format!("Process exited with status {}", code))
            } else {
                verdict.with_detail(stderr.clone())
            }
        }
        other => verdict.with_detail(other.to_string()),
    }
}

/// The same verdict for every test case, used when the whole run is
/// invalidated before or during execution
pub fn replicate(test_cases: &[BackendTestCase], err: &JudgeError) -> Vec<ProgramVerdict> {
    test_cases
        .iter()
        .map(|tc| verdict_for_error(tc.id, err))
        .collect()
}
