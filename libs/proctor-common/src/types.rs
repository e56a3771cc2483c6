use serde::{Deserialize, Serialize};
use std::fmt;

/// Judging discipline declared by an exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseType {
    Backend,
    Frontend,
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExerciseType::Backend => write!(f, "backend"),
            ExerciseType::Frontend => write!(f, "frontend"),
        }
    }
}

/// Declarative exercise definition handed to the judge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exercise {
    pub id: i64,
    pub exercise_type: ExerciseType,
    #[serde(default)]
    pub backend_testcases: Vec<BackendTestCase>,
    #[serde(default, alias = "testcases")]
    pub frontend_testcases: Vec<FrontendTestCase>,
}

impl Exercise {
    /// Number of test cases for the declared discipline
    pub fn test_case_count(&self) -> usize {
        match self.exercise_type {
            ExerciseType::Backend => self.backend_testcases.len(),
            ExerciseType::Frontend => self.frontend_testcases.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendTestCase {
    pub id: i64,
    #[serde(default)]
    pub stdin: String,
    #[serde(default)]
    pub expected_stdout: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendTestCase {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(
        default,
        rename = "attributeName",
        skip_serializing_if = "Option::is_none"
    )]
    pub attribute_name: Option<String>,
}

impl FrontendTestCase {
    /// Display name, falling back to the id when the author left it blank
    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            format!("Test case {}", self.id)
        } else {
            self.name.clone()
        }
    }

    /// Trigger string, treating blank as absent
    pub fn trigger(&self) -> Option<&str> {
        self.trigger
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Program judge status vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgramStatus {
    Accepted,
    WrongAnswer,
    RuntimeError,
    CompilationError,
    TimeLimitExceeded,
    GraderError,
}

impl fmt::Display for ProgramStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProgramStatus::Accepted => "ACCEPTED",
            ProgramStatus::WrongAnswer => "WRONG_ANSWER",
            ProgramStatus::RuntimeError => "RUNTIME_ERROR",
            ProgramStatus::CompilationError => "COMPILATION_ERROR",
            ProgramStatus::TimeLimitExceeded => "TIME_LIMIT_EXCEEDED",
            ProgramStatus::GraderError => "GRADER_ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Verdict for one backend test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramVerdict {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_case_id: Option<i64>,
    pub status: ProgramStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProgramVerdict {
    pub fn new(test_case_id: i64, status: ProgramStatus) -> Self {
        Self {
            test_case_id: Some(test_case_id),
            status,
            output: None,
            expected: None,
            detail: None,
        }
    }

    /// A verdict not bound to any test case (configuration or system failure)
    pub fn unbound(status: ProgramStatus, detail: impl Into<String>) -> Self {
        Self {
            test_case_id: None,
            status,
            output: None,
            expected: None,
            detail: Some(detail.into()),
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn is_accepted(&self) -> bool {
        self.status == ProgramStatus::Accepted
    }
}

pub const PASS_MARKER: &str = "✅ Passed";
pub const FAIL_MARKER: &str = "❌ Failed";
pub const ERROR_MARKER: &str = "❌ Error";
pub const SKIP_MARKER: &str = "⚠️ Skipped";

/// Verdict for one frontend test case
///
/// `result` always starts with one of the marker constants above.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiVerdict {
    pub test: String,
    pub result: String,
}

impl UiVerdict {
    pub fn passed(test: impl Into<String>) -> Self {
        Self {
            test: test.into(),
            result: PASS_MARKER.to_string(),
        }
    }

    pub fn failed(test: impl Into<String>, explanation: impl fmt::Display) -> Self {
        Self {
            test: test.into(),
            result: format!("{} ({})", FAIL_MARKER, explanation),
        }
    }

    pub fn error(test: impl Into<String>, kind: &str, message: impl fmt::Display) -> Self {
        Self {
            test: test.into(),
            result: format!("{}: {}: {}", ERROR_MARKER, kind, message),
        }
    }

    pub fn skipped(test: impl Into<String>, explanation: impl fmt::Display) -> Self {
        Self {
            test: test.into(),
            result: format!("{} ({})", SKIP_MARKER, explanation),
        }
    }

    pub fn is_passed(&self) -> bool {
        self.result.trim() == PASS_MARKER
    }

    pub fn is_error(&self) -> bool {
        self.result.starts_with(ERROR_MARKER)
    }
}

/// Ordered verdict list produced by one judging run
///
/// Serializes as a bare JSON array in either shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JudgeRun {
    Program(Vec<ProgramVerdict>),
    Ui(Vec<UiVerdict>),
}

impl JudgeRun {
    pub fn len(&self) -> usize {
        match self {
            JudgeRun::Program(v) => v.len(),
            JudgeRun::Ui(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn passed_count(&self) -> usize {
        match self {
            JudgeRun::Program(v) => v.iter().filter(|r| r.is_accepted()).count(),
            JudgeRun::Ui(v) => v.iter().filter(|r| r.is_passed()).count(),
        }
    }

    /// True when any verdict is not a pass; drives artifact retention
    pub fn has_failures(&self) -> bool {
        self.passed_count() < self.len()
    }

    /// Single-verdict run for failures that precede any test case
    pub fn degenerate(exercise_type: ExerciseType, label: &str, kind: &str, message: &str) -> Self {
        match exercise_type {
            ExerciseType::Backend => JudgeRun::Program(vec![ProgramVerdict::unbound(
                ProgramStatus::GraderError,
                format!("{}: {}", kind, message),
            )]),
            ExerciseType::Frontend => JudgeRun::Ui(vec![UiVerdict::error(label, kind, message)]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backend_exercise() {
        let json = r#"{
            "id": 7,
            "exercise_type": "backend",
            "backend_testcases": [
                { "id": 1, "stdin": "3 4\n", "expected_stdout": "7" }
            ]
        }"#;
        let exercise: Exercise = serde_json::from_str(json).unwrap();
        assert_eq!(exercise.exercise_type, ExerciseType::Backend);
        assert_eq!(exercise.test_case_count(), 1);
        assert_eq!(exercise.backend_testcases[0].stdin, "3 4\n");
        assert!(exercise.frontend_testcases.is_empty());
    }

    #[test]
    fn test_parse_frontend_exercise_with_legacy_key() {
        let json = r#"{
            "id": 3,
            "exercise_type": "frontend",
            "testcases": [
                { "id": 1, "name": "Color", "type": "attribute_equals",
                  "selector": "h1", "attributeName": "color", "expected": "green" }
            ]
        }"#;
        let exercise: Exercise = serde_json::from_str(json).unwrap();
        assert_eq!(exercise.test_case_count(), 1);
        let tc = &exercise.frontend_testcases[0];
        assert_eq!(tc.kind, "attribute_equals");
        assert_eq!(tc.attribute_name.as_deref(), Some("color"));
        assert_eq!(tc.trigger(), None);
    }

    #[test]
    fn test_blank_trigger_is_absent() {
        let tc = FrontendTestCase {
            id: 1,
            name: String::new(),
            kind: "element_exists".to_string(),
            selector: Some("#a".to_string()),
            trigger: Some("   ".to_string()),
            expected: None,
            attribute_name: None,
        };
        assert_eq!(tc.trigger(), None);
        assert_eq!(tc.display_name(), "Test case 1");
    }

    #[test]
    fn test_program_verdict_shape() {
        let verdict = ProgramVerdict::new(4, ProgramStatus::Accepted).with_output("7");
        let value = serde_json::to_value(&verdict).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "test_case_id": 4, "status": "ACCEPTED", "output": "7" })
        );
    }

    #[test]
    fn test_ui_verdict_markers() {
        assert!(UiVerdict::passed("a").is_passed());
        assert!(!UiVerdict::failed("a", "nope").is_passed());
        assert!(UiVerdict::error("a", "AutomationError", "timeout").is_error());
        assert_eq!(
            UiVerdict::error("a", "AutomationError", "timeout").result,
            "❌ Error: AutomationError: timeout"
        );
        assert!(UiVerdict::skipped("a", "unknown").result.starts_with(SKIP_MARKER));
    }

    #[test]
    fn test_judge_run_serializes_as_array() {
        let run = JudgeRun::Ui(vec![UiVerdict::passed("t1")]);
        let json = serde_json::to_string(&run).unwrap();
        assert_eq!(json, r#"[{"test":"t1","result":"✅ Passed"}]"#);
    }

    #[test]
    fn test_degenerate_run_has_single_verdict() {
        let run = JudgeRun::degenerate(ExerciseType::Backend, "Setup", "ConfigurationError", "no tests");
        assert_eq!(run.len(), 1);
        assert!(run.has_failures());
        match run {
            JudgeRun::Program(v) => {
                assert_eq!(v[0].status, ProgramStatus::GraderError);
                assert_eq!(v[0].test_case_id, None);
            }
            JudgeRun::Ui(_) => panic!("expected program shape"),
        }
    }
}
