// Judge error taxonomy

use proctor_common::types::ProgramStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JudgeError {
    /// Missing or invalid exercise definition, unsupported submission
    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    Compilation(String),

    /// Program exited with a nonzero code; carries stderr
    #[error("{stderr}")]
    Runtime { exit_code: Option<i32>, stderr: String },

    #[error("timed out after {0}ms")]
    Timeout(u64),

    #[error("expected '{expected}', got '{actual}'")]
    ComparisonMismatch { expected: String, actual: String },

    /// Selector, timeout or dialog failures inside the browser
    #[error("{0}")]
    Automation(String),

    /// Toolchain or browser engine unavailable
    #[error("{0}")]
    Setup(String),

    #[error("{0}")]
    System(String),
}

impl JudgeError {
    /// Stable name used in error verdicts
    pub fn kind(&self) -> &'static str {
        match self {
            JudgeError::Configuration(_) => "ConfigurationError",
            JudgeError::Compilation(_) => "CompilationError",
            JudgeError::Runtime { .. } => "RuntimeError",
            JudgeError::Timeout(_) => "TimeoutError",
            JudgeError::ComparisonMismatch { .. } => "ComparisonMismatch",
            JudgeError::Automation(_) => "AutomationError",
            JudgeError::Setup(_) => "SetupError",
            JudgeError::System(_) => "SystemError",
        }
    }

    /// Program judge status this failure maps to
    pub fn program_status(&self) -> ProgramStatus {
        match self {
            JudgeError::Compilation(_) => ProgramStatus::CompilationError,
            JudgeError::Runtime { .. } => ProgramStatus::RuntimeError,
            JudgeError::Timeout(_) => ProgramStatus::TimeLimitExceeded,
            JudgeError::ComparisonMismatch { .. } => ProgramStatus::WrongAnswer,
            JudgeError::Configuration(_)
            | JudgeError::Automation(_)
            | JudgeError::Setup(_)
            | JudgeError::System(_) => ProgramStatus::GraderError,
        }
    }

    /// Whether this failure invalidates every remaining test case
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, JudgeError::Compilation(_) | JudgeError::Setup(_))
    }
}

impl From<std::io::Error> for JudgeError {
    fn from(e: std::io::Error) -> Self {
        JudgeError::System(format!("I/O error: {}", e))
    }
}

pub type JudgeResult<T> = std::result::Result<T, JudgeError>;
