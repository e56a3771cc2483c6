//! Process Engine - Compile Once, Run Every Test Case
//!
//! **Core Responsibility:**
//! Execute a submission against stdin fixtures and capture raw outputs.
//!
//! **Critical Architectural Boundary:**
//! - Engine knows HOW to execute (local processes, working directories)
//! - Engine does NOT know comparison rules (evaluator's job)
//! - Engine does NOT know language specifics (LanguageJudge's job)
//!
//! **Per-submission state machine:**
//! `Prepare → Compile (optional) → [Run → Compare]* → Done`
//!
//! A missing toolchain or a failed build short-circuits the run: every
//! test case receives the same verdict and nothing is executed.

use crate::error::{JudgeError, JudgeResult};
use crate::evaluator::{self, CompilationResult, TestExecutionOutput};
use crate::language::{ensure_toolchain, Invocation, LanguageJudge};
use crate::workspace::Workspace;
use proctor_common::config::JudgeSettings;
use proctor_common::types::{BackendTestCase, ProgramVerdict};
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// What a finished process left behind
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub elapsed_ms: u64,
}

/// Runs the judge's post-run cleanup on every exit path
struct ArtifactGuard<'a> {
    judge: &'a dyn LanguageJudge,
    workspace: &'a Workspace,
}

impl Drop for ArtifactGuard<'_> {
    fn drop(&mut self) {
        self.judge.cleanup(self.workspace);
    }
}

pub struct ProcessEngine {
    settings: JudgeSettings,
}

impl ProcessEngine {
    pub fn new(settings: &JudgeSettings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }

    /// Judge a source file against every test case, in order
    ///
    /// Always returns exactly one verdict per test case.
    #[instrument(skip_all, fields(language = judge.name(), test_count = test_cases.len()))]
    pub async fn judge_submission(
        &self,
        judge: &dyn LanguageJudge,
        submission: &Path,
        test_cases: &[BackendTestCase],
    ) -> Vec<ProgramVerdict> {
        if let Err(e) = ensure_toolchain(judge) {
            warn!(error = %e, "Toolchain unavailable; no test case will run");
            return evaluator::replicate(test_cases, &e);
        }

        // Prepare
        let workspace = match Workspace::create(&self.settings.work_root, "build-") {
            Ok(ws) => ws,
            Err(e) => return evaluator::replicate(test_cases, &e),
        };
        let _guard = ArtifactGuard {
            judge,
            workspace: &workspace,
        };
        let program = match judge.prepare(&workspace, submission) {
            Ok(p) => p,
            Err(e) => return evaluator::replicate(test_cases, &e),
        };

        // Compile
        if let Some(compile) = judge.compile_command(&program) {
            match self.compile(&compile).await {
                Ok(result) if result.success => {
                    info!(compilation_time_ms = result.compilation_time_ms, "Compilation succeeded");
                }
                Ok(result) => {
                    warn!(
                        compilation_time_ms = result.compilation_time_ms,
                        error_preview = result.stderr.lines().next().unwrap_or(""),
                        "Compilation failed"
                    );
                    let err = JudgeError::Compilation(result.stderr.trim().to_string());
                    return evaluator::replicate(test_cases, &err);
                }
                Err(e) => return evaluator::replicate(test_cases, &e),
            }
        }

        // Run → Compare
        let run = judge.run_command(&program);
        let mut verdicts = Vec::with_capacity(test_cases.len());

        for (idx, test_case) in test_cases.iter().enumerate() {
            debug!(test_num = idx + 1, test_id = test_case.id, "Executing test");

            let outcome = self.execute_test(&run, test_case).await;

            if let Err(e) = &outcome {
                if e.is_run_fatal() {
                    warn!(test_id = test_case.id, error = %e, "Run invalidated; backfilling remaining test cases");
                    verdicts.extend(evaluator::replicate(&test_cases[idx..], e));
                    break;
                }
            }

            let verdict = evaluator::evaluate_test(&outcome, test_case);
            info!(
                test_id = test_case.id,
                status = %verdict.status,
                execution_ms = outcome.as_ref().map(|o| o.execution_time_ms).unwrap_or(0),
                "Test result"
            );
            verdicts.push(verdict);
        }

        verdicts
    }

    #[instrument(skip_all, fields(program = %invocation.program))]
    async fn compile(&self, invocation: &Invocation) -> JudgeResult<CompilationResult> {
        let start = Instant::now();
        let limit = self.settings.compile_timeout();

        let output = match run_process(invocation, None, limit).await {
            Ok(output) => output,
            Err(JudgeError::Timeout(ms)) => {
                return Ok(CompilationResult::failure(
                    format!("Compilation timed out after {}ms", ms),
                    start.elapsed().as_millis() as u64,
                ));
            }
            Err(e) => return Err(e),
        };

        if output.exit_code == Some(0) {
            Ok(CompilationResult::success(output.elapsed_ms))
        } else {
            let diagnostics = if output.stderr.trim().is_empty() {
                output.stdout
            } else {
                output.stderr
            };
            Ok(CompilationResult::failure(diagnostics, output.elapsed_ms))
        }
    }

    async fn execute_test(
        &self,
        run: &Invocation,
        test_case: &BackendTestCase,
    ) -> JudgeResult<TestExecutionOutput> {
        let output = run_process(run, Some(&test_case.stdin), self.settings.run_timeout()).await?;

        Ok(TestExecutionOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.exit_code,
            execution_time_ms: output.elapsed_ms,
        })
    }
}

/// Spawn a process, feed stdin, and wait for it under a wall-clock budget
///
/// The child is killed when the budget runs out (kill-on-drop).
pub async fn run_process(
    invocation: &Invocation,
    stdin: Option<&str>,
    limit: Duration,
) -> JudgeResult<ProcessOutput> {
    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .current_dir(&invocation.cwd)
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let start = Instant::now();
    let mut child = cmd.spawn().map_err(|e| match e.kind() {
        ErrorKind::NotFound => {
            JudgeError::Setup(format!("Program not found: {}", invocation.program))
        }
        _ => JudgeError::System(format!("Failed to spawn {}: {}", invocation.program, e)),
    })?;

    if let (Some(data), Some(mut pipe)) = (stdin, child.stdin.take()) {
        let data = data.as_bytes().to_vec();
        // Written concurrently so a chatty child cannot deadlock on a full stdout pipe
        tokio::spawn(async move {
            if let Err(e) = pipe.write_all(&data).await {
                debug!(error = %e, "Failed to write stdin, process could be dead");
            }
        });
    }

    match tokio::time::timeout(limit, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        }),
        Ok(Err(e)) => Err(JudgeError::System(format!(
            "Failed to wait for {}: {}",
            invocation.program, e
        ))),
        Err(_) => Err(JudgeError::Timeout(limit.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CommandSpec, LanguageConfig, LanguageKind};
    use crate::language::judge_for;
    use proctor_common::types::ProgramStatus;
    use std::fs;

    fn shell_profile() -> LanguageConfig {
        LanguageConfig {
            name: "shell".to_string(),
            version: "posix".to_string(),
            kind: LanguageKind::Interpreted,
            file_extensions: vec![".sh".to_string()],
            compile: None,
            run: CommandSpec::new("sh", &["{source}"]),
            entry_point: None,
            cleanup_extensions: vec![],
        }
    }

    fn settings(root: &Path, run_timeout_ms: u64) -> JudgeSettings {
        JudgeSettings {
            run_timeout_ms,
            work_root: root.to_path_buf(),
            ..JudgeSettings::default()
        }
    }

    fn test_case(id: i64, stdin: &str, expected: &str) -> BackendTestCase {
        BackendTestCase {
            id,
            stdin: stdin.to_string(),
            expected_stdout: expected.to_string(),
        }
    }

    fn script(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("submission.sh");
        fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn test_sum_program_accepted() {
        let root = tempfile::tempdir().unwrap();
        let engine = ProcessEngine::new(&settings(root.path(), 5000));
        let judge = judge_for(&shell_profile());
        let src = script(root.path(), "read a b\necho $((a + b))\n");

        let verdicts = engine
            .judge_submission(judge.as_ref(), &src, &[test_case(1, "3 4\n", "7"), test_case(2, "1 1\n", "3")])
            .await;

        assert_eq!(verdicts.len(), 2);
        assert_eq!(verdicts[0].status, ProgramStatus::Accepted);
        assert_eq!(verdicts[0].output.as_deref(), Some("7"));
        assert_eq!(verdicts[1].status, ProgramStatus::WrongAnswer);
        assert_eq!(verdicts[1].output.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_sleeping_program_exceeds_time_limit() {
        let root = tempfile::tempdir().unwrap();
        let engine = ProcessEngine::new(&settings(root.path(), 300));
        let judge = judge_for(&shell_profile());
        let src = script(root.path(), "sleep 5\necho done\n");

        let verdicts = engine
            .judge_submission(judge.as_ref(), &src, &[test_case(1, "", "done")])
            .await;

        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].status, ProgramStatus::TimeLimitExceeded);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_runtime_error_and_run_continues() {
        let root = tempfile::tempdir().unwrap();
        let engine = ProcessEngine::new(&settings(root.path(), 5000));
        let judge = judge_for(&shell_profile());
        let src = script(
            root.path(),
            "read n\nif [ \"$n\" = 0 ]; then echo 'division by zero' >&2; exit 3; fi\necho ok\n",
        );

        let verdicts = engine
            .judge_submission(judge.as_ref(), &src, &[test_case(1, "0\n", "ok"), test_case(2, "5\n", "ok")])
            .await;

        assert_eq!(verdicts[0].status, ProgramStatus::RuntimeError);
        assert_eq!(verdicts[0].detail.as_deref(), Some("division by zero"));
        assert_eq!(verdicts[1].status, ProgramStatus::Accepted);
    }

    #[tokio::test]
    async fn test_compile_failure_short_circuits() {
        let root = tempfile::tempdir().unwrap();
        let engine = ProcessEngine::new(&settings(root.path(), 5000));
        let marker = root.path().join("executed");
        let profile = LanguageConfig {
            name: "broken".to_string(),
            version: "1".to_string(),
            kind: LanguageKind::CompiledNative,
            file_extensions: vec![".b".to_string()],
            compile: Some(CommandSpec::new(
                "sh",
                &["-c", "echo 'syntax error near line 1' >&2; exit 1"],
            )),
            run: CommandSpec::new("touch", &[marker.to_str().unwrap()]),
            entry_point: None,
            cleanup_extensions: vec![],
        };
        let judge = judge_for(&profile);
        let src = script(root.path(), "garbage");

        let cases = [test_case(1, "", ""), test_case(2, "", ""), test_case(3, "", "")];
        let verdicts = engine.judge_submission(judge.as_ref(), &src, &cases).await;

        assert_eq!(verdicts.len(), 3);
        for v in &verdicts {
            assert_eq!(v.status, ProgramStatus::CompilationError);
            assert_eq!(v.detail.as_deref(), Some("syntax error near line 1"));
        }
        assert!(!marker.exists(), "no test case may execute after a failed build");
    }

    #[tokio::test]
    async fn test_missing_toolchain_is_grader_error_for_all() {
        let root = tempfile::tempdir().unwrap();
        let engine = ProcessEngine::new(&settings(root.path(), 5000));
        let mut profile = shell_profile();
        profile.run = CommandSpec::new("definitely-not-an-interpreter-xyz", &["{source}"]);
        let judge = judge_for(&profile);
        let src = script(root.path(), "echo hi");

        let verdicts = engine
            .judge_submission(judge.as_ref(), &src, &[test_case(1, "", "hi"), test_case(2, "", "hi")])
            .await;

        assert_eq!(verdicts.len(), 2);
        assert!(verdicts.iter().all(|v| v.status == ProgramStatus::GraderError));
        assert!(verdicts[0].detail.as_deref().unwrap().contains("definitely-not-an-interpreter-xyz"));
    }

    #[tokio::test]
    async fn test_build_directory_is_released() {
        let root = tempfile::tempdir().unwrap();
        let engine = ProcessEngine::new(&settings(root.path(), 5000));
        let judge = judge_for(&shell_profile());
        let src = script(root.path(), "echo 1");

        engine
            .judge_submission(judge.as_ref(), &src, &[test_case(1, "", "1")])
            .await;

        let leftovers: Vec<_> = fs::read_dir(root.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with("build-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_deterministic_statuses() {
        let root = tempfile::tempdir().unwrap();
        let engine = ProcessEngine::new(&settings(root.path(), 5000));
        let judge = judge_for(&shell_profile());
        let src = script(root.path(), "read a\necho $((a * 2))\n");
        let cases = [test_case(1, "2\n", "4"), test_case(2, "3\n", "7")];

        let first = engine.judge_submission(judge.as_ref(), &src, &cases).await;
        let second = engine.judge_submission(judge.as_ref(), &src, &cases).await;

        let statuses = |v: &[ProgramVerdict]| v.iter().map(|x| x.status).collect::<Vec<_>>();
        assert_eq!(statuses(&first), statuses(&second));
    }
}
