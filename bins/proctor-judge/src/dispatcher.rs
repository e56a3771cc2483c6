//! Submission Dispatcher
//!
//! Routes a submission to the program judge or the UI judge by exercise
//! type, owns the materialized submission for the duration of the run,
//! and keeps it for post-mortem inspection when any verdict is not a pass.

use crate::archive;
use crate::browser::PlaywrightBridge;
use crate::config::LanguageConfigManager;
use crate::engine::ProcessEngine;
use crate::error::{JudgeError, JudgeResult};
use crate::language::judge_for;
use crate::ui_judge::UiJudge;
use crate::workspace::Workspace;
use proctor_common::config::JudgeSettings;
use proctor_common::types::{Exercise, ExerciseType, JudgeRun, UiVerdict};
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument, warn};
use url::Url;
use uuid::Uuid;

/// Test name used for run-level frontend verdicts
const SYSTEM_TEST_NAME: &str = "System Error";
const CONFIG_TEST_NAME: &str = "Configuration";

#[derive(Clone)]
pub struct Dispatcher {
    languages: LanguageConfigManager,
    settings: JudgeSettings,
}

impl Dispatcher {
    pub fn new(languages: LanguageConfigManager, settings: JudgeSettings) -> Self {
        Self {
            languages,
            settings,
        }
    }

    /// Judge a submission, never failing: every error becomes verdict data
    #[instrument(skip_all, fields(run_id = %Uuid::new_v4(), exercise_id = exercise.id, exercise_type = %exercise.exercise_type))]
    pub async fn judge(&self, exercise: &Exercise, submission: &Path) -> JudgeRun {
        match self.try_judge(exercise, submission).await {
            Ok(run) => {
                info!(
                    passed = run.passed_count(),
                    total = run.len(),
                    "Judging complete"
                );
                run
            }
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "Run aborted before judging");
                aborted_run(exercise.exercise_type, &e)
            }
        }
    }

    /// Run `judge` on its own task so that even a panic comes back as a
    /// well-formed verdict list
    pub async fn judge_or_report(&self, exercise: Exercise, submission: PathBuf) -> JudgeRun {
        let exercise_type = exercise.exercise_type;
        let dispatcher = self.clone();

        isolated(exercise_type, async move {
            dispatcher.judge(&exercise, &submission).await
        })
        .await
    }

    async fn try_judge(&self, exercise: &Exercise, submission: &Path) -> JudgeResult<JudgeRun> {
        validate(exercise)?;

        if !submission.is_file() {
            return Err(JudgeError::Configuration(format!(
                "Submission not found: {}",
                submission.display()
            )));
        }

        let workspace = Workspace::for_submission(&self.settings.work_root, exercise.id)?;

        let judged = match exercise.exercise_type {
            ExerciseType::Backend => self.judge_program(exercise, submission, &workspace).await,
            ExerciseType::Frontend => self.judge_ui(exercise, submission, &workspace).await,
        };
        let run = match judged {
            Ok(run) => run,
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "Run aborted after materializing submission");
                aborted_run(exercise.exercise_type, &e)
            }
        };

        if run.has_failures() {
            let retained = workspace.retain_into(&self.settings.retention_dir);
            info!(retained = %retained.display(), "Submission retained for inspection");
        }
        Ok(run)
    }

    async fn judge_program(
        &self,
        exercise: &Exercise,
        submission: &Path,
        workspace: &Workspace,
    ) -> JudgeResult<JudgeRun> {
        let size = std::fs::metadata(submission)?.len();
        if size > self.settings.max_source_bytes as u64 {
            return Err(JudgeError::Configuration(format!(
                "Source file is {} bytes, limit is {}",
                size, self.settings.max_source_bytes
            )));
        }
        if let Some(tc) = exercise
            .backend_testcases
            .iter()
            .find(|tc| tc.stdin.len() > self.settings.max_stdin_bytes)
        {
            return Err(JudgeError::Configuration(format!(
                "stdin of test case {} exceeds {} bytes",
                tc.id, self.settings.max_stdin_bytes
            )));
        }

        let extension = submission
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default();
        let config = self.languages.for_extension(&extension).ok_or_else(|| {
            JudgeError::Configuration(format!(
                "Unsupported submission type '{}'; supported languages: {}",
                extension,
                self.languages.list_languages().join(", ")
            ))
        })?;

        let file_name = submission
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("submission{}", extension));
        let materialized = workspace.copy_in(submission, &file_name)?;

        info!(language = %config.name, "Dispatching to program judge");
        let judge = judge_for(config);
        let engine = ProcessEngine::new(&self.settings);
        let verdicts = engine
            .judge_submission(judge.as_ref(), &materialized, &exercise.backend_testcases)
            .await;

        Ok(JudgeRun::Program(verdicts))
    }

    async fn judge_ui(
        &self,
        exercise: &Exercise,
        submission: &Path,
        workspace: &Workspace,
    ) -> JudgeResult<JudgeRun> {
        let site = workspace.join("site");
        std::fs::create_dir_all(&site)?;

        let is_page = submission
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
            .unwrap_or(false);
        if is_page {
            let name = submission
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.settings.entry_point.clone());
            std::fs::copy(submission, site.join(name))?;
        } else {
            archive::extract(submission, &site, archive::MAX_UNCOMPRESSED_BYTES)?;
        }

        let entry = archive::find_entry_point(&site, &self.settings.entry_point)?
            .ok_or_else(|| {
                JudgeError::Configuration("No HTML entry point found in submission".to_string())
            })?;
        let entry_url = file_url(&entry)?;
        info!(entry = %entry_url, "Dispatching to UI judge");

        let test_cases = &exercise.frontend_testcases;
        let mut page = match PlaywrightBridge::launch(&self.settings).await {
            Ok(page) => page,
            Err(e) => {
                error!(error = %e, "Browser unavailable; every test case errors");
                let verdicts = test_cases
                    .iter()
                    .map(|tc| UiVerdict::error(tc.display_name(), e.kind(), &e))
                    .collect();
                return Ok(JudgeRun::Ui(verdicts));
            }
        };

        let judge = UiJudge::new(&self.settings);
        let verdicts = judge.run(&mut page, &entry_url, test_cases).await;
        Ok(JudgeRun::Ui(verdicts))
    }
}

/// Rejects exercises that cannot produce a meaningful run
fn validate(exercise: &Exercise) -> JudgeResult<()> {
    if exercise.test_case_count() == 0 {
        return Err(JudgeError::Configuration(format!(
            "Exercise {} declares no test cases",
            exercise.id
        )));
    }

    let ids: Vec<i64> = match exercise.exercise_type {
        ExerciseType::Backend => exercise.backend_testcases.iter().map(|t| t.id).collect(),
        ExerciseType::Frontend => exercise.frontend_testcases.iter().map(|t| t.id).collect(),
    };
    let mut seen = HashSet::new();
    if let Some(dup) = ids.iter().find(|id| !seen.insert(**id)) {
        return Err(JudgeError::Configuration(format!(
            "Duplicate test case id {} in exercise {}",
            dup, exercise.id
        )));
    }
    Ok(())
}

/// Single-verdict run for an error that stopped judging as a whole
fn aborted_run(exercise_type: ExerciseType, e: &JudgeError) -> JudgeRun {
    let label = match e {
        JudgeError::Configuration(_) => CONFIG_TEST_NAME,
        _ => SYSTEM_TEST_NAME,
    };
    JudgeRun::degenerate(exercise_type, label, e.kind(), &e.to_string())
}

/// Drive `work` on its own task; a panic becomes a SystemError run
async fn isolated<F>(exercise_type: ExerciseType, work: F) -> JudgeRun
where
    F: Future<Output = JudgeRun> + Send + 'static,
{
    match tokio::spawn(work).await {
        Ok(run) => run,
        Err(e) => {
            error!(error = %e, "Judging task failed");
            JudgeRun::degenerate(
                exercise_type,
                SYSTEM_TEST_NAME,
                "SystemError",
                &format!("Judging task failed: {}", e),
            )
        }
    }
}

fn file_url(path: &Path) -> JudgeResult<String> {
    let absolute = path.canonicalize()?;
    Url::from_file_path(&absolute)
        .map(String::from)
        .map_err(|_| {
            JudgeError::System(format!(
                "Cannot build a file URL for {}",
                absolute.display()
            ))
        })
}
