// Command handlers for the proctor-judge binary
use crate::browser::{PageDriver, PlaywrightBridge};
use crate::config::LanguageConfigManager;
use crate::dispatcher::Dispatcher;
use crate::language::{judge_for, locate_program};
use anyhow::{Context, Result};
use proctor_common::config::JudgeSettings;
use proctor_common::report::{aggregate, ScoreReport};
use proctor_common::types::{Exercise, ExerciseType, JudgeRun};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

const RESULTS_START: &str = "---RESULTS_START---";
const RESULTS_END: &str = "---RESULTS_END---";

fn load_exercise(path: &Path) -> Result<Exercise> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read exercise {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse exercise {}", path.display()))
}

/// Best-effort exercise type for an exercise file that did not parse
fn sniff_exercise_type(path: &Path) -> ExerciseType {
    fs::read_to_string(path)
        .ok()
        .and_then(|c| serde_json::from_str::<serde_json::Value>(&c).ok())
        .and_then(|v| {
            v.get("exercise_type")
                .and_then(|t| t.as_str())
                .map(|t| t.eq_ignore_ascii_case("frontend"))
        })
        .map(|frontend| {
            if frontend {
                ExerciseType::Frontend
            } else {
                ExerciseType::Backend
            }
        })
        .unwrap_or(ExerciseType::Backend)
}

/// Report for a run that could not start; one ConfigurationError verdict
fn configuration_report(exercise_id: i64, exercise_type: ExerciseType, e: &anyhow::Error) -> ScoreReport {
    let run = JudgeRun::degenerate(
        exercise_type,
        "Configuration",
        "ConfigurationError",
        &format!("{:#}", e),
    );
    aggregate(exercise_id, exercise_type, run)
}

pub async fn judge(
    languages: LanguageConfigManager,
    settings: JudgeSettings,
    exercise_path: &Path,
    submission: PathBuf,
    output: Option<&Path>,
    verdicts_only: bool,
) -> Result<()> {
    let report: ScoreReport = match load_exercise(exercise_path) {
        Ok(exercise) => {
            let (id, exercise_type) = (exercise.id, exercise.exercise_type);
            info!(exercise_id = id, submission = %submission.display(), "Judging submission");

            let dispatcher = Dispatcher::new(languages, settings);
            let run = dispatcher.judge_or_report(exercise, submission).await;
            aggregate(id, exercise_type, run)
        }
        Err(e) => {
            error!(error = %format!("{:#}", e), "Exercise definition unusable");
            configuration_report(0, sniff_exercise_type(exercise_path), &e)
        }
    };

    write_report(&report, output, verdicts_only)
}

/// `judge` when the language profiles or settings failed to load: the
/// caller still gets a verdict list
pub fn judge_unconfigured(
    load_error: &anyhow::Error,
    exercise_path: &Path,
    output: Option<&Path>,
    verdicts_only: bool,
) -> Result<()> {
    error!(error = %format!("{:#}", load_error), "Judge configuration unusable");
    let report = match load_exercise(exercise_path) {
        Ok(exercise) => configuration_report(exercise.id, exercise.exercise_type, load_error),
        Err(_) => configuration_report(0, sniff_exercise_type(exercise_path), load_error),
    };
    write_report(&report, output, verdicts_only)
}

fn write_report(report: &ScoreReport, output: Option<&Path>, verdicts_only: bool) -> Result<()> {
    info!(score = %report.score, "Score");

    let json = if verdicts_only {
        serde_json::to_string_pretty(&report.details)?
    } else {
        serde_json::to_string_pretty(report)?
    };
    emit(&json, output, &mut io::stdout().lock())?;
    Ok(())
}

/// Write the result JSON; `stdout` between markers if the file is unwritable
fn emit(json: &str, output: Option<&Path>, stdout: &mut dyn Write) -> io::Result<()> {
    match output {
        Some(path) => match fs::write(path, json) {
            Ok(()) => {
                info!(path = %path.display(), "Results written");
                Ok(())
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot write results file, printing instead");
                writeln!(stdout, "{}", RESULTS_START)?;
                writeln!(stdout, "{}", json)?;
                writeln!(stdout, "{}", RESULTS_END)
            }
        },
        None => writeln!(stdout, "{}", json),
    }
}

pub fn list_languages(languages: &LanguageConfigManager) {
    println!("📋 Configured Languages:\n");
    println!(
        "{:<12} {:<10} {:<18} {:<20}",
        "NAME", "VERSION", "KIND", "EXTENSIONS"
    );
    println!("{}", "─".repeat(62));

    for config in languages.configs() {
        println!(
            "{:<12} {:<10} {:<18} {:<20}",
            config.name,
            config.version,
            config.kind.to_string(),
            config.file_extensions.join(", ")
        );
    }
}

pub async fn check(languages: &LanguageConfigManager, settings: &JudgeSettings) -> Result<()> {
    println!("🔍 Toolchains:\n");
    for config in languages.configs() {
        let judge = judge_for(config);
        let missing: Vec<String> = judge
            .toolchain()
            .into_iter()
            .filter(|program| locate_program(program).is_none())
            .collect();

        if missing.is_empty() {
            println!("  ✅ {:<10} ready", config.name);
        } else {
            println!("  ❌ {:<10} missing: {}", config.name, missing.join(", "));
        }
    }

    println!("\n🌐 Browser:\n");
    if locate_program(&settings.node_command).is_none() {
        println!("  ❌ {} not found", settings.node_command);
        return Ok(());
    }

    match PlaywrightBridge::launch(settings).await {
        Ok(mut bridge) => {
            bridge.close().await?;
            println!("  ✅ Playwright Chromium ready");
        }
        Err(e) => println!("  ❌ {}", e),
    }
    Ok(())
}
