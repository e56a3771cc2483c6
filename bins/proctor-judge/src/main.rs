mod archive;
mod browser;
mod commands;
mod config;
mod css;
mod dispatcher;
mod engine;
mod error;
mod evaluator;
mod language;
mod trigger;
mod ui_judge;
mod workspace;


use anyhow::Result;
use clap::{Parser, Subcommand};
use proctor_common::config::JudgeSettings;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "proctor-judge")]
#[command(about = "Proctor judge - run submissions against exercise test cases", long_about = None)]
struct Cli {
    /// Language profiles (defaults to config/languages.json, else built-ins)
    #[arg(long, global = true)]
    languages: Option<PathBuf>,

    /// Judge settings (defaults to config/judge.json, else built-ins)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Judge one submission and print the score report as JSON
    Judge {
        /// Exercise definition (JSON)
        #[arg(short, long)]
        exercise: PathBuf,

        /// Source file (backend) or zip archive (frontend)
        #[arg(short, long)]
        submission: PathBuf,

        /// Write the JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print only the verdict list
        #[arg(long, default_value = "false")]
        verdicts_only: bool,
    },

    /// List configured language profiles
    Languages,

    /// Probe toolchains and the browser bridge runtime
    Check,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    match std::env::var("PROCTOR_LOG_FORMAT") {
        Ok(format) if format.eq_ignore_ascii_case("json") => builder.json().init(),
        _ => builder.init(),
    }
}

fn load_configuration(cli: &Cli) -> Result<(config::LanguageConfigManager, JudgeSettings)> {
    let languages = match &cli.languages {
        Some(path) => config::LanguageConfigManager::load(path)?,
        None => config::LanguageConfigManager::load_default()?,
    };
    let settings = config::load_settings(cli.settings.as_deref())?;
    Ok((languages, settings))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let loaded = load_configuration(&cli);

    match cli.command {
        Commands::Judge {
            exercise,
            submission,
            output,
            verdicts_only,
        } => match loaded {
            Ok((languages, settings)) => {
                commands::judge(
                    languages,
                    settings,
                    &exercise,
                    submission,
                    output.as_deref(),
                    verdicts_only,
                )
                .await?;
            }
            Err(e) => {
                commands::judge_unconfigured(&e, &exercise, output.as_deref(), verdicts_only)?;
            }
        },
        Commands::Languages => {
            let (languages, _) = loaded?;
            commands::list_languages(&languages);
        }
        Commands::Check => {
            let (languages, settings) = loaded?;
            commands::check(&languages, &settings).await?;
        }
    }

    Ok(())
}
