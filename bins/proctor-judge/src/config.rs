// Language profile and judge settings loading
use anyhow::{bail, Context, Result};
use proctor_common::config::JudgeSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

pub const DEFAULT_LANGUAGES_PATH: &str = "config/languages.json";
pub const DEFAULT_SETTINGS_PATH: &str = "config/judge.json";

/// How a language turns source into something runnable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageKind {
    Interpreted,
    CompiledNative,
    CompiledManaged,
}

impl fmt::Display for LanguageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LanguageKind::Interpreted => write!(f, "interpreted"),
            LanguageKind::CompiledNative => write!(f, "compiled_native"),
            LanguageKind::CompiledManaged => write!(f, "compiled_managed"),
        }
    }
}

/// A program invocation with `{source}`, `{binary}`, `{workdir}`,
/// `{entry}` and `{entry_stem}` placeholders in its arguments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(command: &str, args: &[&str]) -> Self {
        Self {
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub kind: LanguageKind,
    pub file_extensions: Vec<String>,
    #[serde(default)]
    pub compile: Option<CommandSpec>,
    pub run: CommandSpec,
    /// Fixed source filename the toolchain requires
    #[serde(default)]
    pub entry_point: Option<String>,
    /// Build artifacts removed after the run
    #[serde(default)]
    pub cleanup_extensions: Vec<String>,
}

fn default_version() -> String {
    "latest".to_string()
}

impl LanguageConfig {
    /// Whether `ext` (with or without the leading dot) selects this profile
    pub fn matches_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        self.file_extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LanguagesJson {
    languages: Vec<LanguageConfig>,
}

/// Language configuration manager
#[derive(Debug, Clone)]
pub struct LanguageConfigManager {
    configs: HashMap<String, LanguageConfig>,
}

impl LanguageConfigManager {
    /// Load language configurations from languages.json
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Language config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let languages_json: LanguagesJson = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Self::from_configs(languages_json.languages)
    }

    /// Load from config/languages.json, or the built-in profiles when absent
    pub fn load_default() -> Result<Self> {
        let default_path = Path::new(DEFAULT_LANGUAGES_PATH);
        if default_path.exists() {
            Self::load(default_path)
        } else {
            debug!("{} not found, using built-in language profiles", DEFAULT_LANGUAGES_PATH);
            Ok(Self::builtin())
        }
    }

    pub fn from_configs(languages: Vec<LanguageConfig>) -> Result<Self> {
        let mut configs = HashMap::new();
        for lang in languages {
            if lang.file_extensions.is_empty() {
                bail!("Language '{}' declares no file extensions", lang.name);
            }
            if lang.kind != LanguageKind::Interpreted && lang.compile.is_none() {
                bail!("Language '{}' is {} but has no compile command", lang.name, lang.kind);
            }
            if configs.insert(lang.name.clone(), lang).is_some() {
                bail!("Duplicate language profile in configuration");
            }
        }

        if configs.is_empty() {
            bail!("No languages configured");
        }

        Ok(Self { configs })
    }

    /// Python, C++ and Java profiles
    pub fn builtin() -> Self {
        let languages = vec![
            LanguageConfig {
                name: "python".to_string(),
                version: "3".to_string(),
                kind: LanguageKind::Interpreted,
                file_extensions: vec![".py".to_string()],
                compile: None,
                run: CommandSpec::new("python3", &["{source}"]),
                entry_point: None,
                cleanup_extensions: vec![],
            },
            LanguageConfig {
                name: "cpp".to_string(),
                version: "17".to_string(),
                kind: LanguageKind::CompiledNative,
                file_extensions: vec![".cpp".to_string(), ".cc".to_string(), ".cxx".to_string()],
                compile: Some(CommandSpec::new(
                    "g++",
                    &["{source}", "-o", "{binary}", "-std=c++17"],
                )),
                run: CommandSpec::new("{binary}", &[]),
                entry_point: None,
                cleanup_extensions: vec![],
            },
            LanguageConfig {
                name: "java".to_string(),
                version: "17".to_string(),
                kind: LanguageKind::CompiledManaged,
                file_extensions: vec![".java".to_string()],
                compile: Some(CommandSpec::new("javac", &["-encoding", "UTF-8", "{entry}"])),
                run: CommandSpec::new("java", &["-cp", "{workdir}", "{entry_stem}"]),
                entry_point: Some("Main.java".to_string()),
                cleanup_extensions: vec![".class".to_string()],
            },
        ];

        let configs = languages
            .into_iter()
            .map(|lang| (lang.name.clone(), lang))
            .collect();
        Self { configs }
    }

    /// Profile selected by a submission file extension
    pub fn for_extension(&self, ext: &str) -> Option<&LanguageConfig> {
        let mut matches: Vec<&LanguageConfig> = self
            .configs
            .values()
            .filter(|c| c.matches_extension(ext))
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name));
        if matches.len() > 1 {
            warn!(extension = ext, "Extension claimed by several profiles, using '{}'", matches[0].name);
        }
        matches.into_iter().next()
    }

    /// All profiles, ordered by name
    pub fn configs(&self) -> Vec<&LanguageConfig> {
        let mut all: Vec<&LanguageConfig> = self.configs.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// List all supported languages
    pub fn list_languages(&self) -> Vec<String> {
        self.configs().into_iter().map(|c| c.name.clone()).collect()
    }
}

/// Load judge settings from a JSON file (optional) plus environment overrides
pub fn load_settings(path: Option<&Path>) -> Result<JudgeSettings> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_SETTINGS_PATH));

    let settings = if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?
    } else {
        debug!("{} not found, using default judge settings", path.display());
        JudgeSettings::default()
    };

    Ok(settings.with_env_overrides())
}
