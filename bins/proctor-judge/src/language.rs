//! Language judges
//!
//! One `LanguageJudge` per language family. The process engine only asks
//! a judge how to lay out the source, how to build it and how to run it;
//! everything language-specific stays behind this trait.
//!
//! - `Interpreted` runs the source directly
//! - `CompiledNative` builds a binary before the first run
//! - `CompiledManaged` renames the source to the toolchain's fixed entry
//!   point, builds it, and removes class/object files afterwards

use crate::config::{CommandSpec, LanguageConfig, LanguageKind};
use crate::error::{JudgeError, JudgeResult};
use crate::workspace::Workspace;
use std::path::{Path, PathBuf};

/// Source and build paths inside a workspace
#[derive(Debug, Clone)]
pub struct PreparedProgram {
    pub workdir: PathBuf,
    pub source: PathBuf,
    pub binary: PathBuf,
    pub entry: String,
}

/// Fully rendered command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

pub trait LanguageJudge: Send + Sync {
    fn config(&self) -> &LanguageConfig;

    fn name(&self) -> &str {
        &self.config().name
    }

    /// Filename the submission is stored under in the workspace
    fn source_name(&self, submission: &Path) -> String {
        let ext = submission
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("src");
        format!("solution.{}", ext)
    }

    fn prepare(&self, workspace: &Workspace, submission: &Path) -> JudgeResult<PreparedProgram> {
        let name = self.source_name(submission);
        let source = workspace.copy_in(submission, &name)?;
        Ok(PreparedProgram {
            workdir: workspace.path().to_path_buf(),
            source,
            binary: workspace.join("solution"),
            entry: name,
        })
    }

    fn compile_command(&self, program: &PreparedProgram) -> Option<Invocation> {
        self.config().compile.as_ref().map(|spec| render(spec, program))
    }

    fn run_command(&self, program: &PreparedProgram) -> Invocation {
        render(&self.config().run, program)
    }

    /// Post-run artifact removal
    fn cleanup(&self, _workspace: &Workspace) {}

    /// External programs the judge needs on this host
    fn toolchain(&self) -> Vec<String> {
        let config = self.config();
        config
            .compile
            .iter()
            .chain(std::iter::once(&config.run))
            .map(|spec| spec.command.clone())
            .filter(|cmd| !cmd.contains('{'))
            .collect()
    }
}

pub struct Interpreted {
    config: LanguageConfig,
}

impl LanguageJudge for Interpreted {
    fn config(&self) -> &LanguageConfig {
        &self.config
    }

    fn compile_command(&self, _program: &PreparedProgram) -> Option<Invocation> {
        None
    }
}

pub struct CompiledNative {
    config: LanguageConfig,
}

impl LanguageJudge for CompiledNative {
    fn config(&self) -> &LanguageConfig {
        &self.config
    }
}

pub struct CompiledManaged {
    config: LanguageConfig,
}

impl LanguageJudge for CompiledManaged {
    fn config(&self) -> &LanguageConfig {
        &self.config
    }

    fn source_name(&self, submission: &Path) -> String {
        match &self.config.entry_point {
            Some(entry) => entry.clone(),
            None => submission
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "Main.java".to_string()),
        }
    }

    fn cleanup(&self, workspace: &Workspace) {
        workspace.remove_artifacts(&self.config.cleanup_extensions);
    }
}

/// Factory keyed on the profile's declared kind
pub fn judge_for(config: &LanguageConfig) -> Box<dyn LanguageJudge> {
    let config = config.clone();
    match config.kind {
        LanguageKind::Interpreted => Box::new(Interpreted { config }),
        LanguageKind::CompiledNative => Box::new(CompiledNative { config }),
        LanguageKind::CompiledManaged => Box::new(CompiledManaged { config }),
    }
}

fn render(spec: &CommandSpec, program: &PreparedProgram) -> Invocation {
    let entry_stem = Path::new(&program.entry)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let substitute = |arg: &str| {
        arg.replace("{source}", &program.source.to_string_lossy())
            .replace("{binary}", &program.binary.to_string_lossy())
            .replace("{workdir}", &program.workdir.to_string_lossy())
            .replace("{entry_stem}", &entry_stem)
            .replace("{entry}", &program.entry)
    };

    Invocation {
        program: substitute(&spec.command),
        args: spec.args.iter().map(|a| substitute(a)).collect(),
        cwd: program.workdir.clone(),
    }
}

/// Resolve a program name against PATH (or check an explicit path)
pub fn locate_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|p| p.is_file())
}

/// Fail with a setup error if any toolchain program is missing
pub fn ensure_toolchain(judge: &dyn LanguageJudge) -> JudgeResult<()> {
    let missing: Vec<String> = judge
        .toolchain()
        .into_iter()
        .filter(|program| locate_program(program).is_none())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(JudgeError::Setup(format!(
            "Toolchain for '{}' not found: {}",
            judge.name(),
            missing.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LanguageConfigManager;
    use std::fs;

    fn submission(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_interpreted_has_no_compile_step() {
        let manager = LanguageConfigManager::builtin();
        let judge = judge_for(manager.for_extension(".py").unwrap());
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path(), "run-").unwrap();
        let src = submission(root.path(), "upload.py", "print(1)");

        let program = judge.prepare(&ws, &src).unwrap();

        assert!(judge.compile_command(&program).is_none());
        let run = judge.run_command(&program);
        assert_eq!(run.program, "python3");
        assert_eq!(run.args, vec![program.source.to_string_lossy().to_string()]);
        assert!(program.source.ends_with("solution.py"));
    }

    #[test]
    fn test_native_compile_command() {
        let manager = LanguageConfigManager::builtin();
        let judge = judge_for(manager.for_extension(".cpp").unwrap());
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path(), "run-").unwrap();
        let src = submission(root.path(), "a.cpp", "int main(){}");

        let program = judge.prepare(&ws, &src).unwrap();
        let compile = judge.compile_command(&program).unwrap();

        assert_eq!(compile.program, "g++");
        assert!(compile.args.contains(&"-std=c++17".to_string()));
        assert_eq!(
            judge.run_command(&program).program,
            program.binary.to_string_lossy()
        );
        assert_eq!(judge.toolchain(), vec!["g++".to_string()]);
    }

    #[test]
    fn test_managed_renames_to_entry_point() {
        let manager = LanguageConfigManager::builtin();
        let judge = judge_for(manager.for_extension(".java").unwrap());
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path(), "run-").unwrap();
        let src = submission(root.path(), "tmp1234.java", "public class Main {}");

        let program = judge.prepare(&ws, &src).unwrap();

        assert!(ws.join("Main.java").exists());
        assert_eq!(program.entry, "Main.java");
        let compile = judge.compile_command(&program).unwrap();
        assert_eq!(compile.args.last().unwrap(), "Main.java");
        let run = judge.run_command(&program);
        assert_eq!(run.program, "java");
        assert_eq!(run.args.last().unwrap(), "Main");
        assert_eq!(run.cwd, ws.path());
    }

    #[test]
    fn test_locate_program() {
        assert!(locate_program("sh").is_some());
        assert!(locate_program("definitely-not-a-real-toolchain-xyz").is_none());
        assert!(locate_program("/nonexistent/bin/cc").is_none());
    }
}
