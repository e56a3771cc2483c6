// Judge settings shared by the dispatcher and both judges

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Tunable limits and locations for a judging process
///
/// Every field has a default so a partial `judge.json` is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeSettings {
    /// Wall-clock budget per program execution
    pub run_timeout_ms: u64,
    pub compile_timeout_ms: u64,
    /// Delay after each trigger action
    pub settle_delay_ms: u64,
    /// Delay after the reset reload of a trigger-less UI test
    pub reload_settle_ms: u64,
    /// Window for a dialog to appear in `js_alert` tests
    pub dialog_settle_ms: u64,
    /// Bounded wait for `element_not_exists`
    pub hidden_wait_ms: u64,
    pub action_timeout_ms: u64,
    pub navigation_timeout_ms: u64,
    /// Conventional markup entry point preferred inside UI archives
    pub entry_point: String,
    pub work_root: PathBuf,
    pub retention_dir: PathBuf,
    pub node_command: String,
    /// Directory whose node_modules provides `playwright`
    pub bridge_dir: PathBuf,
    pub headless: bool,
    pub max_source_bytes: usize,
    pub max_stdin_bytes: usize,
}

impl Default for JudgeSettings {
    fn default() -> Self {
        let work_root = std::env::temp_dir().join("proctor");
        Self {
            run_timeout_ms: 5000,
            compile_timeout_ms: 30_000,
            settle_delay_ms: 300,
            reload_settle_ms: 200,
            dialog_settle_ms: 1000,
            hidden_wait_ms: 2000,
            action_timeout_ms: 5000,
            navigation_timeout_ms: 15_000,
            entry_point: "index.html".to_string(),
            retention_dir: work_root.join("retained"),
            work_root,
            node_command: "node".to_string(),
            bridge_dir: PathBuf::from("."),
            headless: true,
            max_source_bytes: 1024 * 1024,
            max_stdin_bytes: 10 * 1024 * 1024,
        }
    }
}

impl JudgeSettings {
    /// Apply `PROCTOR_*` environment overrides on top of the loaded values
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok());
        self
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let millis = |key: &str, slot: &mut u64| {
            if let Some(v) = lookup(key).and_then(|v| v.trim().parse().ok()) {
                *slot = v;
            }
        };
        millis("PROCTOR_RUN_TIMEOUT_MS", &mut self.run_timeout_ms);
        millis("PROCTOR_COMPILE_TIMEOUT_MS", &mut self.compile_timeout_ms);
        millis("PROCTOR_SETTLE_DELAY_MS", &mut self.settle_delay_ms);
        millis("PROCTOR_DIALOG_SETTLE_MS", &mut self.dialog_settle_ms);
        millis("PROCTOR_ACTION_TIMEOUT_MS", &mut self.action_timeout_ms);
        millis("PROCTOR_NAVIGATION_TIMEOUT_MS", &mut self.navigation_timeout_ms);

        if let Some(v) = lookup("PROCTOR_WORK_ROOT") {
            self.work_root = PathBuf::from(v);
        }
        if let Some(v) = lookup("PROCTOR_RETENTION_DIR") {
            self.retention_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("PROCTOR_NODE") {
            self.node_command = v;
        }
        if let Some(v) = lookup("PROCTOR_BRIDGE_DIR") {
            self.bridge_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("PROCTOR_HEADLESS") {
            self.headless = !matches!(v.to_lowercase().as_str(), "0" | "false" | "no");
        }
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_millis(self.compile_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn reload_settle(&self) -> Duration {
        Duration::from_millis(self.reload_settle_ms)
    }

    pub fn dialog_settle(&self) -> Duration {
        Duration::from_millis(self.dialog_settle_ms)
    }

    pub fn hidden_wait(&self) -> Duration {
        Duration::from_millis(self.hidden_wait_ms)
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}
