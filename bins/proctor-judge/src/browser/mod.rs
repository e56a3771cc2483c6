//! Browser session abstraction for the UI judge.
//!
//! A `PageDriver` is one page in one isolated browser context. The UI judge
//! receives it as an owned handle and threads it explicitly through every
//! test case, so page state persists between trigger-bearing tests.
//!
//! Production sessions come from [`PlaywrightBridge`], which drives Chromium
//! through a Node.js Playwright process over newline-delimited JSON.

mod bridge;
mod bridge_script;

pub use bridge::PlaywrightBridge;

use crate::error::JudgeResult;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::oneshot;

#[async_trait]
pub trait PageDriver: Send {
    /// Navigate and wait for network idle
    async fn goto(&mut self, url: &str) -> JudgeResult<()>;

    /// Full reload, network idle awaited
    async fn reload(&mut self) -> JudgeResult<()>;

    async fn click(&mut self, selector: &str) -> JudgeResult<()>;

    async fn fill(&mut self, selector: &str, value: &str) -> JudgeResult<()>;

    async fn hover(&mut self, selector: &str) -> JudgeResult<()>;

    /// Programmatically submit the matched form
    async fn submit_form(&mut self, selector: &str) -> JudgeResult<()>;

    /// First match exists and is visible
    async fn is_visible(&mut self, selector: &str) -> JudgeResult<bool>;

    /// Text content of the first match, `None` when nothing matches
    async fn text_content(&mut self, selector: &str) -> JudgeResult<Option<String>>;

    async fn computed_style(&mut self, selector: &str, property: &str) -> JudgeResult<String>;

    async fn attribute(&mut self, selector: &str, name: &str) -> JudgeResult<Option<String>>;

    /// Wait until the selector is hidden or absent; false on timeout
    async fn wait_hidden(&mut self, selector: &str, timeout: Duration) -> JudgeResult<bool>;

    async fn url(&mut self) -> JudgeResult<String>;

    /// Arm a one-shot dialog listener. The next dialog's message is sent
    /// on the returned channel and the dialog is dismissed immediately.
    async fn arm_dialog(&mut self) -> JudgeResult<oneshot::Receiver<String>>;

    async fn close(&mut self) -> JudgeResult<()>;
}
