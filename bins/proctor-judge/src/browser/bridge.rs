use super::bridge_script::BRIDGE_SCRIPT;
use super::PageDriver;
use crate::error::{JudgeError, JudgeResult};
use async_trait::async_trait;
use proctor_common::config::JudgeSettings;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Extra time granted to a bridge call beyond the browser-side timeout
const RPC_SLACK: Duration = Duration::from_secs(5);

/// Time allowed for the node process to exit after `close`
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct BridgeFault {
    #[serde(default)]
    name: String,
    #[serde(default)]
    message: String,
}

type Reply = Result<Value, BridgeFault>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;
type DialogSlot = Arc<Mutex<Option<oneshot::Sender<String>>>>;

/// One Chromium page driven through a Node.js Playwright process
///
/// Requests are `{"id","method","params"}` lines on the child's stdin;
/// replies are matched back by id by a reader task on its stdout.
pub struct PlaywrightBridge {
    child: Child,
    stdin: Option<ChildStdin>,
    next_id: u64,
    pending: PendingMap,
    dialog: DialogSlot,
    reader: JoinHandle<()>,
    action_timeout: Duration,
    navigation_timeout: Duration,
}

impl PlaywrightBridge {
    /// Start the bridge and open a fresh page in an isolated context
    #[instrument(skip_all, fields(node = %settings.node_command, headless = settings.headless))]
    pub async fn launch(settings: &JudgeSettings) -> JudgeResult<Self> {
        let mut child = Command::new(&settings.node_command)
            .arg("-e")
            .arg(BRIDGE_SCRIPT)
            .current_dir(&settings.bridge_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                JudgeError::Setup(format!(
                    "Failed to start browser bridge '{}': {}",
                    settings.node_command, e
                ))
            })?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| JudgeError::Setup("Browser bridge stdout unavailable".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "bridge", "{}", line);
                }
            });
        }

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let dialog: DialogSlot = Arc::new(Mutex::new(None));
        let reader = tokio::spawn(read_replies(stdout, pending.clone(), dialog.clone()));

        let mut bridge = Self {
            child,
            stdin,
            next_id: 0,
            pending,
            dialog,
            reader,
            action_timeout: settings.action_timeout(),
            navigation_timeout: settings.navigation_timeout(),
        };

        let launch_timeout = settings.navigation_timeout();
        bridge
            .call("launch", json!({ "headless": settings.headless }), launch_timeout)
            .await
            .map_err(|e| JudgeError::Setup(format!("Failed to launch browser: {}", e)))?;

        info!("Browser launched");
        Ok(bridge)
    }

    async fn call(&mut self, method: &str, params: Value, timeout: Duration) -> JudgeResult<Value> {
        self.next_id += 1;
        let id = self.next_id;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let request = json!({ "id": id, "method": method, "params": params });
        let mut line = serde_json::to_vec(&request)
            .map_err(|e| JudgeError::System(format!("Failed to encode bridge request: {}", e)))?;
        line.push(b'\n');

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| JudgeError::Automation("Browser bridge is closed".to_string()))?;
        if let Err(e) = stdin.write_all(&line).await {
            self.pending.lock().await.remove(&id);
            return Err(JudgeError::Automation(format!("Browser bridge is gone: {}", e)));
        }
        stdin.flush().await?;

        match tokio::time::timeout(timeout + RPC_SLACK, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(fault))) => Err(fault_to_error(fault)),
            Ok(Err(_)) => Err(JudgeError::Automation(
                "Browser bridge exited unexpectedly".to_string(),
            )),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(JudgeError::Automation(format!(
                    "Browser did not answer '{}' within {}ms",
                    method,
                    (timeout + RPC_SLACK).as_millis()
                )))
            }
        }
    }

    async fn action(&mut self, method: &str, params: Value) -> JudgeResult<Value> {
        let timeout = self.action_timeout;
        self.call(method, with_timeout(params, timeout), timeout).await
    }
}

fn with_timeout(mut params: Value, timeout: Duration) -> Value {
    if let Value::Object(map) = &mut params {
        map.insert("timeout".to_string(), json!(timeout.as_millis() as u64));
    }
    params
}

fn fault_to_error(fault: BridgeFault) -> JudgeError {
    match fault.name.as_str() {
        "SetupError" => JudgeError::Setup(fault.message),
        "" => JudgeError::Automation(fault.message),
        name => JudgeError::Automation(format!("{}: {}", name, fault.message)),
    }
}

async fn read_replies(stdout: ChildStdout, pending: PendingMap, dialog: DialogSlot) {
    let mut lines = BufReader::new(stdout).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Failed to read from browser bridge");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let message: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed bridge message");
                continue;
            }
        };

        if message.get("event").and_then(Value::as_str) == Some("dialog") {
            let text = message
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            debug!(message = %text, "Dialog captured");
            if let Some(tx) = dialog.lock().await.take() {
                let _ = tx.send(text);
            }
            continue;
        }

        let Some(id) = message.get("id").and_then(Value::as_u64) else {
            continue;
        };
        let ok = message.get("ok").and_then(Value::as_bool).unwrap_or(false);
        let reply = if ok {
            Ok(message.get("result").cloned().unwrap_or(Value::Null))
        } else {
            let fault = message
                .get("error")
                .cloned()
                .and_then(|e| serde_json::from_value::<BridgeFault>(e).ok())
                .unwrap_or(BridgeFault {
                    name: String::new(),
                    message: "unknown bridge error".to_string(),
                });
            Err(fault)
        };

        match pending.lock().await.remove(&id) {
            Some(tx) => {
                let _ = tx.send(reply);
            }
            None => {
                if let Err(fault) = reply {
                    warn!(name = %fault.name, message = %fault.message, "Unsolicited bridge error");
                }
            }
        }
    }

    // Dropping the senders wakes every caller with a closed-channel error
    pending.lock().await.clear();
    dialog.lock().await.take();
}

#[async_trait]
impl PageDriver for PlaywrightBridge {
    async fn goto(&mut self, url: &str) -> JudgeResult<()> {
        let timeout = self.navigation_timeout;
        self.call("goto", with_timeout(json!({ "url": url }), timeout), timeout)
            .await?;
        Ok(())
    }

    async fn reload(&mut self) -> JudgeResult<()> {
        let timeout = self.navigation_timeout;
        self.call("reload", with_timeout(json!({}), timeout), timeout)
            .await?;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> JudgeResult<()> {
        self.action("click", json!({ "selector": selector })).await?;
        Ok(())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> JudgeResult<()> {
        self.action("fill", json!({ "selector": selector, "value": value }))
            .await?;
        Ok(())
    }

    async fn hover(&mut self, selector: &str) -> JudgeResult<()> {
        self.action("hover", json!({ "selector": selector })).await?;
        Ok(())
    }

    async fn submit_form(&mut self, selector: &str) -> JudgeResult<()> {
        self.action("submit", json!({ "selector": selector })).await?;
        Ok(())
    }

    async fn is_visible(&mut self, selector: &str) -> JudgeResult<bool> {
        let value = self.action("isVisible", json!({ "selector": selector })).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn text_content(&mut self, selector: &str) -> JudgeResult<Option<String>> {
        let value = self
            .action("textContent", json!({ "selector": selector }))
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn computed_style(&mut self, selector: &str, property: &str) -> JudgeResult<String> {
        let value = self
            .action(
                "computedStyle",
                json!({ "selector": selector, "property": property }),
            )
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn attribute(&mut self, selector: &str, name: &str) -> JudgeResult<Option<String>> {
        let value = self
            .action("attribute", json!({ "selector": selector, "name": name }))
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn wait_hidden(&mut self, selector: &str, timeout: Duration) -> JudgeResult<bool> {
        let value = self
            .call(
                "waitHidden",
                with_timeout(json!({ "selector": selector }), timeout),
                timeout,
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn url(&mut self) -> JudgeResult<String> {
        let value = self.action("url", json!({})).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn arm_dialog(&mut self) -> JudgeResult<oneshot::Receiver<String>> {
        let (tx, rx) = oneshot::channel();
        *self.dialog.lock().await = Some(tx);
        self.action("armDialog", json!({})).await?;
        Ok(rx)
    }

    async fn close(&mut self) -> JudgeResult<()> {
        if self.stdin.is_none() {
            return Ok(());
        }

        let result = self.action("close", json!({})).await;
        self.stdin.take();

        match tokio::time::timeout(SHUTDOWN_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "Browser bridge exited"),
            _ => {
                warn!("Browser bridge did not exit; killing");
                let _ = self.child.kill().await;
            }
        }
        self.reader.abort();
        info!("Browser closed");

        result.map(|_| ())
    }
}

impl Drop for PlaywrightBridge {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_timeout_adds_millis() {
        let params = with_timeout(json!({ "selector": "#a" }), Duration::from_millis(2500));
        assert_eq!(params["timeout"], json!(2500));
        assert_eq!(params["selector"], json!("#a"));
    }

    #[test]
    fn test_fault_mapping() {
        let err = fault_to_error(BridgeFault {
            name: "TimeoutError".to_string(),
            message: "locator.click: Timeout 5000ms exceeded.".to_string(),
        });
        assert_eq!(err.kind(), "AutomationError");
        assert!(err.to_string().starts_with("TimeoutError: locator.click"));

        let err = fault_to_error(BridgeFault {
            name: "SetupError".to_string(),
            message: "browser not launched".to_string(),
        });
        assert_eq!(err.kind(), "SetupError");
    }

    #[tokio::test]
    async fn test_missing_node_is_setup_error() {
        let settings = JudgeSettings {
            node_command: "definitely-not-node-xyz".to_string(),
            ..JudgeSettings::default()
        };
        let err = PlaywrightBridge::launch(&settings).await.err().unwrap();
        assert_eq!(err.kind(), "SetupError");
    }

    #[tokio::test]
    #[ignore = "requires node with the playwright package and chromium installed"]
    async fn test_real_browser_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("index.html");
        std::fs::write(
            &page,
            r#"<html><body>
                <h1 id="title" style="color: #ff0000">Hi</h1>
                <button id="b" onclick="alert(' Hello ')">go</button>
            </body></html>"#,
        )
        .unwrap();

        let mut bridge = PlaywrightBridge::launch(&JudgeSettings::default()).await.unwrap();
        bridge.goto(&format!("file://{}", page.display())).await.unwrap();

        assert_eq!(bridge.text_content("#title").await.unwrap().as_deref(), Some("Hi"));
        assert_eq!(bridge.text_content("#nope").await.unwrap(), None);
        assert_eq!(
            bridge.computed_style("#title", "color").await.unwrap(),
            "rgb(255, 0, 0)"
        );

        let rx = bridge.arm_dialog().await.unwrap();
        bridge.click("#b").await.unwrap();
        let message = tokio::time::timeout(Duration::from_secs(2), rx).await.unwrap().unwrap();
        assert_eq!(message, " Hello ");

        bridge.close().await.unwrap();
    }
}
