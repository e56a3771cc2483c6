//! Trigger Action Interpreter
//!
//! A trigger is a `;`-separated sequence of atomic UI actions:
//!
//! ```text
//! click:<selector>
//! input:<selector>=<value>     value is everything after the first '='
//! hover:<selector>
//! submit:<selector>            submits the matched form programmatically
//! refresh                      full reload, network idle awaited
//! ```
//!
//! The whole string is parsed before anything runs, so a malformed
//! action fails its test case without having touched the page. Actions
//! execute strictly in order, each followed by the settle delay.

use crate::browser::PageDriver;
use crate::error::{JudgeError, JudgeResult};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerAction {
    Click(String),
    Input { selector: String, value: String },
    Hover(String),
    Submit(String),
    Refresh,
}

impl std::fmt::Display for TriggerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerAction::Click(s) => write!(f, "click:{}", s),
            TriggerAction::Input { selector, value } => write!(f, "input:{}={}", selector, value),
            TriggerAction::Hover(s) => write!(f, "hover:{}", s),
            TriggerAction::Submit(s) => write!(f, "submit:{}", s),
            TriggerAction::Refresh => write!(f, "refresh"),
        }
    }
}

fn selector(keyword: &str, raw: &str) -> JudgeResult<String> {
    let selector = raw.trim();
    if selector.is_empty() {
        return Err(JudgeError::Configuration(format!(
            "Selector in '{}' trigger must not be empty",
            keyword
        )));
    }
    Ok(selector.to_string())
}

fn parse_action(action: &str) -> JudgeResult<TriggerAction> {
    if action == "refresh" {
        return Ok(TriggerAction::Refresh);
    }

    let Some((keyword, rest)) = action.split_once(':') else {
        return Err(JudgeError::Configuration(format!(
            "Unsupported trigger action: '{}'",
            action
        )));
    };

    match keyword {
        "click" => Ok(TriggerAction::Click(selector(keyword, rest)?)),
        "hover" => Ok(TriggerAction::Hover(selector(keyword, rest)?)),
        "submit" => Ok(TriggerAction::Submit(selector(keyword, rest)?)),
        "input" => {
            let (target, value) = rest.split_once('=').ok_or_else(|| {
                JudgeError::Configuration(format!(
                    "Invalid 'input' trigger '{}': expected input:<selector>=<value>",
                    action
                ))
            })?;
            Ok(TriggerAction::Input {
                selector: selector(keyword, target)?,
                value: value.to_string(),
            })
        }
        _ => Err(JudgeError::Configuration(format!(
            "Unsupported trigger action: '{}'",
            action
        ))),
    }
}

/// Parse a trigger string. Every `;`-separated segment must be an action,
/// so an empty segment (e.g. a trailing `;`) is rejected.
pub fn parse_trigger(trigger: &str) -> JudgeResult<Vec<TriggerAction>> {
    trigger.split(';').map(str::trim).map(parse_action).collect()
}

/// Execute parsed actions against the page
pub async fn execute_actions(
    page: &mut dyn PageDriver,
    actions: &[TriggerAction],
    settle: Duration,
) -> JudgeResult<()> {
    for (idx, action) in actions.iter().enumerate() {
        debug!(step = idx + 1, total = actions.len(), action = %action, "Trigger action");

        match action {
            TriggerAction::Click(selector) => page.click(selector).await?,
            TriggerAction::Input { selector, value } => page.fill(selector, value).await?,
            TriggerAction::Hover(selector) => page.hover(selector).await?,
            TriggerAction::Submit(selector) => page.submit_form(selector).await?,
            TriggerAction::Refresh => page.reload().await?,
        }

        tokio::time::sleep(settle).await;
    }
    Ok(())
}

/// Parse and run an optional trigger
pub async fn run_trigger(
    page: &mut dyn PageDriver,
    trigger: Option<&str>,
    settle: Duration,
) -> JudgeResult<()> {
    let Some(trigger) = trigger else {
        return Ok(());
    };
    let actions = parse_trigger(trigger)?;
    execute_actions(page, &actions, settle).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui_judge::testing::FakePage;

    #[test]
    fn test_parse_all_actions() {
        let actions = parse_trigger(
            "click:#open; input:#name=Ada Lovelace ;hover: .menu ;submit:form#login;refresh",
        )
        .unwrap();

        assert_eq!(
            actions,
            vec![
                TriggerAction::Click("#open".to_string()),
                TriggerAction::Input {
                    selector: "#name".to_string(),
                    value: "Ada Lovelace".to_string(),
                },
                TriggerAction::Hover(".menu".to_string()),
                TriggerAction::Submit("form#login".to_string()),
                TriggerAction::Refresh,
            ]
        );
    }

    #[test]
    fn test_input_value_keeps_later_equals() {
        let actions = parse_trigger("input:#expr=a=b+c").unwrap();
        assert_eq!(
            actions,
            vec![TriggerAction::Input {
                selector: "#expr".to_string(),
                value: "a=b+c".to_string(),
            }]
        );
    }

    #[test]
    fn test_input_empty_value_allowed() {
        let actions = parse_trigger("input:#q=").unwrap();
        assert_eq!(
            actions,
            vec![TriggerAction::Input {
                selector: "#q".to_string(),
                value: String::new(),
            }]
        );
    }

    #[test]
    fn test_selector_with_pseudo_class() {
        let actions = parse_trigger("click:li:first-child").unwrap();
        assert_eq!(actions, vec![TriggerAction::Click("li:first-child".to_string())]);
    }

    #[test]
    fn test_empty_segment_rejected() {
        let err = parse_trigger("click:#a;").unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
        assert!(err.to_string().contains("Unsupported trigger action: ''"));
        assert!(parse_trigger("click:#a;;click:#b").is_err());
        assert!(parse_trigger(" ; ").is_err());
    }

    #[test]
    fn test_empty_selector_rejected() {
        let err = parse_trigger("click:   ").unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
        assert!(parse_trigger("input:=value").is_err());
    }

    #[test]
    fn test_input_without_equals_rejected() {
        let err = parse_trigger("input:#name").unwrap_err();
        assert!(err.to_string().contains("input:<selector>=<value>"));
    }

    #[test]
    fn test_unknown_keyword_rejected() {
        assert!(parse_trigger("doubleclick:#a").is_err());
        assert!(parse_trigger("#a").is_err());
        assert!(parse_trigger("refresh:now").is_err());
    }

    #[tokio::test]
    async fn test_malformed_trigger_touches_nothing() {
        let mut page = FakePage::new();
        let result = run_trigger(&mut page, Some("click:#reveal;bogus"), Duration::ZERO).await;

        assert!(result.is_err());
        assert!(page.actions.is_empty());
    }

    #[tokio::test]
    async fn test_actions_execute_in_order() {
        let mut page = FakePage::new();
        run_trigger(
            &mut page,
            Some("input:#name=Bob;click:#reveal;hover:#menu;submit:#form;refresh"),
            Duration::ZERO,
        )
        .await
        .unwrap();

        assert_eq!(
            page.actions,
            vec!["fill #name=Bob", "click #reveal", "hover #menu", "submit #form", "reload"]
        );
    }

    #[tokio::test]
    async fn test_action_failure_stops_sequence() {
        let mut page = FakePage::new();
        let result = run_trigger(&mut page, Some("click:#missing;click:#reveal"), Duration::ZERO).await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), "AutomationError");
        assert_eq!(page.actions, vec!["click #missing"]);
    }
}
