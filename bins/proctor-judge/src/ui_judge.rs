//! UI Judge - One Browser Session per Submission
//!
//! **Per test case:**
//! `[Reset-or-Persist] → Trigger → Assert → Emit verdict`
//!
//! A test case without a trigger gets a freshly reloaded page. A test case
//! with a trigger runs against whatever state earlier test cases left, so
//! trigger-bearing tests form a sequential narrative over one session.
//!
//! Every failure inside a test case becomes that test's error verdict and
//! the run moves on. The session is closed at the end whatever happened.

use crate::browser::PageDriver;
use crate::css;
use crate::error::{JudgeError, JudgeResult};
use crate::trigger;
use proctor_common::config::JudgeSettings;
use proctor_common::types::{FrontendTestCase, UiVerdict};
use tracing::{debug, info, instrument, warn};

/// Checks made against page state after the trigger has run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageCheck {
    ElementExists,
    TextEquals,
    AttributeEquals,
    ElementNotExists,
    UrlContains,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Assertion {
    Page(PageCheck),
    JsAlert,
}

impl Assertion {
    fn parse(kind: &str) -> Option<Self> {
        let assertion = match kind.trim() {
            "element_exists" => Assertion::Page(PageCheck::ElementExists),
            "text_equals" => Assertion::Page(PageCheck::TextEquals),
            "attribute_equals" => Assertion::Page(PageCheck::AttributeEquals),
            "element_not_exists" | "element_does_not_exist" => {
                Assertion::Page(PageCheck::ElementNotExists)
            }
            "url_contains" => Assertion::Page(PageCheck::UrlContains),
            "js_alert" => Assertion::JsAlert,
            _ => return None,
        };
        Some(assertion)
    }
}

fn missing(field: &str, kind: &str) -> JudgeError {
    JudgeError::Configuration(format!("'{}' is required for {}", field, kind))
}

/// A selector or attribute name; blank counts as missing
fn non_blank<'a>(value: &'a Option<String>, field: &str, kind: &str) -> JudgeResult<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| missing(field, kind))
}

/// An expected value; an empty string is a legitimate expectation
fn present<'a>(value: &'a Option<String>, field: &str, kind: &str) -> JudgeResult<&'a str> {
    value.as_deref().ok_or_else(|| missing(field, kind))
}

pub struct UiJudge {
    settings: JudgeSettings,
}

impl UiJudge {
    pub fn new(settings: &JudgeSettings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }

    /// Evaluate every test case in order against one page session
    ///
    /// Always returns exactly one verdict per test case and closes the page.
    #[instrument(skip_all, fields(entry = %entry_url, test_count = test_cases.len()))]
    pub async fn run(
        &self,
        page: &mut dyn PageDriver,
        entry_url: &str,
        test_cases: &[FrontendTestCase],
    ) -> Vec<UiVerdict> {
        let verdicts = match page.goto(entry_url).await {
            Ok(()) => {
                let mut verdicts = Vec::with_capacity(test_cases.len());
                for test_case in test_cases {
                    verdicts.push(self.judge_case(page, test_case).await);
                }
                verdicts
            }
            Err(e) => {
                warn!(error = %e, "Initial page load failed; every test case errors");
                test_cases
                    .iter()
                    .map(|tc| UiVerdict::error(tc.display_name(), e.kind(), &e))
                    .collect()
            }
        };

        if let Err(e) = page.close().await {
            warn!(error = %e, "Failed to close browser session");
        }
        verdicts
    }

    async fn judge_case(&self, page: &mut dyn PageDriver, test_case: &FrontendTestCase) -> UiVerdict {
        let name = test_case.display_name();
        let verdict = match self.evaluate(page, test_case).await {
            Ok(verdict) => verdict,
            Err(e) => UiVerdict::error(&name, e.kind(), &e),
        };
        info!(test_id = test_case.id, test = %name, result = %verdict.result, "Test result");
        verdict
    }

    async fn evaluate(
        &self,
        page: &mut dyn PageDriver,
        test_case: &FrontendTestCase,
    ) -> JudgeResult<UiVerdict> {
        let trigger = test_case.trigger();
        if trigger.is_none() {
            debug!(test_id = test_case.id, "No trigger; reloading for a clean page");
            page.reload().await?;
            tokio::time::sleep(self.settings.reload_settle()).await;
        }

        match Assertion::parse(&test_case.kind) {
            Some(Assertion::Page(check)) => {
                trigger::run_trigger(page, trigger, self.settings.settle_delay()).await?;
                self.check_page(page, test_case, check).await
            }
            Some(Assertion::JsAlert) => self.assert_alert(page, test_case, trigger).await,
            None => {
                // Later trigger tests may depend on this step having happened
                trigger::run_trigger(page, trigger, self.settings.settle_delay()).await?;
                Ok(UiVerdict::skipped(
                    test_case.display_name(),
                    format!("Unknown test type: {}", test_case.kind.trim()),
                ))
            }
        }
    }

    async fn check_page(
        &self,
        page: &mut dyn PageDriver,
        test_case: &FrontendTestCase,
        check: PageCheck,
    ) -> JudgeResult<UiVerdict> {
        let name = test_case.display_name();
        let kind = test_case.kind.trim();

        match check {
            PageCheck::ElementExists => {
                let selector = non_blank(&test_case.selector, "selector", kind)?;
                if page.is_visible(selector).await? {
                    Ok(UiVerdict::passed(name))
                } else {
                    Ok(UiVerdict::failed(
                        name,
                        format!("Element '{}' does not exist or is not visible", selector),
                    ))
                }
            }
            PageCheck::TextEquals => {
                let selector = non_blank(&test_case.selector, "selector", kind)?;
                let expected = present(&test_case.expected, "expected", kind)?.trim();
                let actual = page.text_content(selector).await?.unwrap_or_default();
                let actual = actual.trim();
                if actual == expected {
                    Ok(UiVerdict::passed(name))
                } else {
                    Ok(UiVerdict::failed(
                        name,
                        format!("Expected text '{}', got '{}'", expected, actual),
                    ))
                }
            }
            PageCheck::AttributeEquals => self.assert_attribute(page, test_case).await,
            PageCheck::ElementNotExists => {
                let selector = non_blank(&test_case.selector, "selector", kind)?;
                if page.wait_hidden(selector, self.settings.hidden_wait()).await? {
                    Ok(UiVerdict::passed(name))
                } else {
                    Ok(UiVerdict::failed(
                        name,
                        format!("Element '{}' is still present or visible", selector),
                    ))
                }
            }
            PageCheck::UrlContains => {
                let expected = present(&test_case.expected, "expected", kind)?;
                let url = page.url().await?;
                if url.contains(expected) {
                    Ok(UiVerdict::passed(name))
                } else {
                    Ok(UiVerdict::failed(
                        name,
                        format!("Expected URL to contain '{}', current URL is '{}'", expected, url),
                    ))
                }
            }
        }
    }

    async fn assert_attribute(
        &self,
        page: &mut dyn PageDriver,
        test_case: &FrontendTestCase,
    ) -> JudgeResult<UiVerdict> {
        let kind = test_case.kind.trim();
        let selector = non_blank(&test_case.selector, "selector", kind)?;
        let attribute = non_blank(&test_case.attribute_name, "attributeName", kind)?;
        let expected = present(&test_case.expected, "expected", kind)?;

        let (actual, expected) = match css::css_property_for(attribute) {
            Some(property) => {
                debug!(property = %property, "Reading computed style");
                let actual = page.computed_style(selector, &property).await?;
                (
                    css::normalize_value(&property, &actual),
                    css::normalize_value(&property, expected),
                )
            }
            None if attribute.eq_ignore_ascii_case("disabled") => {
                let present = page.attribute(selector, "disabled").await?.is_some();
                (present.to_string(), expected.trim().to_string())
            }
            None => (
                page.attribute(selector, attribute).await?.unwrap_or_default(),
                expected.to_string(),
            ),
        };

        if actual == expected {
            Ok(UiVerdict::passed(test_case.display_name()))
        } else {
            Ok(UiVerdict::failed(
                test_case.display_name(),
                format!(
                    "Attribute '{}': expected '{}', got '{}'",
                    attribute, expected, actual
                ),
            ))
        }
    }

    /// The listener is armed before the trigger so a dialog fired by the
    /// very first action is still captured
    async fn assert_alert(
        &self,
        page: &mut dyn PageDriver,
        test_case: &FrontendTestCase,
        trigger: Option<&str>,
    ) -> JudgeResult<UiVerdict> {
        let expected = present(&test_case.expected, "expected", "js_alert")?.trim();

        let dialog = page.arm_dialog().await?;
        trigger::run_trigger(page, trigger, self.settings.settle_delay()).await?;

        let message = match tokio::time::timeout(self.settings.dialog_settle(), dialog).await {
            Ok(Ok(message)) => Some(message),
            _ => None,
        };
        debug!(captured = ?message, "Dialog window closed");

        match message {
            Some(message) if message.trim() == expected => {
                Ok(UiVerdict::passed(test_case.display_name()))
            }
            Some(message) => Ok(UiVerdict::failed(
                test_case.display_name(),
                format!("Expected alert '{}', got '{}'", expected, message.trim()),
            )),
            None => Ok(UiVerdict::failed(
                test_case.display_name(),
                format!("Expected alert '{}', but no dialog appeared", expected),
            )),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakePage;
    use super::*;
    use proctor_common::types::{FAIL_MARKER, PASS_MARKER};

    const ENTRY: &str = "file:///site/index.html";

    fn settings() -> JudgeSettings {
        JudgeSettings {
            settle_delay_ms: 0,
            reload_settle_ms: 0,
            dialog_settle_ms: 100,
            hidden_wait_ms: 50,
            ..JudgeSettings::default()
        }
    }

    fn case(id: i64, kind: &str) -> FrontendTestCase {
        FrontendTestCase {
            id,
            name: format!("case {}", id),
            kind: kind.to_string(),
            selector: None,
            trigger: None,
            expected: None,
            attribute_name: None,
        }
    }

    fn with_selector(mut tc: FrontendTestCase, selector: &str) -> FrontendTestCase {
        tc.selector = Some(selector.to_string());
        tc
    }

    fn with_trigger(mut tc: FrontendTestCase, trigger: &str) -> FrontendTestCase {
        tc.trigger = Some(trigger.to_string());
        tc
    }

    fn with_expected(mut tc: FrontendTestCase, expected: &str) -> FrontendTestCase {
        tc.expected = Some(expected.to_string());
        tc
    }

    fn attribute_case(id: i64, selector: &str, attribute: &str, expected: &str) -> FrontendTestCase {
        let mut tc = with_expected(with_selector(case(id, "attribute_equals"), selector), expected);
        tc.attribute_name = Some(attribute.to_string());
        tc
    }

    async fn run(page: &mut FakePage, cases: &[FrontendTestCase]) -> Vec<UiVerdict> {
        UiJudge::new(&settings()).run(page, ENTRY, cases).await
    }

    #[tokio::test]
    async fn test_stateful_sequencing() {
        let mut page = FakePage::new();
        let cases = vec![
            with_trigger(with_selector(case(1, "element_exists"), "#panel"), "click:#reveal"),
            with_selector(case(2, "element_exists"), "#panel"),
            with_trigger(with_selector(case(3, "element_exists"), "#panel"), "click:#reveal"),
        ];

        let verdicts = run(&mut page, &cases).await;

        assert_eq!(verdicts.len(), 3);
        assert!(verdicts[0].is_passed());
        assert!(verdicts[1].result.starts_with(FAIL_MARKER));
        assert!(verdicts[2].is_passed());
    }

    #[tokio::test]
    async fn test_trigger_tests_persist_state() {
        let mut page = FakePage::new();
        let cases = vec![
            with_trigger(with_selector(case(1, "element_exists"), "#panel"), "click:#reveal"),
            with_trigger(with_selector(case(2, "element_exists"), "#panel"), "hover:#menu"),
        ];

        let verdicts = run(&mut page, &cases).await;

        assert!(verdicts.iter().all(UiVerdict::is_passed));
        assert!(!page.actions.contains(&"reload".to_string()));
    }

    #[tokio::test]
    async fn test_dialog_capture() {
        let mut page = FakePage::new();
        let cases = vec![
            with_expected(with_trigger(case(1, "js_alert"), "click:#alert-btn"), "Hello"),
            with_expected(with_trigger(case(2, "js_alert"), "click:#alert-btn"), "Goodbye"),
            with_expected(with_trigger(case(3, "js_alert"), "click:#reveal"), "Hello"),
        ];

        let verdicts = run(&mut page, &cases).await;

        assert_eq!(verdicts[0].result, PASS_MARKER);
        assert_eq!(
            verdicts[1].result,
            "❌ Failed (Expected alert 'Goodbye', got 'Hello')"
        );
        assert!(verdicts[2].result.contains("no dialog appeared"));
    }

    #[tokio::test]
    async fn test_color_equivalence() {
        let mut page = FakePage::new();
        let cases = vec![
            attribute_case(1, "#title", "color", "green"),
            attribute_case(2, "#title", "background", "white"),
            attribute_case(3, "#title", "COLOR", "#008000"),
            attribute_case(4, "#title", "color", "red"),
        ];

        let verdicts = run(&mut page, &cases).await;

        assert!(verdicts[0].is_passed());
        assert!(verdicts[1].is_passed());
        assert!(verdicts[2].is_passed());
        assert_eq!(
            verdicts[3].result,
            "❌ Failed (Attribute 'color': expected 'rgb(255,0,0)', got 'rgb(0,128,0)')"
        );
    }

    #[tokio::test]
    async fn test_plain_and_boolean_attributes() {
        let mut page = FakePage::new();
        let cases = vec![
            attribute_case(1, "#submit-btn", "disabled", "true"),
            attribute_case(2, "#reveal", "disabled", "false"),
            attribute_case(3, "#link", "href", "/about"),
            attribute_case(4, "#title", "font-family", "Arial"),
        ];

        let verdicts = run(&mut page, &cases).await;

        assert!(verdicts.iter().all(UiVerdict::is_passed), "{:?}", verdicts);
    }

    #[tokio::test]
    async fn test_text_and_url_assertions() {
        let mut page = FakePage::new();
        let cases = vec![
            with_expected(with_selector(case(1, "text_equals"), "#title"), " Welcome"),
            with_expected(with_selector(case(2, "text_equals"), "#nowhere"), "x"),
            with_expected(with_trigger(case(3, "url_contains"), "submit:#form"), "submitted=1"),
            with_expected(case(4, "url_contains"), "checkout"),
        ];

        let verdicts = run(&mut page, &cases).await;

        assert!(verdicts[0].is_passed());
        assert_eq!(verdicts[1].result, "❌ Failed (Expected text 'x', got '')");
        assert!(verdicts[2].is_passed());
        assert!(verdicts[3].result.starts_with(FAIL_MARKER));
    }

    #[tokio::test]
    async fn test_element_not_exists() {
        let mut page = FakePage::new();
        let cases = vec![
            with_selector(case(1, "element_not_exists"), "#panel"),
            with_selector(case(2, "element_not_exists"), "#title"),
            with_trigger(with_selector(case(3, "element_does_not_exist"), "#toast"), "click:#dismiss"),
        ];

        let verdicts = run(&mut page, &cases).await;

        assert!(verdicts[0].is_passed());
        assert_eq!(
            verdicts[1].result,
            "❌ Failed (Element '#title' is still present or visible)"
        );
        assert!(verdicts[2].is_passed());
    }

    #[tokio::test]
    async fn test_unknown_type_still_runs_its_trigger() {
        let mut page = FakePage::new();
        let cases = vec![
            with_trigger(case(1, "scroll_into_view"), "click:#reveal"),
            with_trigger(with_selector(case(2, "element_exists"), "#panel"), "hover:#menu"),
            case(3, "screenshot_matches"),
        ];

        let verdicts = run(&mut page, &cases).await;

        assert_eq!(
            verdicts[0].result,
            "⚠️ Skipped (Unknown test type: scroll_into_view)"
        );
        assert!(verdicts[1].is_passed(), "{:?}", verdicts[1]);
        assert_eq!(
            verdicts[2].result,
            "⚠️ Skipped (Unknown test type: screenshot_matches)"
        );
        assert_eq!(page.actions, vec!["click #reveal", "hover #menu", "reload"]);
    }

    #[tokio::test]
    async fn test_errors_are_per_test_case() {
        let mut page = FakePage::new();
        let cases = vec![
            with_trigger(with_selector(case(1, "element_exists"), "#panel"), "click:#missing"),
            case(2, "text_equals"),
            with_trigger(with_selector(case(3, "element_exists"), "#panel"), "input:#name"),
            with_selector(case(4, "element_exists"), "#title"),
        ];

        let verdicts = run(&mut page, &cases).await;

        assert_eq!(verdicts.len(), 4);
        assert!(verdicts[0].result.starts_with("❌ Error: AutomationError: TimeoutError"));
        assert_eq!(
            verdicts[1].result,
            "❌ Error: ConfigurationError: 'selector' is required for text_equals"
        );
        assert!(verdicts[2].result.starts_with("❌ Error: ConfigurationError"));
        assert!(verdicts[3].is_passed());
    }

    #[tokio::test]
    async fn test_session_closed_after_run() {
        let mut page = FakePage::new();
        run(&mut page, &[with_selector(case(1, "element_exists"), "#title")]).await;
        assert!(page.closed);
    }

    #[tokio::test]
    async fn test_failed_initial_load_errors_every_case() {
        let mut page = FakePage::new();
        page.fail_goto = true;
        let cases = vec![
            with_selector(case(1, "element_exists"), "#title"),
            with_selector(case(2, "element_exists"), "#panel"),
        ];

        let verdicts = run(&mut page, &cases).await;

        assert_eq!(verdicts.len(), 2);
        assert!(verdicts.iter().all(UiVerdict::is_error));
        assert!(page.closed);
    }
}
