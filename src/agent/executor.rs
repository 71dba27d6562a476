//! Action execution: applies model-issued action requests to the browser
//! session, one at a time, in emission order.

use serde_json::{Map, Value};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{ActionOutcome, SafetyDecision, SafetyPolicy, denormalize};
use crate::browser::{BrowserControl, BrowserResult};
use crate::model::FunctionCall;
use crate::utils::constants::{
    FOCUS_SETTLE, LOAD_SETTLE_TIMEOUT, POST_ACTION_SETTLE, WAIT_ACTION_DURATION,
};

/// Result of running one turn's worth of action requests.
#[derive(Debug)]
pub(crate) struct TurnExecution {
    /// One outcome per executed request, order-preserving. Shorter than the
    /// request list only when the safety gate terminated mid-turn.
    pub outcomes: Vec<ActionOutcome>,
    /// The safety gate ended the turn; remaining requests were abandoned.
    pub terminated: bool,
}

/// A validated action, parsed out of the raw name + argument map.
///
/// Each variant owns its argument requirements, so adding an action never
/// touches the conversation loop.
#[derive(Debug, Clone, PartialEq)]
enum Action {
    OpenBrowser,
    ClickAt {
        x: f64,
        y: f64,
    },
    TypeTextAt {
        x: f64,
        y: f64,
        text: String,
        press_enter: bool,
        clear_before_typing: bool,
    },
    Navigate {
        url: String,
    },
    Search,
    Scroll {
        direction: ScrollDirection,
    },
    Wait,
    RunScript {
        code: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Up => "PageUp",
            Self::Down => "PageDown",
            Self::Left => "ArrowLeft",
            Self::Right => "ArrowRight",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

enum ParseFailure {
    /// Name the executor does not know; reported as `success=false`
    Unsupported(String),
    /// Known action with missing or malformed arguments; reported as an
    /// error-only outcome
    InvalidArgs(String),
}

fn require_f64(args: &Map<String, Value>, name: &str, key: &str) -> Result<f64, ParseFailure> {
    args.get(key).and_then(Value::as_f64).ok_or_else(|| {
        ParseFailure::InvalidArgs(format!("{name} requires numeric '{key}' argument"))
    })
}

fn require_str(args: &Map<String, Value>, name: &str, key: &str) -> Result<String, ParseFailure> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ParseFailure::InvalidArgs(format!("{name} requires '{key}' argument")))
}

fn optional_bool(args: &Map<String, Value>, key: &str, default: bool) -> bool {
    args.get(key).and_then(Value::as_bool).unwrap_or(default)
}

impl Action {
    fn parse(call: &FunctionCall) -> Result<Self, ParseFailure> {
        let name = call.name.as_str();
        let args = &call.args;
        match name {
            "open_web_browser" => Ok(Self::OpenBrowser),
            "click_at" => Ok(Self::ClickAt {
                x: require_f64(args, name, "x")?,
                y: require_f64(args, name, "y")?,
            }),
            "type_text_at" => Ok(Self::TypeTextAt {
                x: require_f64(args, name, "x")?,
                y: require_f64(args, name, "y")?,
                text: require_str(args, name, "text")?,
                press_enter: optional_bool(args, "press_enter", false),
                clear_before_typing: optional_bool(args, "clear_before_typing", true),
            }),
            "navigate" => Ok(Self::Navigate {
                url: require_str(args, name, "url")?,
            }),
            "search" => Ok(Self::Search),
            "scroll_document" => {
                let direction = args
                    .get("direction")
                    .and_then(Value::as_str)
                    .unwrap_or("down");
                ScrollDirection::parse(direction)
                    .map(|direction| Self::Scroll { direction })
                    .ok_or_else(|| {
                        ParseFailure::InvalidArgs(format!(
                            "scroll_document direction must be one of up/down/left/right, got '{direction}'"
                        ))
                    })
            }
            "wait_5_seconds" => Ok(Self::Wait),
            "run_script" => Ok(Self::RunScript {
                code: require_str(args, name, "code")?,
            }),
            other => Err(ParseFailure::Unsupported(other.to_string())),
        }
    }
}

/// Apply one parsed action against the session.
async fn apply<S: BrowserControl + ?Sized>(
    surface: &S,
    name: &str,
    action: Action,
    search_url: &str,
) -> BrowserResult<ActionOutcome> {
    let viewport = surface.viewport();
    match action {
        Action::OpenBrowser => Ok(ActionOutcome::succeeded(name, "Browser is already open.")),
        Action::ClickAt { x, y } => {
            let px = denormalize(x, viewport.width);
            let py = denormalize(y, viewport.height);
            surface.click_at(px, py).await?;
            Ok(ActionOutcome::succeeded(
                name,
                format!("Clicked at ({px}, {py})."),
            ))
        }
        Action::TypeTextAt {
            x,
            y,
            text,
            press_enter,
            clear_before_typing,
        } => {
            let px = denormalize(x, viewport.width);
            let py = denormalize(y, viewport.height);
            surface.click_at(px, py).await?;
            sleep(FOCUS_SETTLE).await;

            if clear_before_typing {
                surface.press_key("Control+a").await?;
                surface.press_key("Backspace").await?;
            }

            surface.type_text(&text).await?;
            if press_enter {
                surface.press_key("Enter").await?;
            }

            Ok(ActionOutcome::succeeded(
                name,
                format!("Typed text at ({px}, {py}): {text}"),
            ))
        }
        Action::Navigate { url } => {
            surface.navigate(&url).await?;
            Ok(ActionOutcome::succeeded(name, format!("Navigated to {url}.")))
        }
        Action::Search => {
            surface.navigate(search_url).await?;
            Ok(ActionOutcome::succeeded(
                name,
                format!("Opened the search page at {search_url}."),
            ))
        }
        Action::Scroll { direction } => {
            surface.press_key(direction.key()).await?;
            Ok(ActionOutcome::succeeded(
                name,
                format!("Scrolled {}.", direction.label()),
            ))
        }
        Action::Wait => {
            sleep(WAIT_ACTION_DURATION).await;
            Ok(ActionOutcome::succeeded(name, "Waited 5 seconds."))
        }
        Action::RunScript { code } => {
            let value = surface.evaluate(&code).await?;
            let mut message = format!("Executed script: {code}");
            if !value.is_null() {
                message.push_str(&format!(" -> {value}"));
            }
            Ok(ActionOutcome::succeeded(name, message))
        }
    }
}

/// Let navigation and rendering triggered by the action settle before the
/// observation is captured.
async fn settle<S: BrowserControl + ?Sized>(surface: &S) {
    let _ = surface.wait_for_load(LOAD_SETTLE_TIMEOUT).await;
    sleep(POST_ACTION_SETTLE).await;
}

/// Execute one turn's action requests sequentially.
///
/// Failures are isolated per action: a browser error in one request is
/// recorded as its outcome and the remaining requests still run. Only the
/// safety gate can cut a turn short.
pub(crate) async fn execute_turn<S: BrowserControl + ?Sized>(
    surface: &S,
    calls: &[FunctionCall],
    policy: &dyn SafetyPolicy,
    search_url: &str,
) -> TurnExecution {
    let mut outcomes = Vec::with_capacity(calls.len());

    for call in calls {
        let mut acknowledged = false;
        if let Some(explanation) = call.safety_review() {
            match policy.review(&explanation) {
                SafetyDecision::Terminate => {
                    info!(action = %call.name, "safety policy terminated the turn");
                    return TurnExecution {
                        outcomes,
                        terminated: true,
                    };
                }
                SafetyDecision::Continue => acknowledged = true,
            }
        }

        debug!(action = %call.name, "executing action");
        let mut outcome = match Action::parse(call) {
            Ok(action) => match apply(surface, &call.name, action, search_url).await {
                Ok(outcome) => {
                    settle(surface).await;
                    outcome
                }
                Err(e) => {
                    warn!(action = %call.name, error = %e, "action failed");
                    ActionOutcome::errored(&call.name, e.to_string())
                }
            },
            Err(ParseFailure::Unsupported(other)) => {
                warn!(action = %other, "model requested unsupported action");
                let outcome = ActionOutcome::failed(&call.name, format!("Unsupported action: {other}"));
                settle(surface).await;
                outcome
            }
            Err(ParseFailure::InvalidArgs(message)) => {
                warn!(action = %call.name, "invalid arguments: {message}");
                ActionOutcome::errored(&call.name, message)
            }
        };
        outcome.safety_acknowledged = acknowledged;
        outcomes.push(outcome);
    }

    TurnExecution {
        outcomes,
        terminated: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AutoApprove;
    use crate::browser::{BrowserError, BrowserResult, Viewport};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted browser double that records every operation.
    struct RecordingSurface {
        ops: Mutex<Vec<String>>,
        fail_navigation: bool,
    }

    impl RecordingSurface {
        fn new() -> Self {
            Self {
                ops: Mutex::new(Vec::new()),
                fail_navigation: false,
            }
        }

        fn failing_navigation() -> Self {
            Self {
                ops: Mutex::new(Vec::new()),
                fail_navigation: true,
            }
        }

        fn record(&self, op: String) {
            self.ops.lock().unwrap().push(op);
        }

        fn ops(&self) -> Vec<String> {
            self.ops.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BrowserControl for RecordingSurface {
        fn viewport(&self) -> Viewport {
            Viewport {
                width: 1000,
                height: 1000,
            }
        }

        async fn navigate(&self, url: &str) -> BrowserResult<()> {
            if self.fail_navigation {
                return Err(BrowserError::NavigationFailed("connection refused".into()));
            }
            self.record(format!("navigate {url}"));
            Ok(())
        }

        async fn click_at(&self, x: f64, y: f64) -> BrowserResult<()> {
            self.record(format!("click {x},{y}"));
            Ok(())
        }

        async fn press_key(&self, key: &str) -> BrowserResult<()> {
            self.record(format!("key {key}"));
            Ok(())
        }

        async fn type_text(&self, text: &str) -> BrowserResult<()> {
            self.record(format!("type {text}"));
            Ok(())
        }

        async fn evaluate(&self, code: &str) -> BrowserResult<serde_json::Value> {
            self.record(format!("eval {code}"));
            Ok(serde_json::Value::Null)
        }

        async fn screenshot(&self) -> BrowserResult<Vec<u8>> {
            Ok(vec![1, 2, 3])
        }

        async fn current_url(&self) -> BrowserResult<String> {
            Ok("https://example.com/".to_string())
        }

        async fn wait_for_load(&self, _timeout: Duration) -> BrowserResult<()> {
            Ok(())
        }

        async fn close(&mut self) {}
    }

    fn call(name: &str, args: serde_json::Value) -> FunctionCall {
        FunctionCall {
            name: name.to_string(),
            args: args.as_object().cloned().unwrap_or_default(),
        }
    }

    struct DenyAll;

    impl SafetyPolicy for DenyAll {
        fn review(&self, _explanation: &str) -> SafetyDecision {
            SafetyDecision::Terminate
        }
    }

    #[tokio::test(start_paused = true)]
    async fn one_outcome_per_request_in_order() {
        let surface = RecordingSurface::new();
        let calls = vec![
            call("navigate", serde_json::json!({"url": "https://example.com"})),
            call("click_at", serde_json::json!({"x": 500, "y": 500})),
            call("scroll_document", serde_json::json!({"direction": "down"})),
        ];

        let execution = execute_turn(&surface, &calls, &AutoApprove, "https://www.google.com").await;

        assert!(!execution.terminated);
        assert_eq!(execution.outcomes.len(), 3);
        assert_eq!(execution.outcomes[0].name, "navigate");
        assert_eq!(execution.outcomes[1].name, "click_at");
        assert_eq!(execution.outcomes[2].name, "scroll_document");
        assert!(execution.outcomes.iter().all(|o| o.success == Some(true)));
    }

    #[tokio::test(start_paused = true)]
    async fn click_coordinates_are_denormalized() {
        let surface = RecordingSurface::new();
        let calls = vec![call("click_at", serde_json::json!({"x": 250, "y": 750}))];

        execute_turn(&surface, &calls, &AutoApprove, "https://www.google.com").await;

        // 1000x1000 viewport: 250/1000 -> 250, 750/1000 -> 750
        assert_eq!(surface.ops(), vec!["click 250,750"]);
    }

    #[tokio::test(start_paused = true)]
    async fn type_text_clears_field_and_submits() {
        let surface = RecordingSurface::new();
        let calls = vec![call(
            "type_text_at",
            serde_json::json!({"x": 0, "y": 0, "text": "rust", "press_enter": true}),
        )];

        let execution = execute_turn(&surface, &calls, &AutoApprove, "https://www.google.com").await;

        assert_eq!(
            surface.ops(),
            vec![
                "click 0,0",
                "key Control+a",
                "key Backspace",
                "type rust",
                "key Enter"
            ]
        );
        assert_eq!(execution.outcomes[0].success, Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn unsupported_action_yields_failure_outcome() {
        let surface = RecordingSurface::new();
        let calls = vec![call("hover_at", serde_json::json!({"x": 1, "y": 2}))];

        let execution = execute_turn(&surface, &calls, &AutoApprove, "https://www.google.com").await;

        assert_eq!(execution.outcomes.len(), 1);
        assert_eq!(execution.outcomes[0].success, Some(false));
        assert!(execution.outcomes[0].error.is_none());
        assert!(surface.ops().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_argument_yields_error_outcome() {
        let surface = RecordingSurface::new();
        let calls = vec![call("navigate", serde_json::json!({}))];

        let execution = execute_turn(&surface, &calls, &AutoApprove, "https://www.google.com").await;

        let outcome = &execution.outcomes[0];
        assert!(outcome.success.is_none());
        assert!(outcome.error.as_deref().unwrap().contains("url"));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_isolated_per_action() {
        let surface = RecordingSurface::failing_navigation();
        let calls = vec![
            call("navigate", serde_json::json!({"url": "https://example.com"})),
            call("wait_5_seconds", serde_json::json!({})),
        ];

        let execution = execute_turn(&surface, &calls, &AutoApprove, "https://www.google.com").await;

        assert_eq!(execution.outcomes.len(), 2);
        assert!(execution.outcomes[0].success.is_none());
        assert!(execution.outcomes[0].error.is_some());
        assert_eq!(execution.outcomes[1].success, Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn terminate_abandons_remaining_actions() {
        let surface = RecordingSurface::new();
        let calls = vec![
            call("scroll_document", serde_json::json!({"direction": "down"})),
            call(
                "click_at",
                serde_json::json!({
                    "x": 1, "y": 2,
                    "safety_decision": {"explanation": "destructive click"}
                }),
            ),
            call("wait_5_seconds", serde_json::json!({})),
        ];

        let execution = execute_turn(&surface, &calls, &DenyAll, "https://www.google.com").await;

        assert!(execution.terminated);
        assert_eq!(execution.outcomes.len(), 1);
        assert_eq!(execution.outcomes[0].name, "scroll_document");
        // The gated click and everything after it never reached the browser
        assert_eq!(surface.ops(), vec!["key PageDown"]);
    }

    #[tokio::test(start_paused = true)]
    async fn approved_review_sets_acknowledgement() {
        let surface = RecordingSurface::new();
        let calls = vec![call(
            "click_at",
            serde_json::json!({
                "x": 1, "y": 2,
                "safety_decision": {"explanation": "login button"}
            }),
        )];

        let execution = execute_turn(&surface, &calls, &AutoApprove, "https://www.google.com").await;

        assert!(!execution.terminated);
        assert!(execution.outcomes[0].safety_acknowledged);
    }

    #[tokio::test(start_paused = true)]
    async fn search_opens_configured_engine() {
        let surface = RecordingSurface::new();
        let calls = vec![call("search", serde_json::json!({}))];

        execute_turn(&surface, &calls, &AutoApprove, "https://duckduckgo.com").await;

        assert_eq!(surface.ops(), vec!["navigate https://duckduckgo.com"]);
    }
}
