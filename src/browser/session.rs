//! Live browser session: one Chrome instance, one page, one task run.

use async_trait::async_trait;
use chromiumoxide::layout::Point;
use chromiumoxide::page::{Page, ScreenshotParams};
use chromiumoxide_cdp::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType,
};
use chromiumoxide_cdp::cdp::browser_protocol::page::CaptureScreenshotFormat;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::wrapper::BrowserWrapper;
use super::{BrowserControl, BrowserError, BrowserResult, Viewport};
use crate::Config;
use crate::utils::constants::{LOAD_SETTLE_TIMEOUT, NAVIGATION_TIMEOUT};

/// One live browser instance plus its navigation context.
///
/// Created at task start, torn down exactly once at task end via
/// [`BrowserControl::close`]. The [`BrowserWrapper`] drop impl is the backstop
/// against leaking a Chrome process on panic paths.
pub struct Session {
    wrapper: BrowserWrapper,
    page: Page,
    viewport: Viewport,
    closed: bool,
}

impl Session {
    /// Launch Chrome with an isolated profile and open a blank page.
    pub async fn launch(config: &Config) -> BrowserResult<Self> {
        let viewport = Viewport {
            width: config.browser.window.width,
            height: config.browser.window.height,
        };

        // Unique profile per task run; batch callers run many tasks from one
        // process, so the process id alone would collide.
        let profile_dir = std::env::temp_dir().join(format!("webscout_profile_{}", Uuid::new_v4()));

        let (browser, handler, user_data_dir) = crate::browser_setup::launch_browser(
            config.browser.headless,
            (viewport.width, viewport.height),
            Some(profile_dir),
            config.browser.disable_security,
        )
        .await
        .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let wrapper = BrowserWrapper::new(browser, handler, user_data_dir);

        let page = wrapper
            .browser()
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::PageCreationFailed(e.to_string()))?;

        info!(
            width = viewport.width,
            height = viewport.height,
            "browser session started"
        );

        Ok(Self {
            wrapper,
            page,
            viewport,
            closed: false,
        })
    }

    /// Dispatch one key chord: down, optional char, up.
    async fn dispatch_key(&self, key: &str, modifiers: i64) -> BrowserResult<()> {
        let spec = KeySpec::for_key(key);

        let mut down = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::KeyDown)
            .key(key.to_string())
            .code(spec.code.clone())
            .modifiers(modifiers);
        if let Some(vk) = spec.virtual_key_code {
            down = down
                .windows_virtual_key_code(vk)
                .native_virtual_key_code(vk);
        }
        self.page
            .execute(down.build().map_err(BrowserError::InputFailed)?)
            .await
            .map_err(|e| BrowserError::InputFailed(e.to_string()))?;

        // Keys that produce text need a Char event, except inside a chord
        // (Ctrl+a must select, not insert an 'a').
        if modifiers == 0
            && let Some(text) = &spec.text
        {
            let ch = DispatchKeyEventParams::builder()
                .r#type(DispatchKeyEventType::Char)
                .key(key.to_string())
                .code(spec.code.clone())
                .text(text.clone())
                .build()
                .map_err(BrowserError::InputFailed)?;
            self.page
                .execute(ch)
                .await
                .map_err(|e| BrowserError::InputFailed(e.to_string()))?;
        }

        let mut up = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::KeyUp)
            .key(key.to_string())
            .code(spec.code)
            .modifiers(modifiers);
        if let Some(vk) = spec.virtual_key_code {
            up = up.windows_virtual_key_code(vk).native_virtual_key_code(vk);
        }
        self.page
            .execute(up.build().map_err(BrowserError::InputFailed)?)
            .await
            .map_err(|e| BrowserError::InputFailed(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl BrowserControl for Session {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    async fn navigate(&self, url: &str) -> BrowserResult<()> {
        let parsed = url::Url::parse(url).map_err(|e| BrowserError::InvalidUrl(e.to_string()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(BrowserError::InvalidUrl(format!(
                "URL must start with http:// or https://, got: {url}"
            )));
        }

        debug!(url, "navigating");
        timeout(NAVIGATION_TIMEOUT, self.page.goto(url))
            .await
            .map_err(|_| {
                BrowserError::NavigationFailed(format!(
                    "Navigation timeout after {}ms for URL: {url}",
                    NAVIGATION_TIMEOUT.as_millis()
                ))
            })?
            .map_err(|e| BrowserError::NavigationFailed(format!("{url}: {e}")))?;

        // Redirect chains and SPA boot can outlive goto; give the lifecycle a
        // bounded chance to finish.
        let _ = timeout(LOAD_SETTLE_TIMEOUT, self.page.wait_for_navigation()).await;
        Ok(())
    }

    async fn click_at(&self, x: f64, y: f64) -> BrowserResult<()> {
        debug!(x, y, "click");
        self.page
            .click(Point { x, y })
            .await
            .map_err(|e| BrowserError::InputFailed(format!("click at ({x}, {y}): {e}")))?;
        Ok(())
    }

    async fn press_key(&self, key: &str) -> BrowserResult<()> {
        debug!(key, "key press");
        let parts: Vec<&str> = key.split('+').collect();
        let (modifier_parts, key_name) = match parts.split_last() {
            Some((last, mods)) => (mods, *last),
            None => return Err(BrowserError::InputFailed("empty key".into())),
        };

        // CDP modifier bitmask: Alt=1, Ctrl=2, Meta=4, Shift=8
        let mut modifiers = 0i64;
        for part in modifier_parts {
            modifiers |= match part.to_ascii_lowercase().as_str() {
                "alt" => 1,
                "control" | "ctrl" => 2,
                "meta" | "cmd" | "command" => 4,
                "shift" => 8,
                other => {
                    return Err(BrowserError::InputFailed(format!(
                        "unknown modifier '{other}' in '{key}'"
                    )));
                }
            };
        }

        self.dispatch_key(key_name, modifiers).await
    }

    async fn type_text(&self, text: &str) -> BrowserResult<()> {
        debug!(chars = text.chars().count(), "typing");
        for ch in text.chars() {
            if ch == '\n' {
                self.dispatch_key("Enter", 0).await?;
            } else if ch == '\t' {
                self.dispatch_key("Tab", 0).await?;
            } else {
                let params = DispatchKeyEventParams::builder()
                    .r#type(DispatchKeyEventType::Char)
                    .text(ch.to_string())
                    .build()
                    .map_err(BrowserError::InputFailed)?;
                self.page
                    .execute(params)
                    .await
                    .map_err(|e| BrowserError::InputFailed(e.to_string()))?;
            }

            // Natural typing cadence; some inputs drop events fired
            // back-to-back.
            let delay = 30 + (rand::random::<u64>() % 31); // 30-60ms
            sleep(Duration::from_millis(delay)).await;
        }
        Ok(())
    }

    async fn evaluate(&self, code: &str) -> BrowserResult<serde_json::Value> {
        debug!(
            code = code.chars().take(100).collect::<String>(),
            "evaluating script"
        );
        let result = self
            .page
            .evaluate(code)
            .await
            .map_err(|e| BrowserError::EvaluationFailed(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn screenshot(&self) -> BrowserResult<Vec<u8>> {
        self.page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .build(),
            )
            .await
            .map_err(|e| BrowserError::ScreenshotFailed(e.to_string()))
    }

    async fn current_url(&self) -> BrowserResult<String> {
        Ok(self
            .page
            .url()
            .await
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn wait_for_load(&self, limit: Duration) -> BrowserResult<()> {
        match timeout(limit, self.page.wait_for_navigation()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => {
                // Not worth failing the action over; the screenshot will show
                // whatever state the page is in.
                warn!("wait for load state failed: {}", e);
                Ok(())
            }
            Err(_) => {
                debug!("load state wait hit {}ms bound", limit.as_millis());
                Ok(())
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        info!("closing browser session");
        let _ = self.page.clone().close().await;
        self.wrapper.shutdown().await;
    }
}

/// CDP key event fields for a named key
struct KeySpec {
    code: String,
    text: Option<String>,
    virtual_key_code: Option<i64>,
}

impl KeySpec {
    fn for_key(key: &str) -> Self {
        let (code, text, vk): (&str, Option<&str>, Option<i64>) = match key {
            "Enter" => ("Enter", Some("\r"), Some(13)),
            "Tab" => ("Tab", Some("\t"), Some(9)),
            "Escape" => ("Escape", None, Some(27)),
            "Backspace" => ("Backspace", None, Some(8)),
            "Delete" => ("Delete", None, Some(46)),
            "ArrowUp" => ("ArrowUp", None, Some(38)),
            "ArrowDown" => ("ArrowDown", None, Some(40)),
            "ArrowLeft" => ("ArrowLeft", None, Some(37)),
            "ArrowRight" => ("ArrowRight", None, Some(39)),
            "Home" => ("Home", None, Some(36)),
            "End" => ("End", None, Some(35)),
            "PageUp" => ("PageUp", None, Some(33)),
            "PageDown" => ("PageDown", None, Some(34)),
            "Space" => ("Space", Some(" "), Some(32)),
            _ => ("", None, None),
        };

        if !code.is_empty() {
            return Self {
                code: code.to_string(),
                text: text.map(str::to_string),
                virtual_key_code: vk,
            };
        }

        // Single printable characters: derive code and text from the char
        let mut chars = key.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => Self {
                code: format!("Key{}", c.to_ascii_uppercase()),
                text: Some(c.to_string()),
                virtual_key_code: Some(c.to_ascii_uppercase() as i64),
            },
            (Some(c), None) if c.is_ascii_digit() => Self {
                code: format!("Digit{c}"),
                text: Some(c.to_string()),
                virtual_key_code: Some(c as i64),
            },
            _ => Self {
                code: key.to_string(),
                text: None,
                virtual_key_code: None,
            },
        }
    }
}
