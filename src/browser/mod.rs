//! Browser infrastructure: launching Chrome, owning the live session, and the
//! control surface the agent core drives.

mod session;
mod wrapper;

pub use crate::browser_setup::{download_managed_browser, find_browser_executable, launch_browser};
pub use session::Session;
pub use wrapper::BrowserWrapper;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to find browser executable: {0}")]
    NotFound(String),

    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Input dispatch failed: {0}")]
    InputFailed(String),

    #[error("Screenshot failed: {0}")]
    ScreenshotFailed(String),

    #[error("Script evaluation failed: {0}")]
    EvaluationFailed(String),
}

pub type BrowserResult<T> = Result<T, BrowserError>;

/// Fixed viewport extent of a session
///
/// The model reports pointer coordinates normalized to 0-1000 against this
/// extent, so it never changes within a task run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Operations the agent core needs from a live browser.
///
/// [`Session`] is the chromiumoxide implementation; tests drive the agent
/// loop against scripted doubles instead of a real Chrome.
#[async_trait]
pub trait BrowserControl: Send + Sync {
    /// Viewport extent the session was launched with
    fn viewport(&self) -> Viewport;

    /// Load `url` in the session's page
    async fn navigate(&self, url: &str) -> BrowserResult<()>;

    /// Pointer click at pixel coordinates
    async fn click_at(&self, x: f64, y: f64) -> BrowserResult<()>;

    /// Press a named key, optionally with `+`-joined modifiers
    /// (e.g. "Enter", "PageDown", "Control+a")
    async fn press_key(&self, key: &str) -> BrowserResult<()>;

    /// Type text into the focused element, character by character
    async fn type_text(&self, text: &str) -> BrowserResult<()>;

    /// Evaluate a script in page context and return its value
    async fn evaluate(&self, code: &str) -> BrowserResult<serde_json::Value>;

    /// Capture the current visual state as a PNG
    async fn screenshot(&self) -> BrowserResult<Vec<u8>>;

    /// Current page URL
    async fn current_url(&self) -> BrowserResult<String>;

    /// Wait until the page reaches a stable load state, bounded by `timeout`.
    /// Hitting the bound is not an error.
    async fn wait_for_load(&self, timeout: Duration) -> BrowserResult<()>;

    /// Tear the session down. Idempotent; the agent core calls it exactly
    /// once on every exit path.
    async fn close(&mut self);
}
