//! Computer-use browsing agent
//!
//! Drives a multi-turn generative-model conversation against a live Chrome
//! instance via chromiumoxide: the model proposes pointer/keyboard/navigation
//! actions, the agent executes them and feeds screenshots back, until the
//! model answers with a structured JSON result.

pub mod agent;
pub mod browser;
pub mod browser_setup;
pub mod model;
mod utils;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Computer-use model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// URL loaded by the `search` action and as the fallback start page
    #[serde(default = "default_search_url")]
    pub search_url: String,

    /// Upper bound on model round-trips per task
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    #[serde(default)]
    pub browser: BrowserConfig,
}

/// Browser security and launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Disable web security features (Same-Origin Policy, etc.)
    /// WARNING: Only enable for trusted content
    #[serde(default = "default_disable_security")]
    pub disable_security: bool,

    /// Viewport dimensions. The model reports coordinates normalized to
    /// 0-1000 against exactly this extent, so it is fixed per task run.
    #[serde(default)]
    pub window: WindowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_width")]
    pub width: u32,

    #[serde(default = "default_window_height")]
    pub height: u32,
}

fn default_model() -> String {
    "gemini-2.5-computer-use-preview-10-2025".to_string()
}

fn default_search_url() -> String {
    "https://www.google.com".to_string()
}

fn default_max_turns() -> usize {
    20
}

fn default_headless() -> bool {
    true
}

fn default_disable_security() -> bool {
    false // SECURE BY DEFAULT
}

fn default_window_width() -> u32 {
    1440
}

fn default_window_height() -> u32 {
    900
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            search_url: default_search_url(),
            max_turns: default_max_turns(),
            browser: BrowserConfig::default(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            disable_security: default_disable_security(),
            window: WindowConfig::default(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

/// Load config from config.yaml in package root
pub fn load_yaml_config() -> anyhow::Result<Config> {
    let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config.yaml");

    if config_path.exists() {
        let contents = fs::read_to_string(&config_path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    } else {
        Ok(Config::default())
    }
}

pub use agent::{
    ActionOutcome, Agent, AgentError, AutoApprove, SafetyDecision, SafetyPolicy, extract_json,
};
pub use browser::{BrowserControl, BrowserError, BrowserResult, BrowserWrapper, Session, Viewport};
pub use model::{Content, GeminiClient, ModelBackend, ModelError, Part};
