//! Shared configuration constants
//!
//! Default values and timing constants used throughout the codebase to
//! ensure consistency and avoid magic numbers.

use std::time::Duration;

/// Chrome user agent string for stealth mode
///
/// Updated: 2025-01-29 to Chrome 132 (current stable)
/// Next update: 2025-04-29 (quarterly schedule)
///
/// Chrome releases new stable versions ~every 4 weeks.
/// Update quarterly to stay within reasonable version window.
///
/// Reference: https://chromiumdash.appspot.com/schedule
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

/// Timeout for a single navigation (goto) to commit
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on waiting for the page to reach a stable load state after an
/// action. Hitting this bound is not an error; the next screenshot simply
/// shows whatever rendered so far.
pub const LOAD_SETTLE_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Fixed delay after each executed action, absorbing rendering latency so the
/// observation sent back to the model is representative.
pub const POST_ACTION_SETTLE: Duration = Duration::from_secs(1);

/// Pause between clicking a text target and typing into it
pub const FOCUS_SETTLE: Duration = Duration::from_millis(100);

/// Duration of the model-requested `wait_5_seconds` action
pub const WAIT_ACTION_DURATION: Duration = Duration::from_secs(5);
