//! Browser lifecycle management
//!
//! Pairs the chromiumoxide browser handle with its event handler task and the
//! profile directory it was launched against. The handler MUST be aborted when
//! the browser goes away or it runs indefinitely.

use chromiumoxide::browser::Browser;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Wrapper for Browser, its event handler task, and its profile directory
///
/// Ensures handler is properly cleaned up when the browser is dropped.
pub struct BrowserWrapper {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: Option<PathBuf>,
}

impl BrowserWrapper {
    pub(crate) fn new(browser: Browser, handler: JoinHandle<()>, user_data_dir: PathBuf) -> Self {
        Self {
            browser,
            handler,
            user_data_dir: Some(user_data_dir),
        }
    }

    /// Get reference to inner browser
    pub(crate) fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Close Chrome, stop the handler task, and remove the profile directory.
    ///
    /// Waiting on the Chrome process before removing the directory matters:
    /// Windows fails to remove files Chrome still holds open.
    pub(crate) async fn shutdown(&mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Browser close failed: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Waiting for browser exit failed: {}", e);
        }
        self.handler.abort();
        self.cleanup_temp_dir();
    }

    /// Clean up temp directory (blocking operation)
    ///
    /// Uses blocking `std::fs::remove_dir_all()` because this may be called
    /// from Drop context where async is not available.
    fn cleanup_temp_dir(&mut self) {
        if let Some(path) = self.user_data_dir.take() {
            info!("Cleaning up temp directory: {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(
                    "Failed to clean up temp directory {}: {}. Manual cleanup may be required.",
                    path.display(),
                    e
                );
            }
        }
    }
}

impl Drop for BrowserWrapper {
    fn drop(&mut self) {
        self.handler.abort();
        // Browser::drop() kills the Chrome process if it is still alive

        // Warn if the directory was not cleaned up via the proper shutdown path
        if let Some(dir) = &self.user_data_dir {
            warn!(
                "BrowserWrapper dropped without explicit shutdown. \
                Temp directory will be orphaned: {}",
                dir.display()
            );
        }
    }
}
