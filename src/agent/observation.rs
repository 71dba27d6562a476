//! Observation packaging: post-turn screenshot + URL wrapped into the model's
//! function-response shape.

use tracing::debug;

use super::{ActionOutcome, AgentResult};
use crate::browser::BrowserControl;
use crate::model::{Blob, FunctionResponse, FunctionResponsePart, Part};

/// Build one function-response part per outcome, preserving the 1:1 mapping
/// with the turn's action requests.
///
/// The screenshot and URL are captured once per turn and shared across all of
/// the turn's responses; the model always sees post-action state.
pub(crate) async fn build_turn_responses<S: BrowserControl + ?Sized>(
    surface: &S,
    outcomes: Vec<ActionOutcome>,
) -> AgentResult<Vec<Part>> {
    let screenshot = surface.screenshot().await?;
    let url = surface.current_url().await?;
    debug!(
        outcomes = outcomes.len(),
        screenshot_bytes = screenshot.len(),
        %url,
        "captured observation"
    );

    let image = Blob::png(&screenshot);

    Ok(outcomes
        .into_iter()
        .map(|outcome| {
            Part::FunctionResponse(FunctionResponse {
                name: outcome.name.clone(),
                response: outcome.into_response(&url),
                parts: vec![FunctionResponsePart {
                    inline_data: image.clone(),
                }],
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{BrowserResult, Viewport};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingSurface {
        screenshots: AtomicUsize,
    }

    #[async_trait]
    impl BrowserControl for CountingSurface {
        fn viewport(&self) -> Viewport {
            Viewport {
                width: 1440,
                height: 900,
            }
        }

        async fn navigate(&self, _url: &str) -> BrowserResult<()> {
            Ok(())
        }

        async fn click_at(&self, _x: f64, _y: f64) -> BrowserResult<()> {
            Ok(())
        }

        async fn press_key(&self, _key: &str) -> BrowserResult<()> {
            Ok(())
        }

        async fn type_text(&self, _text: &str) -> BrowserResult<()> {
            Ok(())
        }

        async fn evaluate(&self, _code: &str) -> BrowserResult<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }

        async fn screenshot(&self) -> BrowserResult<Vec<u8>> {
            self.screenshots.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0x89, 0x50, 0x4e, 0x47])
        }

        async fn current_url(&self) -> BrowserResult<String> {
            Ok("https://example.com/contact".to_string())
        }

        async fn wait_for_load(&self, _timeout: Duration) -> BrowserResult<()> {
            Ok(())
        }

        async fn close(&mut self) {}
    }

    #[tokio::test]
    async fn one_response_per_outcome_sharing_one_screenshot() {
        let surface = CountingSurface {
            screenshots: AtomicUsize::new(0),
        };
        let outcomes = vec![
            ActionOutcome::succeeded("navigate", "Navigated to https://example.com."),
            ActionOutcome::succeeded("click_at", "Clicked at (10, 20)."),
            ActionOutcome::errored("run_script", "ReferenceError"),
        ];

        let parts = build_turn_responses(&surface, outcomes).await.unwrap();

        assert_eq!(parts.len(), 3);
        assert_eq!(surface.screenshots.load(Ordering::SeqCst), 1);

        for part in &parts {
            let Part::FunctionResponse(response) = part else {
                panic!("expected function response part");
            };
            assert_eq!(response.response["url"], "https://example.com/contact");
            assert_eq!(response.parts.len(), 1);
            assert_eq!(response.parts[0].inline_data.mime_type, "image/png");
        }

        let Part::FunctionResponse(errored) = &parts[2] else {
            unreachable!()
        };
        assert_eq!(errored.name, "run_script");
        assert!(errored.response.get("success").is_none());
        assert_eq!(errored.response["error"], "ReferenceError");
    }
}
