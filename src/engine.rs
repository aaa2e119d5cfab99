//! Dispatcher: the engine's public entry point
//!
//! Requests are defaulted, routed through the static registry to one
//! interpreter and normalized. No fault raised below this layer reaches the
//! caller; internal failures degrade to a "completed" result.

mod registry;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::generic;
use crate::heuristic;
use crate::native;
use crate::result::{ExecutionResult, PartialResult, normalize};
pub use registry::{Strategy, lookup};

/// Tag used when a request names no language
pub const DEFAULT_LANGUAGE: &str = "javascript";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Cooperative time budget per run
    pub time_limit_ms: u64,
    /// Minimum latency added before a result is returned, 0 disables it
    pub response_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            time_limit_ms: 5000,
            response_delay_ms: 100,
        }
    }
}

/// A `(source, language, stdin)` triple; every field may be omitted
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct ExecutionRequest {
    pub source: Option<String>,
    pub language: Option<String>,
    pub stdin: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn run(&self, request: ExecutionRequest) -> ExecutionResult {
        self.execute(
            request.source.as_deref().unwrap_or_default(),
            request.language.as_deref().unwrap_or_default(),
            request.stdin.as_deref().unwrap_or_default(),
        )
        .await
    }

    /// Runs `source` as `language`, never failing
    pub async fn execute(&self, source: &str, language: &str, stdin: &str) -> ExecutionResult {
        if source.trim().is_empty() {
            log::debug!("Empty source, nothing to execute");
            self.delay().await;
            return ExecutionResult::no_code();
        }

        let display = match language.trim() {
            "" => DEFAULT_LANGUAGE,
            tag => tag,
        };
        let tag = display.to_lowercase();
        let strategy = lookup(&tag);
        log::debug!("Routing '{tag}' to {strategy:?}");

        let limit = Duration::from_millis(self.config.time_limit_ms);
        let display = display.to_owned();
        let source = source.to_owned();
        let stdin = stdin.to_owned();
        self.settle(&tag, move || dispatch(strategy, &display, &source, &stdin, limit))
            .await
    }

    /// Runs `job` off the async runtime; an error or panic becomes a completed result
    async fn settle<F>(&self, tag: &str, job: F) -> ExecutionResult
    where
        F: FnOnce() -> anyhow::Result<PartialResult> + Send + 'static,
    {
        let partial = match tokio::task::spawn_blocking(job).await {
            Ok(Ok(partial)) => Some(partial),
            Ok(Err(e)) => {
                log::warn!("Interpreter for '{tag}' failed: {e:#}");
                None
            }
            Err(e) => {
                log::error!("Interpreter task for '{tag}' did not finish: {e}");
                None
            }
        };

        self.delay().await;
        partial.map_or_else(ExecutionResult::completed, normalize)
    }

    async fn delay(&self) {
        if self.config.response_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.response_delay_ms)).await;
        }
    }
}

fn dispatch(
    strategy: Strategy,
    language: &str,
    source: &str,
    stdin: &str,
    limit: Duration,
) -> anyhow::Result<PartialResult> {
    match strategy {
        Strategy::Native => native::evaluate(source, stdin, limit),
        Strategy::Heuristic(grammar) => heuristic::interpret(grammar, source, stdin, limit),
        Strategy::Generic => generic::simulate(language, source, stdin),
    }
}

/// Runs one snippet with the default configuration
pub async fn execute(source: &str, language: &str, stdin: &str) -> ExecutionResult {
    Engine::default().execute(source, language, stdin).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{COMPLETED_MESSAGE, Status};

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config: EngineConfig = serde_json::from_str(r#"{"time_limit_ms": 250}"#).unwrap();
        assert_eq!(
            config,
            EngineConfig {
                time_limit_ms: 250,
                response_delay_ms: 100,
            }
        );
    }

    #[test]
    fn test_dispatch_generic_keeps_original_tag() {
        let partial = dispatch(Strategy::Generic, "COBOL", "DISPLAY X.", "", Duration::from_secs(1))
            .unwrap();
        assert!(partial.output.unwrap_or_default().contains("'COBOL'"));
    }

    fn quiet_engine() -> Engine {
        Engine::new(EngineConfig {
            response_delay_ms: 0,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_interpreter_error_becomes_completed() {
        let result = quiet_engine()
            .settle("python", || Err(anyhow::anyhow!("grammar failed to compile")))
            .await;
        assert_eq!(result.output, COMPLETED_MESSAGE);
        assert_eq!(result.status, Status::completed());
        assert_eq!(result.error, "");
    }

    #[tokio::test]
    async fn test_interpreter_panic_becomes_completed() {
        let result = quiet_engine()
            .settle("js", || -> anyhow::Result<PartialResult> {
                panic!("interpreter bug")
            })
            .await;
        assert_eq!(result.output, COMPLETED_MESSAGE);
        assert_eq!(result.status, Status::completed());
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_settled_partial_is_normalized() {
        let result = quiet_engine()
            .settle("js", || {
                Ok(PartialResult {
                    output: Some("hi\n".to_string()),
                    ..Default::default()
                })
            })
            .await;
        assert_eq!(result.output, "hi\n");
        assert_eq!(result.status, Status::success());
    }
}
