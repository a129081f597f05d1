//! Test batteries for model evaluation.
//!
//! Two batteries are run against each model:
//!
//! - **Reasoning** ("smartness"): short questions on math, logic and
//!   knowledge, each with a checkable answer.
//! - **Coding**: function-writing tasks whose answers are extracted, executed
//!   in the sandbox against input/output cases and given partial credit.
//!
//! Tests run sequentially with one chat call each. Per-test failures are
//! recorded on the outcome and never abort a battery.

pub mod catalog;
pub mod coding;
pub mod evaluator;
pub mod reasoning;
pub mod report;

pub use catalog::{AnswerCheck, Battery, Category, CodingTest, Difficulty, ReasoningTest};
pub use coding::{run_coding_battery, CodingResult};
pub use evaluator::{BatteryEvaluator, RepeatMode};
pub use reasoning::{run_reasoning_battery, ReasoningResult};
pub use report::{
    BatteryLines, CodingDetails, CodingOutcome, DisplayLine, LatencyStats, ModelReport,
    ReasoningOutcome, SmartnessDetails,
};

use std::time::Instant;

use crate::error::LlmError;
use crate::llm::{ChatClient, Message};
use crate::metrics::MetricsCollector;
use crate::utils::extract_answer;

/// Send `prompt` as a single user message and time the call.
///
/// Returns the latency in seconds (3 decimals, failures included) and the
/// extracted answer text.
pub(crate) async fn chat_with_model(
    client: &dyn ChatClient,
    model: &str,
    prompt: &str,
    metrics: &MetricsCollector,
) -> (f64, Result<String, LlmError>) {
    let start = Instant::now();
    let reply = client.chat(model, &[Message::user(prompt)]).await;
    let elapsed = start.elapsed().as_secs_f64();

    metrics.record_llm_request(model, reply.is_ok(), elapsed);
    if let Err(e) = &reply {
        tracing::warn!(model = model, error = %e, "Chat request failed");
    }

    (
        report::round_to(elapsed, 3),
        reply.map(|response| extract_answer(&response)),
    )
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::LlmError;
    use crate::llm::{ChatClient, ChatResponse, Message, ModelListing};

    /// Replies to chat calls from a fixed script, in order.
    pub struct ScriptedClient {
        replies: Mutex<VecDeque<Result<String, String>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedClient {
        pub fn new(replies: Vec<Result<&str, &str>>) -> Self {
            Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                calls: Mutex::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ChatClient for ScriptedClient {
        async fn list_models(&self) -> Result<Vec<ModelListing>, LlmError> {
            Ok(Vec::new())
        }

        async fn chat(&self, _model: &str, _messages: &[Message]) -> Result<ChatResponse, LlmError> {
            *self.calls.lock().unwrap() += 1;
            match self.replies.lock().unwrap().pop_front() {
                Some(Ok(text)) => Ok(ChatResponse::Text(text)),
                Some(Err(message)) => Err(LlmError::RequestFailed(message)),
                None => Err(LlmError::RequestFailed("script exhausted".to_string())),
            }
        }
    }
}
