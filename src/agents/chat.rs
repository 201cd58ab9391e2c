//! Chat Session
//!
//! Single-turn questions about a trip. The external aggregator's chat
//! endpoint is tried first when configured; otherwise (or when it fails)
//! the travel assistant agent answers. No memory between calls.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::agents::runner::{AgentError, AgentRunner};
use crate::agents::task::TaskSpec;
use crate::aggregator::{Aggregator, AggregatorEndpoint};
use crate::models::{AnswerSource, ChatTurn, PipelineRun};
use crate::pipeline::ItineraryAssembler;

pub struct ChatSession {
    runner: AgentRunner,
    aggregator: Option<Arc<dyn Aggregator>>,
}

impl ChatSession {
    pub fn new(runner: AgentRunner, aggregator: Option<Arc<dyn Aggregator>>) -> Self {
        Self { runner, aggregator }
    }

    /// Answer one question. `run` is read-only background context.
    pub async fn ask(
        &self,
        question: &str,
        run: Option<&PipelineRun>,
        aggregator_credential: Option<&str>,
    ) -> Result<ChatTurn, AgentError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AgentError::InvalidContext);
        }

        info!(question_len = question.len(), has_run = run.is_some(), "Chat question received");

        if let (Some(aggregator), Some(credential)) = (self.aggregator.as_ref(), aggregator_credential) {
            match aggregator
                .fetch(question, credential, AggregatorEndpoint::Chat)
                .await
            {
                Ok(bundle) => {
                    if let Some(answer) = bundle.response {
                        return Ok(self.turn(question, answer, AnswerSource::External, run));
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Aggregator chat failed, asking the travel assistant");
                }
            }
        }

        let context = ItineraryAssembler::build_chat_context(question, run);
        let answer = self.runner.run(&TaskSpec::chat(), &context).await?;
        Ok(self.turn(question, answer, AnswerSource::Agent, run))
    }

    fn turn(
        &self,
        question: &str,
        answer: String,
        source: AnswerSource,
        run: Option<&PipelineRun>,
    ) -> ChatTurn {
        ChatTurn {
            question: question.to_string(),
            answer,
            source,
            run_id: run.map(|r| r.id),
            asked_at: Utc::now(),
        }
    }
}
