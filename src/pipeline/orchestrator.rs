//! Pipeline Orchestrator
//!
//! Drives one itinerary run:
//!
//! ```text
//! NotStarted ─► TryingExternal ─► Complete            (bundle accepted)
//!                     │
//!                     ▼ (absent or any FallbackError)
//!               RunningStage[0..5] ─► Complete | PartialFailure
//!                     │
//!                     ▼ (credential missing or rejected)
//!                   Failed
//! ```
//!
//! Stages are awaited one after another. A failing stage is recorded and
//! the run moves on; only credential failures end it early.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::agents::{AgentError, AgentRunner, StageId, TaskSpec};
use crate::aggregator::{AggregateBundle, Aggregator, AggregatorEndpoint, FallbackError};
use crate::models::{PipelineRun, RunSource, RunStatus, StageResult, TripRequest};
use crate::pipeline::assembler::ItineraryAssembler;
use crate::pipeline::progress::{ProgressObserver, ProgressTracker};
use crate::session::SessionContext;

const ORCHESTRATOR_ROLE: &str = "Trip Coordinator";

pub struct PipelineOrchestrator {
    runner: AgentRunner,
    aggregator: Option<Arc<dyn Aggregator>>,
    default_aggregator_key: Option<String>,
}

impl PipelineOrchestrator {
    pub fn new(runner: AgentRunner, aggregator: Option<Arc<dyn Aggregator>>) -> Self {
        Self {
            runner,
            aggregator,
            default_aggregator_key: None,
        }
    }

    /// Aggregator credential used when the session has none.
    pub fn with_default_aggregator_key(mut self, key: Option<String>) -> Self {
        self.default_aggregator_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn runner(&self) -> &AgentRunner {
        &self.runner
    }

    fn aggregator_credential<'a>(&'a self, session: &'a SessionContext) -> Option<&'a str> {
        session
            .aggregator_api_key
            .as_deref()
            .or(self.default_aggregator_key.as_deref())
    }

    /// Execute the pipeline for one trip request.
    pub async fn run(
        &self,
        session: &SessionContext,
        request: &TripRequest,
        observer: &dyn ProgressObserver,
    ) -> PipelineRun {
        let mut run = PipelineRun::new(request.clone(), session.language);
        let progress = ProgressTracker::new(observer);
        progress.start();

        info!(
            run_id = %run.id,
            session_id = %session.id,
            destination = %request.destination,
            duration_days = request.duration_days,
            "Starting itinerary pipeline"
        );

        if !self.runner.has_credential() {
            warn!(run_id = %run.id, "No generation credential configured");
            self.runner
                .log()
                .push(ORCHESTRATOR_ROLE, "No API key configured; cannot generate an itinerary");
            run.status = RunStatus::Failed;
            run.error = Some("no API key configured for the generation backend".to_string());
            return finish(run);
        }

        match self.try_external(session, request).await {
            Ok(Some(bundle)) => {
                self.accept_bundle(&mut run, bundle, &progress);
                return finish(run);
            }
            Ok(None) => {}
            Err(reason) => {
                warn!(run_id = %run.id, error = %reason, "Falling back to stage chain");
                self.runner
                    .log()
                    .push(ORCHESTRATOR_ROLE, format!("External aggregator unavailable: {}", reason));
                run.warnings.push(reason.to_string());
            }
        }

        run.source = RunSource::StageChain;
        self.run_stage_chain(&mut run, &progress).await;
        finish(run)
    }

    /// Ok(None) when no aggregator or credential is configured.
    async fn try_external(
        &self,
        session: &SessionContext,
        request: &TripRequest,
    ) -> Result<Option<AggregateBundle>, FallbackError> {
        let (Some(aggregator), Some(credential)) =
            (self.aggregator.as_ref(), self.aggregator_credential(session))
        else {
            return Ok(None);
        };

        self.runner
            .log()
            .push(ORCHESTRATOR_ROLE, "Requesting itinerary from external aggregator");
        let bundle = aggregator
            .fetch(&request.to_query(), credential, AggregatorEndpoint::Travel)
            .await?;
        ensure_research_sections(&bundle)?;
        Ok(Some(bundle))
    }

    fn accept_bundle(&self, run: &mut PipelineRun, bundle: AggregateBundle, progress: &ProgressTracker<'_>) {
        let sections = [
            (StageId::Destination, bundle.destination_info),
            (StageId::Accommodation, bundle.accommodations),
            (StageId::Transportation, bundle.transportation),
            (StageId::Activities, bundle.activities),
            (StageId::Dining, bundle.dining),
        ];
        for (stage, text) in sections {
            run.results
                .record(StageResult::completed(stage, text.unwrap_or_default()));
        }

        let itinerary = match bundle.itinerary {
            Some(text) => StageResult::completed(StageId::Itinerary, text),
            None => StageResult::skipped(StageId::Itinerary, "external aggregator returned no itinerary"),
        };
        run.results.record(itinerary);

        run.source = RunSource::External;
        run.status = RunStatus::Complete;
        progress.complete_all();
        self.runner
            .log()
            .push(ORCHESTRATOR_ROLE, "External aggregator provided the travel plan");
        info!(run_id = %run.id, "External aggregator bundle accepted");
    }

    async fn run_stage_chain(&self, run: &mut PipelineRun, progress: &ProgressTracker<'_>) {
        let language = run.language;

        for stage in StageId::RESEARCH {
            let context = ItineraryAssembler::build_stage_context(stage, &run.request, language);
            if let Err(e) = self.run_stage(run, stage, &context, progress).await {
                fail_run(run, stage, e);
                return;
            }
        }

        let context = ItineraryAssembler::build_final_context(&run.request, &run.results, language);
        if let Err(e) = self.run_stage(run, StageId::Itinerary, &context, progress).await {
            fail_run(run, StageId::Itinerary, e);
            return;
        }

        run.status = if run.results.has_failures() {
            RunStatus::PartialFailure
        } else {
            RunStatus::Complete
        };
    }

    /// Run and record one stage. Only fatal errors are returned.
    async fn run_stage(
        &self,
        run: &mut PipelineRun,
        stage: StageId,
        context: &str,
        progress: &ProgressTracker<'_>,
    ) -> Result<(), AgentError> {
        progress.activate(stage);
        let task = TaskSpec::for_stage(stage);

        let outcome = self.runner.run(&task, context).await;
        let fatal = match outcome {
            Ok(text) => {
                run.results.record(StageResult::completed(stage, text));
                None
            }
            Err(e) => {
                warn!(run_id = %run.id, stage = %stage, error = %e, "Stage failed");
                run.results.record(StageResult::failed(stage, e.to_string()));
                e.is_fatal().then_some(e)
            }
        };

        progress.advance(stage);
        fatal.map_or(Ok(()), Err)
    }
}

/// All five research sections must be present before a bundle is used.
fn ensure_research_sections(bundle: &AggregateBundle) -> Result<(), FallbackError> {
    let fields = [
        ("destination_info", &bundle.destination_info),
        ("accommodations", &bundle.accommodations),
        ("transportation", &bundle.transportation),
        ("activities", &bundle.activities),
        ("dining", &bundle.dining),
    ];
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(FallbackError::SchemaMismatch(missing.join(", ")))
    }
}

fn fail_run(run: &mut PipelineRun, stage: StageId, error: AgentError) {
    warn!(run_id = %run.id, stage = %stage, "Credential rejected, stopping pipeline");
    run.status = RunStatus::Failed;
    run.error = Some(error.to_string());
}

fn finish(mut run: PipelineRun) -> PipelineRun {
    run.finished_at = Some(Utc::now());
    info!(
        run_id = %run.id,
        status = ?run.status,
        source = ?run.source,
        stages = run.results.len(),
        "Itinerary pipeline finished"
    );
    run
}
