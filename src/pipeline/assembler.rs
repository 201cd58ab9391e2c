//! Itinerary Assembler
//!
//! Deterministic string builders for stage contexts, the combined itinerary
//! context, chat context and the downloadable document. Nothing in here
//! fails: absent optional fields render as empty segments.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;

use crate::agents::{OutputLanguage, StageId};
use crate::models::{PipelineRun, TripRequest};

/// Plain-text itinerary offered for download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItineraryDocument {
    pub filename: String,
    pub content: String,
}

impl ItineraryDocument {
    pub fn data_url(&self) -> String {
        format!("data:text/plain;base64,{}", STANDARD.encode(self.content.as_bytes()))
    }
}

pub struct ItineraryAssembler;

impl ItineraryAssembler {
    /// One-paragraph summary of the whole trip.
    pub fn trip_summary(request: &TripRequest) -> String {
        request.to_query()
    }

    /// Input for a single stage: the language directive followed by the
    /// request fields that stage needs.
    pub fn build_stage_context(
        stage: StageId,
        request: &TripRequest,
        language: OutputLanguage,
    ) -> String {
        let mut lines = vec![language.directive().to_string(), String::new()];

        match stage {
            StageId::Destination => {
                lines.push(format!("Destination: {}", request.destination));
                lines.push(format!("Travel dates: {}", request.travel_dates()));
                lines.push(format!("Preferences: {}", request.preferences));
                lines.push(format!("Travel style: {}", request.travel_style_label()));
            }
            StageId::Accommodation => {
                lines.push(format!("Destination: {}", request.destination));
                lines.push(format!("Travel dates: {}", request.travel_dates()));
                lines.push(format!("Duration: {} days", request.duration_days));
                lines.push(format!("Travelers: {}", request.travelers));
                lines.push(format!("Budget: {}", request.budget));
                lines.push(format!("Preferences: {}", request.preferences));
            }
            StageId::Transportation => {
                lines.push(format!("Origin: {}", request.origin));
                lines.push(format!("Destination: {}", request.destination));
                lines.push(format!("Travel dates: {}", request.travel_dates()));
                lines.push(format!("Travelers: {}", request.travelers));
                lines.push(format!("Budget: {}", request.budget));
            }
            StageId::Activities | StageId::Dining => {
                lines.push(format!("Destination: {}", request.destination));
                lines.push(format!("Duration: {} days", request.duration_days));
                lines.push(format!("Preferences: {}", request.preferences));
                lines.push(format!("Travel style: {}", request.travel_style_label()));
                lines.push(format!("Budget: {}", request.budget));
            }
            StageId::Itinerary => {
                lines.push(Self::trip_summary(request));
            }
        }

        lines.push(format!("Special requirements: {}", request.special_requirements));
        lines.join("\n")
    }

    /// Input for the itinerary stage: trip summary plus every research
    /// output in pipeline order. Failed stages contribute their marker.
    pub fn build_final_context(
        request: &TripRequest,
        results: &crate::models::ResultMap,
        language: OutputLanguage,
    ) -> String {
        let mut out = Self::build_stage_context(StageId::Itinerary, request, language);

        for stage in StageId::RESEARCH {
            let text = results
                .get(stage)
                .map(|r| r.context_text())
                .unwrap_or_default();
            out.push_str(&format!("\n\n{}:\n{}", stage.heading(), text));
        }

        out
    }

    /// Context for a chat question, with the run's results as background.
    pub fn build_chat_context(question: &str, run: Option<&PipelineRun>) -> String {
        let question = question.trim();
        let Some(run) = run else {
            return format!("Question: {}", question);
        };

        let mut plan = Self::trip_summary(&run.request);
        match run.itinerary() {
            Some(itinerary) => {
                plan.push_str(&format!("\n\n{}:\n{}", StageId::Itinerary.heading(), itinerary));
            }
            None => {
                for result in run.results.iter().filter(|r| r.success()) {
                    plan.push_str(&format!("\n\n{}:\n{}", result.stage.heading(), result.output));
                }
            }
        }

        format!("Travel Plan: {}\nQuestion: {}", plan, question)
    }

    /// The downloadable file, when the itinerary stage produced text.
    pub fn document(run: &PipelineRun) -> Option<ItineraryDocument> {
        let content = run.itinerary()?.to_string();
        let date = run.finished_at.unwrap_or(run.started_at).format("%Y-%m-%d");
        let destination = run.request.destination.replace(' ', "_");

        Some(ItineraryDocument {
            filename: format!("{}_{}_itinerary.txt", destination, date),
            content,
        })
    }
}
