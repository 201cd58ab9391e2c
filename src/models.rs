use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::agents::{GeneratorFactory, OutputLanguage, StageId};
use crate::aggregator::Aggregator;
use crate::attractions::AttractionSearch;
use crate::config::Config;
use crate::geo::Geocoder;
use crate::session::SessionStore;
use crate::types::{AppError, AppResult};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: SessionStore,
    pub generators: Arc<dyn GeneratorFactory>,
    pub aggregator: Option<Arc<dyn Aggregator>>,
    pub geocoder: Option<Arc<dyn Geocoder>>,
    pub attractions: Option<Arc<dyn AttractionSearch>>,
}

/// Spending level for the whole trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetTier {
    #[serde(alias = "Budget")]
    Budget,
    #[serde(alias = "Moderate", alias = "mid-range", alias = "Mid-range")]
    Moderate,
    #[serde(alias = "Luxury")]
    Luxury,
}

impl BudgetTier {
    pub fn label(self) -> &'static str {
        match self {
            BudgetTier::Budget => "Budget",
            BudgetTier::Moderate => "Moderate",
            BudgetTier::Luxury => "Luxury",
        }
    }
}

impl std::fmt::Display for BudgetTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

fn default_travelers() -> u32 {
    1
}

/// The traveler's trip parameters as submitted through the form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct TripRequest {
    #[validate(length(min = 1, message = "origin is required"))]
    pub origin: String,
    #[validate(length(min = 1, message = "destination is required"))]
    pub destination: String,
    pub start_date: NaiveDate,
    #[validate(range(min = 1, max = 30, message = "duration must be between 1 and 30 days"))]
    pub duration_days: u32,
    #[serde(default = "default_travelers")]
    #[validate(range(min = 1, max = 15, message = "travelers must be between 1 and 15"))]
    pub travelers: u32,
    pub budget: BudgetTier,
    #[serde(default)]
    pub travel_style: BTreeSet<String>,
    #[serde(default)]
    pub preferences: String,
    #[serde(default)]
    pub special_requirements: String,
}

impl TripRequest {
    pub fn new(
        origin: impl Into<String>,
        destination: impl Into<String>,
        start_date: NaiveDate,
        duration_days: u32,
        budget: BudgetTier,
    ) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            start_date,
            duration_days,
            travelers: default_travelers(),
            budget,
            travel_style: BTreeSet::new(),
            preferences: String::new(),
            special_requirements: String::new(),
        }
    }

    pub fn with_travelers(mut self, travelers: u32) -> Self {
        self.travelers = travelers;
        self
    }

    pub fn with_preferences(mut self, preferences: impl Into<String>) -> Self {
        self.preferences = preferences.into();
        self
    }

    pub fn with_special_requirements(mut self, requirements: impl Into<String>) -> Self {
        self.special_requirements = requirements.into();
        self
    }

    pub fn with_travel_style<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.travel_style = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Trim free-text fields, drop blank style tags and validate.
    pub fn normalized(mut self) -> AppResult<Self> {
        self.origin = self.origin.trim().to_string();
        self.destination = self.destination.trim().to_string();
        self.preferences = self.preferences.trim().to_string();
        self.special_requirements = self.special_requirements.trim().to_string();
        self.travel_style = self
            .travel_style
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        self.validate()?;
        if self.end_date().is_none() {
            return Err(AppError::InvalidRequest(
                "trip end date is out of range".to_string(),
            ));
        }
        Ok(self)
    }

    /// Last day of the trip: start + duration - 1.
    pub fn end_date(&self) -> Option<NaiveDate> {
        let extra = u64::from(self.duration_days.saturating_sub(1));
        self.start_date.checked_add_days(Days::new(extra))
    }

    pub fn travel_dates(&self) -> String {
        match self.end_date() {
            Some(end) => format!(
                "{} to {}",
                self.start_date.format("%Y-%m-%d"),
                end.format("%Y-%m-%d")
            ),
            None => self.start_date.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn travel_style_label(&self) -> String {
        self.travel_style
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Single-line query sent to the external aggregator.
    pub fn to_query(&self) -> String {
        format!(
            "Origin: {}, Destination: {}, Travel dates: {}, Duration: {} days, Travelers: {}, \
             Preferences: {}, Travel style: {}, Budget: {}, Special requirements: {}",
            self.origin,
            self.destination,
            self.travel_dates(),
            self.duration_days,
            self.travelers,
            self.preferences,
            self.travel_style_label(),
            self.budget,
            self.special_requirements,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Completed,
    Failed,
    Skipped,
}

/// Output of one stage. Never modified after it is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: StageId,
    pub output: String,
    pub outcome: StageOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl StageResult {
    pub fn completed(stage: StageId, output: impl Into<String>) -> Self {
        Self {
            stage,
            output: output.into(),
            outcome: StageOutcome::Completed,
            error: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn failed(stage: StageId, error: impl Into<String>) -> Self {
        Self {
            stage,
            output: String::new(),
            outcome: StageOutcome::Failed,
            error: Some(error.into()),
            recorded_at: Utc::now(),
        }
    }

    pub fn skipped(stage: StageId, reason: impl Into<String>) -> Self {
        Self {
            stage,
            output: String::new(),
            outcome: StageOutcome::Skipped,
            error: Some(reason.into()),
            recorded_at: Utc::now(),
        }
    }

    pub fn success(&self) -> bool {
        self.outcome == StageOutcome::Completed
    }

    /// Text contributed to downstream contexts; failures become a marker.
    pub fn context_text(&self) -> String {
        match self.outcome {
            StageOutcome::Completed => self.output.clone(),
            StageOutcome::Failed => format!(
                "[{} unavailable: {}]",
                self.stage.role(),
                self.error.as_deref().unwrap_or("unknown error")
            ),
            StageOutcome::Skipped => String::new(),
        }
    }
}

/// Stage outputs of one run, ordered by pipeline position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultMap {
    entries: BTreeMap<StageId, StageResult>,
}

impl ResultMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stage result. Returns false (and keeps the existing entry)
    /// when the stage was already recorded.
    pub fn record(&mut self, result: StageResult) -> bool {
        if self.entries.contains_key(&result.stage) {
            return false;
        }
        self.entries.insert(result.stage, result);
        true
    }

    pub fn get(&self, stage: StageId) -> Option<&StageResult> {
        self.entries.get(&stage)
    }

    /// Successful output of a stage, if any.
    pub fn output(&self, stage: StageId) -> Option<&str> {
        self.get(stage)
            .filter(|r| r.success())
            .map(|r| r.output.as_str())
    }

    pub fn contains(&self, stage: StageId) -> bool {
        self.entries.contains_key(&stage)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageResult> {
        self.entries.values()
    }

    pub fn has_failures(&self) -> bool {
        self.entries
            .values()
            .any(|r| r.outcome == StageOutcome::Failed)
    }

    /// Every stage of the pipeline has an entry.
    pub fn is_complete(&self) -> bool {
        StageId::ALL.iter().all(|s| self.entries.contains_key(s))
    }
}

/// Which path produced a run's results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunSource {
    External,
    StageChain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Complete,
    PartialFailure,
    Failed,
}

/// One execution of the itinerary pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: Uuid,
    pub request: TripRequest,
    pub results: ResultMap,
    pub source: RunSource,
    pub status: RunStatus,
    pub language: OutputLanguage,
    /// Non-blocking problems, e.g. why the external aggregator was not used.
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn new(request: TripRequest, language: OutputLanguage) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            results: ResultMap::new(),
            source: RunSource::StageChain,
            status: RunStatus::Complete,
            language,
            warnings: Vec::new(),
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Final itinerary text, when the itinerary stage succeeded.
    pub fn itinerary(&self) -> Option<&str> {
        self.results.output(StageId::Itinerary)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    External,
    Agent,
}

/// One question/answer exchange with the travel assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
    pub source: AnswerSource,
    /// Run whose results were used as read-only context.
    pub run_id: Option<Uuid>,
    pub asked_at: DateTime<Utc>,
}

// API Request/Response types

#[derive(Debug, Default, Deserialize)]
pub struct SessionSettingsRequest {
    pub llm_api_key: Option<String>,
    pub aggregator_api_key: Option<String>,
    pub embedding_api_key: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub llm_api_key: Option<String>,
    pub aggregator_api_key: Option<String>,
    pub aggregator_active: bool,
    pub embedding_api_key: Option<String>,
    pub language: OutputLanguage,
    pub has_itinerary: bool,
    pub chat_turns: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub aggregator: String,
    pub geocoder: String,
    pub attractions: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_end_date() {
        let request = TripRequest::new("Delhi", "Agra", date(2024, 4, 4), 3, BudgetTier::Budget);
        assert_eq!(request.end_date(), Some(date(2024, 4, 6)));
        assert_eq!(request.travel_dates(), "2024-04-04 to 2024-04-06");

        let day_trip = TripRequest::new("Delhi", "Agra", date(2024, 4, 4), 1, BudgetTier::Budget);
        assert_eq!(day_trip.end_date(), Some(date(2024, 4, 4)));
    }

    #[test]
    fn test_normalized_rejects_blank_destination() {
        let request = TripRequest::new("Delhi", "   ", date(2024, 4, 4), 3, BudgetTier::Budget);
        assert!(matches!(request.normalized(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_normalized_rejects_zero_duration() {
        let request = TripRequest::new("Delhi", "Agra", date(2024, 4, 4), 0, BudgetTier::Budget);
        assert!(request.normalized().is_err());
    }

    #[test]
    fn test_normalized_trims_fields() {
        let request = TripRequest::new(" Delhi ", " Agra", date(2024, 4, 4), 3, BudgetTier::Luxury)
            .with_travel_style(["Culture", "  ", " Food & Dining "])
            .normalized()
            .unwrap();
        assert_eq!(request.origin, "Delhi");
        assert_eq!(request.destination, "Agra");
        assert_eq!(request.travel_style_label(), "Culture, Food & Dining");
    }

    #[test]
    fn test_budget_aliases() {
        let tier: BudgetTier = serde_json::from_str("\"Mid-range\"").unwrap();
        assert_eq!(tier, BudgetTier::Moderate);
        let tier: BudgetTier = serde_json::from_str("\"luxury\"").unwrap();
        assert_eq!(tier, BudgetTier::Luxury);
    }

    #[test]
    fn test_trip_request_deserialize_defaults() {
        let request: TripRequest = serde_json::from_str(
            r#"{"origin":"Delhi","destination":"Agra","start_date":"2024-04-04","duration_days":3,"budget":"Budget"}"#,
        )
        .unwrap();
        assert_eq!(request.travelers, 1);
        assert!(request.travel_style.is_empty());
        assert!(request.preferences.is_empty());
    }

    #[test]
    fn test_result_map_write_once() {
        let mut results = ResultMap::new();
        assert!(results.record(StageResult::completed(StageId::Dining, "first")));
        assert!(!results.record(StageResult::completed(StageId::Dining, "second")));
        assert_eq!(results.output(StageId::Dining), Some("first"));
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_result_map_iterates_in_pipeline_order() {
        let mut results = ResultMap::new();
        results.record(StageResult::completed(StageId::Dining, "d"));
        results.record(StageResult::completed(StageId::Destination, "a"));
        results.record(StageResult::failed(StageId::Transportation, "boom"));
        let order: Vec<_> = results.iter().map(|r| r.stage).collect();
        assert_eq!(
            order,
            vec![StageId::Destination, StageId::Transportation, StageId::Dining]
        );
        assert!(results.has_failures());
        assert!(!results.is_complete());
    }

    #[test]
    fn test_failed_context_marker() {
        let result = StageResult::failed(StageId::Activities, "timed out");
        assert_eq!(
            result.context_text(),
            "[Activities Curator unavailable: timed out]"
        );
        assert!(!result.success());
    }

    #[test]
    fn test_result_map_serializes_by_key() {
        let mut results = ResultMap::new();
        results.record(StageResult::completed(StageId::Destination, "Agra"));
        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(json["destination"]["output"], "Agra");
        assert_eq!(json["destination"]["outcome"], "completed");
    }
}
