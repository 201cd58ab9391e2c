//! Agent System
//!
//! Specialist travel agents that each own one stage of the itinerary
//! pipeline, plus the travel assistant used for follow-up questions:
//!
//! - **Task**: stable stage identifiers and the prompt for each role
//! - **Runner**: executes one task through a `TextGenerator` with a timeout
//! - **Chat**: single-turn question answering about a finished trip
//!
//! ## Pipeline Overview
//!
//! ```text
//! Trip Request
//!      │
//!      ▼
//! ┌──────────────────┐
//! │   Destination    │  → Highlights, weather, customs
//! │   Accommodation  │  → Places to stay within budget
//! │  Transportation  │  → Getting there and around
//! │    Activities    │  → Attractions and experiences
//! │      Dining      │  → Dishes and restaurants
//! └──────────────────┘
//!      │  (each stage runs in order, failures recorded)
//!      ▼
//! ┌──────────────────┐
//! │    Itinerary     │  → Day-by-day plan from all research
//! └──────────────────┘
//!      │
//!      ▼
//!  Travel Plan
//! ```

pub mod chat;
pub mod runner;
pub mod task;

pub use chat::ChatSession;
pub use runner::{
    ActivityEntry, ActivityLog, AgentError, AgentRunner, GeneratorFactory, LlmGenerator,
    LlmGeneratorFactory, TextGenerator,
};
pub use task::{OutputLanguage, StageId, TaskSpec};
