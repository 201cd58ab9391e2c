//! Itinerary Pipeline
//!
//! - **Orchestrator**: runs the external aggregator or the stage chain
//! - **Assembler**: builds stage contexts and the downloadable document
//! - **Progress**: stage transition events for progress displays

pub mod assembler;
pub mod orchestrator;
pub mod progress;

pub use assembler::{ItineraryAssembler, ItineraryDocument};
pub use orchestrator::PipelineOrchestrator;
pub use progress::{
    ChannelObserver, NoopObserver, PipelineEvent, ProgressEvent, ProgressObserver, ProgressTracker,
    RecordingObserver, StageStatus,
};
