//! Progress reporting
//!
//! Stage transitions are pushed to a `ProgressObserver`. Observers only
//! display state; nothing they do feeds back into the run.

use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::agents::{ActivityEntry, ActivityLog, StageId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Active,
    Complete,
}

/// One stage transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub stage_index: usize,
    pub stage: StageId,
    pub status: StageStatus,
}

impl ProgressEvent {
    pub fn new(stage: StageId, status: StageStatus) -> Self {
        Self {
            stage_index: stage.index(),
            stage,
            status,
        }
    }
}

pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, event: ProgressEvent);
}

/// Discards every event.
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _event: ProgressEvent) {}
}

/// Collects events in order, for blocking endpoints and tests.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_progress(&self, event: ProgressEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Anything a live progress display receives.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Progress(ProgressEvent),
    Activity(ActivityEntry),
}

/// Forwards events to a channel. A dropped receiver is ignored.
///
/// With an attached `ActivityLog`, new activity lines are forwarded ahead
/// of each progress event.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<PipelineEvent>,
    log: Option<ActivityLog>,
    forwarded: Mutex<usize>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        Self {
            tx,
            log: None,
            forwarded: Mutex::new(0),
        }
    }

    pub fn with_activity(mut self, log: ActivityLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Send activity lines not yet forwarded.
    pub fn flush_activity(&self) {
        let Some(log) = &self.log else {
            return;
        };
        let mut forwarded = match self.forwarded.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entries = log.entries();
        for entry in entries.iter().skip(*forwarded) {
            let _ = self.tx.send(PipelineEvent::Activity(entry.clone()));
        }
        *forwarded = entries.len();
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_progress(&self, event: ProgressEvent) {
        self.flush_activity();
        let _ = self.tx.send(PipelineEvent::Progress(event));
    }
}

/// Tracks the current stage pointer and emits transitions.
pub struct ProgressTracker<'a> {
    observer: &'a dyn ProgressObserver,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(observer: &'a dyn ProgressObserver) -> Self {
        Self { observer }
    }

    /// Announce every stage as pending.
    pub fn start(&self) {
        for stage in StageId::ALL {
            self.emit(stage, StageStatus::Pending);
        }
    }

    pub fn activate(&self, stage: StageId) {
        self.emit(stage, StageStatus::Active);
    }

    /// Stage finished, successfully or not.
    pub fn advance(&self, stage: StageId) {
        self.emit(stage, StageStatus::Complete);
    }

    pub fn complete_all(&self) {
        for stage in StageId::ALL {
            self.emit(stage, StageStatus::Complete);
        }
    }

    fn emit(&self, stage: StageId, status: StageStatus) {
        self.observer.on_progress(ProgressEvent::new(stage, status));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_start_announces_all_pending() {
        let observer = RecordingObserver::new();
        ProgressTracker::new(&observer).start();

        let events = observer.events();
        assert_eq!(events.len(), 6);
        assert!(events.iter().all(|e| e.status == StageStatus::Pending));
        let indices: Vec<_> = events.iter().map(|e| e.stage_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_channel_observer_forwards() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let observer = ChannelObserver::new(tx);
        let tracker = ProgressTracker::new(&observer);
        tracker.activate(StageId::Dining);
        tracker.advance(StageId::Dining);

        match rx.try_recv().unwrap() {
            PipelineEvent::Progress(event) => {
                assert_eq!(event, ProgressEvent::new(StageId::Dining, StageStatus::Active))
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(
            rx.try_recv().unwrap(),
            PipelineEvent::Progress(ProgressEvent { status: StageStatus::Complete, .. })
        ));
    }

    #[test]
    fn test_channel_observer_forwards_activity_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let log = ActivityLog::new();
        let observer = ChannelObserver::new(tx).with_activity(log.clone());

        log.push("Dining Connoisseur", "Dining Connoisseur starting");
        observer.on_progress(ProgressEvent::new(StageId::Dining, StageStatus::Active));
        observer.flush_activity();

        assert!(matches!(
            rx.try_recv().unwrap(),
            PipelineEvent::Activity(entry) if entry.message == "Dining Connoisseur starting"
        ));
        assert!(matches!(rx.try_recv().unwrap(), PipelineEvent::Progress(_)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_observer_ignores_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        ChannelObserver::new(tx).on_progress(ProgressEvent::new(
            StageId::Destination,
            StageStatus::Active,
        ));
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(ProgressEvent::new(StageId::Itinerary, StageStatus::Active))
            .unwrap();
        assert_eq!(json["stage_index"], 5);
        assert_eq!(json["stage"], "itinerary");
        assert_eq!(json["status"], "active");
    }
}
