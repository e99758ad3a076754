use serde::Serialize;
use tokio::sync::broadcast;

use crate::bookmarks::Bookmark;

/// Notifications for the presentation layer. Every event is emitted after the
/// mutation it describes has been persisted, so a subscriber re-rendering on
/// receipt never observes state ahead of storage.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EngineEvent {
    BookmarksChanged { bookmarks: Vec<Bookmark> },
    CursorMoved { index: usize, time: u32 },
    SpeedChanged { rate: f64, manual: bool },
    TimeSavedUpdated { total_secs: f64 },
    RemainingTime { remaining_secs: f64, percent: f64 },
    OverlayToggled { visible: bool },
    BookmarksImported { taken: usize },
    BookmarksCleared,
    AdSkipped,
}

/// Broadcast fan-out to however many views are listening. Emission never
/// blocks and never fails: with no subscribers the event is simply dropped.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(64);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
