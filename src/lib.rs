//! Core engine for a video bookmarking and playback-state tool: per-video
//! timestamp bookmarks with labels and undo, a persisted global playback
//! speed with a manual-override window, an ad auto-skip flag, and a running
//! "time saved" counter. The presentation layer is a consumer: it implements
//! [`VideoSurface`] over the real player, dispatches [`Command`]s, and
//! subscribes to [`EngineEvent`]s to re-render.

mod bookmarks;
mod events;
mod saved;
mod session;
mod settings;
mod speed;
mod store;
pub mod test_utils;
mod utils;
mod video;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast;

pub use bookmarks::{floor_time, Bookmark, BookmarkList, DeletedEntry, ExportDocument, UndoStack};
pub use events::{EngineEvent, EventBus};
pub use saved::TimeSavedAccumulator;
pub use session::{
    storage_key, Command, Outcome, SessionController, SessionState, VideoDescriptor, HELP_TEXT,
    TICK_INTERVAL,
};
pub use settings::{Settings, DEFAULT_SPEED};
pub use speed::{SpeedController, SpeedState, MAX_RATE, MIN_RATE, OVERRIDE_WINDOW, STEP};
pub use store::{Partition, Store};
pub use utils::format::{format_clock, format_remaining_line, format_time_saved};
pub use video::VideoSurface;

/// Everything the host wires together once at startup: the store, the global
/// settings, the event bus, and the session controller.
pub struct Engine {
    store: Store,
    settings: Settings,
    events: EventBus,
    session: SessionController,
}

impl Engine {
    /// Opens (or creates) the store at `db_path` and builds the engine
    /// around the given video surface.
    pub fn open(db_path: PathBuf, video: Arc<dyn VideoSurface>) -> Result<Self> {
        Ok(Self::with_store(Store::open(db_path)?, video))
    }

    pub fn with_store(store: Store, video: Arc<dyn VideoSurface>) -> Self {
        let settings = Settings::new(store.clone());
        let events = EventBus::new();
        let session = SessionController::new(
            store.clone(),
            settings.clone(),
            events.clone(),
            video,
        );
        Self {
            store,
            settings,
            events,
            session,
        }
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }
}

/// Logging setup for the host shell (reads `RUST_LOG`).
pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}
