use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use log::{debug, error, info};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::bookmarks::{floor_time, Bookmark, BookmarkList, ExportDocument};
use crate::events::{EngineEvent, EventBus};
use crate::saved::TimeSavedAccumulator;
use crate::settings::Settings;
use crate::speed::SpeedController;
use crate::store::{Partition, Store};
use crate::utils::format::format_clock;
use crate::video::VideoSurface;

use super::state::{SessionState, VideoDescriptor};

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

pub const HELP_TEXT: &str = "\
Shortcuts:
  P              Add bookmark at the current time
  L              Label the bookmark at the current time
  Shift+PgUp     Next bookmark
  Shift+PgDn     Previous bookmark
  Shift+R        Remove the bookmark at the current time
  Shift+C        Clear all bookmarks
  Alt+1..9       Set playback speed
  + / -          Step playback speed by 0.25x
  Alt+R          Toggle the remaining-time overlay
  Shift+/        Show this help";

struct Ticker {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl Drop for Ticker {
    // Covers the path where the last controller clone is dropped without
    // deactivate(): the tick task must not outlive its engine.
    fn drop(&mut self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

/// Owns the per-video session (bookmarks, cursor, undo stack) and the 1 s
/// background tick that reconciles speed, accrues time saved, feeds the
/// remaining-time overlay, and skips ads.
///
/// Every mutation persists before its event is emitted, so subscribers that
/// re-render on receipt never run ahead of storage.
#[derive(Clone)]
pub struct SessionController {
    session: Arc<Mutex<Option<SessionState>>>,
    epoch: Arc<AtomicU64>,
    overlay_visible: Arc<AtomicBool>,
    store: Store,
    settings: Settings,
    events: EventBus,
    speed: SpeedController,
    saved: TimeSavedAccumulator,
    video: Arc<dyn VideoSurface>,
    ticker: Arc<Mutex<Option<Ticker>>>,
}

impl SessionController {
    pub fn new(
        store: Store,
        settings: Settings,
        events: EventBus,
        video: Arc<dyn VideoSurface>,
    ) -> Self {
        let speed = SpeedController::new(settings.clone(), events.clone());
        let saved = TimeSavedAccumulator::new(settings.clone(), events.clone());
        Self {
            session: Arc::new(Mutex::new(None)),
            epoch: Arc::new(AtomicU64::new(0)),
            overlay_visible: Arc::new(AtomicBool::new(true)),
            store,
            settings,
            events,
            speed,
            saved,
            video,
            ticker: Arc::new(Mutex::new(None)),
        }
    }

    /// Switches to a new video. Session-scoped state is reset before the
    /// stored list is requested; if another activation happens while that
    /// load is in flight, the completion notices its epoch is stale and
    /// discards itself instead of overwriting the newer session.
    pub async fn activate(&self, descriptor: VideoDescriptor) -> Result<()> {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let storage_key = descriptor.storage_key();
        info!("Activating session for video {}", descriptor.video_id);

        {
            let mut guard = self.session.lock().await;
            *guard = Some(SessionState::new(descriptor, epoch));
        }
        self.saved.reset().await;
        self.spawn_ticker().await;

        let stored = self.store.get(Partition::Local, &storage_key).await?;
        let list = BookmarkList::from_stored(stored);

        match self.apply_loaded(epoch, list).await {
            Some(bookmarks) => self.events.emit(EngineEvent::BookmarksChanged { bookmarks }),
            None => debug!("Discarding stale bookmark load for epoch {epoch}"),
        }
        Ok(())
    }

    /// Applies a completed bookmark load, unless `epoch` no longer identifies
    /// the active session, in which case the load is discarded.
    async fn apply_loaded(&self, epoch: u64, list: BookmarkList) -> Option<Vec<Bookmark>> {
        let mut guard = self.session.lock().await;
        match guard.as_mut() {
            Some(state) if state.epoch == epoch => {
                state.bookmarks = list;
                Some(state.bookmarks.to_vec())
            }
            _ => None,
        }
    }

    /// Tears the session down and stops the background tick.
    pub async fn deactivate(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.cancel_ticker().await;
        let mut guard = self.session.lock().await;
        *guard = None;
    }

    pub async fn descriptor(&self) -> Option<VideoDescriptor> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|state| state.descriptor.clone())
    }

    pub async fn bookmarks(&self) -> Vec<Bookmark> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|state| state.bookmarks.to_vec())
            .unwrap_or_default()
    }

    pub async fn cursor(&self) -> Option<usize> {
        self.session.lock().await.as_ref().and_then(|state| state.cursor)
    }

    pub async fn undo_depth(&self) -> usize {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|state| state.undo.len())
            .unwrap_or(0)
    }

    /// Bookmarks the current playhead second. Returns the new bookmark, or
    /// `None` when that second is already bookmarked (or no session is
    /// active).
    pub async fn add_bookmark(&self) -> Result<Option<Bookmark>> {
        let time = self.video.current_time();
        let mut guard = self.session.lock().await;
        let Some(state) = guard.as_mut() else {
            return Ok(None);
        };
        let Some(index) = state.bookmarks.add(time) else {
            return Ok(None);
        };
        state.cursor = Some(index);
        let bookmark = state.bookmarks.get(index).cloned();
        self.persist_list(state).await?;
        let snapshot = state.bookmarks.to_vec();
        drop(guard);

        if let Some(bm) = &bookmark {
            info!("Bookmarked at {}", format_clock(bm.time));
        }
        self.events
            .emit(EngineEvent::BookmarksChanged { bookmarks: snapshot });
        Ok(bookmark)
    }

    /// Labels the bookmark at the current playhead second. Empty labels and
    /// seconds without a bookmark are no-ops.
    pub async fn label_current(&self, label: &str) -> Result<bool> {
        let Some(secs) = floor_time(self.video.current_time()) else {
            return Ok(false);
        };
        let mut guard = self.session.lock().await;
        let Some(state) = guard.as_mut() else {
            return Ok(false);
        };
        if !state.bookmarks.set_label(secs, label) {
            return Ok(false);
        }
        self.persist_list(state).await?;
        let snapshot = state.bookmarks.to_vec();
        drop(guard);

        self.events
            .emit(EngineEvent::BookmarksChanged { bookmarks: snapshot });
        Ok(true)
    }

    pub async fn navigate_next(&self) -> Option<u32> {
        self.navigate(SessionState::navigate_next).await
    }

    pub async fn navigate_prev(&self) -> Option<u32> {
        self.navigate(SessionState::navigate_prev).await
    }

    async fn navigate(&self, step: fn(&mut SessionState) -> Option<u32>) -> Option<u32> {
        let mut guard = self.session.lock().await;
        let state = guard.as_mut()?;
        let time = step(state)?;
        let index = state.cursor?;
        drop(guard);

        self.video.seek(f64::from(time));
        self.events.emit(EngineEvent::CursorMoved { index, time });
        Some(time)
    }

    /// Removes the bookmark at the current playhead second, if any.
    pub async fn remove_current(&self) -> Result<bool> {
        let Some(secs) = floor_time(self.video.current_time()) else {
            return Ok(false);
        };
        let mut guard = self.session.lock().await;
        let Some(state) = guard.as_mut() else {
            return Ok(false);
        };
        if !state.bookmarks.remove_at_time(secs) {
            return Ok(false);
        }
        state.clamp_cursor();
        self.persist_list(state).await?;
        let snapshot = state.bookmarks.to_vec();
        drop(guard);

        self.events
            .emit(EngineEvent::BookmarksChanged { bookmarks: snapshot });
        Ok(true)
    }

    /// Removes the bookmark at a list index (panel delete button) and records
    /// it on the undo stack.
    pub async fn remove_at(&self, index: usize) -> Result<Option<Bookmark>> {
        let mut guard = self.session.lock().await;
        let Some(state) = guard.as_mut() else {
            return Ok(None);
        };
        let Some(bookmark) = state.bookmarks.remove_at(index) else {
            return Ok(None);
        };
        state.undo.push(bookmark.clone(), index);
        state.clamp_cursor();
        self.persist_list(state).await?;
        let snapshot = state.bookmarks.to_vec();
        drop(guard);

        self.events
            .emit(EngineEvent::BookmarksChanged { bookmarks: snapshot });
        Ok(Some(bookmark))
    }

    /// Restores the most recently deleted bookmark at its original position.
    /// `None` means there was nothing to undo.
    pub async fn undo(&self) -> Result<Option<Bookmark>> {
        let mut guard = self.session.lock().await;
        let Some(state) = guard.as_mut() else {
            return Ok(None);
        };
        let Some(entry) = state.undo.pop() else {
            return Ok(None);
        };
        state
            .bookmarks
            .restore(entry.bookmark.clone(), entry.original_index);
        self.persist_list(state).await?;
        let snapshot = state.bookmarks.to_vec();
        drop(guard);

        info!("Restored bookmark at {}", format_clock(entry.bookmark.time));
        self.events
            .emit(EngineEvent::BookmarksChanged { bookmarks: snapshot });
        Ok(Some(entry.bookmark))
    }

    /// Drops every bookmark and deletes the storage key outright. An empty
    /// list is never written back, so "cleared" and "never bookmarked" are
    /// indistinguishable on the next load. Returns `false` when no session
    /// is active.
    pub async fn clear_all(&self) -> Result<bool> {
        let mut guard = self.session.lock().await;
        let Some(state) = guard.as_mut() else {
            return Ok(false);
        };
        state.bookmarks.clear();
        state.clamp_cursor();
        let key = state.storage_key.clone();
        self.store.remove(Partition::Local, &key).await?;
        drop(guard);

        self.events.emit(EngineEvent::BookmarksChanged {
            bookmarks: Vec::new(),
        });
        self.events.emit(EngineEvent::BookmarksCleared);
        Ok(true)
    }

    /// Merges an exported document into the current list. Existing bookmarks
    /// win at shared timestamps. Returns how many entries were imported.
    pub async fn import(&self, text: &str) -> Result<usize> {
        let document = ExportDocument::parse(text)?;

        let mut guard = self.session.lock().await;
        let Some(state) = guard.as_mut() else {
            bail!("no active video session to import into");
        };
        let taken = state.bookmarks.merge_import(document.bookmarks);
        self.persist_list(state).await?;
        let snapshot = state.bookmarks.to_vec();
        drop(guard);

        info!("Imported {taken} bookmark(s)");
        self.events.emit(EngineEvent::BookmarksImported { taken });
        self.events
            .emit(EngineEvent::BookmarksChanged { bookmarks: snapshot });
        Ok(taken)
    }

    /// Snapshot of the current list with provenance, ready to serialize. A
    /// pure read; nothing is persisted.
    pub async fn export(&self) -> Result<ExportDocument> {
        let guard = self.session.lock().await;
        let Some(state) = guard.as_ref() else {
            bail!("no active video session to export");
        };
        Ok(ExportDocument::snapshot(&state.descriptor, &state.bookmarks))
    }

    pub async fn set_speed_preset(&self, preset: u8) -> Result<f64> {
        self.speed
            .set_preset(self.video.as_ref(), preset, Instant::now())
            .await
    }

    pub async fn speed_up(&self) -> Result<f64> {
        self.speed.step_up(self.video.as_ref(), Instant::now()).await
    }

    pub async fn speed_down(&self) -> Result<f64> {
        self.speed.step_down(self.video.as_ref(), Instant::now()).await
    }

    pub fn toggle_overlay(&self) -> bool {
        let visible = !self.overlay_visible.fetch_xor(true, Ordering::SeqCst);
        self.events.emit(EngineEvent::OverlayToggled { visible });
        visible
    }

    pub fn overlay_visible(&self) -> bool {
        self.overlay_visible.load(Ordering::SeqCst)
    }

    pub async fn time_saved(&self) -> Result<f64> {
        self.saved.total().await
    }

    pub fn help_text(&self) -> &'static str {
        HELP_TEXT
    }

    async fn persist_list(&self, state: &SessionState) -> Result<()> {
        self.store
            .set(Partition::Local, &state.storage_key, state.bookmarks.to_value())
            .await
    }

    async fn spawn_ticker(&self) {
        let mut guard = self.ticker.lock().await;
        // Dropping the previous ticker cancels and aborts it.
        drop(guard.take());

        let cancel = CancellationToken::new();
        let speed = self.speed.clone();
        let saved = self.saved.clone();
        let settings = self.settings.clone();
        let events = self.events.clone();
        let video = Arc::clone(&self.video);
        let overlay = Arc::clone(&self.overlay_visible);
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(TICK_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_tick(&speed, &saved, &settings, &events, video.as_ref(), &overlay).await;
                    }
                    _ = token.cancelled() => {
                        debug!("Session ticker shutting down");
                        break;
                    }
                }
            }
        });

        *guard = Some(Ticker { handle, cancel });
    }

    async fn cancel_ticker(&self) {
        let mut guard = self.ticker.lock().await;
        if let Some(mut ticker) = guard.take() {
            ticker.cancel.cancel();
            if let Err(err) = (&mut ticker.handle).await {
                if !err.is_cancelled() {
                    error!("Session ticker failed to join: {err}");
                }
            }
        }
    }
}

async fn run_tick(
    speed: &SpeedController,
    saved: &TimeSavedAccumulator,
    settings: &Settings,
    events: &EventBus,
    video: &dyn VideoSurface,
    overlay: &AtomicBool,
) {
    let now = Instant::now();

    if let Err(err) = speed.reconcile_tick(video, now).await {
        error!("Speed reconciliation failed: {err:#}");
    }

    if let Err(err) = saved.tick(now, video.is_playing(), video.playback_rate()).await {
        error!("Time-saved update failed: {err:#}");
    }

    if overlay.load(Ordering::SeqCst) {
        if let Some(duration) = video.duration() {
            if duration > 0.0 {
                let remaining = (duration - video.current_time()).max(0.0);
                let percent = (remaining / duration * 100.0).clamp(0.0, 100.0);
                events.emit(EngineEvent::RemainingTime {
                    remaining_secs: remaining,
                    percent,
                });
            }
        }
    }

    match settings.skip_ads().await {
        Ok(true) if video.ad_active() => {
            video.skip_ad();
            info!("Skipped an in-stream ad");
            events.emit(EngineEvent::AdSkipped);
        }
        Ok(_) => {}
        Err(err) => error!("Failed to read skip-ads setting: {err:#}"),
    }
}
