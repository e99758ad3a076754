use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use log::{debug, info};
use tokio::sync::Mutex;

use crate::events::{EngineEvent, EventBus};
use crate::settings::Settings;
use crate::video::VideoSurface;

pub const MIN_RATE: f64 = 0.25;
pub const MAX_RATE: f64 = 20.0;
pub const STEP: f64 = 0.25;

/// How long a manual speed command suppresses automatic reconciliation.
pub const OVERRIDE_WINDOW: Duration = Duration::from_secs(5);

/// The two states of the speed controller. In `Auto`, the periodic tick keeps
/// the video at the persisted global speed; a manual command enters
/// `ManualOverride`, which silences the tick until the window expires.
/// Further manual commands re-arm the window from that moment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeedState {
    Auto,
    ManualOverride { expires_at: Instant },
}

/// Reconciles the video's playback rate against the persisted setting.
///
/// Timestamps are passed in by the caller so the window logic stays testable
/// without sleeping; the session ticker feeds it `Instant::now()`.
#[derive(Clone)]
pub struct SpeedController {
    state: Arc<Mutex<SpeedState>>,
    settings: Settings,
    events: EventBus,
}

impl SpeedController {
    pub fn new(settings: Settings, events: EventBus) -> Self {
        Self {
            state: Arc::new(Mutex::new(SpeedState::Auto)),
            settings,
            events,
        }
    }

    /// Discrete preset command (the 1x..9x keys).
    pub async fn set_preset(
        &self,
        video: &dyn VideoSurface,
        preset: u8,
        now: Instant,
    ) -> Result<f64> {
        if !(1..=9).contains(&preset) {
            bail!("speed preset must be between 1 and 9");
        }
        self.apply_manual(video, f64::from(preset), now).await
    }

    /// Relative step command (+0.25x).
    pub async fn step_up(&self, video: &dyn VideoSurface, now: Instant) -> Result<f64> {
        let current = round_rate(video.playback_rate());
        self.apply_manual(video, current + STEP, now).await
    }

    /// Relative step command (-0.25x).
    pub async fn step_down(&self, video: &dyn VideoSurface, now: Instant) -> Result<f64> {
        let current = round_rate(video.playback_rate());
        self.apply_manual(video, current - STEP, now).await
    }

    async fn apply_manual(
        &self,
        video: &dyn VideoSurface,
        rate: f64,
        now: Instant,
    ) -> Result<f64> {
        let rate = round_rate(rate.clamp(MIN_RATE, MAX_RATE));

        video.set_playback_rate(rate);
        self.settings.set_speed(rate).await?;

        {
            let mut state = self.state.lock().await;
            // Auto -> ManualOverride, or re-arm the window if already overridden.
            *state = SpeedState::ManualOverride {
                expires_at: now + OVERRIDE_WINDOW,
            };
        }

        info!("Manual: playback speed set to {rate}x");
        self.events.emit(EngineEvent::SpeedChanged { rate, manual: true });
        Ok(rate)
    }

    /// Periodic reconciliation. A no-op while a manual override is live;
    /// otherwise re-reads the persisted speed and re-applies it, which is how
    /// a speed set elsewhere (another video, a reload, the options page)
    /// reaches this player.
    pub async fn reconcile_tick(&self, video: &dyn VideoSurface, now: Instant) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            match *state {
                SpeedState::ManualOverride { expires_at } if now < expires_at => return Ok(()),
                SpeedState::ManualOverride { .. } => {
                    // Window elapsed with no further manual command.
                    *state = SpeedState::Auto;
                }
                SpeedState::Auto => {}
            }
        }

        let desired = self.settings.speed().await?;
        let current = round_rate(video.playback_rate());
        video.set_playback_rate(desired);

        if (current - desired).abs() > f64::EPSILON {
            debug!("Auto: playback speed set to {desired}x");
            self.events.emit(EngineEvent::SpeedChanged {
                rate: desired,
                manual: false,
            });
        }
        Ok(())
    }

    pub async fn is_overridden(&self, now: Instant) -> bool {
        match *self.state.lock().await {
            SpeedState::ManualOverride { expires_at } => now < expires_at,
            SpeedState::Auto => false,
        }
    }
}

/// Two-decimal rounding applied before display and storage, so repeated
/// quarter steps never accumulate float drift.
fn round_rate(rate: f64) -> f64 {
    (rate * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeVideo;

    fn controller() -> SpeedController {
        let settings = Settings::new(crate::store::Store::in_memory().unwrap());
        SpeedController::new(settings, EventBus::new())
    }

    #[tokio::test]
    async fn preset_applies_immediately_and_persists() {
        let speed = controller();
        let video = FakeVideo::new();
        let t0 = Instant::now();

        let rate = speed.set_preset(&video, 2, t0).await.unwrap();
        assert_eq!(rate, 2.0);
        assert_eq!(video.playback_rate(), 2.0);
        assert_eq!(speed.settings.speed().await.unwrap(), 2.0);
        assert!(speed.is_overridden(t0).await);
    }

    #[tokio::test]
    async fn preset_outside_one_to_nine_is_rejected() {
        let speed = controller();
        let video = FakeVideo::new();
        assert!(speed.set_preset(&video, 0, Instant::now()).await.is_err());
        assert!(speed.set_preset(&video, 10, Instant::now()).await.is_err());
        assert_eq!(video.playback_rate(), 1.0);
    }

    #[tokio::test]
    async fn steps_are_clamped_and_rounded() {
        let speed = controller();
        let video = FakeVideo::new();
        let t0 = Instant::now();

        video.set_playback_rate(0.25);
        let rate = speed.step_down(&video, t0).await.unwrap();
        assert_eq!(rate, MIN_RATE);

        video.set_playback_rate(19.9);
        let rate = speed.step_up(&video, t0).await.unwrap();
        assert_eq!(rate, MAX_RATE);

        video.set_playback_rate(1.0);
        for _ in 0..3 {
            speed.step_up(&video, t0).await.unwrap();
        }
        assert_eq!(video.playback_rate(), 1.75);
    }

    #[tokio::test]
    async fn ticks_inside_the_window_leave_the_manual_rate_alone() {
        let speed = controller();
        let video = FakeVideo::new();
        let t0 = Instant::now();

        // Global speed says 1.5x, but the user just asked for 3x.
        speed.settings.set_speed(1.5).await.unwrap();
        speed.set_preset(&video, 3, t0).await.unwrap();
        // Persisting the manual rate is part of the command.
        assert_eq!(speed.settings.speed().await.unwrap(), 3.0);

        speed.settings.set_speed(1.5).await.unwrap();
        for secs in 1..=4 {
            let tick = t0 + Duration::from_secs(secs);
            speed.reconcile_tick(&video, tick).await.unwrap();
            assert_eq!(video.playback_rate(), 3.0, "tick at t={secs}");
        }

        // After the 5s window the tick re-applies the stored speed.
        let t6 = t0 + Duration::from_secs(6);
        speed.reconcile_tick(&video, t6).await.unwrap();
        assert_eq!(video.playback_rate(), 1.5);
        assert!(!speed.is_overridden(t6).await);
    }

    #[tokio::test]
    async fn another_manual_command_rearms_the_window() {
        let speed = controller();
        let video = FakeVideo::new();
        let t0 = Instant::now();

        speed.set_preset(&video, 3, t0).await.unwrap();
        let t4 = t0 + Duration::from_secs(4);
        speed.step_up(&video, t4).await.unwrap();

        // 6s after the first command but only 2s after the second: still held.
        speed.settings.set_speed(1.0).await.unwrap();
        let t6 = t0 + Duration::from_secs(6);
        speed.reconcile_tick(&video, t6).await.unwrap();
        assert_eq!(video.playback_rate(), 3.25);

        let t10 = t0 + Duration::from_secs(10);
        speed.reconcile_tick(&video, t10).await.unwrap();
        assert_eq!(video.playback_rate(), 1.0);
    }

    #[tokio::test]
    async fn auto_tick_applies_the_stored_speed() {
        let speed = controller();
        let video = FakeVideo::new();

        speed.settings.set_speed(1.75).await.unwrap();
        speed.reconcile_tick(&video, Instant::now()).await.unwrap();
        assert_eq!(video.playback_rate(), 1.75);
    }
}
