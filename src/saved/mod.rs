use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::Mutex;

use crate::events::{EngineEvent, EventBus};
use crate::settings::Settings;

/// Integrates playback-above-1x into the persisted time-saved counter. Each
/// interval of `e` wall-clock seconds at rate `r > 1` credits
/// `e * (r - 1) / r`: the share of the interval that watching at 1x would
/// have spent waiting.
#[derive(Clone)]
pub struct TimeSavedAccumulator {
    last_tick: Arc<Mutex<Option<Instant>>>,
    settings: Settings,
    events: EventBus,
}

impl TimeSavedAccumulator {
    pub fn new(settings: Settings, events: EventBus) -> Self {
        Self {
            last_tick: Arc::new(Mutex::new(None)),
            settings,
            events,
        }
    }

    /// Forgets the baseline; the next tick only re-establishes it. Called on
    /// (re)initialization so time spent between sessions contributes nothing.
    pub async fn reset(&self) {
        *self.last_tick.lock().await = None;
    }

    /// Periodic sample. Returns the seconds credited for this interval. A
    /// paused video or a rate at or below 1x advances the baseline with zero
    /// contribution; no time debt carries over.
    pub async fn tick(&self, now: Instant, playing: bool, rate: f64) -> Result<f64> {
        let elapsed = {
            let mut last = self.last_tick.lock().await;
            let elapsed = last.map(|prev| now.saturating_duration_since(prev).as_secs_f64());
            *last = Some(now);
            match elapsed {
                Some(secs) => secs,
                None => return Ok(0.0),
            }
        };

        if !playing || rate <= 1.0 || !rate.is_finite() {
            return Ok(0.0);
        }

        let saved = elapsed * (rate - 1.0) / rate;
        let total = self.settings.add_time_saved(saved).await?;
        self.events
            .emit(EngineEvent::TimeSavedUpdated { total_secs: total });
        Ok(saved)
    }

    pub async fn total(&self) -> Result<f64> {
        self.settings.time_saved().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn accumulator() -> TimeSavedAccumulator {
        let settings = Settings::new(crate::store::Store::in_memory().unwrap());
        TimeSavedAccumulator::new(settings, EventBus::new())
    }

    #[tokio::test]
    async fn first_tick_only_establishes_the_baseline() {
        let saved = accumulator();
        let credited = saved.tick(Instant::now(), true, 2.0).await.unwrap();
        assert_eq!(credited, 0.0);
        assert_eq!(saved.total().await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn ten_seconds_at_double_speed_saves_five() {
        let saved = accumulator();
        let t0 = Instant::now();
        saved.tick(t0, true, 2.0).await.unwrap();

        let mut credited = 0.0;
        for secs in 1..=10 {
            credited += saved
                .tick(t0 + Duration::from_secs(secs), true, 2.0)
                .await
                .unwrap();
        }

        assert!((credited - 5.0).abs() < 1e-9);
        assert!((saved.total().await.unwrap() - 5.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn paused_or_normal_speed_contributes_nothing() {
        let saved = accumulator();
        let t0 = Instant::now();
        saved.tick(t0, true, 2.0).await.unwrap();

        let credited = saved
            .tick(t0 + Duration::from_secs(5), false, 2.0)
            .await
            .unwrap();
        assert_eq!(credited, 0.0);

        let credited = saved
            .tick(t0 + Duration::from_secs(10), true, 1.0)
            .await
            .unwrap();
        assert_eq!(credited, 0.0);
        assert_eq!(saved.total().await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn idle_interval_leaves_no_debt() {
        let saved = accumulator();
        let t0 = Instant::now();
        saved.tick(t0, true, 2.0).await.unwrap();

        // Paused for 100s, then one second of 2x playback: only that second
        // counts.
        saved
            .tick(t0 + Duration::from_secs(100), false, 2.0)
            .await
            .unwrap();
        let credited = saved
            .tick(t0 + Duration::from_secs(101), true, 2.0)
            .await
            .unwrap();
        assert!((credited - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn reset_drops_the_baseline() {
        let saved = accumulator();
        let t0 = Instant::now();
        saved.tick(t0, true, 2.0).await.unwrap();
        saved.reset().await;

        let credited = saved
            .tick(t0 + Duration::from_secs(50), true, 2.0)
            .await
            .unwrap();
        assert_eq!(credited, 0.0);
    }
}
