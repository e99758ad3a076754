use anyhow::Result;
use log::warn;
use serde_json::Value;

use crate::store::{Partition, Store};

pub const DEFAULT_SPEED: f64 = 1.0;
const MIN_SANE_SPEED: f64 = 0.1;

const KEY_SPEED: &str = "speed";
const KEY_SKIP_ADS: &str = "skipAds";
const KEY_TIME_SAVED: &str = "timeSaved";

/// Facade over the synced settings partition: the persisted playback speed,
/// the ad auto-skip flag, and the aggregate time-saved counter. These apply
/// across all videos, unlike the per-video bookmark lists.
#[derive(Clone)]
pub struct Settings {
    store: Store,
}

impl Settings {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// The persisted global speed, sanitized. Older versions stored the value
    /// as a string, so both encodings are accepted.
    pub async fn speed(&self) -> Result<f64> {
        let raw = self.store.get(Partition::Sync, KEY_SPEED).await?;
        Ok(sanitize_speed(raw))
    }

    pub async fn set_speed(&self, speed: f64) -> Result<()> {
        self.store
            .set_json(Partition::Sync, KEY_SPEED, &speed)
            .await
    }

    pub async fn skip_ads(&self) -> Result<bool> {
        Ok(self
            .store
            .get_json(Partition::Sync, KEY_SKIP_ADS)
            .await?
            .unwrap_or(false))
    }

    pub async fn set_skip_ads(&self, enabled: bool) -> Result<()> {
        self.store
            .set_json(Partition::Sync, KEY_SKIP_ADS, &enabled)
            .await
    }

    pub async fn time_saved(&self) -> Result<f64> {
        Ok(self
            .store
            .get_json::<f64>(Partition::Sync, KEY_TIME_SAVED)
            .await?
            .filter(|total| total.is_finite() && *total >= 0.0)
            .unwrap_or(0.0))
    }

    /// Adds to the running time-saved total and persists the new value,
    /// which is returned.
    pub async fn add_time_saved(&self, delta_secs: f64) -> Result<f64> {
        let total = self.time_saved().await? + delta_secs.max(0.0);
        self.store
            .set_json(Partition::Sync, KEY_TIME_SAVED, &total)
            .await?;
        Ok(total)
    }
}

/// Accepts a stored speed as a number or a numeric string; anything
/// non-finite or below the sane floor falls back to the default.
fn sanitize_speed(raw: Option<Value>) -> f64 {
    let parsed = match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.parse::<f64>().ok(),
        Some(other) => {
            warn!("Stored speed has unexpected type: {other}");
            None
        }
        None => None,
    };

    match parsed {
        Some(speed) if speed.is_finite() && speed >= MIN_SANE_SPEED => speed,
        Some(speed) => {
            warn!("Stored speed {speed} is out of range, using default");
            DEFAULT_SPEED
        }
        None => DEFAULT_SPEED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings() -> Settings {
        Settings::new(Store::in_memory().unwrap())
    }

    #[tokio::test]
    async fn speed_defaults_to_one() {
        assert_eq!(settings().speed().await.unwrap(), DEFAULT_SPEED);
    }

    #[tokio::test]
    async fn speed_round_trips() {
        let settings = settings();
        settings.set_speed(1.75).await.unwrap();
        assert_eq!(settings.speed().await.unwrap(), 1.75);
    }

    #[tokio::test]
    async fn legacy_string_speed_is_accepted() {
        let settings = settings();
        settings
            .store
            .set(Partition::Sync, KEY_SPEED, json!("2.5"))
            .await
            .unwrap();
        assert_eq!(settings.speed().await.unwrap(), 2.5);
    }

    #[tokio::test]
    async fn out_of_range_speed_falls_back_to_default() {
        let settings = settings();
        settings
            .store
            .set(Partition::Sync, KEY_SPEED, json!(0.05))
            .await
            .unwrap();
        assert_eq!(settings.speed().await.unwrap(), DEFAULT_SPEED);

        settings
            .store
            .set(Partition::Sync, KEY_SPEED, json!("garbage"))
            .await
            .unwrap();
        assert_eq!(settings.speed().await.unwrap(), DEFAULT_SPEED);
    }

    #[tokio::test]
    async fn time_saved_accumulates_and_persists() {
        let settings = settings();
        assert_eq!(settings.time_saved().await.unwrap(), 0.0);
        let total = settings.add_time_saved(5.0).await.unwrap();
        assert_eq!(total, 5.0);
        let total = settings.add_time_saved(2.5).await.unwrap();
        assert_eq!(total, 7.5);
        assert_eq!(settings.time_saved().await.unwrap(), 7.5);
    }

    #[tokio::test]
    async fn skip_ads_defaults_off() {
        let settings = settings();
        assert!(!settings.skip_ads().await.unwrap());
        settings.set_skip_ads(true).await.unwrap();
        assert!(settings.skip_ads().await.unwrap());
    }
}
