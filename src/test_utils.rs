//! Test doubles shared by the unit and integration suites.

use std::sync::Mutex;

use crate::video::VideoSurface;

#[derive(Debug)]
struct FakeVideoState {
    current_time: f64,
    duration: Option<f64>,
    rate: f64,
    playing: bool,
    ad_active: bool,
    seeks: Vec<f64>,
    ads_skipped: u32,
}

impl Default for FakeVideoState {
    fn default() -> Self {
        Self {
            current_time: 0.0,
            duration: None,
            rate: 1.0,
            playing: false,
            ad_active: false,
            seeks: Vec::new(),
            ads_skipped: 0,
        }
    }
}

/// In-memory stand-in for the host video element.
#[derive(Debug, Default)]
pub struct FakeVideo {
    state: Mutex<FakeVideoState>,
}

impl FakeVideo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_position(&self, time: f64) {
        self.state.lock().unwrap().current_time = time;
    }

    pub fn set_duration(&self, duration: f64) {
        self.state.lock().unwrap().duration = Some(duration);
    }

    pub fn set_playing(&self, playing: bool) {
        self.state.lock().unwrap().playing = playing;
    }

    pub fn set_ad_active(&self, active: bool) {
        self.state.lock().unwrap().ad_active = active;
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.state.lock().unwrap().seeks.clone()
    }

    pub fn ads_skipped(&self) -> u32 {
        self.state.lock().unwrap().ads_skipped
    }
}

impl VideoSurface for FakeVideo {
    fn current_time(&self) -> f64 {
        self.state.lock().unwrap().current_time
    }

    fn duration(&self) -> Option<f64> {
        self.state.lock().unwrap().duration
    }

    fn playback_rate(&self) -> f64 {
        self.state.lock().unwrap().rate
    }

    fn set_playback_rate(&self, rate: f64) {
        self.state.lock().unwrap().rate = rate;
    }

    fn seek(&self, time: f64) {
        let mut state = self.state.lock().unwrap();
        state.current_time = time;
        state.seeks.push(time);
    }

    fn is_playing(&self) -> bool {
        self.state.lock().unwrap().playing
    }

    fn ad_active(&self) -> bool {
        self.state.lock().unwrap().ad_active
    }

    fn skip_ad(&self) {
        let mut state = self.state.lock().unwrap();
        state.ad_active = false;
        state.ads_skipped += 1;
    }
}
