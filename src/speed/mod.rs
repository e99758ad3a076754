mod controller;

pub use controller::{SpeedController, SpeedState, MAX_RATE, MIN_RATE, OVERRIDE_WINDOW, STEP};
