/// The capabilities the engine needs from the host's video element. The
/// presentation layer implements this over the real player; the engine never
/// touches the platform directly and never polls for the element to appear —
/// the host activates a session once the surface is ready.
pub trait VideoSurface: Send + Sync {
    /// Current playhead position in seconds.
    fn current_time(&self) -> f64;

    /// Total duration in seconds, when known.
    fn duration(&self) -> Option<f64>;

    fn playback_rate(&self) -> f64;

    fn set_playback_rate(&self, rate: f64);

    fn seek(&self, time: f64);

    fn is_playing(&self) -> bool;

    /// Whether an in-stream ad is currently playing.
    fn ad_active(&self) -> bool {
        false
    }

    /// Jump past the active ad, if any.
    fn skip_ad(&self) {}
}
