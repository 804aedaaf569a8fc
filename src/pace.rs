//! Randomized pacing between workflow steps.

use std::time::Duration;

use rand::Rng;

use crate::config::JitterWindow;

/// Pick a uniformly random delay inside the window.
pub fn pick_delay(window: JitterWindow) -> Duration {
    if window.is_zero() {
        return Duration::ZERO;
    }
    let ms = rand::thread_rng().gen_range(window.min_ms..=window.max_ms);
    Duration::from_millis(ms)
}

/// Sleep for a random duration inside the window. Zero-width windows
/// return immediately, which keeps tests fast.
pub async fn jitter(window: JitterWindow) {
    let delay = pick_delay(window);
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
