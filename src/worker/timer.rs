use rand::Rng;
use std::time::Duration;

use crate::config::DelayRange;

/// Uniformly random duration within the configured range
pub fn random_delay(range: DelayRange) -> Duration {
    let mut rng = rand::thread_rng();
    let delay_ms = rng.gen_range(range.min_ms..=range.max_ms.max(range.min_ms));
    Duration::from_millis(delay_ms)
}
