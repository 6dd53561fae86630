use std::time::Duration;

use tokio::time::Instant;

pub const SENSOR_DATA_POST_INTERVAL: Duration = Duration::from_secs(3 * 60);

#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last_post: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_post: None,
        }
    }

    pub fn is_due(&self) -> bool {
        self.last_post
            .is_none_or(|last| last.elapsed() >= self.interval)
    }

    pub fn mark(&mut self) {
        self.last_post = Some(Instant::now());
    }
}
