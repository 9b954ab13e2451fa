//! Fan-out of a single event to a slice of capability sinks, with
//! per-provider error swallowing and a dedup rate limiter. Adapted from a
//! token-bucket rate filter down to a last-seen-timestamp map, since this
//! limiter's job is "drop duplicate keys within a window", not "sustain a
//! rate".

use std::collections::HashMap;
use std::time::{Duration, Instant};

use futures::future::join_all;
use parking_lot::Mutex;

use crate::sink::{DispatchEvent, Sink};

const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

struct RateLimiter {
    seen: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    fn new() -> Self {
        Self { seen: Mutex::new(HashMap::new()) }
    }

    /// `true` if this key hasn't been seen within the window; only a pass
    /// stamps the key, so a burst of blocked duplicates never refreshes
    /// the window on its own.
    fn allow(&self, key: &str) -> bool {
        let mut seen = self.seen.lock();
        let now = Instant::now();
        match seen.get(key) {
            Some(last) if now.duration_since(*last) < RATE_LIMIT_WINDOW => false,
            _ => {
                seen.insert(key.to_string(), now);
                true
            }
        }
    }
}

pub struct Dispatcher {
    sinks: Vec<Box<dyn Sink>>,
    limiter: RateLimiter,
}

impl Dispatcher {
    pub fn new(sinks: Vec<Box<dyn Sink>>) -> Self {
        Self { sinks, limiter: RateLimiter::new() }
    }

    pub async fn dispatch(&self, event: DispatchEvent) {
        let key = format!("{}|{}", event.event_type, event.namespace.as_deref().unwrap_or("global"));
        if !self.limiter.allow(&key) {
            tracing::debug!(key, "notification dropped by rate limiter");
            return;
        }
        let deliveries = self.sinks.iter().filter(|s| s.supports(&event.event_type)).map(|sink| {
            let event = event.clone();
            async move {
                if let Err(err) = sink.deliver(&event).await {
                    tracing::warn!(sink = sink.name(), %err, "notification sink failed, swallowing");
                }
            }
        });
        join_all(deliveries).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::file::FileSink;

    #[tokio::test]
    async fn rate_limiter_drops_second_identical_key_within_window() {
        let limiter = RateLimiter::new();
        assert!(limiter.allow("violation|prod"));
        assert!(!limiter.allow("violation|prod"));
        assert!(limiter.allow("violation|staging"));
    }

    #[tokio::test]
    async fn dispatch_delivers_to_file_sink() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let sink: Box<dyn Sink> = Box::new(FileSink::new(tmp.path().to_path_buf()));
        let dispatcher = Dispatcher::new(vec![sink]);
        dispatcher
            .dispatch(DispatchEvent {
                event_type: "violation".to_string(),
                namespace: Some("prod".to_string()),
                payload: serde_json::json!({"resource": "api"}),
            })
            .await;
        let contents = std::fs::read_to_string(tmp.path()).unwrap();
        assert!(contents.contains("violation"));
    }

    #[tokio::test]
    async fn unsupported_event_type_is_not_delivered() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let sink: Box<dyn Sink> = Box::new(FileSink::with_filter(tmp.path().to_path_buf(), vec!["bypass_granted".to_string()]));
        let dispatcher = Dispatcher::new(vec![sink]);
        dispatcher
            .dispatch(DispatchEvent {
                event_type: "violation".to_string(),
                namespace: Some("prod".to_string()),
                payload: serde_json::json!({}),
            })
            .await;
        let contents = std::fs::read_to_string(tmp.path()).unwrap();
        assert!(contents.is_empty());
    }
}
