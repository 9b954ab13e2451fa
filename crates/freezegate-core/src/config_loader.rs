//! Reactive configuration plane: loads the `policy` record into a typed
//! `Policy`, then keeps it synchronized via watch (default) or polling, a
//! push-with-coalescing-fallback design adapted to a `ResourceStore::watch`
//! stream instead of a filesystem watcher.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use freezegate_kernel::error::ConfigError;
use freezegate_kernel::model::Policy;
use freezegate_kernel::store::{ResourceStore, WatchEvent};
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio_stream::StreamExt;
use tracing::{info, warn};

const DEFAULT_RETRY_ATTEMPTS: u32 = 5;
const DEFAULT_INITIAL_BACKOFF: StdDuration = StdDuration::from_secs(2);

#[derive(Debug, Clone)]
pub enum ReloadMode {
    Watch,
    Poll { interval: StdDuration },
}

pub struct ConfigLoader {
    store: Arc<dyn ResourceStore>,
    record_name: String,
    mode: ReloadMode,
    policy: Arc<RwLock<Policy>>,
    ready: Arc<AtomicBool>,
    reload_errors: Arc<AtomicU64>,
    last_successful_load: Arc<RwLock<Option<DateTime<Utc>>>>,
    stop_tx: RwLock<Option<watch::Sender<bool>>>,
}

impl ConfigLoader {
    pub fn new(store: Arc<dyn ResourceStore>, record_name: impl Into<String>, mode: ReloadMode) -> Self {
        Self {
            store,
            record_name: record_name.into(),
            mode,
            policy: Arc::new(RwLock::new(Policy::default())),
            ready: Arc::new(AtomicBool::new(false)),
            reload_errors: Arc::new(AtomicU64::new(0)),
            last_successful_load: Arc::new(RwLock::new(None)),
            stop_tx: RwLock::new(None),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn get_config(&self) -> Policy {
        self.policy.read().clone()
    }

    pub fn get_reload_errors(&self) -> u64 {
        self.reload_errors.load(Ordering::SeqCst)
    }

    pub fn last_successful_load(&self) -> Option<DateTime<Utc>> {
        *self.last_successful_load.read()
    }

    pub fn record_name(&self) -> &str {
        &self.record_name
    }

    /// Forces an out-of-band reload, used after the REST surface patches the
    /// policy record directly so the change is visible without waiting for
    /// the watch/poll loop's next tick.
    pub async fn force_reload(&self) -> Result<(), ConfigError> {
        self.reload_once().await
    }

    /// One blocking load with bounded exponential-backoff retry, then the
    /// chosen reload strategy is launched as a background task.
    pub async fn start(self: &Arc<Self>) {
        self.initial_load_with_retry().await;
        self.ready.store(true, Ordering::SeqCst);

        let (stop_tx, stop_rx) = watch::channel(false);
        *self.stop_tx.write() = Some(stop_tx);

        let this = Arc::clone(self);
        match this.mode.clone() {
            ReloadMode::Watch => {
                tokio::spawn(async move { this.watch_loop(stop_rx).await });
            }
            ReloadMode::Poll { interval } => {
                tokio::spawn(async move { this.poll_loop(interval, stop_rx).await });
            }
        }
    }

    pub fn stop(&self) {
        if let Some(tx) = self.stop_tx.read().as_ref() {
            let _ = tx.send(true);
        }
    }

    async fn initial_load_with_retry(&self) {
        let mut backoff = DEFAULT_INITIAL_BACKOFF;
        for attempt in 1..=DEFAULT_RETRY_ATTEMPTS {
            match self.reload_once().await {
                Ok(()) => return,
                Err(ConfigError::NotFound { .. }) => {
                    warn!(record = %self.record_name, "policy record missing, installing defaults");
                    *self.policy.write() = Policy::default();
                    return;
                }
                Err(err) => {
                    warn!(record = %self.record_name, attempt, %err, "initial policy load failed, retrying");
                    if attempt == DEFAULT_RETRY_ATTEMPTS {
                        warn!(record = %self.record_name, "exhausted retries, installing defaults");
                        *self.policy.write() = Policy::default();
                        self.reload_errors.fetch_add(1, Ordering::SeqCst);
                        return;
                    }
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    async fn reload_once(&self) -> Result<(), ConfigError> {
        let record = self.store.read(&self.record_name).await?;
        let record = record.ok_or_else(|| ConfigError::NotFound { record: self.record_name.clone() })?;
        let policy = parse_policy(&record.data)?;
        *self.policy.write() = policy;
        *self.last_successful_load.write() = Some(Utc::now());
        Ok(())
    }

    async fn watch_loop(self: Arc<Self>, mut stop_rx: watch::Receiver<bool>) {
        loop {
            if *stop_rx.borrow() {
                return;
            }
            let mut stream = self.store.watch(&self.record_name);
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            return;
                        }
                    }
                    next = stream.next() => {
                        match next {
                            Some(Ok(WatchEvent::Added(record))) | Some(Ok(WatchEvent::Modified(record))) => {
                                match parse_policy(&record.data) {
                                    Ok(policy) => {
                                        *self.policy.write() = policy;
                                        *self.last_successful_load.write() = Some(Utc::now());
                                        info!(record = %self.record_name, "policy reloaded from watch event");
                                    }
                                    Err(err) => {
                                        warn!(record = %self.record_name, %err, "malformed policy record, keeping previous config");
                                        self.reload_errors.fetch_add(1, Ordering::SeqCst);
                                    }
                                }
                            }
                            Some(Ok(WatchEvent::Deleted)) => {
                                warn!(record = %self.record_name, "policy record deleted, installing defaults");
                                *self.policy.write() = Policy::default();
                            }
                            Some(Err(err)) => {
                                warn!(record = %self.record_name, %err, "watch stream error, resubscribing");
                                self.reload_errors.fetch_add(1, Ordering::SeqCst);
                                break;
                            }
                            None => {
                                warn!(record = %self.record_name, "watch stream ended, resubscribing");
                                break;
                            }
                        }
                    }
                }
            }
        }
    }

    async fn poll_loop(self: Arc<Self>, interval: StdDuration, mut stop_rx: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        return;
                    }
                }
                _ = tokio::time::sleep(interval) => {
                    if let Err(err) = self.reload_once().await {
                        warn!(record = %self.record_name, %err, "polling reload failed, retaining previous config");
                        self.reload_errors.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
        }
    }
}

fn parse_policy(data: &std::collections::BTreeMap<String, String>) -> Result<Policy, ConfigError> {
    let mut policy = Policy::default();

    if let Some(v) = data.get("freezeEnabled") {
        policy.freeze_enabled = v.trim().eq_ignore_ascii_case("true");
    }
    if let Some(v) = data.get("freezeUntil") {
        let v = v.trim();
        if !v.is_empty() {
            policy.freeze_until = Some(parse_instant(v)?);
        }
    }
    if let Some(v) = data.get("freezeMessage") {
        policy.freeze_message = v.clone();
    }
    if let Some(v) = data.get("bypassAnnotationKey") {
        if !v.trim().is_empty() {
            policy.bypass_annotation_key = v.trim().to_string();
        }
    }
    if let Some(v) = data.get("bypassAllowedUsers") {
        policy.bypass_allowed_users = parse_list(v);
    }
    if let Some(v) = data.get("apiAllowedServiceaccounts") {
        policy.api_allowed_serviceaccounts = parse_list(v);
    }
    if let Some(v) = data.get("bypassExemptNamespaces") {
        policy.bypass_exempt_namespaces = parse_list(v);
    }
    if let Some(v) = data.get("monitoredResources") {
        policy.monitored_resources = parse_monitored_resources(v);
    }
    if let Some(v) = data.get("failClosed") {
        policy.fail_closed = v.trim().eq_ignore_ascii_case("true");
    }

    Ok(policy)
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, ConfigError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    // Bare (no zone) timestamps are assumed UTC.
    let with_zone = format!("{raw}Z");
    DateTime::parse_from_rfc3339(&with_zone)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ConfigError::Malformed {
            record: "policy".to_string(),
            reason: format!("invalid freezeUntil '{raw}': {e}"),
        })
}

fn parse_list(raw: &str) -> BTreeSet<String> {
    raw.lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.to_string())
        .collect()
}

/// `monitoredResources` is normalized to plural lowercase so it matches the
/// lowercased singular/plural comparison the scope filter does against the
/// request kind, regardless of how the record's casing was authored.
fn parse_monitored_resources(raw: &str) -> BTreeSet<String> {
    if let Ok(serde_yaml::Value::Sequence(items)) = serde_yaml::from_str(raw) {
        let set: BTreeSet<String> = items.into_iter().filter_map(|v| v.as_str().map(str::to_lowercase)).collect();
        if !set.is_empty() {
            return set;
        }
    }
    let set: BTreeSet<String> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect();
    if set.is_empty() {
        let mut default = BTreeSet::new();
        default.insert("deployments".to_string());
        default
    } else {
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::InMemoryResourceStore;
    use freezegate_kernel::store::ResourceRecord;
    use std::collections::BTreeMap;

    fn policy_record(entries: &[(&str, &str)]) -> ResourceRecord {
        let mut data = BTreeMap::new();
        for (k, v) in entries {
            data.insert(k.to_string(), v.to_string());
        }
        ResourceRecord { data, resource_version: "1".to_string() }
    }

    #[tokio::test]
    async fn loads_and_parses_initial_policy() {
        let store = Arc::new(InMemoryResourceStore::new());
        store
            .create("policy", policy_record(&[("freezeEnabled", "TRUE"), ("freezeMessage", "frozen")]))
            .await
            .unwrap();
        let loader = Arc::new(ConfigLoader::new(store, "policy", ReloadMode::Poll { interval: StdDuration::from_secs(3600) }));
        loader.start().await;
        tokio::task::yield_now().await;
        assert!(loader.is_ready());
        let policy = loader.get_config();
        assert!(policy.freeze_enabled);
        assert_eq!(policy.freeze_message, "frozen");
        loader.stop();
    }

    #[tokio::test]
    async fn missing_record_falls_back_to_defaults() {
        let store = Arc::new(InMemoryResourceStore::new());
        let loader = Arc::new(ConfigLoader::new(store, "policy", ReloadMode::Poll { interval: StdDuration::from_secs(3600) }));
        loader.start().await;
        assert!(loader.is_ready());
        assert!(!loader.get_config().freeze_enabled);
        loader.stop();
    }

    #[test]
    fn monitored_resources_never_empty() {
        assert_eq!(parse_monitored_resources(""), BTreeSet::from(["deployments".to_string()]));
        assert_eq!(parse_monitored_resources("statefulsets, daemonsets"), BTreeSet::from(["statefulsets".to_string(), "daemonsets".to_string()]));
    }

    #[test]
    fn monitored_resources_are_lowercased() {
        assert_eq!(parse_monitored_resources("StatefulSets, Deployments"), BTreeSet::from(["statefulsets".to_string(), "deployments".to_string()]));
        assert_eq!(parse_monitored_resources("- StatefulSets\n- Deployments\n"), BTreeSet::from(["statefulsets".to_string(), "deployments".to_string()]));
    }

    #[test]
    fn list_fields_drop_comments_and_blank_lines() {
        let parsed = parse_list("alice\n# comment\n\nbob\n");
        assert_eq!(parsed, BTreeSet::from(["alice".to_string(), "bob".to_string()]));
    }
}
