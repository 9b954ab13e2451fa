//! The injected collaborator bundle (§9): every component that needs the
//! Clock, the Resource Store, or another manager receives it here at
//! construction. No component reaches for a global.

use std::sync::Arc;

use freezegate_kernel::clock::Clock;
use freezegate_kernel::sink::EventSink;
use freezegate_kernel::store::ResourceStore;

use crate::config_loader::ConfigLoader;
use crate::engine::AdmissionEngine;
use crate::exemption::ExemptionManager;
use crate::history::HistoryTracker;
use crate::schedule::ScheduleStore;
use crate::template::TemplateEngine;

pub struct Context {
    pub clock: Arc<dyn Clock>,
    pub store: Arc<dyn ResourceStore>,
    pub config_loader: Arc<ConfigLoader>,
    pub schedules: Arc<ScheduleStore>,
    pub exemptions: Arc<ExemptionManager>,
    pub history: Arc<HistoryTracker>,
    pub templates: Arc<TemplateEngine>,
    pub engine: Arc<AdmissionEngine>,
}

impl Context {
    pub fn new(
        clock: Arc<dyn Clock>,
        store: Arc<dyn ResourceStore>,
        config_loader: Arc<ConfigLoader>,
        sink: Option<Arc<dyn EventSink>>,
    ) -> Self {
        let schedules = Arc::new(ScheduleStore::new(store.clone()));
        let exemptions = Arc::new(ExemptionManager::new(store.clone(), clock.clone()));
        let history = Arc::new(HistoryTracker::new(store.clone(), clock.clone()));
        let templates = Arc::new(TemplateEngine::new(store.clone(), clock.clone()));
        let engine = Arc::new(AdmissionEngine::new(clock.clone(), exemptions.clone(), Some(history.clone()), sink));
        Self { clock, store, config_loader, schedules, exemptions, history, templates, engine }
    }

    pub async fn load_all(&self) -> anyhow::Result<()> {
        self.config_loader.start().await;
        self.schedules.load().await?;
        self.exemptions.load().await?;
        self.history.load().await?;
        self.templates.reload().await?;
        Ok(())
    }

    /// A policy snapshot with `freezeSchedule` populated from the Schedule
    /// Store — the policy record and the schedule record are two different
    /// external records (§3), merged here for the engine's convenience.
    pub fn policy_snapshot(&self) -> freezegate_kernel::model::Policy {
        let mut policy = self.config_loader.get_config();
        policy.freeze_schedule = self.schedules.list();
        policy
    }
}
