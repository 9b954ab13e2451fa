//! Trait contracts and data model shared by every freezegate crate.
//!
//! This crate never touches a runtime or a transport. Concrete
//! implementations (the in-memory resource store, the config loader, the
//! admission engine, the HTTP boundary) live in `freezegate-core`,
//! `freezegate-notify`, and `freezegate-server`; this crate only defines the
//! shapes they agree on.

pub mod admission;
pub mod clock;
pub mod error;
pub mod model;
pub mod sink;
pub mod store;

pub use admission::{AdmissionContext, AdmissionRequest, AdmissionResponse, AdmissionStage, RequestKind, StageOutcome, UserInfo};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{AdmissionError, ConfigError, ExemptionError, ScheduleError};
pub use model::{
    AuditEvent, Exemption, HistoryEvent, Policy, Schedule, Template, TemplateSchedule,
};
pub use sink::{EventSink, GovernanceEvent};
pub use store::{ResourceRecord, ResourceStore, WatchEvent};
