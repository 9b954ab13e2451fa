use thiserror::Error;

/// Transient/fatal errors surfaced by the Config Loader and the resource
/// store it reads through. Never surfaced to admission callers directly —
/// the engine follows `failClosed` instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("record '{record}' not found")]
    NotFound { record: String },

    #[error("malformed record '{record}': {reason}")]
    Malformed { record: String, reason: String },

    #[error("backend error reading '{record}': {source}")]
    Backend {
        record: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("watch stream for '{record}' ended unexpectedly")]
    WatchEnded { record: String },
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScheduleError {
    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },

    #[error("schedule '{name}' already exists")]
    AlreadyExists { name: String },

    #[error("schedule '{name}' not found")]
    NotFound { name: String },

    #[error("schedule '{name}' is structurally invalid: end must be after start")]
    InvalidRange { name: String },

    #[error(transparent)]
    Store(#[from] ConfigError),
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExemptionError {
    #[error("exemption '{id}' not found")]
    NotFound { id: String },

    #[error(transparent)]
    Store(#[from] ConfigError),
}

/// Errors the Admission Engine itself can raise. Per §7, none of these are
/// allowed to change a dry-run verdict or leak backend detail to the
/// caller — the boundary maps them to a generic 500 and logs the detail.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AdmissionError {
    #[error("malformed admission request: {0}")]
    MalformedRequest(String),

    #[error("config not yet loaded")]
    ConfigNotReady,

    #[error("stage '{stage}' failed: {source}")]
    StageFailed {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },
}
