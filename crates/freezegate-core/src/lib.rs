//! The engine: everything that decides, evaluates, or durably tracks
//! freeze-window state. Implements the trait contracts from
//! `freezegate-kernel` against an injected `ResourceStore`.

pub mod bypass;
pub mod config_loader;
pub mod context;
pub mod dryrun;
pub mod engine;
pub mod exemption;
pub mod history;
pub mod memory_store;
pub mod schedule;
pub mod template;

pub use context::Context;
pub use engine::AdmissionEngine;
