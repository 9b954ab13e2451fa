//! Notification Dispatcher and Audit Sink Set (§4.L, §4.M): pluggable
//! delivery of governance events and audit events to chat/email/HTTP/file
//! providers, with rate-limited, error-swallowing fan-out.

pub mod dispatch;
pub mod event_sink;
pub mod sink;
pub mod sinks;

pub use dispatch::Dispatcher;
pub use event_sink::EventSinkSet;
pub use sink::{DispatchEvent, Sink};
