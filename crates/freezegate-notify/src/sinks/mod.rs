pub mod chat;
pub mod email;
pub mod file;
pub mod http;

pub use chat::ChatSink;
pub use email::EmailSink;
pub use file::FileSink;
pub use http::HttpSink;
