pub mod gateway;
pub mod ingest;
pub mod models;
pub mod prompts;
pub mod samples;
pub mod service;

pub use models::{MessageView, SessionView};
pub use samples::SampleKind;
pub use service::{AppState, create_app};
