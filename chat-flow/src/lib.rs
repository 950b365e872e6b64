pub mod error;
pub mod gateway;
pub mod message;
pub mod render;
pub mod schema;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use error::{ChatError, Result};
pub use gateway::ModelGateway;
pub use message::{Message, MessageOrigin};
pub use render::{RenderedReply, ResponseView, render_reply};
pub use schema::{
    BodyPart, ChartKind, ChartPoint, DoctorAdvice, KeyFinding, LabResult, LabStatus, Severity,
    StructuredResponse, Visualization,
};
pub use session::{AudienceMode, ChatState, SessionSnapshot, UserRole, keys};
pub use store::{InMemoryStore, KeyValueStore, PostgresStore};
