pub mod api;
pub mod cache;
pub mod config;
pub mod conversation;
pub mod error;
pub mod guard;
pub mod mode;
pub mod session;
pub mod state;

// Re-export main types for convenience
pub use api::{Citation, CorpusStatus, HttpGateway, IndexRunResult, RagAnswer, RagGateway, RetrievedChunk};
pub use cache::Slot;
pub use config::Config;
pub use conversation::InputBuffer;
pub use error::GatewayError;
pub use guard::{GuardState, Guards, OperationKind};
pub use mode::Mode;
pub use session::{Outcome, SendTicket, Session, SessionSnapshot, Skip};
pub use state::{ChatMessage, ChatRole};
