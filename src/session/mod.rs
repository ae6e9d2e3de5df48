//! Session identity, local state and the chat session client.
//!
//! # Architecture
//!
//! - [`StateStore`]: persisted key/value state (memory or JSON file)
//! - [`SessionManager`]: loads or creates the [`Session`] for one scope
//! - [`TranscriptRegistry`]: local transcripts keyed by session id
//! - [`TutorSession`]: the request/response exchange with history mirroring
//!
//! # Example
//!
//! ```rust,no_run
//! use tutor_bridge::client::BackendClient;
//! use tutor_bridge::session::TutorSession;
//!
//! # async fn example() -> tutor_bridge::Result<()> {
//! let session = TutorSession::new(BackendClient::new("http://127.0.0.1:8000")?);
//! let reply = session.ask("def f(x): return x+").await?;
//! println!("{}", reply.render());
//! # Ok(())
//! # }
//! ```

mod manager;
mod store;
mod transcript;
mod tutor;

pub use manager::{SESSION_KEY, Session, SessionManager};
pub use store::{FileStateStore, MemoryStateStore, StateStore};
pub use transcript::{Transcript, TranscriptRegistry};
pub use tutor::{SessionOptions, SessionState, TutorSession};
