//! Authentication state.
//!
//! [`SessionManager`] holds the signed-in identity (or its absence) and
//! exposes the register / login / logout flows. State changes are published
//! on a `watch` channel so UI consumers can re-render on change.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use idea_board::backend::MemoryBackend;
//! use idea_board::navigation::TracingNavigator;
//! use idea_board::scope::Scope;
//! use idea_board::session::SessionManager;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let session = SessionManager::mount(
//!     Arc::new(MemoryBackend::new()),
//!     Arc::new(TracingNavigator),
//!     Scope::new(),
//! );
//!
//! let state = session.wait_until_ready().await;
//! assert!(state.current.is_none());
//! # }
//! ```

mod manager;

pub use manager::{SessionManager, SessionState};
