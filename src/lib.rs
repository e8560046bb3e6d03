//! Idea Board
//!
//! Client-side state for a small idea-sharing application backed by an
//! Appwrite-compatible backend-as-a-service. Every persistent operation is a
//! single call to the service; this crate holds the resulting state and
//! publishes it to whatever UI hosts it.
//!
//! # Architecture
//!
//! - **Backend**: trait over the service's identity and document APIs, with
//!   an HTTP client and an in-process implementation
//! - **Session**: current identity plus register / login / logout
//! - **Feed**: newest-first, capped window of ideas with fetch / add / remove
//! - **Console**: text front-end that mounts both stores
//!
//! # Modules
//!
//! - [`backend`]: service surface and implementations
//! - [`config`]: layered configuration
//! - [`console`]: line-oriented front-end
//! - [`error`]: error taxonomy
//! - [`feed`]: idea feed store
//! - [`navigation`]: navigation side effects
//! - [`scope`]: host lifetime and stale-result guard
//! - [`session`]: session manager

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod backend;
pub mod config;
pub mod console;
pub mod error;
pub mod feed;
pub mod navigation;
pub mod scope;
pub mod session;

pub use error::{Error, ErrorKind, Result};
