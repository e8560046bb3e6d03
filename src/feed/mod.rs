//! The idea feed: a capped, newest-first window over the ideas collection.
//!
//! - [`Idea`] / [`IdeaInput`]: the record and its creation input
//! - [`IdeaFeedStore`]: owns the window and exposes fetch / add / remove

mod idea;
mod store;

pub use idea::{Idea, IdeaInput};
pub use store::{DEFAULT_LIMIT, FeedPhase, FeedSettings, FeedState, IdeaFeedStore, RemovePolicy};
