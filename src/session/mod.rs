//!
//! Server-side sessions: the [`Session`] handle, the concurrent
//! [`SessionStore`], and the background reaper that evicts idle sessions.
//!
mod handle;
mod reaper;
mod store;

pub use handle::Session;
pub use reaper::spawn_reaper;
pub use store::SessionStore;
