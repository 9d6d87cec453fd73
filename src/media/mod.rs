//! The offscreen media context and its in-process host.
//!
//! The context owns the single captured-audio resource; the host creates it on
//! demand and delivers bus commands to it one at a time.

mod context;
mod host;

pub use context::{MediaContext, SavedWindowState};
pub use host::LocalOffscreenHost;
