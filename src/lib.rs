//! Single-tab audio capture, coordinated between a background worker, an
//! offscreen media context and the browser window.
//!
//! The [`Coordinator`] turns browser events into commands; the
//! [`MediaContext`] is the only place that knows which tab is captured. They
//! share nothing and talk over an [`OffscreenBus`].

pub mod audio;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod fullscreen;
pub mod media;
pub mod messages;
pub mod platform;
pub mod state_machine;
pub mod utils;
pub mod window_manager;

#[cfg(test)]
mod tests;

pub use config::CaptureConfig;
pub use coordinator::{ActivationOutcome, CaptureIntent, Coordinator, Platform};
pub use error::CaptureError;
pub use events::{BrowserEvent, CaptureInfo, CaptureStatus, InstallReason, InstalledDetails};
pub use fullscreen::FullscreenTransition;
pub use media::{LocalOffscreenHost, MediaContext};
pub use messages::{Message, OffscreenCommand, OffscreenReply, StreamId, TabId, WorkerMessage};
pub use platform::{ContextHost, OffscreenBus, TabCapture};
pub use state_machine::{CapturePhase, CapturedTabState};
pub use utils::logger::init_logging;
pub use window_manager::{WindowId, WindowInfo, WindowManager, WindowState};
