use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CaptureError;

pub type WindowId = i32;

/// Display state of a browser window, matching the browser's wire names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WindowState {
    #[default]
    Normal,
    Minimized,
    Maximized,
    Fullscreen,
    LockedFullscreen,
}

impl WindowState {
    pub fn is_fullscreen(&self) -> bool {
        matches!(self, WindowState::Fullscreen | WindowState::LockedFullscreen)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub id: WindowId,
    pub state: WindowState,
}

/// Window-management primitive of the host browser
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WindowManager: Send + Sync {
    /// The window the user is currently looking at
    async fn get_current(&self) -> Result<WindowInfo, CaptureError>;

    async fn set_state(&self, id: WindowId, state: WindowState) -> Result<(), CaptureError>;
}
