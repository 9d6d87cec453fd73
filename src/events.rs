use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::messages::TabId;

/// Status of a tab capture as reported by the browser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureStatus {
    Pending,
    Active,
    Stopped,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureInfo {
    pub status: CaptureStatus,
    pub fullscreen: bool,
    pub tab_id: TabId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallReason {
    Install,
    Update,
    ChromeUpdate,
    SharedModuleUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledDetails {
    pub reason: InstallReason,
    #[serde(default)]
    pub previous_version: Option<String>,
}

/// Everything the background worker listens to
#[derive(Debug, Clone, PartialEq)]
pub enum BrowserEvent {
    /// The extension's toolbar action was clicked on a tab
    ActionClicked { tab_id: TabId },
    TabRemoved { tab_id: TabId },
    CaptureStatusChanged(CaptureInfo),
    Installed(InstalledDetails),
    /// Raw payload from the runtime message bus
    Message(Value),
}

impl BrowserEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BrowserEvent::ActionClicked { .. } => "action_clicked",
            BrowserEvent::TabRemoved { .. } => "tab_removed",
            BrowserEvent::CaptureStatusChanged(_) => "capture_status_changed",
            BrowserEvent::Installed(_) => "installed",
            BrowserEvent::Message(_) => "message",
        }
    }
}
