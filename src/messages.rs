use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CaptureError;
use crate::window_manager::WindowState;

pub type TabId = i32;

/// Opaque token that authorizes reading one tab's media stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StreamId(String);

impl StreamId {
    pub fn new(raw: impl Into<String>) -> Result<Self, CaptureError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(CaptureError::InvalidIdentifier(
                "stream id is empty".to_string(),
            ));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StreamId {
    type Error = CaptureError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        StreamId::new(value)
    }
}

impl From<StreamId> for String {
    fn from(id: StreamId) -> Self {
        id.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything that travels on the bus, routed by `target`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "lowercase")]
pub enum Message {
    Offscreen(OffscreenCommand),
    Worker(WorkerMessage),
}

impl Message {
    pub fn from_value(value: Value) -> Result<Self, CaptureError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_value(&self) -> Result<Value, CaptureError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Commands handled by the offscreen media context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OffscreenCommand {
    #[serde(rename_all = "camelCase")]
    CaptureTab { stream_id: StreamId, tab_id: TabId },
    ReleaseTab,
    #[serde(rename_all = "camelCase")]
    TabRemoved { tab_id: TabId },
    GetCapturedState,
    #[serde(rename_all = "camelCase")]
    GetSavedWindowState { state: WindowState, tab_id: TabId },
    #[serde(rename_all = "camelCase")]
    SaveWindowState { state: WindowState, tab_id: TabId },
}

impl OffscreenCommand {
    pub fn name(&self) -> &'static str {
        match self {
            OffscreenCommand::CaptureTab { .. } => "captureTab",
            OffscreenCommand::ReleaseTab => "releaseTab",
            OffscreenCommand::TabRemoved { .. } => "tabRemoved",
            OffscreenCommand::GetCapturedState => "getCapturedState",
            OffscreenCommand::GetSavedWindowState { .. } => "getSavedWindowState",
            OffscreenCommand::SaveWindowState { .. } => "saveWindowState",
        }
    }
}

/// Messages handled by the background worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerMessage {
    #[serde(rename_all = "camelCase")]
    PopupReady { tab_id: TabId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ack {
    On,
    Off,
    Saved,
}

/// Reply sent back by the media context for every command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OffscreenReply {
    Ack(Ack),
    Flag(bool),
    Window(WindowState),
}

impl OffscreenReply {
    pub fn into_flag(self, command: &str) -> Result<bool, CaptureError> {
        match self {
            OffscreenReply::Flag(flag) => Ok(flag),
            other => Err(other.unexpected(command)),
        }
    }

    pub fn into_window_state(self, command: &str) -> Result<WindowState, CaptureError> {
        match self {
            OffscreenReply::Window(state) => Ok(state),
            other => Err(other.unexpected(command)),
        }
    }

    pub fn into_ack(self, command: &str) -> Result<Ack, CaptureError> {
        match self {
            OffscreenReply::Ack(ack) => Ok(ack),
            other => Err(other.unexpected(command)),
        }
    }

    fn unexpected(&self, command: &str) -> CaptureError {
        CaptureError::UnexpectedReply {
            command: command.to_string(),
            reply: format!("{:?}", self),
        }
    }
}
