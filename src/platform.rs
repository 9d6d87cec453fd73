//! Host-browser primitives consumed by the coordinator.
//!
//! Real bindings live with the embedder; [`crate::media::LocalOffscreenHost`]
//! provides an in-process implementation of [`ContextHost`] and [`OffscreenBus`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CaptureError;
use crate::messages::{OffscreenCommand, OffscreenReply, StreamId, TabId};

/// Issues capture identifiers for tabs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TabCapture: Send + Sync {
    /// `Ok(None)` when the browser returned no usable identifier
    async fn get_media_stream_id(&self, tab_id: TabId) -> Result<Option<String>, CaptureError>;
}

/// Resolve and validate the capture identifier for `tab_id`
pub async fn resolve_stream_id(
    capture: &dyn TabCapture,
    tab_id: TabId,
) -> Result<StreamId, CaptureError> {
    match capture.get_media_stream_id(tab_id).await {
        Ok(Some(raw)) => StreamId::new(raw).map_err(|_| {
            CaptureError::InvalidIdentifier(format!("empty stream id for tab {}", tab_id))
        }),
        Ok(None) => Err(CaptureError::InvalidIdentifier(format!(
            "no stream id issued for tab {}",
            tab_id
        ))),
        Err(e) => Err(CaptureError::InvalidIdentifier(format!(
            "stream id lookup for tab {} failed: {}",
            tab_id, e
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContextType {
    Tab,
    Popup,
    BackgroundWorker,
    OffscreenDocument,
    SidePanel,
}

/// One running extension context as reported by the browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionContext {
    pub context_type: ContextType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentReason {
    UserMedia,
    AudioPlayback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDocumentParams {
    pub url: String,
    pub reasons: Vec<DocumentReason>,
    pub justification: String,
}

/// Document-hosting primitive: lists contexts and creates the offscreen document
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContextHost: Send + Sync {
    async fn get_contexts(&self) -> Result<Vec<ExtensionContext>, CaptureError>;

    async fn create_document(&self, params: &CreateDocumentParams) -> Result<(), CaptureError>;
}

/// Request/reply delivery of commands to the offscreen media context
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OffscreenBus: Send + Sync {
    async fn send(&self, command: OffscreenCommand) -> Result<OffscreenReply, CaptureError>;
}
