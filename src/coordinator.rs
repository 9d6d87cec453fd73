use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinSet;

use crate::config::CaptureConfig;
use crate::error::{with_timeout, CaptureError};
use crate::events::{BrowserEvent, CaptureInfo, CaptureStatus, InstallReason, InstalledDetails};
use crate::fullscreen::{FullscreenToggle, FullscreenTransition};
use crate::log_context;
use crate::messages::{Ack, Message, OffscreenCommand, OffscreenReply, TabId, WorkerMessage};
use crate::platform::{
    resolve_stream_id, ContextHost, ContextType, CreateDocumentParams, DocumentReason, OffscreenBus,
    TabCapture,
};
use crate::utils::logger::{
    init_logging, log_lifecycle_event, log_operation_complete, log_operation_failed,
    log_operation_start,
};
use crate::window_manager::WindowManager;

/// Browser primitives the coordinator talks to
#[derive(Clone)]
pub struct Platform {
    pub tab_capture: Arc<dyn TabCapture>,
    pub contexts: Arc<dyn ContextHost>,
    pub bus: Arc<dyn OffscreenBus>,
    pub windows: Arc<dyn WindowManager>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureIntent {
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    Started { tab_id: TabId },
    Stopped,
}

/// Background coordinator.
///
/// Decides what each browser event means and relays commands to the media
/// context, which alone owns the capture state. Keeps nothing across its own
/// restarts apart from the activation guard.
pub struct Coordinator {
    platform: Platform,
    config: CaptureConfig,
    /// Held for a whole read-decide-command sequence so two rapid activations
    /// cannot both observe idle and both issue `captureTab`
    activation: AsyncMutex<()>,
}

impl Coordinator {
    /// Installs the logger at `config.log_level` unless one is already set up
    pub fn new(platform: Platform, config: CaptureConfig) -> Self {
        init_logging(&config.log_level);
        Self {
            platform,
            config,
            activation: AsyncMutex::new(()),
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    fn document_params(&self) -> CreateDocumentParams {
        CreateDocumentParams {
            url: self.config.offscreen_url.clone(),
            reasons: vec![DocumentReason::UserMedia],
            justification: self.config.offscreen_justification.clone(),
        }
    }

    async fn has_media_context(&self) -> Result<bool, CaptureError> {
        let contexts = with_timeout(
            "list contexts",
            self.config.context_creation_timeout(),
            self.platform.contexts.get_contexts(),
        )
        .await
        .map_err(context_error)?;

        Ok(contexts
            .iter()
            .any(|c| c.context_type == ContextType::OffscreenDocument))
    }

    /// Make sure the offscreen document exists. Returns true when it was created.
    pub async fn ensure_media_context(&self) -> Result<bool, CaptureError> {
        if self.has_media_context().await? {
            return Ok(false);
        }

        let params = self.document_params();
        let created = with_timeout(
            "create offscreen document",
            self.config.context_creation_timeout(),
            self.platform.contexts.create_document(&params),
        )
        .await;

        match created {
            Ok(()) => Ok(true),
            Err(e) if e.is_timeout() => Err(e),
            Err(e) => {
                // Another handler may have created it in the meantime
                if self.has_media_context().await? {
                    log::debug!("Offscreen document appeared concurrently: {}", e);
                    Ok(false)
                } else {
                    Err(context_error(e))
                }
            }
        }
    }

    async fn send(&self, command: OffscreenCommand) -> Result<OffscreenReply, CaptureError> {
        self.platform.bus.send(command).await
    }

    async fn is_tab_captured(&self) -> Result<bool, CaptureError> {
        self.send(OffscreenCommand::GetCapturedState)
            .await?
            .into_flag("getCapturedState")
    }

    /// Toggle capture for `tab_id` (toolbar click or `popupReady`).
    ///
    /// Sends exactly one of `captureTab` or `releaseTab`. Nothing is sent when
    /// the capture identifier cannot be resolved.
    pub async fn handle_activation(&self, tab_id: TabId) -> Result<ActivationOutcome, CaptureError> {
        let _guard = self.activation.lock().await;
        let start = Instant::now();
        log_operation_start("ACTIVATION", &log_context! { "tab_id" => tab_id });

        let result = self.activate(tab_id).await;
        match &result {
            Ok(outcome) => log_operation_complete(
                "ACTIVATION",
                start.elapsed().as_millis() as u64,
                &log_context! { "tab_id" => tab_id, "outcome" => format!("{:?}", outcome) },
            ),
            Err(e) => log_operation_failed(
                "ACTIVATION",
                &e.to_string(),
                &log_context! { "tab_id" => tab_id },
            ),
        }
        result
    }

    async fn activate(&self, tab_id: TabId) -> Result<ActivationOutcome, CaptureError> {
        self.ensure_media_context().await?;

        let intent = if self.is_tab_captured().await? {
            CaptureIntent::Stop
        } else {
            CaptureIntent::Start
        };
        log::info!("Activation on tab {}: {:?}", tab_id, intent);

        match intent {
            CaptureIntent::Start => {
                let stream_id = resolve_stream_id(self.platform.tab_capture.as_ref(), tab_id).await?;
                let ack = self
                    .send(OffscreenCommand::CaptureTab { stream_id, tab_id })
                    .await?
                    .into_ack("captureTab")?;
                match ack {
                    Ack::On => Ok(ActivationOutcome::Started { tab_id }),
                    _ => Err(CaptureError::Acquisition(format!(
                        "media context could not capture tab {}",
                        tab_id
                    ))),
                }
            }
            CaptureIntent::Stop => {
                self.send(OffscreenCommand::ReleaseTab)
                    .await?
                    .into_ack("releaseTab")?;
                Ok(ActivationOutcome::Stopped)
            }
        }
    }

    /// Forward a closed tab to the media context, which releases it only if it
    /// is the captured one. Returns whether a capture was released.
    pub async fn handle_tab_removed(&self, tab_id: TabId) -> Result<bool, CaptureError> {
        match self.send(OffscreenCommand::TabRemoved { tab_id }).await {
            Ok(reply) => {
                let released = reply.into_flag("tabRemoved")?;
                if released {
                    log::info!("Capture ended because tab {} was closed", tab_id);
                }
                Ok(released)
            }
            Err(CaptureError::ContextUnavailable(reason)) => {
                log::debug!("Tab {} removed with no media context ({})", tab_id, reason);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Drive fullscreen when a captured tab's stream becomes active.
    pub async fn handle_capture_status_changed(
        &self,
        info: CaptureInfo,
    ) -> Result<Option<FullscreenTransition>, CaptureError> {
        if info.status != CaptureStatus::Active {
            log::debug!("Capture status {:?} for tab {}, nothing to do", info.status, info.tab_id);
            return Ok(None);
        }

        if !self.is_tab_captured().await? {
            log::debug!("Capture active for tab {} but nothing captured", info.tab_id);
            return Ok(None);
        }

        let toggle = FullscreenToggle::new(self.platform.windows.as_ref(), self.platform.bus.as_ref());
        toggle.toggle(info.fullscreen, info.tab_id).await.map(Some)
    }

    /// Create the media context on install and update. Browser self-updates are skipped.
    pub async fn handle_installed(&self, details: InstalledDetails) -> Result<bool, CaptureError> {
        if details.reason == InstallReason::ChromeUpdate {
            log::debug!("Browser update, skipping offscreen setup");
            return Ok(false);
        }

        let created = self.ensure_media_context().await?;

        match details.reason {
            InstallReason::Install => {
                log_lifecycle_event("INSTALLED", Some(env!("CARGO_PKG_VERSION")));
            }
            InstallReason::Update => {
                log_lifecycle_event("UPDATED_FROM", details.previous_version.as_deref());
            }
            _ => {}
        }
        Ok(created)
    }

    /// Handle a raw payload from the runtime message bus.
    ///
    /// Messages for other targets are ignored; unknown types are errors.
    pub async fn handle_message(&self, payload: Value) -> Result<Option<ActivationOutcome>, CaptureError> {
        if payload.get("target").and_then(Value::as_str) != Some("worker") {
            return Ok(None);
        }

        match Message::from_value(payload)? {
            Message::Worker(WorkerMessage::PopupReady { tab_id }) => {
                self.handle_activation(tab_id).await.map(Some)
            }
            Message::Offscreen(_) => Ok(None),
        }
    }

    /// Run one event's handler. Failures are logged here and go no further.
    pub async fn dispatch(&self, event: BrowserEvent) {
        let name = event.name();
        let result = match event {
            BrowserEvent::ActionClicked { tab_id } => self.handle_activation(tab_id).await.map(|_| ()),
            BrowserEvent::TabRemoved { tab_id } => self.handle_tab_removed(tab_id).await.map(|_| ()),
            BrowserEvent::CaptureStatusChanged(info) => {
                self.handle_capture_status_changed(info).await.map(|_| ())
            }
            BrowserEvent::Installed(details) => self.handle_installed(details).await.map(|_| ()),
            BrowserEvent::Message(payload) => self.handle_message(payload).await.map(|_| ()),
        };

        if let Err(e) = result {
            log::error!("❌ {} handler failed: {}", name, e);
        }
    }

    /// Consume events until the sender side closes.
    ///
    /// Each event gets its own task, so handlers interleave at their await
    /// points like browser listeners do.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<BrowserEvent>) {
        let mut handlers = JoinSet::new();

        while let Some(event) = events.recv().await {
            let coordinator = Arc::clone(&self);
            handlers.spawn(async move { coordinator.dispatch(event).await });

            while let Some(finished) = handlers.try_join_next() {
                if let Err(e) = finished {
                    log::error!("Event handler task failed: {}", e);
                }
            }
        }

        while let Some(finished) = handlers.join_next().await {
            if let Err(e) = finished {
                log::error!("Event handler task failed: {}", e);
            }
        }
        log::info!("Coordinator event stream closed");
    }
}

fn context_error(e: CaptureError) -> CaptureError {
    match e {
        CaptureError::Timeout { .. } | CaptureError::ContextUnavailable(_) => e,
        other => CaptureError::ContextUnavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{ExtensionContext, MockContextHost, MockOffscreenBus, MockTabCapture};
    use crate::window_manager::MockWindowManager;
    use async_trait::async_trait;
    use serial_test::serial;
    use std::time::Duration;

    fn offscreen_context() -> ExtensionContext {
        ExtensionContext {
            context_type: ContextType::OffscreenDocument,
            document_url: Some("offscreen.html".to_string()),
        }
    }

    fn coordinator(
        tab_capture: MockTabCapture,
        contexts: MockContextHost,
        bus: MockOffscreenBus,
    ) -> Coordinator {
        Coordinator::new(
            Platform {
                tab_capture: Arc::new(tab_capture),
                contexts: Arc::new(contexts),
                bus: Arc::new(bus),
                windows: Arc::new(MockWindowManager::new()),
            },
            CaptureConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_invalid_identifier_sends_no_command() {
        let mut tab_capture = MockTabCapture::new();
        tab_capture.expect_get_media_stream_id().returning(|_| Ok(None));

        let mut contexts = MockContextHost::new();
        contexts
            .expect_get_contexts()
            .returning(|| Ok(vec![offscreen_context()]));

        // Only the state query is expected; any capture or release would panic
        let mut bus = MockOffscreenBus::new();
        bus.expect_send()
            .withf(|cmd| *cmd == OffscreenCommand::GetCapturedState)
            .times(1)
            .returning(|_| Ok(OffscreenReply::Flag(false)));

        let coordinator = coordinator(tab_capture, contexts, bus);
        let err = coordinator.handle_activation(9).await.unwrap_err();

        assert!(matches!(err, CaptureError::InvalidIdentifier(_)));
    }

    #[tokio::test]
    async fn test_stop_needs_no_identifier() {
        let mut tab_capture = MockTabCapture::new();
        tab_capture.expect_get_media_stream_id().never();

        let mut contexts = MockContextHost::new();
        contexts
            .expect_get_contexts()
            .returning(|| Ok(vec![offscreen_context()]));

        let mut bus = MockOffscreenBus::new();
        bus.expect_send()
            .withf(|cmd| *cmd == OffscreenCommand::GetCapturedState)
            .returning(|_| Ok(OffscreenReply::Flag(true)));
        bus.expect_send()
            .withf(|cmd| *cmd == OffscreenCommand::ReleaseTab)
            .times(1)
            .returning(|_| Ok(OffscreenReply::Ack(Ack::Off)));

        let coordinator = coordinator(tab_capture, contexts, bus);
        assert_eq!(coordinator.handle_activation(7).await.unwrap(), ActivationOutcome::Stopped);
    }

    #[tokio::test]
    async fn test_creates_document_when_missing() {
        let mut contexts = MockContextHost::new();
        contexts.expect_get_contexts().times(1).returning(|| Ok(vec![]));
        contexts
            .expect_create_document()
            .withf(|params| {
                params.url == "offscreen.html" && params.reasons == vec![DocumentReason::UserMedia]
            })
            .times(1)
            .returning(|_| Ok(()));

        let coordinator = coordinator(MockTabCapture::new(), contexts, MockOffscreenBus::new());
        assert!(coordinator.ensure_media_context().await.unwrap());
    }

    #[tokio::test]
    async fn test_context_listing_failure_is_context_unavailable() {
        let mut contexts = MockContextHost::new();
        contexts
            .expect_get_contexts()
            .returning(|| Err(CaptureError::Platform("runtime gone".to_string())));

        let mut bus = MockOffscreenBus::new();
        bus.expect_send().never();

        let coordinator = coordinator(MockTabCapture::new(), contexts, bus);
        let err = coordinator.handle_activation(1).await.unwrap_err();
        assert!(matches!(err, CaptureError::ContextUnavailable(_)));
    }

    #[tokio::test]
    async fn test_chrome_update_skips_setup() {
        let mut contexts = MockContextHost::new();
        contexts.expect_get_contexts().never();
        contexts.expect_create_document().never();

        let coordinator = coordinator(MockTabCapture::new(), contexts, MockOffscreenBus::new());
        let created = coordinator
            .handle_installed(InstalledDetails {
                reason: InstallReason::ChromeUpdate,
                previous_version: None,
            })
            .await
            .unwrap();
        assert!(!created);
    }

    #[tokio::test]
    async fn test_inactive_status_is_ignored() {
        let mut bus = MockOffscreenBus::new();
        bus.expect_send().never();

        let coordinator = coordinator(MockTabCapture::new(), MockContextHost::new(), bus);
        let transition = coordinator
            .handle_capture_status_changed(CaptureInfo {
                status: CaptureStatus::Stopped,
                fullscreen: true,
                tab_id: 3,
            })
            .await
            .unwrap();
        assert!(transition.is_none());
    }

    #[tokio::test]
    async fn test_messages_for_other_targets_are_ignored() {
        let mut bus = MockOffscreenBus::new();
        bus.expect_send().never();

        let coordinator = coordinator(MockTabCapture::new(), MockContextHost::new(), bus);
        let outcome = coordinator
            .handle_message(serde_json::json!({"target": "offscreen", "type": "releaseTab"}))
            .await
            .unwrap();
        assert!(outcome.is_none());

        let err = coordinator
            .handle_message(serde_json::json!({"target": "worker", "type": "shutdown"}))
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::Decode(_)));
    }

    #[test]
    #[serial]
    fn test_new_installs_logger() {
        let _coordinator = coordinator(MockTabCapture::new(), MockContextHost::new(), MockOffscreenBus::new());
        assert_ne!(log::max_level(), log::LevelFilter::Off);
    }

    struct StalledContextHost;

    #[async_trait]
    impl ContextHost for StalledContextHost {
        async fn get_contexts(&self) -> Result<Vec<ExtensionContext>, CaptureError> {
            Ok(vec![])
        }

        async fn create_document(&self, _params: &CreateDocumentParams) -> Result<(), CaptureError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_document_creation_times_out() {
        let mut bus = MockOffscreenBus::new();
        bus.expect_send().never();

        let coordinator = Coordinator::new(
            Platform {
                tab_capture: Arc::new(MockTabCapture::new()),
                contexts: Arc::new(StalledContextHost),
                bus: Arc::new(bus),
                windows: Arc::new(MockWindowManager::new()),
            },
            CaptureConfig::default(),
        );

        let err = coordinator.handle_activation(1).await.unwrap_err();
        assert!(err.is_timeout());
    }
}
