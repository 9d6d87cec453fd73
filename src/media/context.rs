use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::audio::{AudioContextOptions, CapturedAudio, MediaDevices};
use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::log_context;
use crate::messages::{Ack, OffscreenCommand, OffscreenReply, StreamId, TabId};
use crate::state_machine::{CapturePhase, CaptureStateMachine};
use crate::utils::logger::{log_operation_complete, log_operation_failed, log_operation_start};
use crate::window_manager::WindowState;

/// Window state saved before entering fullscreen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedWindowState {
    pub tab_id: TabId,
    pub state: WindowState,
}

/// The offscreen media context.
///
/// Sole owner of the captured tab state. It only reacts to commands and each
/// command is handled to completion before the next one is read.
pub struct MediaContext {
    devices: Arc<dyn MediaDevices>,
    machine: CaptureStateMachine,
    saved_window: Option<SavedWindowState>,
    options: AudioContextOptions,
    acquisition_timeout: Duration,
}

impl MediaContext {
    pub fn new(devices: Arc<dyn MediaDevices>, config: &CaptureConfig) -> Self {
        Self {
            devices,
            machine: CaptureStateMachine::new(),
            saved_window: None,
            options: AudioContextOptions {
                latency_hint: config.latency_hint,
            },
            acquisition_timeout: config.stream_acquisition_timeout(),
        }
    }

    pub fn phase(&self) -> CapturePhase {
        self.machine.phase()
    }

    pub fn captured_tab(&self) -> Option<TabId> {
        self.machine.captured_tab()
    }

    pub fn is_capturing(&self) -> bool {
        self.machine.is_capturing()
    }

    /// Handle one command from the bus. Every command gets a reply.
    pub async fn handle(&mut self, command: OffscreenCommand) -> OffscreenReply {
        log::debug!("📨 Offscreen received {}", command.name());

        match command {
            OffscreenCommand::CaptureTab { stream_id, tab_id } => {
                match self.capture_tab(stream_id, tab_id).await {
                    Ok(()) => OffscreenReply::Ack(Ack::On),
                    Err(_) => OffscreenReply::Ack(Ack::Off),
                }
            }
            OffscreenCommand::ReleaseTab => {
                self.release_tab();
                OffscreenReply::Ack(Ack::Off)
            }
            OffscreenCommand::TabRemoved { tab_id } => OffscreenReply::Flag(self.tab_removed(tab_id)),
            OffscreenCommand::GetCapturedState => OffscreenReply::Flag(self.is_capturing()),
            OffscreenCommand::SaveWindowState { state, tab_id } => {
                self.save_window_state(state, tab_id);
                OffscreenReply::Ack(Ack::Saved)
            }
            OffscreenCommand::GetSavedWindowState { state, tab_id } => {
                OffscreenReply::Window(self.saved_window_state(state, tab_id))
            }
        }
    }

    /// Acquire `tab_id`'s audio and route it to the output.
    ///
    /// A capture that is still live is released first. On failure the
    /// context is left idle.
    pub async fn capture_tab(&mut self, stream_id: StreamId, tab_id: TabId) -> Result<(), CaptureError> {
        let start = Instant::now();
        log_operation_start(
            "CAPTURE_TAB",
            &log_context! {
                "tab_id" => tab_id,
                "stream_id" => stream_id.as_str(),
            },
        );

        if self.is_capturing() {
            self.release_tab();
        }
        self.saved_window = None;

        let audio = match CapturedAudio::start(
            self.devices.as_ref(),
            stream_id,
            tab_id,
            self.options,
            self.acquisition_timeout,
        )
        .await
        {
            Ok(audio) => audio,
            Err(e) => {
                log_operation_failed(
                    "CAPTURE_TAB",
                    &e.to_string(),
                    &log_context! { "tab_id" => tab_id },
                );
                return Err(e);
            }
        };

        if let Some(displaced) = self.machine.begin_capture(audio) {
            Self::release_audio(displaced);
        }

        log_operation_complete(
            "CAPTURE_TAB",
            start.elapsed().as_millis() as u64,
            &log_context! { "tab_id" => tab_id },
        );
        Ok(())
    }

    /// Stop the live capture, if any. Returns whether anything was released.
    pub fn release_tab(&mut self) -> bool {
        self.saved_window = None;
        match self.machine.end_capture() {
            Some(audio) => {
                log::info!("🔇 Releasing tab {}", audio.tab_id());
                Self::release_audio(audio);
                true
            }
            None => {
                log::debug!("releaseTab with nothing captured");
                false
            }
        }
    }

    /// Release only when `tab_id` is the captured tab
    pub fn tab_removed(&mut self, tab_id: TabId) -> bool {
        match self.machine.end_capture_for(tab_id) {
            Some(audio) => {
                log::info!("🗑️ Captured tab {} was closed, releasing", tab_id);
                self.saved_window = None;
                Self::release_audio(audio);
                true
            }
            None => false,
        }
    }

    pub fn save_window_state(&mut self, state: WindowState, tab_id: TabId) {
        if let Some(previous) = self.saved_window.replace(SavedWindowState { tab_id, state }) {
            log::debug!("Overwriting saved window state {:?}", previous);
        }
        log::info!("🪟 Saved window state {:?} for tab {}", state, tab_id);
    }

    /// The most recently saved state, or `fallback` when nothing was saved
    /// since the last capture or release
    pub fn saved_window_state(&self, fallback: WindowState, tab_id: TabId) -> WindowState {
        match self.saved_window {
            Some(saved) => {
                if saved.tab_id != tab_id {
                    log::debug!("Saved window state came from tab {}, asked for tab {}", saved.tab_id, tab_id);
                }
                saved.state
            }
            None => fallback,
        }
    }

    /// Release everything before the hosting context goes away
    pub fn shutdown(&mut self) {
        if self.release_tab() {
            log::info!("Offscreen context shut down with a live capture; released");
        }
    }

    fn release_audio(mut audio: CapturedAudio) {
        if let Err(e) = audio.release() {
            log::error!("Failed to close audio context for tab {}: {}", audio.tab_id(), e);
        }
    }
}
