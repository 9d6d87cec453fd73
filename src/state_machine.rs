use serde::Serialize;

use crate::audio::CapturedAudio;
use crate::log_context;
use crate::messages::TabId;
use crate::utils::logger::log_state_transition;

/// Label of the capture state, used for transition checks and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum CapturePhase {
    #[default]
    Idle,
    Capturing,
}

/// Which tab, if any, is captured. At most one capture exists at a time.
#[derive(Debug, Default)]
pub enum CapturedTabState {
    #[default]
    Idle,
    Capturing { tab_id: TabId, audio: CapturedAudio },
}

impl CapturedTabState {
    pub fn phase(&self) -> CapturePhase {
        match self {
            CapturedTabState::Idle => CapturePhase::Idle,
            CapturedTabState::Capturing { .. } => CapturePhase::Capturing,
        }
    }

    pub fn captured_tab(&self) -> Option<TabId> {
        match self {
            CapturedTabState::Idle => None,
            CapturedTabState::Capturing { tab_id, .. } => Some(*tab_id),
        }
    }
}

/// State machine owning the captured tab state
#[derive(Debug, Default)]
pub struct CaptureStateMachine {
    state: CapturedTabState,
}

impl CaptureStateMachine {
    pub fn new() -> Self {
        Self {
            state: CapturedTabState::Idle,
        }
    }

    pub fn phase(&self) -> CapturePhase {
        self.state.phase()
    }

    pub fn captured_tab(&self) -> Option<TabId> {
        self.state.captured_tab()
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self.state, CapturedTabState::Capturing { .. })
    }

    /// Install a new capture.
    ///
    /// A capture that is still live is moved out first and returned so the
    /// caller can release it; `Capturing -> Capturing` is never taken directly.
    pub fn begin_capture(&mut self, audio: CapturedAudio) -> Option<CapturedAudio> {
        let displaced = if self.is_capturing() {
            log::warn!(
                "[FLOW] captureTab while tab {:?} is still captured, releasing it first",
                self.captured_tab()
            );
            self.end_capture()
        } else {
            None
        };

        let tab_id = audio.tab_id();
        self.log_transition(CapturePhase::Capturing);
        self.state = CapturedTabState::Capturing { tab_id, audio };
        displaced
    }

    /// Return to idle, handing back the capture that was live, if any
    pub fn end_capture(&mut self) -> Option<CapturedAudio> {
        self.log_transition(CapturePhase::Idle);
        match std::mem::take(&mut self.state) {
            CapturedTabState::Idle => None,
            CapturedTabState::Capturing { audio, .. } => Some(audio),
        }
    }

    /// Return to idle only when `tab_id` is the captured tab
    pub fn end_capture_for(&mut self, tab_id: TabId) -> Option<CapturedAudio> {
        if self.captured_tab() == Some(tab_id) {
            self.end_capture()
        } else {
            log::debug!(
                "[FLOW] Ignoring release for tab {} (captured: {:?})",
                tab_id,
                self.captured_tab()
            );
            None
        }
    }

    fn log_transition(&self, to: CapturePhase) {
        let from = self.phase();
        log_state_transition(
            "CAPTURE",
            &format!("{:?}", from),
            &format!("{:?}", to),
            Self::is_valid_transition(from, to),
            &log_context! { "tab_id" => format!("{:?}", self.captured_tab()) },
        );
    }

    /// Idle -> Capturing, Capturing -> Idle, and the Idle self loop
    pub fn is_valid_transition(from: CapturePhase, to: CapturePhase) -> bool {
        match (from, to) {
            (CapturePhase::Idle, CapturePhase::Capturing) => true,
            (CapturePhase::Capturing, CapturePhase::Idle) => true,
            // Failed capture or release while idle
            (CapturePhase::Idle, CapturePhase::Idle) => true,
            (CapturePhase::Capturing, CapturePhase::Capturing) => false,
        }
    }
}
