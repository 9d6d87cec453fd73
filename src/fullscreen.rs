use crate::error::CaptureError;
use crate::messages::{OffscreenCommand, TabId};
use crate::platform::OffscreenBus;
use crate::window_manager::{WindowId, WindowManager, WindowState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullscreenTransition {
    /// Window went fullscreen; `saved` is what it will be restored to
    Entered { window_id: WindowId, saved: WindowState },
    Restored { window_id: WindowId, state: WindowState },
}

/// Ties the current window's fullscreen state to capture activity.
///
/// Holds no state itself: the pre-fullscreen state lives in the media context
/// between enter and exit.
pub struct FullscreenToggle<'a> {
    windows: &'a dyn WindowManager,
    bus: &'a dyn OffscreenBus,
}

impl<'a> FullscreenToggle<'a> {
    pub fn new(windows: &'a dyn WindowManager, bus: &'a dyn OffscreenBus) -> Self {
        Self { windows, bus }
    }

    pub async fn toggle(&self, fullscreen: bool, tab_id: TabId) -> Result<FullscreenTransition, CaptureError> {
        if fullscreen {
            self.enter(tab_id).await
        } else {
            self.exit(tab_id).await
        }
    }

    async fn enter(&self, tab_id: TabId) -> Result<FullscreenTransition, CaptureError> {
        let current = self.windows.get_current().await?;

        if current.state.is_fullscreen() {
            log::debug!("Window {} already {:?}, saving it as is", current.id, current.state);
        }

        let command = OffscreenCommand::SaveWindowState {
            state: current.state,
            tab_id,
        };
        let name = command.name();
        self.bus.send(command).await?.into_ack(name)?;

        self.windows.set_state(current.id, WindowState::Fullscreen).await?;
        log::info!("🖥️ Window {} fullscreen for tab {} (was {:?})", current.id, tab_id, current.state);

        Ok(FullscreenTransition::Entered {
            window_id: current.id,
            saved: current.state,
        })
    }

    async fn exit(&self, tab_id: TabId) -> Result<FullscreenTransition, CaptureError> {
        let current = self.windows.get_current().await?;

        let command = OffscreenCommand::GetSavedWindowState {
            state: current.state,
            tab_id,
        };
        let name = command.name();
        let restored = match self.bus.send(command).await.and_then(|reply| reply.into_window_state(name)) {
            Ok(state) => state,
            Err(e) => {
                log::error!("Error getting saved window state, keeping {:?}: {}", current.state, e);
                current.state
            }
        };

        self.windows.set_state(current.id, restored).await?;
        log::info!("🖥️ Window {} restored to {:?} for tab {}", current.id, restored, tab_id);

        Ok(FullscreenTransition::Restored {
            window_id: current.id,
            state: restored,
        })
    }
}
