//! End-to-end capture scenarios against the in-process offscreen host.

use std::time::Duration;

use serde_json::json;
use tokio_test::{assert_err, assert_ok};

use super::fakes::Harness;
use crate::config::CaptureConfig;
use crate::coordinator::ActivationOutcome;
use crate::error::CaptureError;
use crate::events::{BrowserEvent, CaptureInfo, CaptureStatus, InstallReason, InstalledDetails};
use crate::fullscreen::FullscreenTransition;
use crate::window_manager::WindowState;

fn active(tab_id: i32, fullscreen: bool) -> CaptureInfo {
    CaptureInfo {
        status: CaptureStatus::Active,
        fullscreen,
        tab_id,
    }
}

#[tokio::test]
async fn test_activation_toggles_capture() {
    let harness = Harness::new();
    harness.tab_capture.set_stream_id(7, Some("abc"));

    let outcome = assert_ok!(harness.coordinator.handle_activation(7).await);
    assert_eq!(outcome, ActivationOutcome::Started { tab_id: 7 });
    assert!(harness.captured().await);
    assert_eq!(harness.devices.requested_stream_ids(), vec!["abc".to_string()]);
    assert_eq!(harness.devices.live_graph_count(), 1);

    let outcome = assert_ok!(harness.coordinator.handle_activation(7).await);
    assert_eq!(outcome, ActivationOutcome::Stopped);
    assert!(!harness.captured().await);
    assert_eq!(harness.devices.live_graph_count(), 0);
    assert_eq!(harness.devices.stopped_track_count(), 1);

    // Stopping never asks for a new identifier
    assert_eq!(harness.tab_capture.calls(), vec![7]);
    assert_eq!(harness.host.documents_created(), 1);
}

#[tokio::test]
async fn test_unresolvable_identifier_leaves_context_idle() {
    let harness = Harness::new();
    harness.tab_capture.set_stream_id(9, None);

    let err = assert_err!(harness.coordinator.handle_activation(9).await);
    assert!(matches!(err, CaptureError::InvalidIdentifier(_)));

    assert!(!harness.captured().await);
    assert!(harness.devices.requested_stream_ids().is_empty());
}

#[tokio::test]
async fn test_empty_identifier_is_rejected() {
    let harness = Harness::new();
    harness.tab_capture.set_stream_id(9, Some(""));

    let err = assert_err!(harness.coordinator.handle_activation(9).await);
    assert!(matches!(err, CaptureError::InvalidIdentifier(_)));
    assert!(harness.devices.requested_stream_ids().is_empty());
}

#[tokio::test]
async fn test_acquisition_failure_reports_error_and_stays_idle() {
    let harness = Harness::new();
    harness.devices.fail_acquire(true);

    let err = assert_err!(harness.coordinator.handle_activation(4).await);
    assert!(matches!(err, CaptureError::Acquisition(_)));
    assert!(!harness.captured().await);

    // Next activation tries again rather than releasing
    harness.devices.fail_acquire(false);
    let outcome = assert_ok!(harness.coordinator.handle_activation(4).await);
    assert_eq!(outcome, ActivationOutcome::Started { tab_id: 4 });
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_capture_does_not_stay_live() {
    let config = CaptureConfig {
        message_timeout_ms: 100,
        ..CaptureConfig::default()
    };
    let harness = Harness::with_config(config);
    harness.devices.set_acquire_delay(Duration::from_millis(300));

    let err = assert_err!(harness.coordinator.handle_activation(7).await);
    assert!(err.is_timeout());

    // Let the media context finish the abandoned command
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert!(!harness.captured().await);
    assert_eq!(harness.devices.requested_stream_ids(), vec!["stream-7".to_string()]);
    assert_eq!(harness.devices.live_graph_count(), 0);
}

#[tokio::test]
async fn test_closing_other_tab_keeps_capture() {
    let harness = Harness::new();
    assert_ok!(harness.coordinator.handle_activation(3).await);

    assert!(!assert_ok!(harness.coordinator.handle_tab_removed(5).await));
    assert!(harness.captured().await);

    assert!(assert_ok!(harness.coordinator.handle_tab_removed(3).await));
    assert!(!harness.captured().await);
    assert_eq!(harness.devices.live_graph_count(), 0);
}

#[tokio::test]
async fn test_tab_removed_without_document_creates_nothing() {
    let harness = Harness::new();

    assert!(!assert_ok!(harness.coordinator.handle_tab_removed(3).await));
    assert!(!harness.host.is_running());
    assert_eq!(harness.host.documents_created(), 0);
}

#[tokio::test]
async fn test_fullscreen_cycle_restores_previous_state() {
    let harness = Harness::new();
    assert_ok!(harness.coordinator.handle_activation(3).await);
    assert_ok!(
        crate::window_manager::WindowManager::set_state(&harness.windows, 1, WindowState::Maximized).await
    );

    let entered = assert_ok!(harness.coordinator.handle_capture_status_changed(active(3, true)).await);
    assert_eq!(
        entered,
        Some(FullscreenTransition::Entered { window_id: 1, saved: WindowState::Maximized })
    );
    assert_eq!(harness.windows.current_state(), WindowState::Fullscreen);

    let restored = assert_ok!(harness.coordinator.handle_capture_status_changed(active(3, false)).await);
    assert_eq!(
        restored,
        Some(FullscreenTransition::Restored { window_id: 1, state: WindowState::Maximized })
    );
    assert_eq!(harness.windows.current_state(), WindowState::Maximized);
}

#[tokio::test]
async fn test_status_change_without_capture_leaves_window_alone() {
    let harness = Harness::new();
    assert_ok!(harness.coordinator.ensure_media_context().await);

    let transition = assert_ok!(harness.coordinator.handle_capture_status_changed(active(3, true)).await);
    assert!(transition.is_none());
    assert!(harness.windows.updates().is_empty());
}

#[tokio::test]
async fn test_exit_without_saved_state_keeps_current() {
    let harness = Harness::new();
    assert_ok!(harness.coordinator.handle_activation(3).await);

    let restored = assert_ok!(harness.coordinator.handle_capture_status_changed(active(3, false)).await);
    assert_eq!(
        restored,
        Some(FullscreenTransition::Restored { window_id: 1, state: WindowState::Normal })
    );
}

#[tokio::test]
async fn test_closed_document_is_recreated_idle() {
    let harness = Harness::new();
    assert_ok!(harness.coordinator.handle_activation(7).await);
    assert!(harness.host.close_document().await);
    assert_eq!(harness.devices.live_graph_count(), 0);

    // Fresh context knows nothing of the old capture, so this starts again
    let outcome = assert_ok!(harness.coordinator.handle_activation(7).await);
    assert_eq!(outcome, ActivationOutcome::Started { tab_id: 7 });
    assert_eq!(harness.host.documents_created(), 2);
}

#[tokio::test]
async fn test_install_creates_document_once() {
    let harness = Harness::new();

    let created = assert_ok!(
        harness
            .coordinator
            .handle_installed(InstalledDetails { reason: InstallReason::Install, previous_version: None })
            .await
    );
    assert!(created);

    let created = assert_ok!(
        harness
            .coordinator
            .handle_installed(InstalledDetails {
                reason: InstallReason::Update,
                previous_version: Some("0.0.9".to_string()),
            })
            .await
    );
    assert!(!created);
    assert_eq!(harness.host.documents_created(), 1);
}

#[tokio::test]
async fn test_popup_ready_activates_tab() {
    let harness = Harness::new();

    harness
        .coordinator
        .dispatch(BrowserEvent::Message(json!({"target": "worker", "type": "popupReady", "tabId": 12})))
        .await;

    assert!(harness.captured().await);
    assert_eq!(harness.devices.requested_stream_ids(), vec!["stream-12".to_string()]);
}

#[tokio::test]
async fn test_unknown_popup_message_never_activates() {
    let harness = Harness::new();

    harness
        .coordinator
        .dispatch(BrowserEvent::Message(json!({"target": "worker", "type": "popupClosed", "tabId": 12})))
        .await;

    assert!(!harness.captured().await);
    assert!(harness.tab_capture.calls().is_empty());
}
