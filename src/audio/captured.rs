use std::time::Duration;

use super::{AudioContextOptions, AudioGraph, MediaDevices, MediaStream, TabAudioConstraints};
use crate::error::{with_timeout, CaptureError};
use crate::messages::{StreamId, TabId};

/// The live captured-audio resource of one tab.
///
/// Owns the input stream and the graph routing it to the output sink.
/// Dropping an unreleased capture releases it.
pub struct CapturedAudio {
    tab_id: TabId,
    stream: MediaStream,
    graph: Box<dyn AudioGraph>,
    released: bool,
}

impl CapturedAudio {
    /// Acquire the tab's audio and route it to the output.
    ///
    /// Nothing stays acquired when this fails.
    pub async fn start(
        devices: &dyn MediaDevices,
        stream_id: StreamId,
        tab_id: TabId,
        options: AudioContextOptions,
        acquisition_timeout: Duration,
    ) -> Result<Self, CaptureError> {
        let constraints = TabAudioConstraints::for_stream(stream_id);
        let mut stream = with_timeout(
            "acquire tab audio",
            acquisition_timeout,
            devices.get_user_media(&constraints),
        )
        .await?;

        if !stream.has_audio() {
            return Err(CaptureError::Acquisition(format!(
                "stream {} has no audio tracks",
                constraints.stream_id()
            )));
        }

        let mut graph = match devices.create_audio_context(options) {
            Ok(graph) => graph,
            Err(e) => {
                stream.stop_audio_tracks();
                return Err(e);
            }
        };

        if let Err(e) = graph.connect_to_output(&stream) {
            stream.stop_audio_tracks();
            if let Err(close_err) = graph.close() {
                log::warn!("Failed to close audio context after connect error: {}", close_err);
            }
            return Err(e);
        }

        log::info!(
            "🎵 Tab {} audio routed to output (tracks: {:?})",
            tab_id,
            stream.audio_track_ids()
        );

        Ok(Self {
            tab_id,
            stream,
            graph,
            released: false,
        })
    }

    pub fn tab_id(&self) -> TabId {
        self.tab_id
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Stop the audio tracks and close the audio context. Safe to call twice.
    pub fn release(&mut self) -> Result<(), CaptureError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let stopped = self.stream.stop_audio_tracks();
        log::debug!("Stopped {} audio track(s) for tab {}", stopped, self.tab_id);

        self.graph.close()
    }
}

impl Drop for CapturedAudio {
    fn drop(&mut self) {
        if !self.released {
            log::warn!("Captured audio for tab {} dropped without release", self.tab_id);
            if let Err(e) = self.release() {
                log::error!("Failed to release audio for tab {}: {}", self.tab_id, e);
            }
        }
    }
}

impl std::fmt::Debug for CapturedAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedAudio")
            .field("tab_id", &self.tab_id)
            .field("tracks", &self.stream.audio_track_ids())
            .field("released", &self.released)
            .finish()
    }
}
