pub mod captured;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::LatencyHint;
use crate::error::CaptureError;
use crate::messages::StreamId;

pub use captured::CapturedAudio;

/// Media constraints that select a tab's audio by capture identifier.
///
/// Serializes to `{"audio": {"mandatory": {"chromeMediaSource": "tab", "chromeMediaSourceId": ..}}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabAudioConstraints {
    pub audio: AudioConstraint,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioConstraint {
    pub mandatory: MandatoryTabSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MandatoryTabSource {
    pub chrome_media_source: &'static str,
    pub chrome_media_source_id: StreamId,
}

impl TabAudioConstraints {
    pub fn for_stream(stream_id: StreamId) -> Self {
        Self {
            audio: AudioConstraint {
                mandatory: MandatoryTabSource {
                    chrome_media_source: "tab",
                    chrome_media_source_id: stream_id,
                },
            },
        }
    }

    pub fn stream_id(&self) -> &StreamId {
        &self.audio.mandatory.chrome_media_source_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioContextOptions {
    pub latency_hint: LatencyHint,
}

/// One live audio track of a captured stream
pub trait AudioTrack: Send {
    fn id(&self) -> &str;
    fn stop(&mut self);
}

/// Captured media stream; only its audio tracks matter here
pub struct MediaStream {
    audio_tracks: Vec<Box<dyn AudioTrack>>,
}

impl MediaStream {
    pub fn new(audio_tracks: Vec<Box<dyn AudioTrack>>) -> Self {
        Self { audio_tracks }
    }

    pub fn audio_track_ids(&self) -> Vec<String> {
        self.audio_tracks.iter().map(|t| t.id().to_string()).collect()
    }

    pub fn has_audio(&self) -> bool {
        !self.audio_tracks.is_empty()
    }

    /// Stop every audio track, returning how many were stopped
    pub fn stop_audio_tracks(&mut self) -> usize {
        for track in self.audio_tracks.iter_mut() {
            track.stop();
        }
        self.audio_tracks.len()
    }
}

/// Audio processing graph: the captured stream as source, the output sink as destination
pub trait AudioGraph: Send {
    fn connect_to_output(&mut self, stream: &MediaStream) -> Result<(), CaptureError>;
    fn close(&mut self) -> Result<(), CaptureError>;
}

/// Media primitives available inside the offscreen context
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn get_user_media(
        &self,
        constraints: &TabAudioConstraints,
    ) -> Result<MediaStream, CaptureError>;

    fn create_audio_context(
        &self,
        options: AudioContextOptions,
    ) -> Result<Box<dyn AudioGraph>, CaptureError>;
}
