//! Wire types and connector for the Gemini Live API.
//!
//! One outbound WebSocket connection is opened per client session. The
//! endpoint is parameterized by the configured model and credential; the
//! browser client never sees either.

use crate::config::Config;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite};
use tracing::info;

pub type UpstreamStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Mime type of the browser's microphone capture slices.
pub const CLIENT_AUDIO_MIME: &str = "audio/webm;codecs=opus";

/// Output format requested from upstream: low-latency PCM.
const OUTPUT_AUDIO_MIME: &str = "audio/pcm;rate=24000";

/// One base64-encoded audio chunk.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AudioBlob {
    pub data: String,
    pub mime_type: String,
}

/// The message kinds the bridge sends upstream.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum UpstreamCommand {
    #[serde(rename = "session.update")]
    SessionUpdate { session: Value },
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: AudioBlob },
    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,
    #[serde(rename = "response.create")]
    ResponseCreate,
    #[serde(rename = "response.cancel")]
    ResponseCancel,
}

/// Builds the session-configuration message sent exactly once, immediately
/// after the upstream connection opens and before any buffered audio.
pub fn initial_session_update(config: &Config) -> UpstreamCommand {
    UpstreamCommand::SessionUpdate {
        session: json!({
            "modalities": ["AUDIO", "TEXT"],
            "instructions": config.instructions,
            "voice": config.voice,
            // Let the server detect end-of-speech.
            "turn_detection": { "type": "server_vad" },
            "generation_config": {
                "response_mime_type": OUTPUT_AUDIO_MIME,
                "spoken_language": config.spoken_language,
            },
        }),
    }
}

/// Wraps one binary client chunk in an append message.
pub fn append_chunk(chunk: &[u8]) -> UpstreamCommand {
    UpstreamCommand::InputAudioBufferAppend {
        audio: AudioBlob {
            data: STANDARD.encode(chunk),
            mime_type: CLIENT_AUDIO_MIME.to_string(),
        },
    }
}

/// The full connection URL for the configured model and credential.
pub fn live_url(config: &Config) -> String {
    format!(
        "{}/models/{}:connect?key={}",
        config.upstream_url, config.model, config.api_key
    )
}

/// Opens the outbound connection for one session.
///
/// There is no retry: a session gets exactly one connection attempt, and a
/// failure here terminates the session before it ever becomes ready.
pub async fn connect(config: &Config) -> Result<UpstreamStream, tungstenite::Error> {
    let (ws_stream, _) = connect_async(live_url(config)).await?;
    info!("Connected to Gemini Live WebSocket");
    Ok(ws_stream)
}
