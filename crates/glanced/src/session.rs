//! Streaming session pipeline.
//!
//! One session owns one WebSocket connection end-to-end and processes its
//! frames strictly in sequence: decode, detect, cache + archive each crop,
//! embed, match, reply. A bad frame never terminates the stream; only a
//! caller disconnect or a transport fault does. The pipeline buffers
//! nothing itself — sustained overload shows up as latency on the
//! transport's inbound queue, not as data loss here.

use std::io::Cursor;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use glance_core::IdentityMatch;
use image::RgbImage;
use serde::Serialize;
use uuid::Uuid;

use crate::state::AppState;
use glance_store::ArchiveOutcome;

/// Reply sent for each processed frame: the registered identities present,
/// in detection order. Faces with no match are omitted.
#[derive(Debug, Default, Serialize)]
pub struct FrameReply {
    pub recognized_faces: Vec<IdentityMatch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Connecting,
    Open,
    Processing,
    Closing,
    Closed,
}

/// GET /api/recognition/ws — upgrade into a streaming session.
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| Session::new(state).run(socket))
}

/// Per-connection pipeline. Frames are handled one at a time; no stage of a
/// frame runs concurrently with another stage of the same frame.
pub struct Session {
    id: Uuid,
    state: SessionState,
    app: AppState,
}

impl Session {
    pub fn new(app: AppState) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Connecting,
            app,
        }
    }

    fn transition(&mut self, next: SessionState) {
        tracing::trace!(session = %self.id, from = ?self.state, to = ?next, "session state");
        self.state = next;
    }

    /// Drive the session until the caller disconnects or the transport
    /// faults. Disconnects are observed between frames; an in-flight frame
    /// always completes first.
    pub async fn run(mut self, mut socket: WebSocket) {
        tracing::info!(session = %self.id, "stream session opened");
        self.transition(SessionState::Open);
        let mut seq: u64 = 0;

        while let Some(incoming) = socket.recv().await {
            let message = match incoming {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!(session = %self.id, error = %e, "transport fault; closing session");
                    break;
                }
            };

            match message {
                Message::Binary(data) => {
                    seq += 1;
                    self.transition(SessionState::Processing);

                    let mut send_failed = false;
                    if let Some(reply) = self.process_frame(seq, &data).await {
                        match serde_json::to_string(&reply) {
                            Ok(text) => {
                                if socket.send(Message::Text(text.into())).await.is_err() {
                                    tracing::warn!(session = %self.id, frame = seq, "reply send failed; closing session");
                                    send_failed = true;
                                }
                            }
                            Err(e) => {
                                tracing::error!(session = %self.id, frame = seq, error = %e, "reply serialization failed");
                            }
                        }
                    }

                    if send_failed {
                        break;
                    }
                    self.transition(SessionState::Open);
                }
                Message::Close(_) => {
                    tracing::debug!(session = %self.id, "close frame received");
                    break;
                }
                Message::Text(_) => {
                    tracing::debug!(session = %self.id, "ignoring text message on binary frame stream");
                }
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }

        self.transition(SessionState::Closing);
        // Session-scoped resources (store handle, cache and model
        // references) are dropped with the session itself.
        self.transition(SessionState::Closed);
        tracing::info!(session = %self.id, frames = seq, "stream session closed");
    }

    /// Run the staged sequence for one frame.
    ///
    /// Returns `None` when the frame could not be decoded (no reply is sent
    /// for it); every other per-frame fault degrades to a smaller reply
    /// instead of failing the frame.
    async fn process_frame(&self, seq: u64, data: &[u8]) -> Option<FrameReply> {
        let image = match image::load_from_memory(data) {
            Ok(decoded) => Arc::new(decoded.to_rgb8()),
            Err(e) => {
                tracing::warn!(session = %self.id, frame = seq, error = %e, "frame decode failed; skipping frame");
                return None;
            }
        };

        let regions = match self.app.detect(image.clone()).await {
            Ok(regions) => regions,
            Err(e) => {
                tracing::warn!(session = %self.id, frame = seq, error = %e, "detection failed; treating frame as faceless");
                Vec::new()
            }
        };
        if regions.is_empty() {
            return Some(FrameReply::default());
        }

        let gallery = match self.app.store.list_identities().await {
            Ok(gallery) => gallery,
            Err(e) => {
                tracing::warn!(session = %self.id, frame = seq, error = %e, "identity query failed; no matching for this frame");
                Vec::new()
            }
        };

        let mut recognized = Vec::new();
        for region in &regions {
            let crop = region.crop_from(&image);
            let face_id = Uuid::new_v4();

            match encode_crop(&crop) {
                Ok(bytes) => {
                    self.app.cache.put(face_id, bytes, self.app.cache_ttl);
                    self.archive(seq, face_id).await;
                }
                Err(e) => {
                    tracing::warn!(session = %self.id, frame = seq, face = %face_id, error = %e, "crop encode failed; skipping cache and archival");
                }
            }

            let embedding = match self.app.embed(crop).await {
                Ok(embedding) => embedding,
                Err(e) => {
                    tracing::warn!(session = %self.id, frame = seq, face = %face_id, error = %e, "embedding failed; skipping region");
                    continue;
                }
            };

            if let Some(matched) = self.app.matcher.find_match(&embedding, &gallery) {
                recognized.push(matched);
            }
        }

        Some(FrameReply {
            recognized_faces: recognized,
        })
    }

    /// Best-effort archival: read the crop back from the cache and insert it
    /// into the durable archive. A miss or store failure is logged and
    /// skipped; it never fails the frame.
    async fn archive(&self, seq: u64, face_id: Uuid) {
        let Some(bytes) = self.app.cache.get(&face_id) else {
            tracing::warn!(session = %self.id, frame = seq, face = %face_id, "cached crop missing at archival; skipping");
            return;
        };

        match self.app.store.archive_face(&face_id.to_string(), &bytes).await {
            Ok(ArchiveOutcome::Inserted) => {
                tracing::debug!(session = %self.id, frame = seq, face = %face_id, "face archived");
            }
            Ok(ArchiveOutcome::AlreadyArchived) => {
                tracing::debug!(session = %self.id, frame = seq, face = %face_id, "face already archived");
            }
            Err(e) => {
                tracing::warn!(session = %self.id, frame = seq, face = %face_id, error = %e, "archival failed; continuing");
            }
        }
    }
}

/// Encode a face crop as PNG for caching and archival.
fn encode_crop(crop: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Cursor::new(Vec::new());
    crop.write_to(&mut buf, image::ImageFormat::Png)?;
    Ok(buf.into_inner())
}
