//! Stores a blob, either inline or assembled from chunk frames.

use tokio::sync::mpsc;

use filesync_core::codec::Record;
use filesync_core::crypto;
use filesync_core::message::{ChunkData, Done, Sender, UploadRequest, UploadResponse};
use filesync_core::wire::Frame;

use crate::handlers::error_frame;
use crate::mux::Request;

/// An upload with inline data is stored directly. Empty data announces a
/// chunked upload: the blob follows as `ChunkData` continuation frames on
/// the same transaction, closed by `last`. A cancelled request context
/// abandons the transfer; nothing partial is stored.
pub async fn handle_upload(responses: mpsc::Sender<Frame>, mut req: Request) -> anyhow::Result<()> {
    let transaction_id = req.frame.header.transaction_id;
    let body = std::mem::replace(&mut req.frame.body, filesync_core::codec::Value::Null);
    let request = UploadRequest::from_value(body)?;

    let mut data = request.data;
    if data.is_empty() {
        loop {
            let frame = tokio::select! {
                _ = req.ctx.cancelled() => {
                    tracing::debug!("upload cancelled mid-transfer");
                    return Ok(());
                }
                frame = req.inbox.recv() => match frame {
                    Some(frame) => frame,
                    None => return Ok(()),
                },
            };
            let chunk = ChunkData::from_value(frame.body)?;
            data.extend_from_slice(&chunk.data);
            if chunk.last {
                break;
            }
        }
    }

    let hash = request.file.hash_hex();
    let checksum = request.file.checksum_str();
    if crypto::content_checksum(&data) != checksum {
        tracing::warn!(%hash, "upload checksum mismatch, rejecting");
        responses
            .send(error_frame(transaction_id, "checksum mismatch"))
            .await?;
        return Ok(());
    }

    match req.session.files.create(&hash, &checksum, &data) {
        Ok(_) => {
            tracing::debug!(%hash, bytes = data.len(), "stored upload");
            let response = UploadResponse {
                sender: Sender::Server,
                done: Done::Yes,
            };
            responses
                .send(Frame::with_transaction(transaction_id, response.to_value()))
                .await?;
        }
        Err(e) => {
            tracing::error!(%hash, error = %e, "failed to store upload");
            responses
                .send(error_frame(transaction_id, "failed to store file"))
                .await?;
        }
    }
    Ok(())
}
