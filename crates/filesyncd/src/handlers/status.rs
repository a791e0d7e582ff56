//! Reports the sync state of one file.

use tokio::sync::mpsc;

use filesync_core::codec::Record;
use filesync_core::message::{FileStatus, Sender, StatusRequest, StatusResponse};
use filesync_core::wire::Frame;

use crate::mux::Request;

/// Unknown hash → the server has never seen this file. Known hash with a
/// matching checksum → in sync. Known hash, different checksum → the
/// stored copy is stale and wants an upload.
pub async fn handle_status(responses: mpsc::Sender<Frame>, req: Request) -> anyhow::Result<()> {
    let transaction_id = req.frame.header.transaction_id;
    let request = StatusRequest::from_value(req.frame.body)?;

    let hash = request.file.hash_hex();
    let status = match req.session.files.file_info(&hash)? {
        None => FileStatus::Unknown,
        Some(info) if info.checksum == request.file.checksum => FileStatus::Synced,
        Some(_) => FileStatus::Stale,
    };
    tracing::debug!(%hash, ?status, "status request");

    let response = StatusResponse {
        sender: Sender::Server,
        status,
    };
    responses
        .send(Frame::with_transaction(transaction_id, response.to_value()))
        .await?;
    Ok(())
}
