//! Serves a blob back to the client.

use tokio::sync::mpsc;

use filesync_core::codec::Record;
use filesync_core::message::{DownloadRequest, DownloadResponse, Sender};
use filesync_core::wire::Frame;
use filesync_services::FileStoreError;

use crate::handlers::error_frame;
use crate::mux::Request;

pub async fn handle_download(responses: mpsc::Sender<Frame>, req: Request) -> anyhow::Result<()> {
    let transaction_id = req.frame.header.transaction_id;
    let request = DownloadRequest::from_value(req.frame.body)?;
    let hash = hex::encode(&request.hash);

    match req.session.files.read(&hash) {
        Ok(data) => {
            tracing::debug!(%hash, bytes = data.len(), "serving download");
            let response = DownloadResponse {
                sender: Sender::Server,
                data,
            };
            responses
                .send(Frame::with_transaction(transaction_id, response.to_value()))
                .await?;
        }
        Err(FileStoreError::NotFound(_)) | Err(FileStoreError::BadHash(_)) => {
            tracing::debug!(%hash, "download of unknown file");
            responses
                .send(error_frame(transaction_id, "file not found"))
                .await?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
