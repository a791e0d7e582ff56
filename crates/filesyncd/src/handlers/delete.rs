//! Removes a blob and its metadata.

use tokio::sync::mpsc;

use filesync_core::codec::Record;
use filesync_core::message::{DeleteRequest, DeleteResponse, Done, Sender};
use filesync_core::wire::Frame;
use filesync_services::FileStoreError;

use crate::handlers::error_frame;
use crate::mux::Request;

pub async fn handle_delete(responses: mpsc::Sender<Frame>, req: Request) -> anyhow::Result<()> {
    let transaction_id = req.frame.header.transaction_id;
    let request = DeleteRequest::from_value(req.frame.body)?;
    let hash = hex::encode(&request.hash);

    match req.session.files.remove(&hash) {
        Ok(()) => {
            tracing::debug!(%hash, "deleted file");
            let response = DeleteResponse {
                sender: Sender::Server,
                done: Done::Yes,
            };
            responses
                .send(Frame::with_transaction(transaction_id, response.to_value()))
                .await?;
        }
        Err(FileStoreError::NotFound(_)) | Err(FileStoreError::BadHash(_)) => {
            tracing::debug!(%hash, "delete of unknown file");
            responses
                .send(error_frame(transaction_id, "file not found"))
                .await?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
