//! Lists every file the server holds for this user.

use tokio::sync::mpsc;

use filesync_core::codec::Record;
use filesync_core::message::{ListRequest, ListResponse, Sender};
use filesync_core::wire::Frame;

use crate::mux::Request;

pub async fn handle_list(responses: mpsc::Sender<Frame>, req: Request) -> anyhow::Result<()> {
    let transaction_id = req.frame.header.transaction_id;
    let _request = ListRequest::from_value(req.frame.body)?;

    let files = req.session.files.list()?;
    tracing::debug!(count = files.len(), "listing files");

    let response = ListResponse {
        sender: Sender::Server,
        files,
    };
    responses
        .send(Frame::with_transaction(transaction_id, response.to_value()))
        .await?;
    Ok(())
}
