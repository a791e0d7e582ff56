//! Development-only loopback: the request comes back with the sender
//! flipped to Server.

use tokio::sync::mpsc;

use filesync_core::codec::Record;
use filesync_core::message::{EchoRequest, Sender};
use filesync_core::wire::Frame;

use crate::mux::Request;

pub async fn handle_echo(responses: mpsc::Sender<Frame>, req: Request) -> anyhow::Result<()> {
    let transaction_id = req.frame.header.transaction_id;
    let flags = req.frame.header.flags;

    let mut echo = EchoRequest::from_value(req.frame.body)?;
    echo.sender = Sender::Server;

    let mut frame = Frame::with_transaction(transaction_id, echo.to_value());
    frame.header.flags = flags;
    responses.send(frame).await?;
    Ok(())
}
