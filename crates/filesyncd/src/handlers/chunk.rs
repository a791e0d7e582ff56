//! Stray chunk frames.
//!
//! Chunk frames normally continue an open Upload transaction and are routed
//! to its inbox by the mux. One arriving with no open transaction has
//! nothing to attach to; it is logged and dropped.

use tokio::sync::mpsc;

use filesync_core::codec::Record;
use filesync_core::message::ChunkData;
use filesync_core::wire::Frame;

use crate::mux::Request;

pub async fn handle_chunk(_responses: mpsc::Sender<Frame>, req: Request) -> anyhow::Result<()> {
    let chunk = ChunkData::from_value(req.frame.body)?;
    tracing::warn!(
        bytes = chunk.data.len(),
        last = chunk.last,
        "chunk frame outside an open transaction, dropping"
    );
    Ok(())
}
