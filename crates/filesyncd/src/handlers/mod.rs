//! Request handlers, one per action. Each is a plain `async fn` matching
//! the mux handler contract: decode the request, talk to the session's
//! file store, enqueue response frames carrying the request's transaction
//! id. User-visible failures go out as error frames; anything else bubbles
//! up to the mux, which logs it without killing the session.

mod chunk;
mod delete;
mod download;
mod echo;
mod list;
mod status;
mod upload;

pub use chunk::handle_chunk;
pub use delete::handle_delete;
pub use download::handle_download;
pub use echo::handle_echo;
pub use list::handle_list;
pub use status::handle_status;
pub use upload::handle_upload;

use filesync_core::codec::Record;
use filesync_core::message::{ErrorResponse, Sender};
use filesync_core::wire::{Frame, TransactionId};

/// A response frame carrying an error message, with the ERROR flag set.
pub(crate) fn error_frame(transaction_id: TransactionId, message: impl Into<String>) -> Frame {
    let body = ErrorResponse {
        sender: Sender::Server,
        message: message.into(),
    };
    Frame::with_transaction(transaction_id, body.to_value()).error()
}
