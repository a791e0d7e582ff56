//! Connection multiplexer — drives one authenticated connection.
//!
//! Per connection: the receive loop (this module) reads frames and routes
//! them, a responder task serializes every outbound frame through one
//! writer, and each request runs in its own task under a 5-second deadline.
//! Handlers never touch the socket; they enqueue frames on the bounded
//! response queue, which is what makes frame writes atomic per frame.
//!
//! Cancellation is a tree: root (listener) → session → request. A `Cancel`
//! frame or a fatal read error cancels the session; expiry of a request
//! deadline cancels only that request and frees its transaction slot.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use filesync_core::codec::{Decoder, Encoder};
use filesync_core::message::{self, Action};
use filesync_core::registry;
use filesync_core::wire::{Frame, TypeId};

use crate::auth::Authenticator;
use crate::session::Session;

/// Capacity of the outbound response queue. Handlers producing faster than
/// the peer drains block here, back-pressuring their own work.
const RESPONSE_QUEUE_CAPACITY: usize = 5;

/// Deadline for a single request's handler.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a handler gets: the opening frame, the transaction's inbound
/// queue for continuation frames, the session, and the request context.
pub struct Request {
    pub frame: Frame,
    pub inbox: mpsc::Receiver<Frame>,
    pub session: Arc<Session>,
    pub ctx: CancellationToken,
}

type HandlerFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// A registered request handler. Plain `async fn(responses, request)`
/// functions implement this via the blanket impl below.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, responses: mpsc::Sender<Frame>, req: Request) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(mpsc::Sender<Frame>, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn call(&self, responses: mpsc::Sender<Frame>, req: Request) -> HandlerFuture {
        Box::pin(self(responses, req))
    }
}

/// Routes frames of authenticated connections to handlers.
pub struct Mux {
    handlers: HashMap<Action, Arc<dyn Handler>>,
    /// type id of each action's request record; the type id in a frame
    /// header is what names the action on the wire.
    actions: HashMap<TypeId, Action>,
    authenticator: Authenticator,
    root: CancellationToken,
}

impl Mux {
    pub fn new(authenticator: Authenticator) -> Self {
        message::register_payloads();
        let mut actions = HashMap::new();
        for action in [
            Action::Status,
            Action::Upload,
            Action::Download,
            Action::Delete,
            Action::Chunk,
            Action::List,
            Action::Error,
            Action::Cancel,
            Action::Echo,
        ] {
            if let Some(shape) = action.request_shape() {
                actions.insert(registry::register(shape), action);
            }
        }
        Self {
            handlers: HashMap::new(),
            actions,
            authenticator,
            root: CancellationToken::new(),
        }
    }

    /// Register the handler for an action. Call before serving.
    pub fn handle<H: Handler>(&mut self, action: Action, handler: H) {
        tracing::debug!(%action, "registering handler");
        self.handlers.insert(action, Arc::new(handler));
    }

    /// Cancel every session rooted here and refuse further work.
    pub fn shutdown(&self) {
        self.root.cancel();
    }

    /// Serve one connection to completion: authenticate, then pump frames
    /// until the peer disconnects, cancels, or the stream breaks.
    pub async fn serve_conn<S>(&self, mut stream: S)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let outcome = match self.authenticator.authenticate(&mut stream).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, "authentication failed, closing connection");
                return;
            }
        };
        let session = Arc::new(Session::new(outcome.username, outcome.files));
        let ctx = self.root.child_token();

        let (reader, writer) = tokio::io::split(stream);
        let (responses, responses_rx) = mpsc::channel(RESPONSE_QUEUE_CAPACITY);
        let responder = tokio::spawn(respond_loop(writer, responses_rx, ctx.clone()));

        let mut decoder = Decoder::new(reader);
        loop {
            let frame = tokio::select! {
                _ = ctx.cancelled() => {
                    tracing::info!("session context cancelled, shutting down connection");
                    break;
                }
                result = decoder.decode() => match result {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::error!(error = %e, "error receiving frame");
                        break;
                    }
                },
            };

            let Some(action) = self.actions.get(&frame.header.type_id).copied() else {
                tracing::warn!(type_id = frame.header.type_id, "frame with unknown type id, ignoring");
                continue;
            };

            if action == Action::Cancel {
                tracing::info!("received cancel frame, shutting down connection");
                break;
            }

            let transaction_id = frame.header.transaction_id;
            if let Some(open) = session.transaction(&transaction_id) {
                // Continuation of an open exchange; no new handler.
                tracing::debug!(%action, "forwarding frame to open transaction");
                if open.send(frame).await.is_err() {
                    tracing::debug!("transaction inbox gone, dropping continuation frame");
                }
                continue;
            }

            let Some(handler) = self.handlers.get(&action) else {
                tracing::warn!(%action, "no handler registered, ignoring frame");
                continue;
            };

            let req_ctx = ctx.child_token();
            let req = Request {
                frame,
                inbox: session.open_transaction(transaction_id),
                session: session.clone(),
                ctx: req_ctx.clone(),
            };
            let handler = handler.clone();
            let responses = responses.clone();
            let session_for_task = session.clone();
            tokio::spawn(async move {
                tokio::select! {
                    result = tokio::time::timeout(REQUEST_TIMEOUT, handler.call(responses, req)) => {
                        match result {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => tracing::error!(%action, error = %e, "handler failed"),
                            Err(_) => tracing::warn!(%action, "request deadline exceeded, cancelling"),
                        }
                    }
                    _ = req_ctx.cancelled() => {}
                }
                req_ctx.cancel();
                session_for_task.close_transaction(&transaction_id);
            });
        }

        ctx.cancel();
        drop(responses);
        let _ = responder.await;
    }
}

/// Drains the response queue through the single writer. Exits when the
/// session is cancelled or every sender is gone.
async fn respond_loop<W: AsyncWrite + Unpin>(
    writer: W,
    mut responses: mpsc::Receiver<Frame>,
    ctx: CancellationToken,
) {
    let mut encoder = Encoder::new(writer);
    loop {
        tokio::select! {
            _ = ctx.cancelled() => break,
            frame = responses.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = encoder.encode(&frame).await {
                        tracing::error!(error = %e, "error sending response");
                    }
                }
                None => break,
            },
        }
    }
    let _ = encoder.into_inner().shutdown().await;
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use filesync_core::codec::Record;
    use filesync_core::message::EchoRequest;
    use filesync_core::registry;
    use filesync_services::{FileStoreFactory, LruCache, UserStore};

    fn mux() -> Mux {
        let tmp = std::env::temp_dir().join(format!("filesyncd-mux-test-{}", std::process::id()));
        let users = Arc::new(UserStore::new());
        let stores = Arc::new(FileStoreFactory::new(
            tmp,
            Arc::new(LruCache::new(4)),
            Arc::new(LruCache::new(4)),
        ));
        Mux::new(Authenticator::new(users, stores, 32))
    }

    #[test]
    fn every_request_type_id_maps_to_its_action() {
        let mux = mux();
        let echo_id = registry::id_of(&EchoRequest::shape()).unwrap();
        assert_eq!(mux.actions.get(&echo_id), Some(&Action::Echo));
        // Auth has no request record and must not be dispatchable.
        assert_eq!(mux.actions.len(), 9);
    }

    #[test]
    fn handlers_register_by_action() {
        let mut mux = mux();
        assert!(mux.handlers.is_empty());
        mux.handle(Action::Echo, |responses: mpsc::Sender<Frame>, req: Request| async move {
            let _ = (responses, req.frame);
            anyhow::Ok(())
        });
        assert!(mux.handlers.contains_key(&Action::Echo));
    }
}
