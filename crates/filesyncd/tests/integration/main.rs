//! End-to-end protocol tests.
//!
//! Each test stands up a full mux — authenticator, session, handlers —
//! and drives it from a real client over an in-memory duplex stream.
//! Nothing is mocked below the TLS layer; the bytes on the duplex are
//! exactly the bytes that would cross the socket.

use std::sync::Arc;

use tokio::io::{duplex, DuplexStream, ReadHalf, WriteHalf};

use filesync_core::codec::{Decoder, Encoder, Record, Value};
use filesync_core::crypto;
use filesync_core::message::{register_payloads, Action, AuthResult};
use filesync_core::wire::{Frame, TransactionId, WireError};
use filesync_services::{FileStoreFactory, LruCache, UserStore};
use filesyncd::auth::Authenticator;
use filesyncd::handlers;
use filesyncd::mux::Mux;

mod auth;
mod echo;
mod files;
mod sessions;

// ── Harness ──────────────────────────────────────────────────────────────────

pub struct Harness {
    pub mux: Arc<Mux>,
    pub users: Arc<UserStore>,
    _data_dir: tempfile::TempDir,
}

/// A server with every handler registered, Echo included.
pub fn harness() -> Harness {
    harness_with(|_| {})
}

/// Same, with a hook to override handlers for a single test.
pub fn harness_with(customize: impl FnOnce(&mut Mux)) -> Harness {
    register_payloads();
    let data_dir = tempfile::tempdir().expect("tempdir");
    let users = Arc::new(UserStore::new());
    let stores = Arc::new(FileStoreFactory::new(
        data_dir.path(),
        Arc::new(LruCache::new(64)),
        Arc::new(LruCache::new(64)),
    ));
    let authenticator = Authenticator::new(users.clone(), stores, 32);

    let mut mux = Mux::new(authenticator);
    mux.handle(Action::Status, handlers::handle_status);
    mux.handle(Action::Download, handlers::handle_download);
    mux.handle(Action::Upload, handlers::handle_upload);
    mux.handle(Action::Delete, handlers::handle_delete);
    mux.handle(Action::Chunk, handlers::handle_chunk);
    mux.handle(Action::List, handlers::handle_list);
    mux.handle(Action::Echo, handlers::handle_echo);
    customize(&mut mux);

    Harness {
        mux: Arc::new(mux),
        users,
        _data_dir: data_dir,
    }
}

impl Harness {
    /// Open a connection to the server, spawning its mux task.
    pub fn connect(&self) -> TestClient {
        let (client_side, server_side) = duplex(1 << 16);
        let mux = self.mux.clone();
        tokio::spawn(async move { mux.serve_conn(server_side).await });
        TestClient::new(client_side)
    }
}

// ── Test client ──────────────────────────────────────────────────────────────

/// The client side of the protocol, frame by frame.
pub struct TestClient {
    decoder: Decoder<ReadHalf<DuplexStream>>,
    encoder: Encoder<WriteHalf<DuplexStream>>,
}

impl TestClient {
    pub fn new(stream: DuplexStream) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            decoder: Decoder::new(reader),
            encoder: Encoder::new(writer),
        }
    }

    pub async fn send(&mut self, frame: Frame) {
        self.encoder.encode(&frame).await.expect("send frame");
    }

    pub async fn recv(&mut self) -> Result<Frame, WireError> {
        self.decoder.decode().await
    }

    pub async fn recv_ok(&mut self) -> Frame {
        self.recv().await.expect("receive frame")
    }

    /// Run the client side of the handshake. On `NewUser`, enroll with the
    /// same key the response was computed with.
    pub async fn authenticate(&mut self, username: &str, key: &[u8]) -> AuthResult {
        self.authenticate_with(username, key, key).await
    }

    /// Handshake with separate response and enrollment keys, for tests
    /// poking at the enrollment path.
    pub async fn authenticate_with(
        &mut self,
        username: &str,
        response_key: &[u8],
        enroll_key: &[u8],
    ) -> AuthResult {
        let challenge = self.recv_ok().await.body.into_bytes().expect("challenge");
        let mac = crypto::challenge_response(&challenge, response_key).expect("hmac");
        let mut body = mac.to_vec();
        body.extend_from_slice(username.as_bytes());
        self.send(Frame::new(Value::Bytes(body))).await;

        loop {
            let tag = self.recv_ok().await.body.into_u8().expect("result tag");
            match AuthResult::from_u8(tag).expect("known tag") {
                AuthResult::NewUser => {
                    self.send(Frame::new(Value::Bytes(enroll_key.to_vec())))
                        .await;
                }
                result => return result,
            }
        }
    }

    /// Send a typed request under a transaction and return the next frame.
    pub async fn request<R: Record>(&mut self, transaction_id: TransactionId, body: R) -> Frame {
        self.send(Frame::with_transaction(transaction_id, body.to_value()))
            .await;
        self.recv_ok().await
    }
}

pub fn tid(byte: u8) -> TransactionId {
    [byte; 16]
}
