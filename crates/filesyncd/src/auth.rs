//! Challenge–response authentication.
//!
//! The server initiates; four frames settle it, all on the raw post-TLS
//! stream before the dispatch loop starts:
//!
//! ```text
//! S → C : challenge                       (base64 of N random bytes)
//! C → S : hmac || username                (32-byte HMAC-SHA256, UTF-8 tail)
//! S → C : NewUser                         (only if the username is unknown)
//! C → S : shared key                      (raw bytes, enrollment)
//! S → C : Authenticated | Unauthorized    (1-byte result tag)
//! ```
//!
//! Unknown users are enrolled trust-on-first-use: the key received on this
//! very connection verifies the response that preceded it. Deployments
//! facing untrusted networks must gate enrollment externally.
//!
//! State machine: Idle → ChallengeSent → ResponseReceived →
//! (ProvisionNeeded → KeyReceived)? → Authenticated | Failed.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use zeroize::Zeroizing;

use filesync_core::codec::{Decoder, Encoder, Value};
use filesync_core::crypto::{self, RESPONSE_SIZE};
use filesync_core::message::AuthResult;
use filesync_core::wire::{Frame, WireError};
use filesync_services::{FileStore, FileStoreError, FileStoreFactory, UserError, UserStore};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("challenge response too short: {0} bytes")]
    ShortResponse(usize),

    #[error("malformed auth frame: {0}")]
    Malformed(&'static str),

    #[error("challenge failed for user {0}")]
    ChallengeFailed(String),

    #[error(transparent)]
    User(#[from] UserError),

    #[error(transparent)]
    Store(#[from] FileStoreError),
}

/// What a successful handshake yields: the identity and the capability
/// over that user's storage area.
pub struct AuthOutcome {
    pub username: String,
    pub files: Arc<FileStore>,
}

impl std::fmt::Debug for AuthOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthOutcome")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Runs the handshake and provisions new users.
pub struct Authenticator {
    users: Arc<UserStore>,
    stores: Arc<FileStoreFactory>,
    challenge_len: usize,
}

impl Authenticator {
    pub fn new(users: Arc<UserStore>, stores: Arc<FileStoreFactory>, challenge_len: usize) -> Self {
        Self {
            users,
            stores,
            challenge_len,
        }
    }

    /// Authenticate the peer on `stream`. Any failure closes the exchange
    /// with a best-effort `Unauthorized` tag; the caller drops the
    /// connection.
    pub async fn authenticate<S>(&self, stream: &mut S) -> Result<AuthOutcome, AuthError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (reader, writer) = tokio::io::split(stream);
        let mut decoder = Decoder::new(reader);
        let mut encoder = Encoder::new(writer);

        let challenge = crypto::generate_challenge(self.challenge_len);
        encoder
            .encode(&Frame::new(Value::Bytes(challenge.clone())))
            .await?;

        let response = match decoder.decode().await {
            Ok(frame) => frame,
            Err(e) => {
                send_result(&mut encoder, AuthResult::Unauthorized).await;
                return Err(e.into());
            }
        };
        let body = match response.body {
            Value::Bytes(body) => body,
            _ => {
                send_result(&mut encoder, AuthResult::Unauthorized).await;
                return Err(AuthError::Malformed("expected byte response"));
            }
        };
        // 32 bytes of HMAC plus at least one byte of username.
        if body.len() < RESPONSE_SIZE + 1 {
            send_result(&mut encoder, AuthResult::Unauthorized).await;
            return Err(AuthError::ShortResponse(body.len()));
        }
        let mac = &body[..RESPONSE_SIZE];
        let username = String::from_utf8_lossy(&body[RESPONSE_SIZE..]).into_owned();

        let shared_key: Zeroizing<Vec<u8>> = match self.users.shared_key(&username) {
            Some(key) => key,
            None => {
                // Trust-on-first-use enrollment: ask for the key, store it,
                // then verify the response against what we just learned.
                tracing::debug!(%username, "unknown user, requesting shared key");
                encoder
                    .encode(&Frame::new(Value::U8(AuthResult::NewUser as u8)))
                    .await?;
                let key_frame = match decoder.decode().await {
                    Ok(frame) => frame,
                    Err(e) => {
                        send_result(&mut encoder, AuthResult::Unauthorized).await;
                        return Err(e.into());
                    }
                };
                let key = match key_frame.body {
                    Value::Bytes(key) => key,
                    _ => {
                        send_result(&mut encoder, AuthResult::Unauthorized).await;
                        return Err(AuthError::Malformed("expected shared key bytes"));
                    }
                };
                self.users.create(&username, key.clone())?;
                tracing::info!(%username, "enrolled new user");
                Zeroizing::new(key)
            }
        };

        if !crypto::verify_response(&challenge, &shared_key, mac) {
            send_result(&mut encoder, AuthResult::Unauthorized).await;
            return Err(AuthError::ChallengeFailed(username));
        }

        encoder
            .encode(&Frame::new(Value::U8(AuthResult::Authenticated as u8)))
            .await?;

        let dir = self.users.storage_dir(&username)?;
        let files = self.stores.open(&dir)?;
        tracing::debug!(%username, "authenticated");
        Ok(AuthOutcome { username, files })
    }
}

/// Best-effort result tag; failures here are moot, the connection is about
/// to close anyway.
async fn send_result<W: AsyncWrite + Unpin>(encoder: &mut Encoder<W>, result: AuthResult) {
    let _ = encoder
        .encode(&Frame::new(Value::U8(result as u8)))
        .await;
}

// ── Tests ────────────────────────────────────────────────────────────────────
