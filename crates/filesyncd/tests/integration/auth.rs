//! Authentication scenarios: enrollment, rejection, and malformed
//! handshakes.

use filesync_core::codec::{Record, Value};
use filesync_core::crypto;
use filesync_core::message::AuthResult;
use filesync_core::wire::Frame;

use crate::*;

#[tokio::test]
async fn new_user_enrollment_completes_the_documented_exchange() {
    let harness = harness();
    let mut client = harness.connect();

    // Challenge: 32 random bytes arrive as 44 base64 bytes.
    let challenge = client.recv_ok().await.body.into_bytes().expect("challenge");
    assert_eq!(challenge.len(), 44);

    // hmac || username = 32 + 3 bytes.
    let mac = crypto::challenge_response(&challenge, b"secret").expect("hmac");
    let mut body = mac.to_vec();
    body.extend_from_slice(b"bob");
    assert_eq!(body.len(), 35);
    client.send(Frame::new(Value::Bytes(body))).await;

    // Unknown user: server asks for the key.
    let tag = client.recv_ok().await.body.into_u8().expect("tag");
    assert_eq!(AuthResult::from_u8(tag), Some(AuthResult::NewUser));
    client
        .send(Frame::new(Value::Bytes(b"secret".to_vec())))
        .await;

    let tag = client.recv_ok().await.body.into_u8().expect("tag");
    assert_eq!(AuthResult::from_u8(tag), Some(AuthResult::Authenticated));
    assert!(harness.users.shared_key("bob").is_some());
}

#[tokio::test]
async fn existing_user_with_wrong_key_is_rejected_and_disconnected() {
    let harness = harness();
    harness
        .users
        .create("alice", b"secret-a".to_vec())
        .expect("create user");

    let mut client = harness.connect();
    let result = client.authenticate("alice", b"secret-b").await;
    assert_eq!(result, AuthResult::Unauthorized);

    // The server closed the connection; nothing more arrives.
    assert!(client.recv().await.is_err());
}

#[tokio::test]
async fn short_auth_body_is_rejected() {
    let harness = harness();
    let mut client = harness.connect();

    let _challenge = client.recv_ok().await;
    client
        .send(Frame::new(Value::Bytes(vec![0u8; 16])))
        .await;

    let tag = client.recv_ok().await.body.into_u8().expect("tag");
    assert_eq!(AuthResult::from_u8(tag), Some(AuthResult::Unauthorized));
    assert!(client.recv().await.is_err());
}

#[tokio::test]
async fn no_frames_are_processed_before_authentication() {
    let harness = harness();
    let mut client = harness.connect();

    let _challenge = client.recv_ok().await;
    // An Echo request instead of an auth response. Its bytes do not form a
    // valid auth body, so the handshake fails and the connection closes —
    // the echo is never dispatched.
    client
        .send(Frame::with_transaction(
            tid(1),
            filesync_core::message::EchoRequest {
                sender: filesync_core::message::Sender::Client,
                data: b"premature".to_vec(),
            }
            .to_value(),
        ))
        .await;

    let tag = client.recv_ok().await.body.into_u8().expect("tag");
    assert_eq!(AuthResult::from_u8(tag), Some(AuthResult::Unauthorized));
    assert!(client.recv().await.is_err());
}

#[tokio::test]
async fn second_connection_reuses_the_enrolled_key() {
    let harness = harness();

    let mut first = harness.connect();
    assert_eq!(
        first.authenticate("carol", b"secret-c").await,
        AuthResult::Authenticated
    );

    let mut second = harness.connect();
    assert_eq!(
        second.authenticate("carol", b"secret-c").await,
        AuthResult::Authenticated
    );
    assert_eq!(
        harness.users.shared_key("carol").as_deref().map(|k| k.as_slice()),
        Some(b"secret-c".as_slice())
    );
}
