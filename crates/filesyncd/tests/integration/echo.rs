//! The reference round trip: echo.

use filesync_core::codec::Record;
use filesync_core::message::{AuthResult, EchoRequest, Sender};
use filesync_core::wire::Frame;

use crate::*;

#[tokio::test]
async fn echo_round_trip_flips_sender_and_keeps_the_transaction() {
    let harness = harness();
    let mut client = harness.connect();
    assert_eq!(
        client.authenticate("alice", b"secret-a").await,
        AuthResult::Authenticated
    );

    let request = EchoRequest {
        sender: Sender::Client,
        data: b"ping".to_vec(),
    };
    let reply = client.request(tid(0x01), request).await;

    assert_eq!(reply.header.transaction_id, tid(0x01));
    let echoed = EchoRequest::from_value(reply.body).expect("echo payload");
    assert_eq!(echoed.sender, Sender::Server);
    assert_eq!(echoed.data, b"ping");
}

#[tokio::test]
async fn interleaved_echo_transactions_each_get_their_reply() {
    let harness = harness();
    let mut client = harness.connect();
    client.authenticate("alice", b"secret-a").await;

    // Two requests in flight before reading either reply. Replies may come
    // back in any order across transactions.
    client
        .send(Frame::with_transaction(
            tid(0x0a),
            EchoRequest {
                sender: Sender::Client,
                data: b"first".to_vec(),
            }
            .to_value(),
        ))
        .await;
    client
        .send(Frame::with_transaction(
            tid(0x0b),
            EchoRequest {
                sender: Sender::Client,
                data: b"second".to_vec(),
            }
            .to_value(),
        ))
        .await;

    let mut seen = std::collections::HashMap::new();
    for _ in 0..2 {
        let reply = client.recv_ok().await;
        let echoed = EchoRequest::from_value(reply.body).expect("echo payload");
        seen.insert(reply.header.transaction_id, echoed.data);
    }
    assert_eq!(seen.get(&tid(0x0a)).map(Vec::as_slice), Some(b"first".as_slice()));
    assert_eq!(seen.get(&tid(0x0b)).map(Vec::as_slice), Some(b"second".as_slice()));
}
