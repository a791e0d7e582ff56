//! Session lifecycle: cancellation, request deadlines, and dispatch of
//! frames the server does not understand.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use filesync_core::codec::{Record, Value};
use filesync_core::crypto;
use filesync_core::message::{CancelRequest, EchoRequest, Sender, StatusRequest, UploadRequest};
use filesync_core::wire::{Frame, FLAG_HUFFMAN};
use filesyncd::mux::Request;
use tokio::sync::mpsc;

use crate::*;

fn probe_file() -> filesync_core::message::FileInfo {
    filesync_core::message::FileInfo::new(
        crypto::content_hash(b"probe").to_vec(),
        crypto::content_checksum(b"probe").into_bytes(),
        1,
    )
}

#[tokio::test]
async fn cancel_frame_tears_down_the_session() {
    let harness = harness();
    let mut client = harness.connect();
    client.authenticate("alice", b"secret-a").await;

    // Park a chunked upload so a transaction is open when cancel arrives.
    client
        .send(Frame::with_transaction(
            tid(5),
            UploadRequest {
                sender: Sender::Client,
                file: probe_file(),
                data: Vec::new(),
            }
            .to_value(),
        ))
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    client
        .send(Frame::new(
            CancelRequest {
                sender: Sender::Client,
            }
            .to_value(),
        ))
        .await;

    // The server closes the connection; the read side drains to an error.
    assert!(client.recv().await.is_err());
}

#[tokio::test]
async fn unknown_type_ids_are_ignored_not_fatal() {
    let harness = harness();
    let mut client = harness.connect();
    client.authenticate("alice", b"secret-a").await;

    // A bare byte-sequence body is a registered shape but no action's
    // request record; the mux logs and moves on.
    client
        .send(Frame::new(Value::Bytes(b"noise".to_vec())))
        .await;

    // The session is still alive and serves the next request.
    let reply = client
        .request(
            tid(1),
            EchoRequest {
                sender: Sender::Client,
                data: b"still here".to_vec(),
            },
        )
        .await;
    let echoed = EchoRequest::from_value(reply.body).expect("echo payload");
    assert_eq!(echoed.data, b"still here");
}

#[tokio::test]
async fn reserved_huffman_flag_is_ignored() {
    let harness = harness();
    let mut client = harness.connect();
    client.authenticate("alice", b"secret-a").await;

    let mut frame = Frame::with_transaction(
        tid(2),
        EchoRequest {
            sender: Sender::Client,
            data: b"flagged".to_vec(),
        }
        .to_value(),
    );
    frame.header.flags |= FLAG_HUFFMAN;
    client.send(frame).await;

    let reply = client.recv_ok().await;
    let echoed = EchoRequest::from_value(reply.body).expect("echo payload");
    assert_eq!(echoed.data, b"flagged");
}

#[tokio::test]
async fn request_deadline_frees_the_transaction_slot() {
    let calls = std::sync::Arc::new(AtomicUsize::new(0));
    let handler_calls = calls.clone();
    let harness = harness_with(move |mux| {
        mux.handle(
            filesync_core::message::Action::Status,
            move |_responses: mpsc::Sender<Frame>, req: Request| {
                let calls = handler_calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    // Outlive the request deadline; exit on cancellation.
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_secs(60)) => {}
                        _ = req.ctx.cancelled() => {}
                    }
                    anyhow::Ok(())
                }
            },
        );
    });
    let mut client = harness.connect();
    client.authenticate("alice", b"secret-a").await;

    let stuck = tid(0x77);
    let request = StatusRequest {
        sender: Sender::Client,
        file: probe_file(),
    };

    client
        .send(Frame::with_transaction(stuck, request.to_value()))
        .await;
    wait_for(&calls, 1).await;

    // While the transaction is open, frames on the same id are
    // continuations: no second handler.
    client
        .send(Frame::with_transaction(stuck, request.to_value()))
        .await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Past the deadline the slot is free; the same id opens a new
    // transaction.
    tokio::time::sleep(Duration::from_secs(5)).await;
    client
        .send(Frame::with_transaction(stuck, request.to_value()))
        .await;
    wait_for(&calls, 2).await;
}

async fn wait_for(calls: &AtomicUsize, target: usize) {
    for _ in 0..100 {
        if calls.load(Ordering::SeqCst) >= target {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "handler was called {} times, expected {target}",
        calls.load(Ordering::SeqCst)
    );
}
