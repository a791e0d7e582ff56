//! File operations end to end: upload, status, download, list, delete,
//! and the chunked upload path.

use filesync_core::codec::Record;
use filesync_core::crypto;
use filesync_core::message::{
    ChunkData, DeleteRequest, DeleteResponse, Done, DownloadRequest, DownloadResponse,
    ErrorResponse, FileInfo, FileStatus, ListRequest, ListResponse, Sender, StatusRequest,
    StatusResponse, UploadRequest, UploadResponse,
};
use filesync_core::wire::Frame;

use crate::*;

fn descriptor(data: &[u8]) -> FileInfo {
    FileInfo::new(
        crypto::content_hash(data).to_vec(),
        crypto::content_checksum(data).into_bytes(),
        1,
    )
}

#[tokio::test]
async fn full_sync_cycle_for_one_file() {
    let harness = harness();
    let mut client = harness.connect();
    client.authenticate("alice", b"secret-a").await;

    let data = b"file contents worth syncing".to_vec();
    let file = descriptor(&data);

    // Unknown before the upload.
    let reply = client
        .request(
            tid(1),
            StatusRequest {
                sender: Sender::Client,
                file: file.clone(),
            },
        )
        .await;
    let status = StatusResponse::from_value(reply.body).expect("status payload");
    assert_eq!(status.sender, Sender::Server);
    assert_eq!(status.status, FileStatus::Unknown);

    // Inline upload.
    let reply = client
        .request(
            tid(2),
            UploadRequest {
                sender: Sender::Client,
                file: file.clone(),
                data: data.clone(),
            },
        )
        .await;
    let upload = UploadResponse::from_value(reply.body).expect("upload payload");
    assert_eq!(upload.sender, Sender::Server);
    assert_eq!(upload.done, Done::Yes);

    // Synced now.
    let reply = client
        .request(
            tid(3),
            StatusRequest {
                sender: Sender::Client,
                file: file.clone(),
            },
        )
        .await;
    let status = StatusResponse::from_value(reply.body).expect("status payload");
    assert_eq!(status.status, FileStatus::Synced);

    // Download returns the payload, checksum line stripped.
    let reply = client
        .request(
            tid(4),
            DownloadRequest {
                sender: Sender::Client,
                hash: file.hash.clone(),
            },
        )
        .await;
    let download = DownloadResponse::from_value(reply.body).expect("download payload");
    assert_eq!(download.sender, Sender::Server);
    assert_eq!(download.data, data);

    // Listed.
    let reply = client
        .request(
            tid(5),
            ListRequest {
                sender: Sender::Client,
            },
        )
        .await;
    let list = ListResponse::from_value(reply.body).expect("list payload");
    assert_eq!(list.sender, Sender::Server);
    assert_eq!(list.files.len(), 1);
    assert_eq!(list.files[0].hash, file.hash);

    // Delete, then unknown again.
    let reply = client
        .request(
            tid(6),
            DeleteRequest {
                sender: Sender::Client,
                hash: file.hash.clone(),
            },
        )
        .await;
    let delete = DeleteResponse::from_value(reply.body).expect("delete payload");
    assert_eq!(delete.done, Done::Yes);

    let reply = client
        .request(
            tid(7),
            StatusRequest {
                sender: Sender::Client,
                file: file.clone(),
            },
        )
        .await;
    let status = StatusResponse::from_value(reply.body).expect("status payload");
    assert_eq!(status.status, FileStatus::Unknown);
}

#[tokio::test]
async fn chunked_upload_assembles_continuation_frames() {
    let harness = harness();
    let mut client = harness.connect();
    client.authenticate("alice", b"secret-a").await;

    let data = b"0123456789abcdefghijklmnopqrstuvwxyz".to_vec();
    let file = descriptor(&data);
    let upload_tid = tid(0x42);

    // Announce the chunked upload: empty inline data.
    client
        .send(Frame::with_transaction(
            upload_tid,
            UploadRequest {
                sender: Sender::Client,
                file: file.clone(),
                data: Vec::new(),
            }
            .to_value(),
        ))
        .await;

    // Stream the blob in three chunks on the same transaction.
    for (i, piece) in data.chunks(16).enumerate() {
        client
            .send(Frame::with_transaction(
                upload_tid,
                ChunkData {
                    sender: Sender::Client,
                    data: piece.to_vec(),
                    last: (i + 1) * 16 >= data.len(),
                }
                .to_value(),
            ))
            .await;
    }

    let reply = client.recv_ok().await;
    assert_eq!(reply.header.transaction_id, upload_tid);
    let upload = UploadResponse::from_value(reply.body).expect("upload payload");
    assert_eq!(upload.done, Done::Yes);

    // The assembled blob downloads intact.
    let reply = client
        .request(
            tid(0x43),
            DownloadRequest {
                sender: Sender::Client,
                hash: file.hash.clone(),
            },
        )
        .await;
    let download = DownloadResponse::from_value(reply.body).expect("download payload");
    assert_eq!(download.data, data);
}

#[tokio::test]
async fn upload_with_bad_checksum_is_refused() {
    let harness = harness();
    let mut client = harness.connect();
    client.authenticate("alice", b"secret-a").await;

    let data = b"real contents".to_vec();
    let mut file = descriptor(&data);
    file.checksum = crypto::content_checksum(b"different contents").into_bytes();

    let reply = client
        .request(
            tid(9),
            UploadRequest {
                sender: Sender::Client,
                file,
                data,
            },
        )
        .await;
    assert!(reply.header.is_error());
    let error = ErrorResponse::from_value(reply.body).expect("error payload");
    assert_eq!(error.sender, Sender::Server);
    assert!(error.message.contains("checksum"));
}

#[tokio::test]
async fn download_of_unknown_hash_is_an_error_frame() {
    let harness = harness();
    let mut client = harness.connect();
    client.authenticate("alice", b"secret-a").await;

    let reply = client
        .request(
            tid(10),
            DownloadRequest {
                sender: Sender::Client,
                hash: vec![0xee; 8],
            },
        )
        .await;
    assert!(reply.header.is_error());
    let error = ErrorResponse::from_value(reply.body).expect("error payload");
    assert!(error.message.contains("not found"));
}

#[tokio::test]
async fn users_only_see_their_own_files() {
    let harness = harness();

    let data = b"alice's private blob".to_vec();
    let file = descriptor(&data);

    let mut alice = harness.connect();
    alice.authenticate("alice", b"secret-a").await;
    alice
        .request(
            tid(1),
            UploadRequest {
                sender: Sender::Client,
                file: file.clone(),
                data,
            },
        )
        .await;

    let mut bob = harness.connect();
    bob.authenticate("bob", b"secret-b").await;
    let reply = bob
        .request(
            tid(2),
            DownloadRequest {
                sender: Sender::Client,
                hash: file.hash.clone(),
            },
        )
        .await;
    assert!(reply.header.is_error(), "bob must not read alice's file");
}
