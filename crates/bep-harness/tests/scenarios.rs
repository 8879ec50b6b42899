//! End-to-end scenarios exercising `bep-core` and `bep-crypto` together
//! over the in-memory duplex transport, without a real socket.

use std::sync::Arc;
use std::time::Duration;

use bep_core::{Connection, ConnectionConfig, Environment, Model};
use bep_crypto::{encrypt_file_info, file_key, folder_key, seal_deterministic, InboundAdapter, MIN_PADDED_SIZE};
use bep_harness::{duplex_pair, DeterministicEnvironment, RecordingModel};
use bep_model::DeviceID;
use bep_proto::{ClusterConfig, CompressionPolicy};

fn device(byte: u8) -> DeviceID {
    DeviceID::new([byte; 32])
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

/// S1: a pair of in-memory connected pipes; each side sends an empty
/// ClusterConfig, then calls `ping()`; both return success and the peer
/// actually observes the ClusterConfig.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn s1_ping_round_trip() {
    let ((a_read, a_write), (b_read, b_write)) = duplex_pair(64 * 1024);
    let env = DeterministicEnvironment::new(1);
    let model_a = Arc::new(RecordingModel::new());
    let model_b = Arc::new(RecordingModel::new());

    let a = Connection::start(
        device(2),
        env.clone(),
        ConnectionConfig::default(),
        a_read,
        a_write,
        Arc::clone(&model_a),
    );
    let b = Connection::start(device(1), env, ConnectionConfig::default(), b_read, b_write, model_b.clone());

    a.cluster_config(ClusterConfig::default()).await.unwrap();
    b.cluster_config(ClusterConfig::default()).await.unwrap();
    settle().await;

    a.ping().await.unwrap();
    b.ping().await.unwrap();

    assert_eq!(model_a.cluster_configs().len(), 1);
    assert_eq!(model_b.cluster_configs().len(), 1);
}

/// S2: 1000 alternating Requests (direction flips each iteration) where
/// the Model returns a 128 KiB buffer carrying the big-endian request
/// offset in its last 8 bytes; every Response must decode back to the
/// offset that was requested.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn s2_alternating_requests_round_trip_the_offset() {
    const ITERATIONS: u64 = 1000;
    const BLOCK_SIZE: usize = 128 * 1024;

    let ((a_read, a_write), (b_read, b_write)) = duplex_pair(256 * 1024);
    let env = DeterministicEnvironment::new(2);
    let model_a = Arc::new(RecordingModel::new());
    let model_b = Arc::new(RecordingModel::new());

    for i in 0..ITERATIONS {
        let mut buf = vec![0u8; BLOCK_SIZE];
        buf[BLOCK_SIZE - 8..].copy_from_slice(&i.to_be_bytes());
        model_a.seed_block("default", "blob", i32::try_from(i).unwrap(), buf.clone());
        model_b.seed_block("default", "blob", i32::try_from(i).unwrap(), buf);
    }

    let a = Connection::start(
        device(2),
        env.clone(),
        ConnectionConfig::default(),
        a_read,
        a_write,
        Arc::clone(&model_a),
    );
    let b = Connection::start(device(1), env, ConnectionConfig::default(), b_read, b_write, model_b);

    a.cluster_config(ClusterConfig::default()).await.unwrap();
    b.cluster_config(ClusterConfig::default()).await.unwrap();
    settle().await;

    for i in 0..ITERATIONS {
        let block_no = i32::try_from(i).unwrap();
        let requester = if i % 2 == 0 { &a } else { &b };
        let data = requester
            .request(
                "default".to_string(),
                "blob".to_string(),
                block_no,
                i64::try_from(i).unwrap(),
                i32::try_from(BLOCK_SIZE).unwrap(),
                Vec::new(),
                0,
                false,
            )
            .await
            .unwrap();

        let tail = &data[BLOCK_SIZE - 8..];
        assert_eq!(u64::from_be_bytes(tail.try_into().unwrap()), i);
    }
}

/// S3: sending a Request before ClusterConfig closes the connection with
/// an out-of-state protocol error.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn s3_request_before_cluster_config_closes_the_connection() {
    let ((a_read, a_write), (_b_read, mut b_write)) = duplex_pair(64 * 1024);
    let env = DeterministicEnvironment::new(3);
    let model_a = Arc::new(RecordingModel::new());

    let a = Connection::start(device(2), env, ConnectionConfig::default(), a_read, a_write, model_a);

    let request = bep_proto::Message::Request(bep_proto::Request {
        id: 0,
        folder: "default".to_string(),
        name: "a".to_string(),
        block_no: 0,
        offset: 0,
        size: 0,
        hash: Vec::new(),
        weak_hash: 0,
        from_temporary: false,
    });
    let bytes = bep_proto::encode(&request, CompressionPolicy::Never).unwrap();
    use tokio::io::AsyncWriteExt;
    b_write.write_all(&bytes).await.unwrap();

    settle().await;
    assert!(a.closed());
}

/// S5: under `Always` compression, a 10 KiB all-zero Response occupies
/// far fewer wire bytes than its payload size, while a 10 KiB random
/// Response stays within a small constant of it.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn s5_compression_gain() {
    let compressed_delta = response_wire_bytes(vec![0u8; 10 * 1024]).await;
    let incompressible_delta = response_wire_bytes(pseudo_random_bytes(10 * 1024)).await;

    assert!(compressed_delta < 10 * 1024 / 4, "all-zero response should compress heavily");
    assert!(
        incompressible_delta < 10 * 1024 + 64,
        "random response should cost close to its raw size"
    );
}

async fn response_wire_bytes(payload: Vec<u8>) -> usize {
    let ((a_read, a_write), (b_read, b_write)) = duplex_pair(64 * 1024);
    let env = DeterministicEnvironment::new(5);
    let model_a = Arc::new(RecordingModel::new());
    let model_b = Arc::new(RecordingModel::new());
    model_b.seed_block("default", "blob", 0, payload);

    let a = Connection::start(
        device(2),
        env.clone(),
        config_always(),
        a_read,
        a_write,
        Arc::clone(&model_a),
    );
    let b = Connection::start(device(1), env, config_always(), b_read, b_write, model_b);

    a.cluster_config(ClusterConfig::default()).await.unwrap();
    b.cluster_config(ClusterConfig::default()).await.unwrap();
    settle().await;

    let before = b.statistics().out_bytes_total;
    a.request("default".to_string(), "blob".to_string(), 0, 0, 10 * 1024, Vec::new(), 0, false)
        .await
        .unwrap();
    let after = b.statistics().out_bytes_total;
    usize::try_from(after - before).unwrap()
}

fn config_always() -> ConnectionConfig {
    ConnectionConfig { compression_policy: CompressionPolicy::Always, ..ConnectionConfig::default() }
}

fn pseudo_random_bytes(len: usize) -> Vec<u8> {
    let env = DeterministicEnvironment::new(99);
    let mut buf = vec![0u8; len];
    env.random_bytes(&mut buf);
    buf
}

/// S6: on the trusted side's `InboundAdapter`, a Request for the
/// encrypted name at `blockNo = 0` (so the offset adjustment is a no-op),
/// `offset = 0`, `size = MinPaddedSize`, decrypts to the real name and
/// `real size = MinPaddedSize - blockOverhead`, and the reply is
/// `MinPaddedSize + blockOverhead` bytes on the wire.
#[tokio::test]
async fn s6_encrypted_request_round_trips_through_the_inbound_adapter() {
    let key = folder_key("hunter2", "folder-a").unwrap();
    let env = DeterministicEnvironment::new(6);
    let real_name = "docs/report.pdf";
    let real_data = vec![5u8; MIN_PADDED_SIZE - bep_crypto::BLOCK_OVERHEAD as usize];

    let inner = Arc::new(RecordingModel::new());
    inner.seed_block("folder-a", real_name, 0, real_data.clone());

    let encrypted = encrypt_file_info(
        &sample_file_info(real_name),
        &key,
        device(1).short(),
        env.unix_timestamp_nanos(),
        [7u8; 24],
    )
    .unwrap();
    let visible_name = encrypted.visible.name;

    let fkey = file_key(&key, real_name).unwrap();
    let real_hash = [9u8; 32];
    let token = seal_deterministic(fkey.as_bytes(), &real_hash, &0i64.to_be_bytes()).unwrap();

    let adapter = InboundAdapter::new(inner, folder_key("hunter2", "folder-a").unwrap(), env);
    let sealed = adapter
        .request(
            device(1),
            "folder-a",
            &visible_name,
            0,
            0,
            i32::try_from(MIN_PADDED_SIZE).unwrap(),
            &token,
            7,
            false,
        )
        .await
        .unwrap();

    assert_eq!(sealed.len(), MIN_PADDED_SIZE + bep_crypto::BLOCK_OVERHEAD as usize);
    let opened = bep_crypto::open_random(fkey.as_bytes(), &sealed).unwrap();
    assert_eq!(&opened[..real_data.len()], real_data.as_slice());
}

fn sample_file_info(name: &str) -> bep_model::FileInfo {
    bep_model::FileInfo {
        name: name.to_string(),
        size: i64::try_from(MIN_PADDED_SIZE - bep_crypto::BLOCK_OVERHEAD as usize).unwrap(),
        modified_s: 0,
        modified_ns: 0,
        modified_by: 0,
        version: bep_model::Vector::new(),
        sequence: 0,
        blocks: vec![bep_model::BlockInfo {
            hash: vec![0u8; 32],
            offset: 0,
            size: i32::try_from(MIN_PADDED_SIZE - bep_crypto::BLOCK_OVERHEAD as usize).unwrap(),
        }],
        symlink_target: Vec::new(),
        blocks_hash: Vec::new(),
        file_type: bep_model::FileType::File,
        permissions: 0o644,
        raw_block_size: bep_model::MIN_BLOCK_SIZE as i32,
        deleted: false,
        no_permissions: false,
        local_flags: 0,
    }
}
