use super::extension::LOCAL_UT_METADATA_ID;
use super::*;
use crate::constants::{MAX_METADATA_SIZE, METADATA_PIECE_SIZE};
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

fn sha1_of(data: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[test]
fn handshake_roundtrip() {
    let hs = Handshake::new([0xAB; 20], [0xCD; 20]);
    let encoded = hs.encode();
    assert_eq!(encoded.len(), HANDSHAKE_LEN);

    let decoded = Handshake::decode(&encoded).unwrap();
    assert_eq!(decoded.info_hash, [0xAB; 20]);
    assert_eq!(decoded.peer_id, [0xCD; 20]);
    assert!(decoded.supports_extension_protocol());
}

#[test]
fn handshake_rejects_garbage() {
    assert!(Handshake::decode(&[0u8; 68]).is_err());
    assert!(Handshake::decode(b"short").is_err());
}

#[test]
fn handshake_extension_bit_is_reserved_5_0x10() {
    let hs = Handshake::new([0u8; 20], [0u8; 20]);
    assert_eq!(hs.reserved[5] & 0x10, 0x10);

    let mut plain = hs.clone();
    plain.reserved = [0u8; 8];
    assert!(!plain.supports_extension_protocol());
}

#[test]
fn extension_handshake_roundtrip() {
    let hs = ExtensionHandshake::local();
    let decoded = ExtensionHandshake::decode(&hs.encode()).unwrap();

    assert_eq!(decoded.ut_metadata_id(), Some(LOCAL_UT_METADATA_ID));
    assert_eq!(decoded.metadata_size, Some(0));
}

#[test]
fn extension_handshake_ignores_disabled_extensions() {
    // id 0 in the m dict means "disabled"
    let payload = b"d1:md11:ut_metadatai0eee";
    let decoded = ExtensionHandshake::decode(payload).unwrap();
    assert_eq!(decoded.ut_metadata_id(), None);
}

#[test]
fn metadata_message_request_roundtrip() {
    let msg = MetadataMessage::request(5);
    let decoded = MetadataMessage::decode(&msg.encode()).unwrap();
    assert_eq!(decoded.msg_type, MetadataMessageType::Request);
    assert_eq!(decoded.piece, 5);
    assert!(decoded.data.is_none());
}

#[test]
fn metadata_message_data_carries_trailing_bytes() {
    let data = Bytes::from_static(b"piece-bytes");
    let msg = MetadataMessage {
        msg_type: MetadataMessageType::Data,
        piece: 2,
        total_size: Some(1000),
        data: Some(data.clone()),
    };

    let decoded = MetadataMessage::decode(&msg.encode()).unwrap();
    assert_eq!(decoded.msg_type, MetadataMessageType::Data);
    assert_eq!(decoded.piece, 2);
    assert_eq!(decoded.total_size, Some(1000));
    assert_eq!(decoded.data, Some(data));
}

#[test]
fn assembler_rejects_bad_sizes() {
    assert!(matches!(
        MetadataAssembler::new(0),
        Err(WireError::InvalidMetadataSize(0))
    ));
    assert!(MetadataAssembler::new(MAX_METADATA_SIZE).is_ok());
    assert!(MetadataAssembler::new(MAX_METADATA_SIZE + 1).is_err());
}

#[test]
fn assembler_piece_accounting() {
    // 20 000 bytes → one full piece and a 3 616-byte tail.
    let asm = MetadataAssembler::new(20_000).unwrap();
    assert_eq!(asm.num_pieces(), 2);
    assert_eq!(asm.piece_len(0), METADATA_PIECE_SIZE);
    assert_eq!(asm.piece_len(1), 3_616);

    // Exact multiple: no runt piece.
    let asm = MetadataAssembler::new(2 * METADATA_PIECE_SIZE).unwrap();
    assert_eq!(asm.num_pieces(), 2);
    assert_eq!(asm.piece_len(1), METADATA_PIECE_SIZE);
}

#[test]
fn assembler_out_of_order_reassembly() {
    let mut metadata = vec![0u8; 20_000];
    for (i, byte) in metadata.iter_mut().enumerate() {
        *byte = (i % 251) as u8;
    }
    let info_hash = sha1_of(&metadata);

    let mut asm = MetadataAssembler::new(metadata.len()).unwrap();
    assert!(!asm.is_complete());

    // Deliver piece 1 before piece 0.
    asm.insert(1, &metadata[METADATA_PIECE_SIZE..]).unwrap();
    asm.insert(0, &metadata[..METADATA_PIECE_SIZE]).unwrap();
    assert!(asm.is_complete());

    let verified = asm.verify(&info_hash).unwrap();
    assert_eq!(verified.as_ref(), metadata.as_slice());
}

#[test]
fn assembler_detects_corruption() {
    let metadata = vec![0x5A; 20_000];
    let info_hash = sha1_of(&metadata);

    let mut corrupted = metadata.clone();
    corrupted[7] ^= 0x01;

    let mut asm = MetadataAssembler::new(metadata.len()).unwrap();
    asm.insert(0, &corrupted[..METADATA_PIECE_SIZE]).unwrap();
    asm.insert(1, &corrupted[METADATA_PIECE_SIZE..]).unwrap();

    assert!(matches!(
        asm.verify(&info_hash),
        Err(WireError::HashMismatch)
    ));
}

#[test]
fn assembler_rejects_bad_pieces() {
    let mut asm = MetadataAssembler::new(20_000).unwrap();

    assert!(matches!(
        asm.insert(2, &[0u8; 100]),
        Err(WireError::PieceOutOfRange(2))
    ));
    // Wrong length for the tail piece.
    assert!(asm.insert(1, &[0u8; 100]).is_err());

    // Duplicates are harmless.
    asm.insert(0, &vec![1u8; METADATA_PIECE_SIZE]).unwrap();
    asm.insert(0, &vec![2u8; METADATA_PIECE_SIZE]).unwrap();
    assert!(!asm.is_complete());
}

// --- end-to-end session against an in-process peer ---------------------

struct FakePeer {
    metadata: Vec<u8>,
    info_hash: [u8; 20],
    /// metadata_size to advertise; defaults to the real length.
    advertised_size: Option<i64>,
    corrupt: bool,
}

impl FakePeer {
    fn serving(metadata: Vec<u8>) -> Self {
        let info_hash = sha1_of(&metadata);
        Self {
            metadata,
            info_hash,
            advertised_size: None,
            corrupt: false,
        }
    }

    async fn spawn(self) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            self.serve(stream).await;
        });
        addr
    }

    async fn serve(self, mut stream: TcpStream) {
        // BitTorrent handshake
        let mut hs = [0u8; HANDSHAKE_LEN];
        stream.read_exact(&mut hs).await.unwrap();
        let theirs = Handshake::decode(&hs).unwrap();
        assert!(theirs.supports_extension_protocol());

        // Always answers with its own hash; a client asking about a
        // different torrent sees the mismatch.
        let reply = Handshake::new(self.info_hash, *b"-FP0001-abcdefghijkl");
        stream.write_all(&reply.encode()).await.unwrap();

        // Their extension handshake
        let (msg_id, payload) = read_frame(&mut stream).await;
        assert_eq!(msg_id, EXTENSION_MSG_ID);
        assert_eq!(payload[0], EXTENSION_HANDSHAKE_ID);

        // Ours: ut_metadata lives at id 3 on this side
        let mut hs = ExtensionHandshake::default();
        hs.extensions.insert(UT_METADATA.to_string(), 3);
        hs.metadata_size = Some(
            self.advertised_size
                .unwrap_or(self.metadata.len() as i64),
        );
        let mut ext = vec![EXTENSION_HANDSHAKE_ID];
        ext.extend_from_slice(&hs.encode());
        write_frame(&mut stream, EXTENSION_MSG_ID, &ext).await;

        // Collect every request, then answer highest piece first so the
        // client has to reassemble out of order.
        let num_pieces = self.metadata.len().div_ceil(METADATA_PIECE_SIZE);
        let mut requested = Vec::new();
        while requested.len() < num_pieces {
            let (msg_id, payload) = read_frame(&mut stream).await;
            assert_eq!(msg_id, EXTENSION_MSG_ID);
            assert_eq!(payload[0], 3);
            let msg = MetadataMessage::decode(&payload[1..]).unwrap();
            assert_eq!(msg.msg_type, MetadataMessageType::Request);
            requested.push(msg.piece);
        }
        requested.sort_unstable();
        requested.reverse();

        for piece in requested {
            let start = piece as usize * METADATA_PIECE_SIZE;
            let end = (start + METADATA_PIECE_SIZE).min(self.metadata.len());
            let mut chunk = self.metadata[start..end].to_vec();
            if self.corrupt {
                chunk[0] ^= 0xFF;
            }

            let data = MetadataMessage {
                msg_type: MetadataMessageType::Data,
                piece,
                total_size: Some(self.metadata.len() as i64),
                data: Some(Bytes::from(chunk)),
            };
            let mut ext = vec![LOCAL_UT_METADATA_ID];
            ext.extend_from_slice(&data.encode());
            write_frame(&mut stream, EXTENSION_MSG_ID, &ext).await;
        }
    }
}

async fn read_frame(stream: &mut TcpStream) -> (u8, Vec<u8>) {
    loop {
        let mut len = [0u8; 4];
        stream.read_exact(&mut len).await.unwrap();
        let len = u32::from_be_bytes(len) as usize;
        if len == 0 {
            continue;
        }

        let mut frame = vec![0u8; len];
        stream.read_exact(&mut frame).await.unwrap();
        let msg_id = frame.remove(0);
        return (msg_id, frame);
    }
}

async fn write_frame(stream: &mut TcpStream, msg_id: u8, payload: &[u8]) {
    let mut buf = Vec::with_capacity(5 + payload.len());
    buf.extend_from_slice(&(1 + payload.len() as u32).to_be_bytes());
    buf.push(msg_id);
    buf.extend_from_slice(payload);
    stream.write_all(&buf).await.unwrap();
}

fn test_metadata(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 253) as u8).collect()
}

#[tokio::test]
async fn session_fetches_and_verifies_metadata() {
    let metadata = test_metadata(20_000);
    let peer = FakePeer::serving(metadata.clone());
    let info_hash = peer.info_hash;
    let addr = peer.spawn().await;

    let fetched = super::session::fetch(addr, info_hash, *b"-BS0001-aaaaaaaaaaaa", 65536)
        .await
        .unwrap();
    assert_eq!(fetched.as_ref(), metadata.as_slice());
}

#[tokio::test]
async fn session_rejects_corrupted_metadata() {
    let mut peer = FakePeer::serving(test_metadata(20_000));
    peer.corrupt = true;
    let info_hash = peer.info_hash;
    let addr = peer.spawn().await;

    let result = super::session::fetch(addr, info_hash, *b"-BS0001-aaaaaaaaaaaa", 65536).await;
    assert!(matches!(result, Err(WireError::HashMismatch)));
}

#[tokio::test]
async fn session_rejects_zero_metadata_size() {
    let mut peer = FakePeer::serving(test_metadata(4_096));
    peer.advertised_size = Some(0);
    let info_hash = peer.info_hash;
    let addr = peer.spawn().await;

    let result = super::session::fetch(addr, info_hash, *b"-BS0001-aaaaaaaaaaaa", 65536).await;
    assert!(matches!(result, Err(WireError::InvalidMetadataSize(0))));
}

#[tokio::test]
async fn session_rejects_wrong_info_hash() {
    let peer = FakePeer::serving(test_metadata(4_096));
    let addr = peer.spawn().await;

    // Ask the peer about a torrent it is not serving; the fake peer's
    // handshake answers with its own hash, which must not match.
    let result =
        super::session::fetch(addr, [0x42; 20], *b"-BS0001-aaaaaaaaaaaa", 65536).await;
    assert!(matches!(result, Err(WireError::InfoHashMismatch)));
}

#[tokio::test]
async fn fetcher_delivers_metadata() {
    let metadata = test_metadata(20_000);
    let peer = FakePeer::serving(metadata.clone());
    let info_hash = peer.info_hash;
    let addr = peer.spawn().await;

    let (fetcher, mut responses) = MetadataFetcher::new(65536, 8, 4);
    tokio::spawn(fetcher.clone().run());

    fetcher.request(info_hash, addr);

    let fetched = tokio::time::timeout(std::time::Duration::from_secs(30), responses.recv())
        .await
        .expect("fetch timed out")
        .expect("fetcher closed");
    assert_eq!(fetched.info_hash, info_hash);
    assert_eq!(fetched.info.as_ref(), metadata.as_slice());

    fetcher.stop();
}
