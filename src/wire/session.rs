use std::net::SocketAddr;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

use super::error::WireError;
use super::extension::{ExtensionHandshake, EXTENSION_HANDSHAKE_ID, EXTENSION_MSG_ID,
    LOCAL_UT_METADATA_ID};
use super::handshake::{Handshake, HANDSHAKE_LEN};
use super::metadata::{MetadataAssembler, MetadataMessage, MetadataMessageType};
use crate::constants::{WIRE_SESSION_TIMEOUT, WIRE_STAGE_TIMEOUT};

/// Runs one complete metadata fetch against a peer and returns the verified
/// raw `info` dictionary.
///
/// The session walks `Dialing → Handshaking → ExtNegotiating → Downloading`
/// with a deadline per stage and one over the whole session. Any failure
/// ends the session; retries against other peers are the scheduler's call.
pub(super) async fn fetch(
    peer: SocketAddr,
    info_hash: [u8; 20],
    peer_id: [u8; 20],
    buffer_cap: usize,
) -> Result<Bytes, WireError> {
    timeout(
        WIRE_SESSION_TIMEOUT,
        run_session(peer, info_hash, peer_id, buffer_cap),
    )
    .await
    .map_err(|_| WireError::Timeout)?
}

async fn run_session(
    peer: SocketAddr,
    info_hash: [u8; 20],
    peer_id: [u8; 20],
    buffer_cap: usize,
) -> Result<Bytes, WireError> {
    // Dialing
    let mut stream = timeout(WIRE_STAGE_TIMEOUT, TcpStream::connect(peer))
        .await
        .map_err(|_| WireError::Timeout)??;

    // Handshaking
    let ours = Handshake::new(info_hash, peer_id);
    stage_write(&mut stream, &ours.encode()).await?;

    let mut read_buf = BytesMut::with_capacity(buffer_cap.max(HANDSHAKE_LEN));
    fill_buf(&mut stream, &mut read_buf, HANDSHAKE_LEN).await?;
    let theirs = Handshake::decode(&read_buf.split_to(HANDSHAKE_LEN))?;

    if theirs.info_hash != info_hash {
        return Err(WireError::InfoHashMismatch);
    }
    if !theirs.supports_extension_protocol() {
        return Err(WireError::ExtensionsUnsupported);
    }

    // ExtNegotiating
    write_extended(
        &mut stream,
        EXTENSION_HANDSHAKE_ID,
        &ExtensionHandshake::local().encode(),
    )
    .await?;

    let (ut_metadata_id, metadata_size) = loop {
        let (msg_id, payload) = read_message(&mut stream, &mut read_buf, buffer_cap).await?;
        if msg_id != EXTENSION_MSG_ID || payload.is_empty() {
            continue;
        }
        if payload[0] != EXTENSION_HANDSHAKE_ID {
            continue;
        }

        let hs = ExtensionHandshake::decode(&payload[1..])?;
        let id = hs.ut_metadata_id().ok_or(WireError::ExtensionsUnsupported)?;
        let size = hs.metadata_size.unwrap_or(0);
        if size <= 0 {
            return Err(WireError::InvalidMetadataSize(size.max(0) as usize));
        }
        break (id, size as usize);
    };

    // Downloading: queue every piece up front; ut_metadata payloads are
    // tiny, so in-flight bounding buys nothing here.
    let mut assembler = MetadataAssembler::new(metadata_size)?;
    trace!(%peer, pieces = assembler.num_pieces(), metadata_size, "requesting metadata");

    for piece in 0..assembler.num_pieces() as u32 {
        write_extended(
            &mut stream,
            ut_metadata_id,
            &MetadataMessage::request(piece).encode(),
        )
        .await?;
    }

    while !assembler.is_complete() {
        let (msg_id, payload) = read_message(&mut stream, &mut read_buf, buffer_cap).await?;
        if msg_id != EXTENSION_MSG_ID || payload.is_empty() {
            continue;
        }
        // Peers reply on the id WE advertised for ut_metadata.
        if payload[0] != LOCAL_UT_METADATA_ID {
            continue;
        }

        let msg = MetadataMessage::decode(&payload[1..])?;
        match msg.msg_type {
            MetadataMessageType::Data => {
                let data = msg.data.as_deref().unwrap_or_default();
                assembler.insert(msg.piece, data)?;
            }
            MetadataMessageType::Reject => {
                return Err(WireError::PieceRejected(msg.piece));
            }
            MetadataMessageType::Request => {
                // We advertised metadata_size 0; nothing to serve.
            }
        }
    }

    // Verified | Failed
    assembler.verify(&info_hash)
}

async fn stage_write(stream: &mut TcpStream, data: &[u8]) -> Result<(), WireError> {
    timeout(WIRE_STAGE_TIMEOUT, stream.write_all(data))
        .await
        .map_err(|_| WireError::Timeout)??;
    Ok(())
}

/// Writes a length-prefixed peer-wire message.
async fn write_message(stream: &mut TcpStream, msg_id: u8, payload: &[u8]) -> Result<(), WireError> {
    let mut buf = BytesMut::with_capacity(5 + payload.len());
    buf.put_u32(1 + payload.len() as u32);
    buf.put_u8(msg_id);
    buf.put_slice(payload);
    stage_write(stream, &buf).await
}

/// Writes an extension-protocol message (`20`, extension id, payload).
async fn write_extended(
    stream: &mut TcpStream,
    ext_id: u8,
    payload: &[u8],
) -> Result<(), WireError> {
    let mut buf = BytesMut::with_capacity(1 + payload.len());
    buf.put_u8(ext_id);
    buf.put_slice(payload);
    write_message(stream, EXTENSION_MSG_ID, &buf).await
}

/// Reads one non-keepalive message, returning `(message id, payload)`.
async fn read_message(
    stream: &mut TcpStream,
    buf: &mut BytesMut,
    buffer_cap: usize,
) -> Result<(u8, Bytes), WireError> {
    loop {
        fill_buf(stream, buf, 4).await?;
        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;

        if len == 0 {
            // keepalive
            buf.advance(4);
            continue;
        }
        if len > buffer_cap {
            return Err(WireError::MessageTooLarge(len));
        }

        fill_buf(stream, buf, 4 + len).await?;
        buf.advance(4);
        let mut frame = buf.split_to(len);
        let msg_id = frame[0];
        frame.advance(1);
        return Ok((msg_id, frame.freeze()));
    }
}

/// Grows the buffer until it holds at least `want` bytes.
async fn fill_buf(stream: &mut TcpStream, buf: &mut BytesMut, want: usize) -> Result<(), WireError> {
    while buf.len() < want {
        let n = timeout(WIRE_STAGE_TIMEOUT, stream.read_buf(buf))
            .await
            .map_err(|_| WireError::Timeout)??;
        if n == 0 {
            return Err(WireError::ConnectionClosed);
        }
    }
    Ok(())
}
