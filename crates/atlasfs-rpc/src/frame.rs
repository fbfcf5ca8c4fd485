//! Async frame I/O
//!
//! One frame is a 4-byte little-endian length followed by a bincode
//! payload. Oversized frames are rejected before allocation.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use atlasfs_core::{wire, RpcError, MAX_MESSAGE_SIZE};

/// Send one frame on the stream.
pub async fn send_frame<T: Serialize>(stream: &mut TcpStream, msg: &T) -> Result<(), RpcError> {
    let data =
        wire::encode_frame(msg).map_err(|e| RpcError::Transport(format!("encode failure: {e}")))?;

    stream
        .write_all(&data)
        .await
        .map_err(|e| RpcError::Transport(format!("write failure: {e}")))?;

    Ok(())
}

/// Receive one frame from the stream.
pub async fn recv_frame<T: DeserializeOwned>(stream: &mut TcpStream) -> Result<T, RpcError> {
    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .await
        .map_err(|e| RpcError::Transport(format!("read failure: {e}")))?;

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(RpcError::Transport(format!(
            "frame too large: {len} bytes (max {MAX_MESSAGE_SIZE})"
        )));
    }

    let mut payload = vec![0u8; len];
    stream
        .read_exact(&mut payload)
        .await
        .map_err(|e| RpcError::Transport(format!("read failure: {e}")))?;

    wire::decode_frame(&payload).map_err(|e| RpcError::Transport(format!("decode failure: {e}")))
}
