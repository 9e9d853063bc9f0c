use crate::constants::MAX_FRAME_SIZE_B;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Timed out talking to {0}")]
    Timeout(String),
    #[error("Frame of {0} bytes exceeds the maximum frame size")]
    FrameTooLarge(usize),
    #[error("Malformed message: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Response does not belong to the request that was sent")]
    RequestIdMismatch,
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("Remote endpoint rejected the request: {0}")]
    Remote(String),
}

///
/// Writes one frame: a 4-byte big-endian length followed by the JSON encoding of `message`.
///
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), NetworkError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(message)?;
    if body.len() > MAX_FRAME_SIZE_B {
        return Err(NetworkError::FrameTooLarge(body.len()));
    }
    writer.write_all(&(body.len() as u32).to_be_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

///
/// Reads one frame written by [`write_frame`].
///
/// Returns `Ok(None)` when the peer closed the connection cleanly before a new frame started.
/// A close in the middle of the length prefix is an `UnexpectedEof` error.
///
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>, NetworkError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut length_prefix = [0u8; 4];
    let mut filled = 0;
    while filled < length_prefix.len() {
        let bytes_read = reader.read(&mut length_prefix[filled..]).await?;
        if bytes_read == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(NetworkError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("connection closed after {} bytes of a frame length", filled),
            )));
        }
        filled += bytes_read;
    }

    let length = u32::from_be_bytes(length_prefix) as usize;
    if length > MAX_FRAME_SIZE_B {
        return Err(NetworkError::FrameTooLarge(length));
    }

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;
    Ok(Some(serde_json::from_slice(&body)?))
}
