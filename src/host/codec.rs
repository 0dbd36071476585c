//! Browser native messaging framing: a `u32` length in native byte order
//! followed by that many bytes of UTF-8 JSON.

use std::io::ErrorKind;

use anyhow::{bail, Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest message the browser accepts from a native host.
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Read one frame's body. Returns `Ok(None)` once the browser closes the pipe.
///
/// An oversized or truncated frame leaves the stream unusable, so both are
/// errors.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err).context("failed to read message length"),
    }

    let len = u32::from_ne_bytes(header) as usize;
    if len > MAX_MESSAGE_BYTES {
        bail!("message of {len} bytes exceeds the {MAX_MESSAGE_BYTES} byte limit");
    }

    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .context("message body truncated")?;
    Ok(Some(body))
}

/// Read and decode one framed message.
pub async fn read_message<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    match read_frame(reader).await? {
        Some(body) => {
            let message = serde_json::from_slice(&body).context("malformed message JSON")?;
            Ok(Some(message))
        }
        None => Ok(None),
    }
}

pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(message).context("failed to encode message")?;
    if body.len() > MAX_MESSAGE_BYTES {
        bail!(
            "outgoing message of {} bytes exceeds the {MAX_MESSAGE_BYTES} byte limit",
            body.len()
        );
    }

    let len = u32::try_from(body.len()).context("message length overflows u32")?;
    writer.write_all(&len.to_ne_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}
