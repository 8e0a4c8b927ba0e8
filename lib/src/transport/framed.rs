use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{MAX_FRAME_BYTES, ProtocolError, Transport};

pub async fn write_bytes_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge(payload.len()));
    }

    writer.write_u32(payload.len() as u32).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one `[u32 length][bytes]` frame. `None` means the peer closed the
/// stream cleanly between frames.
pub async fn read_bytes_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    let first = reader.read(&mut len_buf).await?;
    if first == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut len_buf[first..]).await?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

/// Length-prefixed message transport over any byte stream.
pub struct FramedTransport<S> {
    stream: S,
}

impl<S> FramedTransport<S> {
    pub const fn new(stream: S) -> Self {
        Self { stream }
    }
}

impl<S> Transport for FramedTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        read_bytes_frame(&mut self.stream).await
    }

    async fn send(&mut self, message: Vec<u8>) -> Result<(), ProtocolError> {
        write_bytes_frame(&mut self.stream, &message).await
    }

    async fn close(&mut self) -> Result<(), ProtocolError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
