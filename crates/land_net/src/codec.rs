//! Wire framing.
//!
//! A connection carries a sequence of frames: a big-endian `u32` byte count
//! followed by that many bytes of MessagePack holding one
//! [`WirePacket`](crate::WirePacket). The length travels outside the
//! MessagePack body, so a body that fails to decode costs one packet and the
//! next frame still starts at a known offset.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::NetError;

/// Largest frame body accepted in either direction, in bytes.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Serialise `value` into a frame body.
///
/// # Errors
///
/// Returns [`NetError::Encode`] when `rmp-serde` cannot represent `value`.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, NetError> {
    rmp_serde::to_vec(value).map_err(NetError::Encode)
}

/// Parse a frame body as `T`.
///
/// # Errors
///
/// Returns [`NetError::Decode`] when the body is not MessagePack of the
/// expected shape.
pub fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, NetError> {
    rmp_serde::from_slice(bytes).map_err(NetError::Decode)
}

/// Write one length-prefixed frame and flush it.
///
/// # Errors
///
/// Returns [`NetError::FrameTooLarge`] for oversized frames and
/// [`NetError::Io`] if the write fails.
pub async fn write_frame<W>(writer: &mut W, bytes: &[u8]) -> Result<(), NetError>
where
    W: AsyncWrite + Unpin,
{
    if bytes.len() > MAX_FRAME_LEN {
        return Err(NetError::FrameTooLarge(bytes.len()));
    }
    writer.write_u32(bytes.len() as u32).await?;
    writer.write_all(bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame.
///
/// Returns `Ok(None)` if the stream ended before a new frame started.
///
/// # Errors
///
/// Returns [`NetError::FrameTooLarge`] if the header exceeds
/// [`MAX_FRAME_LEN`] and [`NetError::Io`] if the stream breaks, including
/// ending in the middle of a frame.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, NetError>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(NetError::Io(e)),
    };
    if len > MAX_FRAME_LEN {
        return Err(NetError::FrameTooLarge(len));
    }
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes).await?;
    Ok(Some(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::packet::WirePacket;

    #[tokio::test]
    async fn test_header_is_big_endian_body_length() {
        let mut out = Vec::new();
        write_frame(&mut out, &[0xAA; 258]).await.unwrap();
        assert_eq!(&out[..4], &[0, 0, 1, 2]);
        assert_eq!(out.len(), 4 + 258);
    }

    #[tokio::test]
    async fn test_bad_body_leaves_next_frame_readable() {
        let good = encode(&WirePacket::new("chat", &"hi").unwrap()).unwrap();
        let (mut a, mut b) = tokio::io::duplex(256);
        write_frame(&mut a, &[0xC1, 0xC1]).await.unwrap();
        write_frame(&mut a, &good).await.unwrap();

        let bad = read_frame(&mut b).await.unwrap().unwrap();
        assert!(matches!(decode::<WirePacket>(&bad), Err(NetError::Decode(_))));
        let next = read_frame(&mut b).await.unwrap().unwrap();
        assert_eq!(decode::<WirePacket>(&next).unwrap().tag, "chat");
    }

    #[tokio::test]
    async fn test_oversized_body_not_written() {
        let mut out = Vec::new();
        let err = write_frame(&mut out, &vec![0u8; MAX_FRAME_LEN + 1]).await.unwrap_err();
        assert!(matches!(err, NetError::FrameTooLarge(_)));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_frames_keep_boundaries() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let writer = tokio::spawn(async move {
            write_frame(&mut a, b"one").await.unwrap();
            write_frame(&mut a, b"").await.unwrap();
            write_frame(&mut a, &[7u8; 200]).await.unwrap();
        });

        assert_eq!(read_frame(&mut b).await.unwrap().unwrap(), b"one");
        assert_eq!(read_frame(&mut b).await.unwrap().unwrap(), b"");
        assert_eq!(read_frame(&mut b).await.unwrap().unwrap(), vec![7u8; 200]);
        writer.await.unwrap();
        // Writer half dropped: clean end of stream.
        assert!(read_frame(&mut b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_header_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_u32(MAX_FRAME_LEN as u32 + 1).await.unwrap();
        let err = read_frame(&mut b).await.unwrap_err();
        assert!(matches!(err, NetError::FrameTooLarge(_)));
    }

    #[tokio::test]
    async fn test_truncated_frame_is_io_error() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_u32(10).await.unwrap();
        a.write_all(b"abc").await.unwrap();
        drop(a);
        let err = read_frame(&mut b).await.unwrap_err();
        assert!(matches!(err, NetError::Io(_)));
    }
}
