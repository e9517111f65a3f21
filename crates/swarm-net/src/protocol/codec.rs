//! Frame format: `[4 bytes big-endian length][JSON-encoded Envelope]`.
//!
//! Max message size: 8 MiB (covers bulk task context/result payloads without
//! letting a single frame exhaust the reader's buffer).

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::types::Envelope;

pub const MAX_MSG_BYTES: usize = 8 * 1024 * 1024;

pub async fn write_framed<W>(io: &mut W, env: &Envelope) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let payload = serde_json::to_vec(env)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    if payload.len() > MAX_MSG_BYTES {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "message too large"));
    }
    let len = payload.len() as u32;
    io.write_all(&len.to_be_bytes()).await?;
    io.write_all(&payload).await?;
    io.flush().await
}

pub async fn read_framed<R>(io: &mut R) -> io::Result<Envelope>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    io.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MSG_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "incoming message too large",
        ));
    }
    let mut payload = vec![0u8; len];
    io.read_exact(&mut payload).await?;
    serde_json::from_slice(&payload)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::{tag, Hello};

    #[tokio::test]
    async fn frame_roundtrips_over_a_duplex_pipe() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        let hello = Hello {
            node_id: "n1".into(),
            listen_port: 7420,
            public_key_hex: None,
        };
        let env = Envelope::new(tag::HELLO, &hello).unwrap();
        write_framed(&mut a, &env).await.unwrap();
        let got = read_framed(&mut b).await.unwrap();
        assert_eq!(got.msg_type, tag::HELLO);
        let decoded: Hello = got.decode().unwrap();
        assert_eq!(decoded, hello);
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected_on_read() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let len = (MAX_MSG_BYTES as u32) + 1;
        a.write_all(&len.to_be_bytes()).await.unwrap();
        let result = read_framed(&mut b).await;
        assert!(result.is_err());
    }
}
