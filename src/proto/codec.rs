use bytes::{BufMut, BytesMut};
use prost::Message;
use std::io::{self, Read, Write};

use crate::{Error, ErrorKind, Result};

/// Largest frame body accepted by `read_frame`
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

const MAX_DELIMITER_LEN: usize = 10;

/// Read a length-delimited message from the stream.
///
/// Returns `None` if the stream is closed before the first byte of the frame.
pub fn read_frame<R, M>(reader: &mut R) -> Result<Option<M>>
where
    R: Read,
    M: Message + Default,
{
    let mut len_delim_byte = [0u8; 1];
    let mut msg_len_delim = BytesMut::with_capacity(MAX_DELIMITER_LEN);

    // NOTE: The length delimiter is read one byte at a time so that no byte of the frame body, or
    // of the next frame, is consumed before the length is known.
    loop {
        let n_read = match reader.read(&mut len_delim_byte) {
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(Error::from(err)),
        };
        if n_read == 0 {
            if msg_len_delim.is_empty() {
                return Ok(None);
            }
            return Err(Error::from(io::Error::from(io::ErrorKind::UnexpectedEof)));
        }
        msg_len_delim.put_slice(&len_delim_byte);

        // the most significant bit marks that more bytes of the varint follow
        if len_delim_byte[0] & 0x80 == 0 {
            break;
        }
        if msg_len_delim.len() >= MAX_DELIMITER_LEN {
            return Err(Error::new(
                ErrorKind::InvalidNetworkMessage,
                "Length delimiter is too long",
            ));
        }
    }

    let len = prost::decode_length_delimiter(&msg_len_delim[..])?;
    if len > MAX_FRAME_LEN {
        return Err(Error::new(
            ErrorKind::FrameTooLarge,
            format!("{} bytes", len),
        ));
    }

    // the buffer grows with the bytes that actually arrive, not with the declared length
    let mut msg_bytes = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut msg_bytes)?;
    if msg_bytes.len() < len {
        return Err(Error::from(io::Error::from(io::ErrorKind::UnexpectedEof)));
    }
    Ok(Some(M::decode(msg_bytes.as_slice())?))
}

/// Write a length-delimited message to the stream and flush it.
pub fn write_frame<W, M>(writer: &mut W, msg: &M) -> Result<()>
where
    W: Write,
    M: Message,
{
    let mut msg_bytes = Vec::with_capacity(MAX_DELIMITER_LEN + msg.encoded_len());
    msg.encode_length_delimited(&mut msg_bytes)?;
    writer.write_all(&msg_bytes)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{EchoRequest, RpcRequest};
    use std::io::Cursor;

    #[test]
    fn consecutive_frames() {
        let first = RpcRequest {
            method: "Echo".to_string(),
            payload: vec![1, 2, 3],
            attachment: vec![],
        };
        let second = RpcRequest {
            method: "Echo".to_string(),
            payload: vec![0xAB; 300],
            attachment: b"attached".to_vec(),
        };

        let mut buf = vec![];
        write_frame(&mut buf, &first).unwrap();
        write_frame(&mut buf, &second).unwrap();

        let mut reader = Cursor::new(buf);
        assert_eq!(Some(first), read_frame::<_, RpcRequest>(&mut reader).unwrap());
        assert_eq!(Some(second), read_frame::<_, RpcRequest>(&mut reader).unwrap());
        assert_eq!(None, read_frame::<_, RpcRequest>(&mut reader).unwrap());
    }

    #[test]
    fn truncated_frame() {
        let req = EchoRequest {
            op: 1,
            key: b"key".to_vec(),
            value: b"value".to_vec(),
        };
        let mut buf = vec![];
        write_frame(&mut buf, &req).unwrap();
        buf.truncate(buf.len() - 2);

        let mut reader = Cursor::new(buf);
        assert!(read_frame::<_, EchoRequest>(&mut reader).is_err());
    }

    #[test]
    fn overlong_delimiter() {
        let mut reader = Cursor::new(vec![0xFFu8; 16]);
        let err = read_frame::<_, EchoRequest>(&mut reader).unwrap_err();
        assert_eq!(Some(ErrorKind::InvalidNetworkMessage), err.kind());
    }

    #[test]
    fn oversized_frame() {
        let mut buf = vec![];
        prost::encode_length_delimiter(MAX_FRAME_LEN + 1, &mut buf).unwrap();

        let mut reader = Cursor::new(buf);
        let err = read_frame::<_, EchoRequest>(&mut reader).unwrap_err();
        assert_eq!(Some(ErrorKind::FrameTooLarge), err.kind());
    }

    #[test]
    fn declared_length_without_body() {
        // a large declared length is not trusted before its bytes arrive
        let mut buf = vec![];
        prost::encode_length_delimiter(MAX_FRAME_LEN, &mut buf).unwrap();
        buf.extend_from_slice(b"short");

        let mut reader = Cursor::new(buf);
        let err = read_frame::<_, EchoRequest>(&mut reader).unwrap_err();
        assert_eq!(None, err.kind());
        assert!(err.to_string().contains("i/o error"));
    }
}
