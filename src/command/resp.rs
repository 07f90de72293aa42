//! RESP2 wire framing: decoding inbound frames and encoding outbound replies.
//!
//! Decoding supports the two shapes clients send: inline commands
//! (space-separated tokens terminated by `\r\n`) and the array-of-bulk-strings
//! form every real client actually uses. Encoding covers the five RESP2 reply
//! types plus `write_any`, used by handlers that build heterogeneous arrays
//! (e.g. `COMMAND INFO`, `CLUSTER PEERS`).

use std::collections::HashMap;

use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{DataBuddyError, Result};

/// A decoded inbound command: the raw argument tokens, already split out of
/// their RESP framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Argument tokens, in order. `args[0]` is the command name.
    pub args: Vec<Vec<u8>>,
}

impl Command {
    /// Returns `args[0]` as a lowercase string, or empty string if no args.
    pub fn name_lower(&self) -> String {
        self.args
            .first()
            .map(|a| String::from_utf8_lossy(a).to_lowercase())
            .unwrap_or_default()
    }

    /// Returns argument `i` as a UTF-8 string (lossy).
    pub fn arg_str(&self, i: usize) -> String {
        String::from_utf8_lossy(&self.args[i]).into_owned()
    }
}

/// A value that can be written as a RESP reply, including the heterogeneous
/// shapes handlers build for introspection commands.
#[derive(Debug, Clone)]
pub enum RespValue {
    /// `+OK\r\n`
    Simple(String),
    /// `-ERR ...\r\n`
    Error(String),
    /// `:123\r\n`
    Integer(i64),
    /// `$n\r\n...\r\n`, or `$-1\r\n` for `None`.
    Bulk(Option<Vec<u8>>),
    /// `*n\r\n` followed by each element's encoding, or `*-1\r\n` for `None`.
    Array(Option<Vec<RespValue>>),
    /// A flat map encoded as an array of alternating key/value bulk strings,
    /// matching the shape clients expect for tag maps (`CLUSTER PEERS`).
    Map(HashMap<String, String>),
}

impl RespValue {
    /// Shorthand for `Bulk(Some(bytes))`.
    pub fn bulk(bytes: impl Into<Vec<u8>>) -> Self {
        RespValue::Bulk(Some(bytes.into()))
    }

    /// Shorthand for a simple string.
    pub fn simple(s: impl Into<String>) -> Self {
        RespValue::Simple(s.into())
    }

    /// Shorthand for an error reply. Callers are expected to already include
    /// an `ERR ` (or other convention) prefix in `s`.
    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    /// Builds an array of bulk strings from an iterator of string-likes.
    pub fn string_array(items: impl IntoIterator<Item = impl Into<String>>) -> Self {
        RespValue::Array(Some(
            items
                .into_iter()
                .map(|s| RespValue::bulk(s.into().into_bytes()))
                .collect(),
        ))
    }
}

/// Reads a single inbound command from `reader`.
///
/// Supports both inline commands and RESP arrays-of-bulk-strings. Returns
/// `Ok(None)` on a clean EOF before any bytes of a new frame arrive.
pub async fn read_command<R>(reader: &mut R) -> Result<Option<Command>>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    use tokio::io::AsyncBufReadExt;

    let mut first_byte = [0u8; 1];
    let n = reader.read(&mut first_byte).await?;
    if n == 0 {
        return Ok(None);
    }

    if first_byte[0] == b'*' {
        let count = read_line_as_int(reader).await?;
        if count < 0 {
            return Ok(Some(Command { args: Vec::new() }));
        }
        let mut args = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let mut marker = [0u8; 1];
            reader.read_exact(&mut marker).await?;
            if marker[0] != b'$' {
                return Err(protocol_error("expected bulk string"));
            }
            let len = read_line_as_int(reader).await?;
            if len < 0 {
                args.push(Vec::new());
                continue;
            }
            let mut buf = vec![0u8; len as usize];
            reader.read_exact(&mut buf).await?;
            let mut crlf = [0u8; 2];
            reader.read_exact(&mut crlf).await?;
            args.push(buf);
        }
        Ok(Some(Command { args }))
    } else {
        let mut line = Vec::new();
        line.push(first_byte[0]);
        reader.read_until(b'\n', &mut line).await?;
        trim_crlf(&mut line);
        let args = line
            .split(|&b| b == b' ')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_vec())
            .collect::<Vec<_>>();
        Ok(Some(Command { args }))
    }
}

async fn read_line_as_int<R>(reader: &mut R) -> Result<i64>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    use tokio::io::AsyncBufReadExt;
    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line).await?;
    trim_crlf(&mut line);
    std::str::from_utf8(&line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| protocol_error("expected integer line"))
}

fn trim_crlf(line: &mut Vec<u8>) {
    while matches!(line.last(), Some(b'\n') | Some(b'\r')) {
        line.pop();
    }
}

fn protocol_error(msg: &str) -> DataBuddyError {
    DataBuddyError::Protocol(msg.to_string())
}

/// Writes a single RESP value to `writer`.
pub async fn write_value<W>(writer: &mut W, value: &RespValue) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    encode_into(value, &mut buf);
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

fn encode_into(value: &RespValue, buf: &mut Vec<u8>) {
    match value {
        RespValue::Simple(s) => {
            buf.push(b'+');
            buf.extend_from_slice(s.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        RespValue::Error(s) => {
            buf.push(b'-');
            buf.extend_from_slice(s.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        RespValue::Integer(i) => {
            buf.push(b':');
            buf.extend_from_slice(i.to_string().as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        RespValue::Bulk(None) => buf.extend_from_slice(b"$-1\r\n"),
        RespValue::Bulk(Some(bytes)) => {
            buf.push(b'$');
            buf.extend_from_slice(bytes.len().to_string().as_bytes());
            buf.extend_from_slice(b"\r\n");
            buf.extend_from_slice(bytes);
            buf.extend_from_slice(b"\r\n");
        }
        RespValue::Array(None) => buf.extend_from_slice(b"*-1\r\n"),
        RespValue::Array(Some(items)) => {
            buf.push(b'*');
            buf.extend_from_slice(items.len().to_string().as_bytes());
            buf.extend_from_slice(b"\r\n");
            for item in items {
                encode_into(item, buf);
            }
        }
        RespValue::Map(map) => {
            buf.push(b'*');
            buf.extend_from_slice((map.len() * 2).to_string().as_bytes());
            buf.extend_from_slice(b"\r\n");
            for (k, v) in map {
                encode_into(&RespValue::bulk(k.clone().into_bytes()), buf);
                encode_into(&RespValue::bulk(v.clone().into_bytes()), buf);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    async fn decode(input: &[u8]) -> Command {
        let mut reader = BufReader::new(input);
        read_command(&mut reader).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_decode_array_of_bulk() {
        let cmd = decode(b"*1\r\n$4\r\nPING\r\n").await;
        assert_eq!(cmd.args, vec![b"PING".to_vec()]);
    }

    #[tokio::test]
    async fn test_decode_inline_command() {
        let cmd = decode(b"PING\r\n").await;
        assert_eq!(cmd.args, vec![b"PING".to_vec()]);
    }

    #[tokio::test]
    async fn test_decode_multi_arg_array() {
        let cmd = decode(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n").await;
        assert_eq!(
            cmd.args,
            vec![b"SET".to_vec(), b"k".to_vec(), b"v".to_vec()]
        );
    }

    #[tokio::test]
    async fn test_decode_returns_none_on_eof() {
        let mut reader = BufReader::new(&b""[..]);
        assert!(read_command(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_encode_simple() {
        let mut buf = Vec::new();
        write_value(&mut buf, &RespValue::simple("PONG")).await.unwrap();
        assert_eq!(buf, b"+PONG\r\n");
    }

    #[tokio::test]
    async fn test_encode_error() {
        let mut buf = Vec::new();
        write_value(&mut buf, &RespValue::error("ERR boom")).await.unwrap();
        assert_eq!(buf, b"-ERR boom\r\n");
    }

    #[tokio::test]
    async fn test_encode_integer() {
        let mut buf = Vec::new();
        write_value(&mut buf, &RespValue::Integer(42)).await.unwrap();
        assert_eq!(buf, b":42\r\n");
    }

    #[tokio::test]
    async fn test_encode_bulk_nil() {
        let mut buf = Vec::new();
        write_value(&mut buf, &RespValue::Bulk(None)).await.unwrap();
        assert_eq!(buf, b"$-1\r\n");
    }

    #[tokio::test]
    async fn test_encode_bulk_value() {
        let mut buf = Vec::new();
        write_value(&mut buf, &RespValue::bulk(b"30".to_vec())).await.unwrap();
        assert_eq!(buf, b"$2\r\n30\r\n");
    }

    #[tokio::test]
    async fn test_encode_array() {
        let mut buf = Vec::new();
        write_value(&mut buf, &RespValue::string_array(["a", "aa", "ab"]))
            .await
            .unwrap();
        assert_eq!(buf, b"*3\r\n$1\r\na\r\n$2\r\naa\r\n$2\r\nab\r\n");
    }
}
