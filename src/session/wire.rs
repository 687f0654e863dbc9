//! Wire format: one JSON envelope per line.
//!
//! Every line is `{"version": N, "message": {...}}`. The version is checked
//! before the message body is interpreted, so a peer speaking another version
//! gets a clear error instead of a confusing decode failure.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Rejection;
use crate::game::{Change, Game, PlayerId};

/// Version of the wire protocol spoken by this crate.
pub const PROTOCOL_VERSION: u32 = 1;

/// Longest line [`read_message`] accepts, newline included.
pub const MAX_FRAME_BYTES: u64 = 4 * 1024 * 1024;

/// Error type for encoding and decoding wire messages.
#[derive(Debug, Error)]
pub enum WireError {
    /// The message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
    /// The line is not a valid envelope or message.
    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
    /// The peer speaks another protocol version.
    #[error("protocol version mismatch: expected {expected}, got {found}")]
    VersionMismatch {
        /// Version spoken here.
        expected: u32,
        /// Version received.
        found: u32,
    },
    /// The peer sent a line longer than the frame limit.
    #[error("frame exceeds {limit} bytes")]
    FrameTooLong {
        /// Limit in bytes.
        limit: u64,
    },
    /// Reading or writing the stream failed.
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
}

/// A versioned message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Protocol version of the sender.
    pub version: u32,
    /// The message itself.
    pub message: T,
}

#[derive(Deserialize)]
struct Header {
    version: u32,
}

/// Messages sent by players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// First message on a connection.
    Hello {
        /// Display name.
        name: String,
    },
    /// Propose a change for the current phase.
    SubmitChange {
        /// The change; its player field is overwritten by the host.
        change: Change,
    },
}

/// Messages sent by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Reply to `Hello`: the id this connection plays as.
    Welcome {
        /// Assigned player id.
        player: PlayerId,
        /// Host protocol version.
        protocol_version: u32,
    },
    /// Full snapshot of the canonical game.
    GameState {
        /// The game.
        game: Box<Game>,
    },
    /// The last submitted change was applied.
    ChangeAccepted,
    /// The last submitted change was refused.
    ChangeRejected {
        /// Why.
        reason: Rejection,
    },
}

/// Encode a message as one envelope line, including the trailing newline.
///
/// # Errors
///
/// Returns an error if the message cannot be serialized.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, WireError> {
    let envelope = Envelope {
        version: PROTOCOL_VERSION,
        message,
    };
    let mut line = serde_json::to_string(&envelope).map_err(WireError::Encode)?;
    line.push('\n');
    Ok(line)
}

/// Decode one envelope line.
///
/// # Errors
///
/// Returns an error on a version mismatch or malformed line.
pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T, WireError> {
    let header: Header = serde_json::from_str(line).map_err(WireError::Decode)?;
    if header.version != PROTOCOL_VERSION {
        return Err(WireError::VersionMismatch {
            expected: PROTOCOL_VERSION,
            found: header.version,
        });
    }
    let envelope: Envelope<T> = serde_json::from_str(line).map_err(WireError::Decode)?;
    Ok(envelope.message)
}

/// Write one message.
///
/// # Errors
///
/// Returns an error if encoding or writing fails.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let line = encode_line(message)?;
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Read the next message, skipping blank lines.
///
/// Returns `None` once the peer has closed the stream.
///
/// # Errors
///
/// Returns an error if reading or decoding fails, or if a line is longer
/// than [`MAX_FRAME_BYTES`].
pub async fn read_message<R, T>(reader: &mut R) -> Result<Option<T>, WireError>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    read_message_limited(reader, MAX_FRAME_BYTES).await
}

/// [`read_message`] with a custom frame limit.
///
/// # Errors
///
/// See [`read_message`].
pub async fn read_message_limited<R, T>(reader: &mut R, limit: u64) -> Result<Option<T>, WireError>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = Vec::new();
    loop {
        line.clear();
        let mut frame = (&mut *reader).take(limit);
        if frame.read_until(b'\n', &mut line).await? == 0 {
            return Ok(None);
        }
        if frame.limit() == 0 && !line.ends_with(b"\n") {
            return Err(WireError::FrameTooLong { limit });
        }
        let text = std::str::from_utf8(&line)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            return decode_line(trimmed).map(Some);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::KindId;

    #[test]
    fn test_client_message_shape() {
        let line = encode_line(&ClientMessage::Hello {
            name: "ada".to_string(),
        })
        .unwrap();
        assert_eq!(
            line,
            "{\"version\":1,\"message\":{\"type\":\"hello\",\"name\":\"ada\"}}\n"
        );
    }

    #[test]
    fn test_change_survives_wire() {
        let message = ClientMessage::SubmitChange {
            change: Change::pick(2, KindId(5)),
        };
        let line = encode_line(&message).unwrap();
        let decoded: ClientMessage = decode_line(line.trim()).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_version_mismatch() {
        let line = r#"{"version":99,"message":{"type":"hello","name":"x"}}"#;
        let err = decode_line::<ClientMessage>(line).unwrap_err();
        assert!(matches!(
            err,
            WireError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                found: 99
            }
        ));
    }

    #[test]
    fn test_malformed_line() {
        assert!(matches!(
            decode_line::<ClientMessage>("not json"),
            Err(WireError::Decode(_))
        ));
        assert!(matches!(
            decode_line::<ClientMessage>(r#"{"version":1,"message":{"type":"dance"}}"#),
            Err(WireError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_stream_roundtrip_skips_blank_lines() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(b"\n");
        write_message(&mut buffer, &ServerMessage::ChangeAccepted)
            .await
            .unwrap();

        let mut reader = tokio::io::BufReader::new(buffer.as_slice());
        let message: Option<ServerMessage> = read_message(&mut reader).await.unwrap();
        assert!(matches!(message, Some(ServerMessage::ChangeAccepted)));
        let end: Option<ServerMessage> = read_message(&mut reader).await.unwrap();
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_oversized_line_rejected() {
        let hello = encode_line(&ClientMessage::Hello {
            name: "x".repeat(200),
        })
        .unwrap();
        let mut reader = tokio::io::BufReader::new(hello.as_bytes());
        let err = read_message_limited::<_, ClientMessage>(&mut reader, 64)
            .await
            .unwrap_err();
        assert!(matches!(err, WireError::FrameTooLong { limit: 64 }));

        // Lines within the limit still decode.
        let mut reader = tokio::io::BufReader::new(hello.as_bytes());
        let message = read_message_limited::<_, ClientMessage>(&mut reader, 1024)
            .await
            .unwrap();
        assert!(matches!(message, Some(ClientMessage::Hello { name }) if name.len() == 200));
    }

    #[tokio::test]
    async fn test_line_without_newline_at_eof() {
        let mut line = encode_line(&ServerMessage::ChangeAccepted).unwrap();
        line.pop();
        let mut reader = tokio::io::BufReader::new(line.as_bytes());
        let message: Option<ServerMessage> = read_message(&mut reader).await.unwrap();
        assert!(matches!(message, Some(ServerMessage::ChangeAccepted)));
    }
}
