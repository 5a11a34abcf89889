use std::io::{self, BufRead, Read};

use log::trace;
use thiserror::Error;

use super::{Popped, Reply};

/// Largest bulk value accepted from the server, matching the store's own
/// default `proto-max-bulk-len`.
pub const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;
/// Largest array header accepted from the server.
pub const MAX_ARRAY_LEN: i64 = 1024 * 1024;
/// Deepest array nesting accepted from the server.
pub const MAX_DEPTH: usize = 32;

const CRLF: &[u8] = b"\r\n";

#[derive(Debug, Error)]
pub enum CodecError {
    /// The stream closed in the middle of a frame (or before one started).
    #[error("end of stream")]
    EndOfStream,
    #[error("malformed reply: {0}")]
    Malformed(String),
    #[error("server error: {0}")]
    Server(String),
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
    #[error("unexpected array length: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("codec IO error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for CodecError {
    fn from(value: io::Error) -> Self {
        match value.kind() {
            io::ErrorKind::UnexpectedEof => CodecError::EndOfStream,
            _ => CodecError::Io(value),
        }
    }
}

/// Encodes a command as an array of bulk strings, command name first.
///
/// The whole frame is returned as one buffer so the caller can write and
/// flush it in a single step.
pub fn encode_command(name: &str, args: &[&str]) -> Vec<u8> {
    let size = std::iter::once(name)
        .chain(args.iter().copied())
        .map(|t| t.len() + 16)
        .sum::<usize>();
    let mut frame = Vec::with_capacity(size + 16);
    frame.extend_from_slice(format!("*{}\r\n", args.len() + 1).as_bytes());

    for token in std::iter::once(name).chain(args.iter().copied()) {
        frame.extend_from_slice(format!("${}\r\n", token.len()).as_bytes());
        frame.extend_from_slice(token.as_bytes());
        frame.extend_from_slice(CRLF);
    }
    frame
}

/// Decodes exactly one reply frame from `reader`.
///
/// Arrays are decoded recursively, so every element announced by the header
/// is consumed even when the caller later rejects the array.
pub fn decode_reply<R: BufRead>(reader: &mut R) -> Result<Reply, CodecError> {
    decode_nested(reader, 0)
}

fn decode_nested<R: BufRead>(reader: &mut R, depth: usize) -> Result<Reply, CodecError> {
    let line = read_line(reader)?;
    trace!("reply header: {line:?}");

    let Some(lead) = line.chars().next() else {
        return Err(CodecError::Malformed("empty header".to_string()));
    };
    let rest = &line[lead.len_utf8()..];

    match lead {
        '+' => Ok(Reply::Status(rest.to_string())),
        '-' => Ok(Reply::Error(rest.to_string())),
        '$' => {
            let len = parse_len(&line, rest)?;
            if len == -1 {
                return Ok(Reply::Bulk(None));
            }
            if !(0..=MAX_BULK_LEN).contains(&len) {
                return Err(CodecError::Malformed(format!("invalid bulk length {line:?}")));
            }

            let mut buf = Vec::new();
            reader.by_ref().take(len as u64).read_to_end(&mut buf)?;
            if buf.len() as i64 != len {
                return Err(CodecError::EndOfStream);
            }
            let mut terminator = [0; 2];
            reader.read_exact(&mut terminator)?;
            Ok(Reply::Bulk(Some(buf)))
        }
        '*' => {
            let count = parse_len(&line, rest)?;
            if count <= -1 {
                return Ok(Reply::Array(None));
            }
            if count > MAX_ARRAY_LEN {
                return Err(CodecError::Malformed(format!("invalid array length {line:?}")));
            }
            if depth >= MAX_DEPTH {
                return Err(CodecError::Malformed(format!(
                    "arrays nested deeper than {MAX_DEPTH}"
                )));
            }

            let mut items = Vec::new();
            for _ in 0..count {
                items.push(decode_nested(reader, depth + 1)?);
            }
            Ok(Reply::Array(Some(items)))
        }
        _ => Err(CodecError::Malformed(format!("unexpected lead byte in {line:?}"))),
    }
}

/// Interprets a reply to a blocking pop.
///
/// Nil replies and empty arrays are timeouts. A two element array of bulk
/// values is a job; their bytes are read as lossy UTF-8 so a garbled payload
/// is left for the job decoder to reject. Anything else is an error, reported after the whole
/// reply has already been read off the stream.
pub fn interpret_pop(reply: Reply) -> Result<Popped, CodecError> {
    match reply {
        Reply::Bulk(None) | Reply::Array(None) => Ok(Popped::Timeout),
        Reply::Array(Some(items)) if items.is_empty() => Ok(Popped::Timeout),
        Reply::Array(Some(items)) => {
            let actual = items.len();
            let [key, payload]: [Reply; 2] = items
                .try_into()
                .map_err(|_| CodecError::LengthMismatch { expected: 2, actual })?;

            Ok(Popped::Job {
                key: bulk_text(key)?,
                payload: bulk_text(payload)?,
            })
        }
        Reply::Error(e) => Err(CodecError::Server(e)),
        other => Err(CodecError::UnexpectedReply(other.kind())),
    }
}

/// Interprets a reply that must be a status line (`+OK`).
pub fn interpret_status(reply: Reply) -> Result<String, CodecError> {
    match reply {
        Reply::Status(s) => Ok(s),
        Reply::Error(e) => Err(CodecError::Server(e)),
        other => Err(CodecError::UnexpectedReply(other.kind())),
    }
}

fn bulk_text(reply: Reply) -> Result<String, CodecError> {
    match reply {
        Reply::Bulk(Some(bytes)) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        other => Err(CodecError::UnexpectedReply(other.kind())),
    }
}

fn read_line<R: BufRead>(reader: &mut R) -> Result<String, CodecError> {
    let mut buf = Vec::new();
    let n = reader.read_until(b'\n', &mut buf)?;
    if n == 0 || !buf.ends_with(b"\n") {
        return Err(CodecError::EndOfStream);
    }

    buf.pop();
    if buf.ends_with(b"\r") {
        buf.pop();
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn parse_len(line: &str, digits: &str) -> Result<i64, CodecError> {
    digits
        .parse::<i64>()
        .map_err(|_| CodecError::Malformed(format!("invalid length in {line:?}")))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn reader(input: &str) -> Cursor<Vec<u8>> {
        Cursor::new(input.as_bytes().to_vec())
    }

    #[test]
    fn encode_ping_with_arguments() {
        let frame = encode_command("PING", &["foo", "bar"]);
        assert_eq!(frame, b"*3\r\n$4\r\nPING\r\n$3\r\nfoo\r\n$3\r\nbar\r\n");
    }

    #[test]
    fn encode_uses_byte_lengths() {
        let frame = encode_command("AUTH", &["pässword"]);
        assert_eq!(frame, "*2\r\n$4\r\nAUTH\r\n$9\r\npässword\r\n".as_bytes());
    }

    #[test]
    fn encode_without_arguments() {
        assert_eq!(encode_command("PING", &[]), b"*1\r\n$4\r\nPING\r\n");
    }

    #[test]
    fn decode_status_and_error() {
        let mut r = reader("+OK\r\n-ERR invalid password\r\n");
        assert_eq!(decode_reply(&mut r).unwrap(), Reply::Status("OK".to_string()));
        assert_eq!(
            decode_reply(&mut r).unwrap(),
            Reply::Error("ERR invalid password".to_string())
        );
    }

    #[test]
    fn decode_pop_job() {
        let payload = r#"{"foo":"bar"}"#;
        let input = format!("*2\r\n$5\r\nqueue\r\n${}\r\n{payload}\r\n", payload.len());
        let mut r = reader(&input);

        let popped = interpret_pop(decode_reply(&mut r).unwrap()).unwrap();
        assert_eq!(
            popped,
            Popped::Job {
                key: "queue".to_string(),
                payload: payload.to_string()
            }
        );
    }

    #[test]
    fn decode_pop_job_with_short_payload() {
        let mut r = reader("*2\r\n$5\r\nqueue\r\n$9\r\n{\"x\":\"y\"}\r\n");

        let popped = interpret_pop(decode_reply(&mut r).unwrap()).unwrap();
        assert_eq!(
            popped,
            Popped::Job {
                key: "queue".to_string(),
                payload: r#"{"x":"y"}"#.to_string()
            }
        );
    }

    #[test]
    fn decode_pop_timeouts() {
        for input in ["$-1\r\n", "*-1\r\n", "*0\r\n"] {
            let mut r = reader(input);
            let popped = interpret_pop(decode_reply(&mut r).unwrap()).unwrap();
            assert_eq!(popped, Popped::Timeout, "input {input:?}");
        }
    }

    #[test]
    fn pop_length_mismatch_keeps_stream_aligned() {
        let mut r = reader("*3\r\n$1\r\na\r\n$1\r\nb\r\n$1\r\nc\r\n+OK\r\n");

        let err = interpret_pop(decode_reply(&mut r).unwrap()).unwrap_err();
        assert!(matches!(
            err,
            CodecError::LengthMismatch {
                expected: 2,
                actual: 3
            }
        ));
        assert_eq!(decode_reply(&mut r).unwrap(), Reply::Status("OK".to_string()));
    }

    #[test]
    fn pop_server_error() {
        let mut r = reader("-WRONGTYPE Operation against a key\r\n");
        let err = interpret_pop(decode_reply(&mut r).unwrap()).unwrap_err();
        assert!(matches!(err, CodecError::Server(e) if e.starts_with("WRONGTYPE")));
    }

    #[test]
    fn pop_rejects_non_nil_bulk() {
        let mut r = reader("$3\r\nabc\r\n");
        let err = interpret_pop(decode_reply(&mut r).unwrap()).unwrap_err();
        assert!(matches!(err, CodecError::UnexpectedReply(_)));
    }

    #[test]
    fn decode_nested_and_empty_values() {
        let mut r = reader("*2\r\n$0\r\n\r\n*-1\r\n");
        assert_eq!(
            decode_reply(&mut r).unwrap(),
            Reply::Array(Some(vec![Reply::Bulk(Some(vec![])), Reply::Array(None)]))
        );
    }

    #[test]
    fn truncated_frames_are_end_of_stream() {
        for input in ["", "*2\r\n", "*2\r\n$5\r\nque", "$5\r\nqueue", "+OK"] {
            let mut r = reader(input);
            let err = decode_reply(&mut r).unwrap_err();
            assert!(matches!(err, CodecError::EndOfStream), "input {input:?}: {err}");
        }
    }

    #[test]
    fn unknown_lead_byte_is_malformed() {
        let mut r = reader(":1\r\n");
        assert!(matches!(
            decode_reply(&mut r).unwrap_err(),
            CodecError::Malformed(_)
        ));
    }

    #[test]
    fn bad_lengths_are_malformed() {
        for input in ["$abc\r\n", "*x\r\n", "$-2\r\n", "\r\n"] {
            let mut r = reader(input);
            assert!(
                matches!(decode_reply(&mut r).unwrap_err(), CodecError::Malformed(_)),
                "input {input:?}"
            );
        }
    }

    #[test]
    fn deep_nesting_is_malformed() {
        let mut r = reader(&"*1\r\n".repeat(100_000));
        assert!(matches!(
            decode_reply(&mut r).unwrap_err(),
            CodecError::Malformed(_)
        ));
    }

    #[test]
    fn nesting_up_to_limit() {
        let input = format!("{}*0\r\n", "*1\r\n".repeat(MAX_DEPTH - 1));
        let mut r = reader(&input);

        let mut reply = decode_reply(&mut r).unwrap();
        for _ in 1..MAX_DEPTH {
            let Reply::Array(Some(mut items)) = reply else {
                panic!("expected array, got {reply:?}");
            };
            reply = items.pop().unwrap();
        }
        assert_eq!(reply, Reply::Array(Some(vec![])));
    }

    #[test]
    fn oversized_bulk_header_needs_body() {
        let mut r = reader("$536870912\r\nabc");
        assert!(matches!(
            decode_reply(&mut r).unwrap_err(),
            CodecError::EndOfStream
        ));
    }

    #[test]
    fn pop_job_with_invalid_utf8() {
        let mut r = Cursor::new(b"*2\r\n$1\r\nq\r\n$2\r\n\xff\xfe\r\n+OK\r\n".to_vec());

        let popped = interpret_pop(decode_reply(&mut r).unwrap()).unwrap();
        assert_eq!(
            popped,
            Popped::Job {
                key: "q".to_string(),
                payload: "\u{fffd}\u{fffd}".to_string()
            }
        );
        assert_eq!(decode_reply(&mut r).unwrap(), Reply::Status("OK".to_string()));
    }

    #[test]
    fn status_interpretation() {
        assert_eq!(
            interpret_status(Reply::Status("OK".to_string())).unwrap(),
            "OK"
        );
        assert!(matches!(
            interpret_status(Reply::Error("NOAUTH".to_string())).unwrap_err(),
            CodecError::Server(_)
        ));
        assert!(matches!(
            interpret_status(Reply::Bulk(None)).unwrap_err(),
            CodecError::UnexpectedReply(_)
        ));
    }
}
