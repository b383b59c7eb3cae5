//! Newline-delimited JSON stream processing.
//!
//! Ollama streams its responses as one JSON object per line, with no
//! enclosing array and no terminator other than the end of the body:
//! ```text
//! {"model":"llama3","response":"The","done":false}
//! {"model":"llama3","response":" sky","done":false}
//! {"model":"llama3","response":"","done":true,"eval_count":2}
//! ```
//!
//! [`parse_line`] turns one line into at most one typed value and
//! [`LineReader`] pulls lines off a response body and feeds them to it.

use std::io;
use std::marker::PhantomData;
use std::pin::Pin;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::de::DeserializeOwned;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

use crate::client::ClientError;

type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Longest line a [`LineReader`] buffers before giving up on it.
pub const MAX_LINE_LENGTH: usize = 16 * 1024 * 1024;

/// How much of an oversized line is kept in the error.
const LINE_PREVIEW: usize = 256;

/// Decode a single line of an event stream.
///
/// A blank line carries no item and yields `Ok(None)`. Any other line must
/// decode to exactly one `T`; a line that does not is a protocol violation
/// and is reported as [`ClientError::MalformedLine`].
///
/// # Example
/// ```
/// use ollama_core::ndjson::parse_line;
///
/// let value: Option<serde_json::Value> = parse_line("{\"done\":true}").unwrap();
/// assert_eq!(value.unwrap()["done"], true);
///
/// let blank: Option<serde_json::Value> = parse_line("").unwrap();
/// assert!(blank.is_none());
/// ```
pub fn parse_line<T: DeserializeOwned>(line: &str) -> Result<Option<T>, ClientError> {
    if line.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str(line)
        .map(Some)
        .map_err(|source| ClientError::MalformedLine {
            line: line.to_string(),
            source: Box::new(source),
        })
}

/// Outcome of a single [`LineReader::try_read_next`] call.
#[derive(Debug)]
pub enum ReadOutcome<T> {
    /// The line decoded into an item.
    Item(T),
    /// The line was blank; read again.
    Blank,
    /// The body has no more data.
    EndOfStream,
}

/// Reads typed items off a byte stream, one line at a time.
///
/// Owns the line-splitting reader layered over the body; dropping the
/// `LineReader` drops the body stream and with it the HTTP connection.
/// Each call to [`try_read_next`](Self::try_read_next) consumes exactly one
/// line and nothing is read ahead beyond what line splitting needs.
pub struct LineReader<T> {
    reader: StreamReader<ByteStream, Bytes>,
    line: Vec<u8>,
    max_line_length: usize,
    _item: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> LineReader<T> {
    /// Wrap an arbitrary byte stream.
    pub fn new<S>(bytes: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        let bytes: ByteStream = Box::pin(bytes);
        Self {
            reader: StreamReader::new(bytes),
            line: Vec::new(),
            max_line_length: MAX_LINE_LENGTH,
            _item: PhantomData,
        }
    }

    /// Take ownership of an HTTP response and read its body.
    pub fn from_response(response: reqwest::Response) -> Self {
        Self::new(response.bytes_stream().map(|chunk| chunk.map_err(io::Error::other)))
    }

    /// Cap the length of a single line, in bytes.
    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    /// Read one line and decode it.
    pub async fn try_read_next(&mut self) -> Result<ReadOutcome<T>, ClientError> {
        let Some(line) = self.read_line().await? else {
            return Ok(ReadOutcome::EndOfStream);
        };

        Ok(match parse_line(&line)? {
            Some(item) => ReadOutcome::Item(item),
            None => ReadOutcome::Blank,
        })
    }

    /// Pull the next raw line off the body, without its terminator.
    ///
    /// Only failures of the body itself are [`ClientError::Body`]; bytes
    /// that arrived but cannot form a text line are a malformed line.
    async fn read_line(&mut self) -> Result<Option<String>, ClientError> {
        self.line.clear();
        loop {
            let available = self.reader.fill_buf().await.map_err(ClientError::Body)?;
            if available.is_empty() {
                if self.line.is_empty() {
                    return Ok(None);
                }
                break;
            }

            let (taken, complete) = match available.iter().position(|b| *b == b'\n') {
                Some(end) => (end + 1, true),
                None => (available.len(), false),
            };
            self.line.extend_from_slice(&available[..taken]);
            self.reader.consume(taken);

            if self.line.len() > self.max_line_length {
                let preview = String::from_utf8_lossy(&self.line[..LINE_PREVIEW.min(self.line.len())]).into_owned();
                return Err(ClientError::MalformedLine {
                    line: preview,
                    source: format!("line exceeds {} bytes", self.max_line_length).into(),
                });
            }
            if complete {
                break;
            }
        }

        if self.line.last() == Some(&b'\n') {
            self.line.pop();
            if self.line.last() == Some(&b'\r') {
                self.line.pop();
            }
        }

        match std::str::from_utf8(&self.line) {
            Ok(text) => Ok(Some(text.to_string())),
            Err(source) => Err(ClientError::MalformedLine {
                line: String::from_utf8_lossy(&self.line).into_owned(),
                source: Box::new(source),
            }),
        }
    }
}

impl<T> LineReader<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Turn the reader into a lazy stream of items.
    ///
    /// Blank lines are skipped. The stream ends at end of body, or right
    /// after yielding the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<T, ClientError>> + Send {
        stream::unfold(Some(self), |reader| async move {
            let mut reader = reader?;
            loop {
                match reader.try_read_next().await {
                    Ok(ReadOutcome::Item(item)) => return Some((Ok(item), Some(reader))),
                    Ok(ReadOutcome::Blank) => continue,
                    Ok(ReadOutcome::EndOfStream) => return None,
                    Err(e) => return Some((Err(e), None)),
                }
            }
        })
    }
}
