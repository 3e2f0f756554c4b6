//! Lazy decoding of the streamed `netconf` response.
//!
//! The proxy writes one JSON record per line as each device finishes. A
//! [`RecordStream`] reads the body line by line, yields successful records
//! with normalized payloads and buffers failed ones. The failure buffer is
//! published only once the body has been read to the end; a transport or
//! decode error ends the stream without publishing anything.
//!
//! Dropping a `RecordStream` before it is drained drops the underlying
//! response, which closes the connection.

use std::fmt;
use std::io;
use std::mem;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use futures::io::{AsyncBufRead, AsyncBufReadExt};
use futures::{Stream, TryStreamExt};
use netcommander_core::{Error, XmlNormalizer};
use reqwest::Response;
use tracing::{debug, warn};

use crate::envelope::RpcEnvelope;
use crate::models::{DeviceReply, ResultRecord};
use crate::Result;

/// Shared slot holding the failures of the most recently drained stream.
pub(crate) type Outcome = Arc<RwLock<Vec<ResultRecord>>>;

type BodyReader = Pin<Box<dyn AsyncBufRead + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Streaming,
    Drained,
    Failed,
}

/// Pull-based sequence of device replies from one proxy call.
///
/// Records arrive in the order the proxy emits them, which is completion
/// order rather than device-set order.
pub struct RecordStream {
    body: Option<BodyReader>,
    line: Vec<u8>,
    state: State,
    normalizer: XmlNormalizer,
    unwrap_reply: bool,
    failures: Vec<ResultRecord>,
    outcome: Outcome,
}

impl RecordStream {
    pub(crate) fn new(
        response: Response,
        normalizer: XmlNormalizer,
        unwrap_reply: bool,
        outcome: Outcome,
    ) -> Self {
        let body = Box::pin(response.bytes_stream().map_err(io::Error::other)).into_async_read();
        Self {
            body: Some(Box::pin(body)),
            line: Vec::new(),
            state: State::Streaming,
            normalizer,
            unwrap_reply,
            failures: Vec::new(),
            outcome,
        }
    }

    /// Pull the next successful reply.
    ///
    /// Returns `None` once the body is exhausted, after an error has been
    /// returned, or after [`RecordStream::close`].
    ///
    /// # Errors
    ///
    /// Yields a transport error if the connection fails mid-stream, and
    /// [`Error::MalformedResponse`] if a record or its XML payload cannot be
    /// decoded. Either ends the stream.
    pub async fn next_record(&mut self) -> Option<Result<DeviceReply>> {
        while self.state == State::Streaming {
            let body = self.body.as_mut()?;
            self.line.clear();
            match body.read_until(b'\n', &mut self.line).await {
                Ok(0) => self.finish(),
                Ok(_) => {
                    let line = mem::take(&mut self.line);
                    let decoded = self.decode_line(&line);
                    self.line = line;
                    match decoded {
                        Ok(Some(reply)) => return Some(Ok(reply)),
                        Ok(None) => {}
                        Err(err) => {
                            self.fail();
                            return Some(Err(err));
                        }
                    }
                }
                Err(err) => {
                    self.fail();
                    return Some(Err(transport_error(err)));
                }
            }
        }
        None
    }

    /// Failed records of this call, available once the stream is drained.
    #[must_use]
    pub fn failures(&self) -> Option<&[ResultRecord]> {
        (self.state == State::Drained).then_some(self.failures.as_slice())
    }

    /// Returns true once the body has been read to the end.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.state == State::Drained
    }

    /// Stop reading and release the connection.
    ///
    /// Nothing is published; buffered failures are discarded.
    pub fn close(&mut self) {
        self.fail();
    }

    /// Drain the stream, returning every reply and the failed records.
    ///
    /// # Errors
    ///
    /// Returns the first transport or decode error encountered.
    pub async fn collect_all(mut self) -> Result<(Vec<DeviceReply>, Vec<ResultRecord>)> {
        let mut replies = Vec::new();
        while let Some(reply) = self.next_record().await {
            replies.push(reply?);
        }
        Ok((replies, mem::take(&mut self.failures)))
    }

    /// Adapt into a [`futures::Stream`].
    ///
    /// The stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<DeviceReply>> {
        futures::stream::unfold(self, |mut records| async move {
            records.next_record().await.map(|item| (item, records))
        })
    }

    fn decode_line(&mut self, line: &[u8]) -> Result<Option<DeviceReply>> {
        let line = line.strip_suffix(b"\n").unwrap_or(line);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        let record: ResultRecord = serde_json::from_slice(line)
            .map_err(|e| Error::malformed_response(None, format!("invalid record: {e}")))?;
        debug!(host = %record.hostname, success = record.success, "proxy record");

        if !record.success {
            warn!(
                host = %record.hostname,
                reason = record.failure_message().unwrap_or("unknown"),
                "device failed"
            );
            self.failures.push(record);
            return Ok(None);
        }

        let host = record.hostname.as_str();
        let raw = record
            .output
            .as_deref()
            .ok_or_else(|| Error::malformed_response(Some(host), "successful record has no output"))?;
        let mut output = self.normalizer.normalize(raw, Some(host))?;
        if self.unwrap_reply {
            output = RpcEnvelope::unwrap(output, Some(host))?;
        }

        Ok(Some(DeviceReply {
            hostname: record.hostname,
            output,
        }))
    }

    fn finish(&mut self) {
        self.body = None;
        self.state = State::Drained;
        debug!(failures = self.failures.len(), "proxy stream drained");
        if let Ok(mut outcome) = self.outcome.write() {
            outcome.clone_from(&self.failures);
        }
    }

    fn fail(&mut self) {
        self.body = None;
        self.line.clear();
        self.failures.clear();
        self.state = State::Failed;
    }
}

impl fmt::Debug for RecordStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStream")
            .field("state", &self.state)
            .field("unwrap_reply", &self.unwrap_reply)
            .field("failures", &self.failures)
            .finish_non_exhaustive()
    }
}

/// Recover the HTTP error behind a failed body read.
fn transport_error(err: io::Error) -> Error {
    match err.into_inner().map(|inner| inner.downcast::<reqwest::Error>()) {
        Some(Ok(http)) => Error::from(*http),
        Some(Err(other)) => Error::HttpError(format!("Failed to read proxy response: {other}")),
        None => Error::HttpError("Failed to read proxy response".to_string()),
    }
}
