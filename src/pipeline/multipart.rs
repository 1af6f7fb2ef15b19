//! Streaming `multipart/mixed` decoder.
//!
//! The response body arrives as a stream of byte chunks of arbitrary size.
//! [`MultipartReader`] walks it in a single forward pass:
//!
//! ```text
//! preamble
//! --boundary CRLF headers CRLF CRLF body
//! CRLF --boundary CRLF headers CRLF CRLF body
//! CRLF --boundary-- epilogue
//! ```
//!
//! Each part is handed out as a [`ResponsePart`] that mutably borrows the
//! reader, so part *N+1* can only be requested once part *N* is dropped. Any
//! body bytes of part *N* the caller did not read are skipped then. Part
//! bodies are yielded chunk by chunk and never buffered whole: the reader
//! holds at most one network chunk plus a boundary's worth of look-behind.

use crate::error::ConvertApiError;
use crate::pipeline::disposition::ContentDisposition;
use bytes::{Buf, Bytes, BytesMut};
use futures::StreamExt;
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::{debug, trace};

/// A boxed stream of body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ConvertApiError>> + Send>>;

/// Upper bound on one part's header block.
const MAX_HEADER_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Before the first boundary.
    Preamble,
    /// Just past a boundary line; the next bytes are part headers.
    Headers,
    /// Inside a part body.
    Body,
    /// Past the closing boundary.
    Finished,
}

/// Headers of one part.
#[derive(Debug, Clone, Default)]
pub struct PartHead {
    headers: Vec<(String, String)>,
    disposition: Option<ContentDisposition>,
}

impl PartHead {
    fn new(headers: Vec<(String, String)>) -> Self {
        let disposition = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-disposition"))
            .map(|(_, v)| ContentDisposition::parse(v));
        Self {
            headers,
            disposition,
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn name(&self) -> Option<&str> {
        self.disposition.as_ref()?.name.as_deref()
    }

    /// Decoded file name, extended form first. `None` for auxiliary parts.
    pub fn file_name(&self) -> Option<&str> {
        self.disposition.as_ref()?.file_name()
    }
}

/// Single-pass reader over a `multipart/mixed` body.
pub struct MultipartReader<S> {
    stream: S,
    buf: BytesMut,
    /// `CRLF--boundary`
    delimiter: Vec<u8>,
    state: State,
}

impl<S> MultipartReader<S>
where
    S: Stream<Item = Result<Bytes, ConvertApiError>> + Unpin,
{
    pub fn new(stream: S, boundary: &str) -> Self {
        let mut delimiter = Vec::with_capacity(boundary.len() + 4);
        delimiter.extend_from_slice(b"\r\n--");
        delimiter.extend_from_slice(boundary.as_bytes());

        // A leading CRLF lets a boundary on the very first line match the
        // same delimiter as every later one.
        let mut buf = BytesMut::with_capacity(8 * 1024);
        buf.extend_from_slice(b"\r\n");

        Self {
            stream,
            buf,
            delimiter,
            state: State::Preamble,
        }
    }

    /// Advance to the next part, including auxiliary parts without a file name.
    pub async fn next_part(&mut self) -> Result<Option<ResponsePart<'_, S>>, ConvertApiError> {
        match self.next_head().await? {
            Some(head) => Ok(Some(ResponsePart { reader: self, head })),
            None => Ok(None),
        }
    }

    /// Advance to the next part that names a file, skipping the others.
    pub async fn next_file_part(
        &mut self,
    ) -> Result<Option<ResponsePart<'_, S>>, ConvertApiError> {
        loop {
            let Some(head) = self.next_head().await? else {
                return Ok(None);
            };
            if head.file_name().is_some() {
                return Ok(Some(ResponsePart { reader: self, head }));
            }
            debug!(
                "Skipping part without file name (name: {:?})",
                head.name()
            );
        }
    }

    async fn next_head(&mut self) -> Result<Option<PartHead>, ConvertApiError> {
        loop {
            match self.state {
                State::Finished => return Ok(None),
                State::Body => {
                    // Drain what the caller left unread.
                    while self.body_chunk().await?.is_some() {}
                }
                State::Preamble => self.skip_preamble().await?,
                State::Headers => {
                    let head = PartHead::new(self.read_headers().await?);
                    self.state = State::Body;
                    trace!("Part headers: {:?}", head.headers);
                    return Ok(Some(head));
                }
            }
        }
    }

    /// Next chunk of the current part body, `None` at its end.
    async fn body_chunk(&mut self) -> Result<Option<Bytes>, ConvertApiError> {
        if self.state != State::Body {
            return Ok(None);
        }
        loop {
            if let Some(i) = find(&self.buf, &self.delimiter) {
                if i > 0 {
                    return Ok(Some(self.buf.split_to(i).freeze()));
                }
                self.buf.advance(self.delimiter.len());
                self.after_delimiter().await?;
                return Ok(None);
            }

            // Anything before the last `delimiter.len() - 1` bytes cannot be
            // the start of a delimiter.
            let safe = self.buf.len().saturating_sub(self.delimiter.len() - 1);
            if safe > 0 {
                return Ok(Some(self.buf.split_to(safe).freeze()));
            }
            if !self.fill().await? {
                return Err(ConvertApiError::MalformedResponse(
                    "body ended inside a part (missing closing boundary)".into(),
                ));
            }
        }
    }

    async fn skip_preamble(&mut self) -> Result<(), ConvertApiError> {
        loop {
            if let Some(i) = find(&self.buf, &self.delimiter) {
                self.buf.advance(i + self.delimiter.len());
                return self.after_delimiter().await;
            }
            let keep = self.delimiter.len() - 1;
            if self.buf.len() > keep {
                let drop = self.buf.len() - keep;
                self.buf.advance(drop);
            }
            if !self.fill().await? {
                return Err(ConvertApiError::MalformedResponse(
                    "no multipart boundary found in response body".into(),
                ));
            }
        }
    }

    /// Decide between the closing delimiter and a new part, consuming the
    /// rest of the boundary line.
    async fn after_delimiter(&mut self) -> Result<(), ConvertApiError> {
        while self.buf.len() < 2 {
            if !self.fill().await? {
                return Err(ConvertApiError::MalformedResponse(
                    "body ended right after a boundary".into(),
                ));
            }
        }
        if self.buf.starts_with(b"--") {
            self.state = State::Finished;
            self.buf.clear();
            return Ok(());
        }

        // Skip optional transport padding up to the line break.
        let end = self.read_until_crlf().await?;
        self.buf.advance(end + 2);
        self.state = State::Headers;
        Ok(())
    }

    async fn read_headers(&mut self) -> Result<Vec<(String, String)>, ConvertApiError> {
        let mut headers: Vec<(String, String)> = Vec::new();
        let mut consumed = 0usize;

        loop {
            let end = self.read_until_crlf().await?;
            let line = self.buf.split_to(end);
            self.buf.advance(2);
            consumed += end + 2;
            if consumed > MAX_HEADER_BYTES {
                return Err(ConvertApiError::MalformedResponse(
                    "part header block too large".into(),
                ));
            }

            if line.is_empty() {
                return Ok(headers);
            }
            let line = String::from_utf8_lossy(&line);

            if line.starts_with([' ', '\t']) {
                // Folded continuation of the previous header.
                if let Some((_, value)) = headers.last_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }
            match line.split_once(':') {
                Some((name, value)) => {
                    headers.push((name.trim().to_string(), value.trim().to_string()))
                }
                None => {
                    return Err(ConvertApiError::MalformedResponse(format!(
                        "invalid part header line: {line:?}"
                    )))
                }
            }
        }
    }

    /// Offset of the next CRLF in the buffer, reading more as needed.
    async fn read_until_crlf(&mut self) -> Result<usize, ConvertApiError> {
        loop {
            if let Some(i) = find(&self.buf, b"\r\n") {
                return Ok(i);
            }
            if self.buf.len() > MAX_HEADER_BYTES {
                return Err(ConvertApiError::MalformedResponse(
                    "part header line too long".into(),
                ));
            }
            if !self.fill().await? {
                return Err(ConvertApiError::MalformedResponse(
                    "body ended inside part headers".into(),
                ));
            }
        }
    }

    /// Append the next network chunk. `false` at end of stream.
    async fn fill(&mut self) -> Result<bool, ConvertApiError> {
        match self.stream.next().await {
            Some(chunk) => {
                self.buf.extend_from_slice(&chunk?);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// One decoded part, borrowed from its reader.
pub struct ResponsePart<'a, S> {
    reader: &'a mut MultipartReader<S>,
    head: PartHead,
}

impl<S> ResponsePart<'_, S>
where
    S: Stream<Item = Result<Bytes, ConvertApiError>> + Unpin,
{
    pub fn head(&self) -> &PartHead {
        &self.head
    }

    pub fn name(&self) -> Option<&str> {
        self.head.name()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.head.file_name()
    }

    /// Next body chunk, `None` once the part is exhausted.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, ConvertApiError> {
        self.reader.body_chunk().await
    }

    /// Collect the remaining body into memory. Meant for small parts.
    pub async fn bytes(&mut self) -> Result<Vec<u8>, ConvertApiError> {
        let mut out = Vec::new();
        while let Some(chunk) = self.chunk().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
