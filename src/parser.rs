//! Incremental parser over the response half of a connection.
//!
//! The transport side appends chunks through a [`Feed`]; read primitives consume from the
//! head of the buffer. Bytes arriving while nobody is reading stay buffered. Every
//! primitive returns a [`Read`] future which completes atomically: either the whole
//! shape it asked for is taken from the buffer, or nothing is. This is what makes
//! cancellation safe, a cancelled read never eats bytes. Line searches are the one
//! exception: lines they reject are dropped as soon as they are scanned.
//!
//! Only one read may be outstanding per parser. Issuing a second one while the first is
//! still pending fails it with [`AdbError::ReadInProgress`].

use crate::buffer::Buffer;
use crate::protocol::{self, AdbError, LENGTH_PREFIX};
use bytes::Bytes;
use futures::io::{AsyncRead, AsyncReadExt};
use futures::stream::{Stream, TryStreamExt};
use regex::{Captures, Regex};
use std::convert::Infallible;
use std::future::{self, Future};
use std::io::{self, Write};
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

/// Read size used by [`Feed::pump`]
pub const PUMP_CHUNK_SIZE: usize = 64 * 1024;

struct Pending {
    id: u64,
    waker: Option<Waker>,
}

#[derive(Default)]
struct State {
    buffer: Buffer,
    ended: bool,
    closed: bool,
    detached: bool,
    failure: Option<Arc<io::Error>>,
    pending: Option<Pending>,
    raw_waker: Option<Waker>,
    next_id: u64,
}

impl State {
    fn take_wakers(&mut self) -> Vec<Waker> {
        let mut wakers = Vec::with_capacity(2);
        if let Some(waker) = self.pending.as_mut().and_then(|p| p.waker.take()) {
            wakers.push(waker);
        }
        if let Some(waker) = self.raw_waker.take() {
            wakers.push(waker);
        }
        wakers
    }

    fn release(&mut self, id: u64) -> Option<Waker> {
        match &self.pending {
            Some(pending) if pending.id == id => self.pending.take().and_then(|p| p.waker),
            _ => None,
        }
    }
}

type Shared = Arc<Mutex<State>>;

fn lock(shared: &Shared) -> MutexGuard<'_, State> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run `f` under the lock, then wake whoever it unblocked
fn update(shared: &Shared, f: impl FnOnce(&mut State)) {
    let wakers = {
        let mut state = lock(shared);
        f(&mut state);
        state.take_wakers()
    };
    wakers.into_iter().for_each(Waker::wake);
}

/// Stateful reader over one byte stream
pub struct Parser {
    shared: Shared,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Handle for the transport side to append incoming data
    pub fn feed(&self) -> Feed {
        Feed {
            shared: self.shared.clone(),
        }
    }

    /// Whether the stream has ended (or the parser was ended)
    pub fn is_ended(&self) -> bool {
        lock(&self.shared).ended
    }

    /// Bytes currently buffered and not yet consumed
    pub fn buffered(&self) -> usize {
        lock(&self.shared).buffer.len()
    }

    fn request<R: sealed::Request>(&self, request: R) -> Read<R> {
        let mut state = lock(&self.shared);
        let id = state.next_id;
        state.next_id += 1;

        let early = if state.detached {
            Some(AdbError::Detached)
        } else if state.pending.is_some() {
            Some(AdbError::ReadInProgress)
        } else {
            state.pending = Some(Pending { id, waker: None });
            None
        };

        Read {
            shared: self.shared.clone(),
            id,
            cancelled: Arc::new(AtomicBool::new(false)),
            request: Some(request),
            early,
        }
    }

    /// Exactly `n` bytes
    pub fn read_bytes(&self, n: usize) -> Read<ReadBytes> {
        self.request(ReadBytes { n })
    }

    /// Forward up to `max` bytes into `sink` in the chunk sizes they arrive in.
    ///
    /// Only the last chunk is split, when it would overshoot `max`. Chunks already
    /// forwarded stay forwarded if the read is cancelled or fails.
    pub fn read_byte_flow<'a, W>(&self, max: usize, sink: &'a mut W) -> Read<ReadByteFlow<'a, W>>
    where
        W: Write + ?Sized,
    {
        self.request(ReadByteFlow {
            remaining: max,
            sink,
        })
    }

    /// Exactly `n` bytes decoded as text
    pub fn read_ascii(&self, n: usize) -> Read<ReadAscii> {
        self.request(ReadAscii {
            inner: ReadBytes { n },
        })
    }

    /// A length-prefixed value frame, payload only
    pub fn read_value(&self) -> Read<ReadValue> {
        self.request(ReadValue)
    }

    /// Read the value following a `FAIL` marker and fail with it
    pub fn read_error(&self) -> Read<ReadError> {
        self.request(ReadError)
    }

    /// One line, without its `\n` and an immediately preceding `\r`
    pub fn read_line(&self) -> Read<ReadLine> {
        self.request(ReadLine { scanned: 0 })
    }

    /// Skip lines until one matches `pattern`. Skipped lines are discarded, even if the
    /// stream ends without a match.
    pub fn search_line(&self, pattern: &Regex) -> Read<SearchPattern> {
        self.request(SearchPattern {
            pattern: pattern.clone(),
            scanned: 0,
        })
    }

    /// Skip lines until `matcher` accepts one, resolving with what it returned
    pub fn search_line_with<T, F>(&self, matcher: F) -> Read<SearchLine<F, T>>
    where
        F: FnMut(&str) -> Option<T>,
    {
        self.request(SearchLine {
            matcher,
            scanned: 0,
            _output: PhantomData,
        })
    }

    /// Everything before the first `byte`; the delimiter itself is consumed too
    pub fn read_until(&self, byte: u8) -> Read<ReadUntil> {
        self.request(ReadUntil { byte, scanned: 0 })
    }

    /// Everything until the end of the stream
    pub fn read_all(&self) -> Read<ReadAll> {
        self.request(ReadAll)
    }

    /// Stop reading: drop whatever is buffered and ignore anything that still arrives.
    ///
    /// Idempotent. The transport side sees this through [`Feed::is_closed`].
    pub fn end(&self) {
        update(&self.shared, |state| {
            if !state.closed {
                log::trace!("parser ended, discarding {} bytes", state.buffer.len());
            }
            state.closed = true;
            state.ended = true;
            state.buffer.clear();
        });
    }

    /// Hand the stream over for direct consumption, buffered bytes first.
    ///
    /// Reads issued on this parser afterwards fail with [`AdbError::Detached`].
    pub fn raw(&self) -> RawStream {
        lock(&self.shared).detached = true;
        RawStream {
            shared: self.shared.clone(),
            errored: false,
        }
    }

    /// An already-failed read, used when a reply matches nothing expected
    pub fn unexpected<T>(
        &self,
        observed: impl Into<String>,
        expected: impl Into<String>,
    ) -> future::Ready<Result<T, AdbError>> {
        future::ready(Err(AdbError::UnexpectedData {
            unexpected: observed.into(),
            expected: expected.into(),
        }))
    }
}

/// Transport-side handle of a [`Parser`]
#[derive(Clone)]
pub struct Feed {
    shared: Shared,
}

impl Feed {
    /// Append a chunk. Ignored once the stream has ended.
    pub fn push(&self, chunk: impl Into<Bytes>) {
        let chunk = chunk.into();
        update(&self.shared, |state| {
            if state.ended {
                log::trace!("dropping {} bytes after end of stream", chunk.len());
                return;
            }
            log::trace!("received {} bytes", chunk.len());
            state.buffer.push(chunk);
        });
    }

    /// Signal end of stream
    pub fn finish(&self) {
        update(&self.shared, |state| {
            if !state.ended {
                log::trace!("end of stream, {} bytes buffered", state.buffer.len());
            }
            state.ended = true;
        });
    }

    /// Abort pending and future reads with a transport error
    pub fn fail(&self, error: io::Error) {
        self.fail_shared(Arc::new(error));
    }

    fn fail_shared(&self, error: Arc<io::Error>) {
        update(&self.shared, |state| {
            log::warn!("transport error: {}", error);
            state.failure = Some(error);
        });
    }

    /// Whether the parser side called [`Parser::end`]
    pub fn is_closed(&self) -> bool {
        lock(&self.shared).closed
    }

    /// Copy everything from `reader` into the parser until it ends, fails or the parser
    /// is closed
    pub async fn pump<R>(&self, mut reader: R) -> Result<(), AdbError>
    where
        R: AsyncRead + Unpin,
    {
        let mut chunk = vec![0u8; PUMP_CHUNK_SIZE];
        loop {
            if self.is_closed() {
                return Ok(());
            }
            match reader.read(&mut chunk).await {
                Ok(0) => {
                    self.finish();
                    return Ok(());
                }
                Ok(n) => self.push(Bytes::copy_from_slice(&chunk[..n])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let error = Arc::new(e);
                    self.fail_shared(error.clone());
                    return Err(AdbError::Transport(error));
                }
            }
        }
    }
}

/// Cancels a [`Read`] from anywhere, e.g. a timeout task
#[derive(Clone)]
pub struct CancelHandle {
    shared: Shared,
    id: u64,
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// No-op once the read has settled
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        let waker = lock(&self.shared).release(self.id);
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// Pending read on a [`Parser`]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Read<R> {
    shared: Shared,
    id: u64,
    cancelled: Arc<AtomicBool>,
    request: Option<R>,
    early: Option<AdbError>,
}

// The request is never pinned structurally.
impl<R> Unpin for Read<R> {}

impl<R> Read<R> {
    pub fn cancel(&self) {
        self.cancel_handle().cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            shared: self.shared.clone(),
            id: self.id,
            cancelled: self.cancelled.clone(),
        }
    }
}

impl<R: sealed::Request> Future for Read<R> {
    type Output = Result<R::Output, AdbError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Some(error) = this.early.take() {
            this.request = None;
            return Poll::Ready(Err(error));
        }
        let Some(request) = this.request.as_mut() else {
            return Poll::Ready(Err(AdbError::Cancelled));
        };

        let mut state = lock(&this.shared);
        if this.cancelled.load(Ordering::Acquire) {
            state.release(this.id);
            drop(state);
            this.request = None;
            return Poll::Ready(Err(AdbError::Cancelled));
        }

        let outcome = match request.poll_buffer(&mut state.buffer, false) {
            Poll::Ready(outcome) => outcome,
            Poll::Pending => {
                if let Some(error) = &state.failure {
                    Err(AdbError::Transport(error.clone()))
                } else if state.ended {
                    match request.poll_buffer(&mut state.buffer, true) {
                        Poll::Ready(outcome) => outcome,
                        Poll::Pending => Err(AdbError::premature_unbounded()),
                    }
                } else {
                    if let Some(pending) = state.pending.as_mut().filter(|p| p.id == this.id) {
                        pending.waker = Some(cx.waker().clone());
                    }
                    return Poll::Pending;
                }
            }
        };

        state.release(this.id);
        drop(state);
        this.request = None;
        Poll::Ready(outcome)
    }
}

impl<R> Drop for Read<R> {
    fn drop(&mut self) {
        if self.request.is_some() && self.early.is_none() {
            lock(&self.shared).release(self.id);
        }
    }
}

mod sealed {
    use super::*;

    pub trait Request {
        type Output;

        /// Try to complete against the buffer, consuming only on success.
        /// With `ended` set no more data will come and the request must settle.
        fn poll_buffer(
            &mut self,
            buffer: &mut Buffer,
            ended: bool,
        ) -> Poll<Result<Self::Output, AdbError>>;
    }
}

pub struct ReadBytes {
    n: usize,
}

impl sealed::Request for ReadBytes {
    type Output = Bytes;

    fn poll_buffer(&mut self, buffer: &mut Buffer, ended: bool) -> Poll<Result<Bytes, AdbError>> {
        if buffer.len() >= self.n {
            Poll::Ready(Ok(buffer.split_to(self.n)))
        } else if ended {
            Poll::Ready(Err(AdbError::premature(self.n - buffer.len())))
        } else {
            Poll::Pending
        }
    }
}

pub struct ReadAscii {
    inner: ReadBytes,
}

impl sealed::Request for ReadAscii {
    type Output = String;

    fn poll_buffer(&mut self, buffer: &mut Buffer, ended: bool) -> Poll<Result<String, AdbError>> {
        self.inner
            .poll_buffer(buffer, ended)
            .map_ok(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }
}

pub struct ReadByteFlow<'a, W: ?Sized> {
    remaining: usize,
    sink: &'a mut W,
}

impl<W: Write + ?Sized> sealed::Request for ReadByteFlow<'_, W> {
    type Output = ();

    fn poll_buffer(&mut self, buffer: &mut Buffer, ended: bool) -> Poll<Result<(), AdbError>> {
        while let Some(chunk) = buffer.pop_chunk(self.remaining) {
            self.remaining -= chunk.len();
            self.sink.write_all(&chunk)?;
        }

        if self.remaining == 0 {
            Poll::Ready(Ok(()))
        } else if ended {
            Poll::Ready(Err(AdbError::premature(self.remaining)))
        } else {
            Poll::Pending
        }
    }
}

pub struct ReadValue;

impl sealed::Request for ReadValue {
    type Output = Bytes;

    fn poll_buffer(&mut self, buffer: &mut Buffer, ended: bool) -> Poll<Result<Bytes, AdbError>> {
        let available = buffer.len();
        if available < LENGTH_PREFIX {
            return if ended {
                Poll::Ready(Err(AdbError::premature(LENGTH_PREFIX - available)))
            } else {
                Poll::Pending
            };
        }

        let length = protocol::decode_length(&buffer.copy_range(0, LENGTH_PREFIX))?;
        let total = LENGTH_PREFIX + length;
        if available >= total {
            buffer.split_to(LENGTH_PREFIX);
            Poll::Ready(Ok(buffer.split_to(length)))
        } else if ended {
            Poll::Ready(Err(AdbError::premature(total - available)))
        } else {
            Poll::Pending
        }
    }
}

pub struct ReadError;

impl sealed::Request for ReadError {
    type Output = Infallible;

    fn poll_buffer(
        &mut self,
        buffer: &mut Buffer,
        ended: bool,
    ) -> Poll<Result<Infallible, AdbError>> {
        ReadValue.poll_buffer(buffer, ended).map(|value| {
            let value = value?;
            Err(AdbError::Fail(String::from_utf8_lossy(&value).into_owned()))
        })
    }
}

/// Strip the line feed and one carriage return before it
fn trim_line(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

pub struct ReadLine {
    scanned: usize,
}

impl sealed::Request for ReadLine {
    type Output = Bytes;

    fn poll_buffer(&mut self, buffer: &mut Buffer, ended: bool) -> Poll<Result<Bytes, AdbError>> {
        match buffer.position(b'\n', self.scanned) {
            Some(i) => {
                let line = buffer.split_to(i + 1);
                let len = trim_line(&line).len();
                Poll::Ready(Ok(line.slice(..len)))
            }
            None if ended => Poll::Ready(Err(AdbError::premature_unbounded())),
            None => {
                self.scanned = buffer.len();
                Poll::Pending
            }
        }
    }
}

pub struct ReadUntil {
    byte: u8,
    scanned: usize,
}

impl sealed::Request for ReadUntil {
    type Output = Bytes;

    fn poll_buffer(&mut self, buffer: &mut Buffer, ended: bool) -> Poll<Result<Bytes, AdbError>> {
        match buffer.position(self.byte, self.scanned) {
            Some(i) => {
                let head = buffer.split_to(i);
                buffer.split_to(1);
                Poll::Ready(Ok(head))
            }
            None if ended => Poll::Ready(Err(AdbError::premature_unbounded())),
            None => {
                self.scanned = buffer.len();
                Poll::Pending
            }
        }
    }
}

pub struct ReadAll;

impl sealed::Request for ReadAll {
    type Output = Bytes;

    fn poll_buffer(&mut self, buffer: &mut Buffer, ended: bool) -> Poll<Result<Bytes, AdbError>> {
        if ended {
            Poll::Ready(Ok(buffer.take_all()))
        } else {
            Poll::Pending
        }
    }
}

/// Take complete lines off the buffer until `matcher` accepts one. Rejected lines are
/// discarded as they are scanned; `*scanned` tracks how far into a trailing partial
/// line the search has already looked.
fn scan_lines<T>(
    buffer: &mut Buffer,
    scanned: &mut usize,
    ended: bool,
    mut matcher: impl FnMut(&str) -> Option<T>,
) -> Poll<Result<T, AdbError>> {
    while let Some(i) = buffer.position(b'\n', *scanned) {
        let raw = buffer.split_to(i + 1);
        *scanned = 0;
        let line = String::from_utf8_lossy(trim_line(&raw));
        if let Some(found) = matcher(&line) {
            return Poll::Ready(Ok(found));
        }
        log::trace!("skipped line '{}'", line);
    }

    if ended {
        Poll::Ready(Err(AdbError::premature_unbounded()))
    } else {
        *scanned = buffer.len();
        Poll::Pending
    }
}

pub struct SearchPattern {
    pattern: Regex,
    scanned: usize,
}

impl sealed::Request for SearchPattern {
    type Output = LineMatch;

    fn poll_buffer(
        &mut self,
        buffer: &mut Buffer,
        ended: bool,
    ) -> Poll<Result<LineMatch, AdbError>> {
        let pattern = &self.pattern;
        scan_lines(buffer, &mut self.scanned, ended, |line| {
            pattern
                .captures(line)
                .map(|captures| LineMatch::from_captures(line, &captures))
        })
    }
}

pub struct SearchLine<F, T> {
    matcher: F,
    scanned: usize,
    _output: PhantomData<fn() -> T>,
}

impl<F, T> sealed::Request for SearchLine<F, T>
where
    F: FnMut(&str) -> Option<T>,
{
    type Output = T;

    fn poll_buffer(&mut self, buffer: &mut Buffer, ended: bool) -> Poll<Result<T, AdbError>> {
        scan_lines(buffer, &mut self.scanned, ended, &mut self.matcher)
    }
}

/// A line accepted by [`Parser::search_line`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMatch {
    line: String,
    groups: Vec<Option<String>>,
}

impl LineMatch {
    pub fn from_captures(line: &str, captures: &Captures<'_>) -> Self {
        Self {
            line: line.to_string(),
            groups: captures
                .iter()
                .map(|group| group.map(|m| m.as_str().to_string()))
                .collect(),
        }
    }

    /// The whole line the pattern matched in
    pub fn line(&self) -> &str {
        &self.line
    }

    /// The matched text
    pub fn as_str(&self) -> &str {
        self.get(0).unwrap_or_default()
    }

    /// Capture group `i`, 0 being the whole match
    pub fn get(&self, i: usize) -> Option<&str> {
        self.groups.get(i).and_then(|g| g.as_deref())
    }
}

/// The parser's stream after [`Parser::raw`]
pub struct RawStream {
    shared: Shared,
    errored: bool,
}

impl std::fmt::Debug for RawStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawStream")
            .field("errored", &self.errored)
            .finish_non_exhaustive()
    }
}

impl RawStream {
    /// Collect the rest of the stream
    pub async fn read_all(self) -> Result<Vec<u8>, AdbError> {
        self.try_fold(Vec::new(), |mut out, chunk| {
            out.extend_from_slice(&chunk);
            future::ready(Ok(out))
        })
        .await
    }

    /// Stop consuming and discard the rest
    pub fn end(&self) {
        update(&self.shared, |state| {
            state.closed = true;
            state.ended = true;
            state.buffer.clear();
        });
    }
}

impl Stream for RawStream {
    type Item = Result<Bytes, AdbError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let mut state = lock(&this.shared);

        if let Some(chunk) = state.buffer.pop_front() {
            return Poll::Ready(Some(Ok(chunk)));
        }
        if let Some(error) = &state.failure {
            if this.errored {
                return Poll::Ready(None);
            }
            this.errored = true;
            return Poll::Ready(Some(Err(AdbError::Transport(error.clone()))));
        }
        if state.ended {
            return Poll::Ready(None);
        }

        state.raw_waker = Some(cx.waker().clone());
        Poll::Pending
    }
}
