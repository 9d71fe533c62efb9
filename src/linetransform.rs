use crate::protocol::AdbError;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::Stream;
use futures::{ready, TryStreamExt};
use std::future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Turns the `\r\n` line endings some device shells emit for binary output back into `\n`.
///
/// A trailing `\r` at a chunk boundary is held back until the next chunk shows whether a
/// `\n` follows it.
#[derive(Debug)]
pub struct LineTransform<S> {
    inner: S,
    transform: bool,
    skip_lf: bool,
    held_cr: bool,
}

impl<S> LineTransform<S> {
    /// Always convert
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            transform: true,
            skip_lf: false,
            held_cr: false,
        }
    }

    /// Decide from the first byte of an `echo` that preceded the payload.
    ///
    /// `\n` means the shell leaves line endings alone. Anything else means they get
    /// rewritten to `\r\n`, and the `\n` completing the echo is dropped as well.
    pub fn auto_detect(first: u8, inner: S) -> Self {
        let transform = first != b'\n';
        Self {
            inner,
            transform,
            skip_lf: transform,
            held_cr: false,
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn convert(&mut self, mut data: Bytes) -> Bytes {
        if self.skip_lf && !data.is_empty() {
            if data[0] == b'\n' {
                data = data.slice(1..);
            }
            self.skip_lf = false;
        }
        if !self.transform {
            return data;
        }

        let mut out = BytesMut::with_capacity(data.len() + 1);
        if self.held_cr {
            self.held_cr = false;
            if data.first() != Some(&b'\n') {
                out.put_u8(b'\r');
            }
        }
        for (i, &b) in data.iter().enumerate() {
            if b != b'\r' {
                out.put_u8(b);
            } else if i + 1 == data.len() {
                self.held_cr = true;
            } else if data[i + 1] != b'\n' {
                out.put_u8(b);
            }
        }
        out.freeze()
    }
}

impl<S> LineTransform<S>
where
    S: Stream<Item = Result<Bytes, AdbError>> + Unpin,
{
    /// Collect the rest of the converted stream
    pub async fn read_all(self) -> Result<Vec<u8>, AdbError> {
        self.try_fold(Vec::new(), |mut out, chunk| {
            out.extend_from_slice(&chunk);
            future::ready(Ok(out))
        })
        .await
    }
}

impl<S> Stream for LineTransform<S>
where
    S: Stream<Item = Result<Bytes, AdbError>> + Unpin,
{
    type Item = Result<Bytes, AdbError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
                Some(Ok(chunk)) => {
                    let out = this.convert(chunk);
                    if !out.is_empty() {
                        return Poll::Ready(Some(Ok(out)));
                    }
                }
                Some(Err(error)) => return Poll::Ready(Some(Err(error))),
                None if this.held_cr => {
                    this.held_cr = false;
                    return Poll::Ready(Some(Ok(Bytes::from_static(b"\r"))));
                }
                None => return Poll::Ready(None),
            }
        }
    }
}
