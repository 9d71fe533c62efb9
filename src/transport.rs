use bytes::Bytes;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::io::{AsyncWrite, AsyncWriteExt};
use futures::StreamExt;
use std::io;

/// Write half of an established connection to the ADB server or a device.
///
/// Writes are fire-and-forget: the transport accepts the bytes or reports that it can't,
/// but nothing here waits for the peer.
pub trait Transport {
    /// Queue raw bytes for the peer
    fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Close the write half. Further writes fail.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Transport that hands every write to a channel.
///
/// The receiving end is drained by whatever task owns the socket, usually through
/// [`drain_into`].
pub struct ChannelTransport {
    sender: Option<UnboundedSender<Bytes>>,
}

impl ChannelTransport {
    pub fn new(sender: UnboundedSender<Bytes>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// Create a transport together with the receiver of its writes
    pub fn pair() -> (Self, UnboundedReceiver<Bytes>) {
        let (sender, receiver) = mpsc::unbounded();
        (Self::new(sender), receiver)
    }
}

impl Transport for ChannelTransport {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "Transport closed"))?;

        sender
            .unbounded_send(Bytes::copy_from_slice(data))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "Write receiver dropped"))
    }

    fn close(&mut self) -> io::Result<()> {
        if let Some(sender) = self.sender.take() {
            sender.close_channel();
        }
        Ok(())
    }
}

/// Any blocking writer, e.g. a `std::net::TcpStream`
pub struct IoTransport<W> {
    writer: W,
}

impl<W: io::Write> IoTransport<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: io::Write> Transport for IoTransport<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data)?;
        self.writer.flush()
    }
}

/// Copy queued writes into `writer` until the transport is closed
pub async fn drain_into<W>(mut receiver: UnboundedReceiver<Bytes>, mut writer: W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(data) = receiver.next().await {
        writer.write_all(&data).await?;
        writer.flush().await?;
    }
    writer.close().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn test_channel_transport_forwards_writes() {
        let (mut transport, mut receiver) = ChannelTransport::pair();
        transport.write(b"0005sync:").unwrap();
        assert_eq!(receiver.try_next().unwrap().unwrap(), Bytes::from_static(b"0005sync:"));
    }

    #[test]
    fn test_channel_transport_closed() {
        let (mut transport, mut receiver) = ChannelTransport::pair();
        transport.close().unwrap();
        assert!(transport.write(b"x").is_err());
        assert_eq!(receiver.try_next().unwrap(), None);
    }

    #[test]
    fn test_drain_into_writer() {
        let (mut transport, receiver) = ChannelTransport::pair();
        transport.write(b"OK").unwrap();
        transport.write(b"AY").unwrap();
        transport.close().unwrap();

        let mut out = futures::io::Cursor::new(Vec::new());
        block_on(drain_into(receiver, &mut out)).unwrap();
        assert_eq!(out.into_inner(), b"OKAY".to_vec());
    }

    #[test]
    fn test_io_transport() {
        let mut transport = IoTransport::new(Vec::new());
        transport.write(b"0004host").unwrap();
        assert_eq!(transport.into_inner(), b"0004host".to_vec());
    }
}
