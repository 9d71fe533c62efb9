#![allow(dead_code)]

use adbkit_rs::{ChannelTransport, Connection, Feed};
use bytes::Bytes;
use futures::channel::mpsc::UnboundedReceiver;

/// A connection whose writes land in the returned receiver and whose reads come from
/// the returned feed
pub fn mock_connection() -> (Connection, Feed, UnboundedReceiver<Bytes>) {
    let (transport, writes) = ChannelTransport::pair();
    let conn = Connection::new(transport);
    let feed = conn.feed();
    (conn, feed, writes)
}

/// Everything written so far
pub fn written(writes: &mut UnboundedReceiver<Bytes>) -> Vec<u8> {
    let mut out = Vec::new();
    while let Ok(Some(chunk)) = writes.try_next() {
        out.extend_from_slice(&chunk);
    }
    out
}

/// A framed value as the server would send it
pub fn value(data: &str) -> Vec<u8> {
    adbkit_rs::protocol::encode(data).unwrap()
}
