//! adbkit-rs - client side of the ADB (Android Debug Bridge) wire protocol
//!
//! This library frames requests for the ADB server, parses its replies incrementally
//! and implements the device commands built on top of them: shell-backed package
//! management, log and screenshot streams, and sync-mode file access.
//!
//! The crate does not own a socket. Whatever reads the connection pushes bytes into the
//! parser through a [`Feed`]; writes go out through a [`Transport`].
//!
//! # Example
//!
//! ```no_run
//! use adbkit_rs::commands::ClearCommand;
//! use adbkit_rs::{Command, Connection, IoTransport};
//! use std::net::TcpStream;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let socket = TcpStream::connect("127.0.0.1:5037")?;
//! let mut conn = Connection::new(IoTransport::new(socket.try_clone()?));
//!
//! // Something has to move bytes from the socket into the parser
//! let feed = conn.feed();
//! std::thread::spawn(move || {
//!     let _ = futures::executor::block_on(feed.pump(futures::io::AllowStdIo::new(socket)));
//! });
//!
//! ClearCommand::new(&mut conn)
//!     .execute("com.example.app".to_string())
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod buffer;

pub mod command;
pub mod commands;
pub mod connection;
pub mod linetransform;
pub mod parser;
pub mod protocol;
pub mod sync;
pub mod transport;

// Re-export main types
pub use command::{AcceptanceTable, Command, ShellArg};
pub use connection::Connection;
pub use linetransform::LineTransform;
pub use parser::{CancelHandle, Feed, LineMatch, Parser, RawStream, Read};
pub use protocol::{AdbError, Reply};
pub use sync::{DirEntry, FileMode, FileStat, SyncSession};
pub use transport::{ChannelTransport, IoTransport, Transport};
