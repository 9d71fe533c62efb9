//! Sync mode, entered with a `sync:` request.
//!
//! Requests are a 4-byte id, a little-endian u32 length and the payload. Replies start
//! with a 4-byte id; lengths in replies are little-endian too, unlike the hex prefixes
//! of the regular protocol.

use crate::connection::Connection;
use crate::parser::Parser;
use crate::protocol::AdbError;
use std::io::Write;

/// Largest payload of a single `DATA` packet
pub const DATA_MAX_LENGTH: usize = 64 * 1024;

/// Ids of sync requests and replies, stored as their 4 ASCII characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncId {
    List,
    Send,
    Recv,
    Stat,
    Data,
    Done,
    Fail,
    Dent,
    Quit,
    Okay,
}

impl SyncId {
    const ALL: [SyncId; 10] = [
        SyncId::List,
        SyncId::Send,
        SyncId::Recv,
        SyncId::Stat,
        SyncId::Data,
        SyncId::Done,
        SyncId::Fail,
        SyncId::Dent,
        SyncId::Quit,
        SyncId::Okay,
    ];

    pub fn tag(&self) -> &'static [u8; 4] {
        match self {
            SyncId::List => b"LIST",
            SyncId::Send => b"SEND",
            SyncId::Recv => b"RECV",
            SyncId::Stat => b"STAT",
            SyncId::Data => b"DATA",
            SyncId::Done => b"DONE",
            SyncId::Fail => b"FAIL",
            SyncId::Dent => b"DENT",
            SyncId::Quit => b"QUIT",
            SyncId::Okay => b"OKAY",
        }
    }

    /// Id from its little-endian numeric form, e.g. `0x5453494c` for `LIST`
    pub fn from_u32(value: u32) -> Option<Self> {
        Self::from_bytes(&value.to_le_bytes())
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Self::ALL.into_iter().find(|id| &id.tag()[..] == bytes)
    }

    pub fn as_bytes(&self) -> [u8; 4] {
        *self.tag()
    }
}

/// Sync request
pub struct SyncPacket {
    pub id: SyncId,
    pub data: Vec<u8>,
}

impl SyncPacket {
    pub fn new(id: SyncId, data: Vec<u8>) -> Self {
        Self { id, data }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + self.data.len());
        bytes.extend_from_slice(self.id.tag());
        bytes.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&self.data);
        bytes
    }
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;
const S_IFREG: u32 = 0o100000;
const S_IFLNK: u32 = 0o120000;

/// File type bits of a `st_mode`
pub trait FileMode {
    fn mode(&self) -> u32;

    fn is_directory(&self) -> bool {
        self.mode() & S_IFMT == S_IFDIR
    }

    fn is_file(&self) -> bool {
        self.mode() & S_IFMT == S_IFREG
    }

    fn is_symlink(&self) -> bool {
        self.mode() & S_IFMT == S_IFLNK
    }
}

/// Reply to `STAT`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub mode: u32,
    pub size: u32,
    pub mtime: u32,
}

impl FileStat {
    /// Decode the mode, size and mtime words following a `STAT` id
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AdbError> {
        if bytes.len() < 12 {
            return Err(AdbError::premature(12 - bytes.len()));
        }
        Ok(Self {
            mode: le_u32(bytes, 0),
            size: le_u32(bytes, 4),
            mtime: le_u32(bytes, 8),
        })
    }
}

impl FileMode for FileStat {
    fn mode(&self) -> u32 {
        self.mode
    }
}

/// One `DENT` reply of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub mode: u32,
    pub size: u32,
    pub mtime: u32,
}

impl FileMode for DirEntry {
    fn mode(&self) -> u32 {
        self.mode
    }
}

/// A connection in sync mode
pub struct SyncSession<'a> {
    connection: &'a mut Connection,
}

impl<'a> SyncSession<'a> {
    pub fn new(connection: &'a mut Connection) -> Self {
        Self { connection }
    }

    fn parser(&self) -> &Parser {
        self.connection.parser()
    }

    fn send(&mut self, id: SyncId, path: &str) -> Result<(), AdbError> {
        log::debug!("sync {:?} '{}'", id, path);
        let packet = SyncPacket::new(id, path.as_bytes().to_vec());
        self.connection.write(&packet.to_bytes())
    }

    async fn read_id(&self) -> Result<(Option<SyncId>, String), AdbError> {
        let reply = self.parser().read_ascii(4).await?;
        Ok((SyncId::from_bytes(reply.as_bytes()), reply))
    }

    async fn read_u32(&self) -> Result<u32, AdbError> {
        let bytes = self.parser().read_bytes(4).await?;
        Ok(le_u32(&bytes, 0))
    }

    /// `FAIL` in sync mode carries a little-endian length, not a hex one
    async fn read_sync_failure(&self) -> AdbError {
        let length = match self.read_u32().await {
            Ok(length) => length as usize,
            Err(error) => return error,
        };
        match self.parser().read_bytes(length).await {
            Ok(message) => AdbError::Fail(String::from_utf8_lossy(&message).into_owned()),
            Err(error) => error,
        }
    }

    /// Stat a remote path. A zero mode means the path does not exist.
    pub async fn stat(&mut self, path: &str) -> Result<FileStat, AdbError> {
        self.send(SyncId::Stat, path)?;
        match self.read_id().await? {
            (Some(SyncId::Stat), _) => {
                let stat = FileStat::from_bytes(&self.parser().read_bytes(12).await?)?;
                if stat.mode == 0 {
                    return Err(AdbError::NotFound(path.to_string()));
                }
                Ok(stat)
            }
            (Some(SyncId::Fail), _) => Err(self.read_sync_failure().await),
            (_, reply) => self.parser().unexpected(reply, "STAT or FAIL").await,
        }
    }

    /// List a remote directory, without `.` and `..`
    pub async fn readdir(&mut self, path: &str) -> Result<Vec<DirEntry>, AdbError> {
        self.send(SyncId::List, path)?;
        let mut entries = Vec::new();
        loop {
            match self.read_id().await? {
                (Some(SyncId::Dent), _) => {
                    let header = self.parser().read_bytes(16).await?;
                    let name_length = le_u32(&header, 12) as usize;
                    let name = self.parser().read_bytes(name_length).await?;
                    let name = String::from_utf8_lossy(&name).into_owned();
                    if name == "." || name == ".." {
                        continue;
                    }
                    entries.push(DirEntry {
                        name,
                        mode: le_u32(&header, 0),
                        size: le_u32(&header, 4),
                        mtime: le_u32(&header, 8),
                    });
                }
                (Some(SyncId::Done), _) => {
                    self.parser().read_bytes(16).await?;
                    log::debug!("listed {} entries in '{}'", entries.len(), path);
                    return Ok(entries);
                }
                (Some(SyncId::Fail), _) => return Err(self.read_sync_failure().await),
                (_, reply) => {
                    return self.parser().unexpected(reply, "DENT, DONE or FAIL").await;
                }
            }
        }
    }

    /// Stream a remote file into `sink`, returning the number of bytes written
    pub async fn pull<W>(&mut self, path: &str, sink: &mut W) -> Result<u64, AdbError>
    where
        W: Write + ?Sized,
    {
        self.send(SyncId::Recv, path)?;
        let mut total = 0u64;
        loop {
            match self.read_id().await? {
                (Some(SyncId::Data), _) => {
                    let length = self.read_u32().await? as usize;
                    self.parser().read_byte_flow(length, sink).await?;
                    total += length as u64;
                }
                (Some(SyncId::Done), _) => {
                    self.read_u32().await?;
                    log::debug!("pulled {} bytes from '{}'", total, path);
                    return Ok(total);
                }
                (Some(SyncId::Fail), _) => return Err(self.read_sync_failure().await),
                (_, reply) => {
                    return self.parser().unexpected(reply, "DATA, DONE or FAIL").await;
                }
            }
        }
    }

    /// Leave sync mode and close the connection
    pub fn end(self) -> Result<(), AdbError> {
        let packet = SyncPacket::new(SyncId::Quit, Vec::new());
        self.connection.write(&packet.to_bytes())?;
        self.connection.end()
    }
}

impl std::fmt::Debug for SyncSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSession").finish_non_exhaustive()
    }
}
