use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Success marker sent by the device after a request
pub const OKAY: &[u8; 4] = b"OKAY";

/// Failure marker, always followed by a value frame holding the reason
pub const FAIL: &[u8; 4] = b"FAIL";

/// Largest payload a value frame can carry (4 hex digits)
pub const MAX_VALUE_LENGTH: usize = 0xffff;

/// Length of the hex prefix of a value frame
pub const LENGTH_PREFIX: usize = 4;

/// Frame `data` as a value: 4 lowercase hex digits of its byte length, then the bytes.
///
/// Text is framed by its UTF-8 byte length, not its character count.
pub fn encode(data: impl AsRef<[u8]>) -> Result<Vec<u8>, AdbError> {
    let data = data.as_ref();
    if data.len() > MAX_VALUE_LENGTH {
        return Err(AdbError::PayloadTooLarge(data.len()));
    }

    let mut bytes = Vec::with_capacity(LENGTH_PREFIX + data.len());
    bytes.extend_from_slice(format!("{:04x}", data.len()).as_bytes());
    bytes.extend_from_slice(data);
    Ok(bytes)
}

/// Decode the 4 ASCII hex digits of a value frame prefix
pub fn decode_length(prefix: &[u8]) -> Result<usize, AdbError> {
    let invalid = || AdbError::InvalidLength(String::from_utf8_lossy(prefix).into_owned());

    if prefix.len() != LENGTH_PREFIX {
        return Err(invalid());
    }
    let text = std::str::from_utf8(prefix).map_err(|_| invalid())?;
    if !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    usize::from_str_radix(text, 16).map_err(|_| invalid())
}

/// Reply to a framed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Okay,
    Fail,
}

impl Reply {
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            b"OKAY" => Some(Reply::Okay),
            b"FAIL" => Some(Reply::Fail),
            _ => None,
        }
    }
}

/// ADB errors
#[derive(Error, Debug)]
pub enum AdbError {
    #[error("Premature end of stream{}", missing_suffix(.missing_bytes))]
    PrematureEof { missing_bytes: Option<usize> },

    #[error("Failure: '{0}'")]
    Fail(String),

    #[error("Unexpected '{unexpected}', was expecting {expected}")]
    UnexpectedData { unexpected: String, expected: String },

    #[error("Transport error: {0}")]
    Transport(#[source] Arc<io::Error>),

    #[error("Write error: {0}")]
    Write(#[from] io::Error),

    #[error("Read cancelled")]
    Cancelled,

    #[error("Another read is already pending on this parser")]
    ReadInProgress,

    #[error("Stream was handed off with raw()")]
    Detached,

    #[error("Invalid length prefix: '{0}'")]
    InvalidLength(String),

    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("{0}")]
    CommandFailed(String),

    #[error("No such file or directory: '{0}'")]
    NotFound(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl AdbError {
    pub(crate) fn premature(missing_bytes: usize) -> Self {
        AdbError::PrematureEof {
            missing_bytes: Some(missing_bytes),
        }
    }

    pub(crate) fn premature_unbounded() -> Self {
        AdbError::PrematureEof { missing_bytes: None }
    }

    /// Bytes a fixed-length read was still waiting for when the stream ended
    pub fn missing_bytes(&self) -> Option<usize> {
        match self {
            AdbError::PrematureEof { missing_bytes } => *missing_bytes,
            _ => None,
        }
    }
}

fn missing_suffix(missing_bytes: &Option<usize>) -> String {
    match missing_bytes {
        Some(n) => format!(", needed {} more bytes", n),
        None => String::new(),
    }
}
