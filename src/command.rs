//! Command base: request framing, shell escaping and the lenient line scan shared by
//! shell-backed commands.

use crate::connection::Connection;
use crate::parser::{LineMatch, Parser};
use crate::protocol::{self, AdbError, Reply};
use regex::Regex;
use std::path::Path;

/// A single request/response exchange on a [`Connection`].
///
/// A command borrows its connection exclusively and is consumed by `execute`.
#[allow(async_fn_in_trait)]
pub trait Command: Sized {
    type Args;
    type Output;

    fn connection(&mut self) -> &mut Connection;

    async fn execute(self, args: Self::Args) -> Result<Self::Output, AdbError>;

    /// Frame `data` as a value and write it
    fn send(&mut self, data: impl AsRef<[u8]>) -> Result<&mut Self, AdbError> {
        let encoded = protocol::encode(data)?;
        log::debug!("Send '{}'", String::from_utf8_lossy(&encoded));
        self.connection().write(&encoded)?;
        Ok(self)
    }

    fn escape<A: ShellArg + ?Sized>(&self, arg: &A) -> String {
        arg.escape()
    }

    fn escape_compat<A: ShellArg + ?Sized>(&self, arg: &A) -> String {
        arg.escape_compat()
    }
}

/// Something that can be placed on a device shell command line
pub trait ShellArg {
    /// Single-quoted, safe for POSIX shells
    fn escape(&self) -> String;

    /// Double-quoted, for shells that mangle single-quote escapes
    fn escape_compat(&self) -> String;
}

macro_rules! numeric_shell_arg {
    ($($ty:ty),*) => {
        $(
            impl ShellArg for $ty {
                fn escape(&self) -> String {
                    self.to_string()
                }

                fn escape_compat(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

numeric_shell_arg!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl ShellArg for str {
    fn escape(&self) -> String {
        format!("'{}'", self.replace('\'', r#"'"'"'"#))
    }

    fn escape_compat(&self) -> String {
        let mut out = String::with_capacity(self.len() + 2);
        out.push('"');
        for c in self.chars() {
            if matches!(c, '$' | '`' | '\\' | '"') {
                out.push('\\');
            }
            out.push(c);
        }
        out.push('"');
        out
    }
}

impl ShellArg for String {
    fn escape(&self) -> String {
        self.as_str().escape()
    }

    fn escape_compat(&self) -> String {
        self.as_str().escape_compat()
    }
}

impl ShellArg for Path {
    fn escape(&self) -> String {
        self.to_string_lossy().escape()
    }

    fn escape_compat(&self) -> String {
        self.to_string_lossy().escape_compat()
    }
}

impl<T: ShellArg + ?Sized> ShellArg for &T {
    fn escape(&self) -> String {
        (**self).escape()
    }

    fn escape_compat(&self) -> String {
        (**self).escape_compat()
    }
}

/// Read the 4-byte reply to a framed request.
///
/// `FAIL` turns into the device's error message, anything else into
/// [`AdbError::UnexpectedData`].
pub async fn expect_okay(parser: &Parser) -> Result<(), AdbError> {
    let reply = parser.read_ascii(4).await?;
    match Reply::from_bytes(reply.as_bytes()) {
        Some(Reply::Okay) => Ok(()),
        Some(Reply::Fail) => Err(read_failure(parser).await),
        None => parser.unexpected(reply, "OKAY or FAIL").await,
    }
}

/// The error carried by the value frame after a `FAIL` marker
pub async fn read_failure(parser: &Parser) -> AdbError {
    match parser.read_error().await {
        Ok(never) => match never {},
        Err(error) => error,
    }
}

type Outcome<T> = Box<dyn Fn(&LineMatch) -> Result<T, AdbError> + Send + Sync>;

struct Marker<T> {
    pattern: Regex,
    outcome: Outcome<T>,
}

/// Ordered markers a shell-backed command looks for in its output.
///
/// Lines matching no marker are skipped. The first marker matching a line decides the
/// outcome; if the stream ends first the scan fails with a premature end of stream.
pub struct AcceptanceTable<T> {
    markers: Vec<Marker<T>>,
}

impl<T> Default for AcceptanceTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AcceptanceTable<T> {
    pub fn new() -> Self {
        Self {
            markers: Vec::new(),
        }
    }

    pub fn marker<F>(mut self, pattern: &str, outcome: F) -> Result<Self, AdbError>
    where
        F: Fn(&LineMatch) -> Result<T, AdbError> + Send + Sync + 'static,
    {
        self.markers.push(Marker {
            pattern: Regex::new(pattern)?,
            outcome: Box::new(outcome),
        });
        Ok(self)
    }

    /// Outcome of the first marker matching `line`, if any
    pub fn classify(&self, line: &str) -> Option<Result<T, AdbError>> {
        self.markers.iter().find_map(|marker| {
            let captures = marker.pattern.captures(line)?;
            Some((marker.outcome)(&LineMatch::from_captures(line, &captures)))
        })
    }

    /// Scan output lines until a marker matches
    pub async fn scan(&self, parser: &Parser) -> Result<T, AdbError> {
        parser.search_line_with(|line| self.classify(line)).await?
    }

    /// Await `OKAY`, then scan
    pub async fn resolve(&self, parser: &Parser) -> Result<T, AdbError> {
        expect_okay(parser).await?;
        self.scan(parser).await
    }
}
