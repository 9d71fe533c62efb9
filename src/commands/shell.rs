use crate::command::{expect_okay, Command};
use crate::connection::Connection;
use crate::parser::RawStream;
use crate::protocol::AdbError;

/// `shell:<command>`, resolving with the raw output
pub struct ShellCommand<'a> {
    connection: &'a mut Connection,
}

impl<'a> ShellCommand<'a> {
    pub fn new(connection: &'a mut Connection) -> Self {
        Self { connection }
    }
}

impl Command for ShellCommand<'_> {
    type Args = String;
    type Output = RawStream;

    fn connection(&mut self) -> &mut Connection {
        self.connection
    }

    async fn execute(mut self, command: String) -> Result<RawStream, AdbError> {
        self.send(format!("shell:{}", command))?;
        let parser = self.connection.parser();
        expect_okay(parser).await?;
        Ok(parser.raw())
    }
}
