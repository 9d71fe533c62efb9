use crate::command::{expect_okay, Command};
use crate::connection::Connection;
use crate::parser::RawStream;
use crate::protocol::AdbError;

/// `log:<name>`, streaming a binary log buffer such as `main` or `events`
pub struct LogCommand<'a> {
    connection: &'a mut Connection,
}

impl<'a> LogCommand<'a> {
    pub fn new(connection: &'a mut Connection) -> Self {
        Self { connection }
    }
}

impl Command for LogCommand<'_> {
    type Args = String;
    type Output = RawStream;

    fn connection(&mut self) -> &mut Connection {
        self.connection
    }

    async fn execute(mut self, name: String) -> Result<RawStream, AdbError> {
        self.send(format!("log:{}", name))?;
        let parser = self.connection.parser();
        expect_okay(parser).await?;
        Ok(parser.raw())
    }
}
