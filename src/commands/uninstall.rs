use crate::command::{AcceptanceTable, Command};
use crate::connection::Connection;
use crate::protocol::AdbError;

/// `pm uninstall <package>`.
///
/// A missing package is not an error; any `Failure` line counts as done too.
pub struct UninstallCommand<'a> {
    connection: &'a mut Connection,
}

impl<'a> UninstallCommand<'a> {
    pub fn new(connection: &'a mut Connection) -> Self {
        Self { connection }
    }
}

impl Command for UninstallCommand<'_> {
    type Args = String;
    type Output = ();

    fn connection(&mut self) -> &mut Connection {
        self.connection
    }

    async fn execute(mut self, package: String) -> Result<(), AdbError> {
        self.send(format!("shell:pm uninstall {}", package))?;

        let table = AcceptanceTable::new()
            .marker(r"^(Success|Failure.*|.*Unknown package:.*)$", |m| {
                log::debug!("uninstall finished with '{}'", m.line());
                Ok(())
            })?;

        let parser = self.connection.parser();
        table.resolve(parser).await?;
        parser.read_all().await?;
        Ok(())
    }
}
