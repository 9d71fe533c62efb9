use crate::command::{AcceptanceTable, Command};
use crate::connection::Connection;
use crate::protocol::AdbError;

/// `pm clear <package>`
pub struct ClearCommand<'a> {
    connection: &'a mut Connection,
}

impl<'a> ClearCommand<'a> {
    pub fn new(connection: &'a mut Connection) -> Self {
        Self { connection }
    }
}

impl Command for ClearCommand<'_> {
    type Args = String;
    type Output = ();

    fn connection(&mut self) -> &mut Connection {
        self.connection
    }

    async fn execute(mut self, package: String) -> Result<(), AdbError> {
        self.send(format!("shell:pm clear {}", package))?;

        let table = AcceptanceTable::new()
            .marker(r"^Success$", |_| Ok(()))?
            .marker(r"^Failed$", move |_| {
                Err(AdbError::CommandFailed(format!(
                    "Package '{}' could not be cleared",
                    package
                )))
            })?;

        let parser = self.connection.parser();
        let result = table.resolve(parser).await;
        parser.end();
        result
    }
}
