use crate::command::{expect_okay, Command};
use crate::connection::Connection;
use crate::protocol::AdbError;

/// `remount:`, remounting the system partition read-write
pub struct RemountCommand<'a> {
    connection: &'a mut Connection,
}

impl<'a> RemountCommand<'a> {
    pub fn new(connection: &'a mut Connection) -> Self {
        Self { connection }
    }
}

impl Command for RemountCommand<'_> {
    type Args = ();
    type Output = ();

    fn connection(&mut self) -> &mut Connection {
        self.connection
    }

    async fn execute(mut self, _: ()) -> Result<(), AdbError> {
        self.send("remount:")?;
        expect_okay(self.connection.parser()).await
    }
}
