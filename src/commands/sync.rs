use crate::command::{expect_okay, Command};
use crate::connection::Connection;
use crate::protocol::AdbError;
use crate::sync::SyncSession;

/// `sync:`, switching the connection to sync mode
pub struct SyncCommand<'a> {
    connection: &'a mut Connection,
}

impl<'a> SyncCommand<'a> {
    pub fn new(connection: &'a mut Connection) -> Self {
        Self { connection }
    }
}

impl<'a> Command for SyncCommand<'a> {
    type Args = ();
    type Output = SyncSession<'a>;

    fn connection(&mut self) -> &mut Connection {
        self.connection
    }

    async fn execute(mut self, _: ()) -> Result<SyncSession<'a>, AdbError> {
        self.send("sync:")?;
        expect_okay(self.connection.parser()).await?;
        Ok(SyncSession::new(self.connection))
    }
}
