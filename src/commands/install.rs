use crate::command::{AcceptanceTable, Command};
use crate::connection::Connection;
use crate::protocol::AdbError;
use std::sync::Arc;

/// `pm install -r <apk>` for an APK already on the device
pub struct InstallCommand<'a> {
    connection: &'a mut Connection,
}

impl<'a> InstallCommand<'a> {
    pub fn new(connection: &'a mut Connection) -> Self {
        Self { connection }
    }
}

impl Command for InstallCommand<'_> {
    type Args = String;
    type Output = ();

    fn connection(&mut self) -> &mut Connection {
        self.connection
    }

    async fn execute(mut self, apk: String) -> Result<(), AdbError> {
        let command = format!("shell:pm install -r {}", self.escape_compat(&apk));
        self.send(command)?;

        let apk: Arc<str> = apk.into();
        let failed = apk.clone();
        let table = AcceptanceTable::new()
            .marker(r"^Success$", |_| Ok(()))?
            .marker(r"^Failure \[(.*)\]$", move |m| {
                Err(AdbError::CommandFailed(format!(
                    "{} could not be installed [{}]",
                    failed,
                    m.get(1).unwrap_or_default()
                )))
            })?
            .marker(r"^Exception.*$", move |m| {
                Err(AdbError::CommandFailed(format!(
                    "{} could not be installed: {}",
                    apk,
                    m.line()
                )))
            })?;

        // Whichever marker decided, the rest of the output is drained
        let parser = self.connection.parser();
        let outcome = table.resolve(parser).await;
        if matches!(outcome, Ok(()) | Err(AdbError::CommandFailed(_))) {
            parser.read_all().await?;
        }
        outcome
    }
}
