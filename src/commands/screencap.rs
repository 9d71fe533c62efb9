use crate::command::{expect_okay, Command};
use crate::connection::Connection;
use crate::linetransform::LineTransform;
use crate::parser::RawStream;
use crate::protocol::AdbError;

/// PNG screenshot of the device screen.
///
/// An `echo` runs first so the line endings the shell produces can be detected from its
/// output before the image data starts.
pub struct ScreencapCommand<'a> {
    connection: &'a mut Connection,
}

impl<'a> ScreencapCommand<'a> {
    pub fn new(connection: &'a mut Connection) -> Self {
        Self { connection }
    }
}

impl Command for ScreencapCommand<'_> {
    type Args = ();
    type Output = LineTransform<RawStream>;

    fn connection(&mut self) -> &mut Connection {
        self.connection
    }

    async fn execute(mut self, _: ()) -> Result<LineTransform<RawStream>, AdbError> {
        self.send("shell:echo && screencap -p 2>/dev/null")?;
        let parser = self.connection.parser();
        expect_okay(parser).await?;

        // No output at all means screencap is not available
        let first = parser.read_bytes(1).await?;
        log::trace!("screencap line ending probe {:?}", first);
        Ok(LineTransform::auto_detect(first[0], parser.raw()))
    }
}
