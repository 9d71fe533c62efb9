use crate::parser::{Feed, Parser};
use crate::protocol::AdbError;
use crate::transport::Transport;

/// One connection: a write half plus the parser bound to its read half
pub struct Connection {
    transport: Box<dyn Transport>,
    parser: Parser,
}

impl Connection {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::with_parser(transport, Parser::new())
    }

    pub fn with_parser(transport: impl Transport + 'static, parser: Parser) -> Self {
        Self {
            transport: Box::new(transport),
            parser,
        }
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    /// Handle for whatever reads the socket to push data into the parser
    pub fn feed(&self) -> Feed {
        self.parser.feed()
    }

    /// Write raw bytes, no framing
    pub fn write(&mut self, data: &[u8]) -> Result<(), AdbError> {
        self.transport.write(data)?;
        Ok(())
    }

    /// Close both halves. Buffered response data is discarded.
    pub fn end(&mut self) -> Result<(), AdbError> {
        self.parser.end();
        self.transport.close()?;
        Ok(())
    }
}
