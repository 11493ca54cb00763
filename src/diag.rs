use std::error::Error;
use std::fmt;

/// A parse error together with the line it was detected on.
#[derive(Debug, PartialEq)]
pub struct FullParseError {
    pub pos: Position,
    pub error: ParseError,
}

impl fmt::Display for FullParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error: {}: {}", self.pos, self.error)
    }
}

impl Error for FullParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}

/// Line number (starting at one).
pub type Position = u32;

#[derive(Debug, PartialEq)]
pub enum ParseError {
    UnexpectedToken(String, String),
    NoPrefixParseFn(String),
    ExpectedIdentifier,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedToken(unexpected, expected) => write!(
                f,
                "unexpected token '{}', expected '{}'",
                unexpected, expected
            ),
            ParseError::NoPrefixParseFn(token) => {
                write!(f, "no prefix parse function for '{}'", token)
            }
            ParseError::ExpectedIdentifier => {
                write!(f, "expected identifier")
            }
        }
    }
}
