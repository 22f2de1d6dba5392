use core::fmt;

use super::Pos;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub pos: Pos,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnterminatedVariable,
    UnterminatedDefine,
    MissingSeparator,
}

impl ParseError {
    pub(crate) fn new(pos: Pos, kind: ParseErrorKind) -> Self {
        Self { pos, kind }
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseErrorKind::UnterminatedVariable => write!(f, "unterminated variable reference"),
            ParseErrorKind::UnterminatedDefine => write!(f, "missing endef for define"),
            ParseErrorKind::MissingSeparator => write!(f, "missing separator"),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.pos, self.kind)
    }
}

impl core::error::Error for ParseError {}
