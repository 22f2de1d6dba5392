use alloc::borrow::Cow;
use core::fmt;

/// A construct that could not be translated. It ends up as an error
/// comment in the output, never as a failed conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    Unsupported(Cow<'static, str>),
    Type(Cow<'static, str>),
    Conflict(Cow<'static, str>),
}

macro_rules! bail_unsupported {
    ($msg:expr, $($arg:tt)*) => { return Err(TranslateError::Unsupported(alloc::format!($msg, $($arg)*).into())) };
    ($msg:expr) =>              { return Err(TranslateError::Unsupported(alloc::format!($msg).into())) };
}

macro_rules! bail_type {
    ($msg:expr, $($arg:tt)*) => { return Err(TranslateError::Type(alloc::format!($msg, $($arg)*).into())) };
    ($msg:expr) =>              { return Err(TranslateError::Type(alloc::format!($msg).into())) };
}

pub(crate) use {bail_type, bail_unsupported};

impl TranslateError {
    pub fn message(&self) -> &str {
        match self {
            TranslateError::Unsupported(msg)
            | TranslateError::Type(msg)
            | TranslateError::Conflict(msg) => msg,
        }
    }
}

impl fmt::Display for TranslateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl core::error::Error for TranslateError {}
