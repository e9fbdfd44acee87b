//! `pgexec` error types.
use std::{backtrace::Backtrace, fmt, io};

use crate::{
    connection::{ParseError, UnsupportedAuth},
    decode::{DecodeError, TypeMismatch},
    executor::{BindError, IndexError, StateError},
    postgres::{DatabaseError, ProtocolError},
};

/// A specialized [`Result`] type for `pgexec` operation.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All possible error from `pgexec` library.
pub struct Error {
    context: String,
    backtrace: Backtrace,
    kind: ErrorKind,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// Consume self into the error kind.
    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }

    /// Server diagnostics, if the error was reported by server.
    pub fn database_error(&self) -> Option<&DatabaseError> {
        match &self.kind {
            ErrorKind::Preparation(e) | ErrorKind::Execution(e) | ErrorKind::Database(e) => Some(e),
            _ => None,
        }
    }

    /// Returns `true` if the underlying connection should not be used anymore.
    pub fn is_connection_error(&self) -> bool {
        match &self.kind {
            ErrorKind::Io(_) | ErrorKind::Protocol(_) | ErrorKind::UnsupportedAuth(_) => true,
            ErrorKind::Preparation(e) | ErrorKind::Execution(e) | ErrorKind::Database(e) => {
                e.code().starts_with("08") || e.severity() == "FATAL" || e.severity() == "PANIC"
            }
            _ => false,
        }
    }

    fn context(mut self, context: &str) -> Self {
        if self.context.is_empty() {
            self.context.push_str(context);
        }
        self
    }

    /// Server rejected statement registration.
    pub(crate) fn preparation(self) -> Self {
        let kind = match self.kind {
            ErrorKind::Database(e) => ErrorKind::Preparation(e),
            kind => kind,
        };
        Self { kind, ..self }.context("failed to prepare statement")
    }

    /// Server failed the statement execution.
    pub(crate) fn execution(self) -> Self {
        let kind = match self.kind {
            ErrorKind::Database(e) => ErrorKind::Execution(e),
            kind => kind,
        };
        Self { kind, ..self }.context("failed to execute statement")
    }
}

/// All possible error kind from `pgexec` library.
pub enum ErrorKind {
    /// Server rejected statement preparation.
    Preparation(DatabaseError),
    /// Server failed statement execution.
    Execution(DatabaseError),
    /// Parameters do not match statement placeholders.
    Bind(BindError),
    /// Requested type does not match the declared column type.
    TypeMismatch(TypeMismatch),
    /// Column index out of range.
    Index(IndexError),
    /// Operation is not valid in current executor state.
    State(StateError),
    /// Server reported error outside statement lifecycle.
    Database(DatabaseError),
    Decode(DecodeError),
    Config(ParseError),
    Protocol(ProtocolError),
    Io(io::Error),
    UnsupportedAuth(UnsupportedAuth),
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for Error {
            fn from($pat: $ty) -> Self {
                let backtrace = std::backtrace::Backtrace::capture();
                Self { context: String::new(), backtrace, kind: $body }
            }
        }
    };
}

from!(<ErrorKind>e => e);
from!(<BindError>e => ErrorKind::Bind(e));
from!(<TypeMismatch>e => ErrorKind::TypeMismatch(e));
from!(<IndexError>e => ErrorKind::Index(e));
from!(<StateError>e => ErrorKind::State(e));
from!(<DatabaseError>e => ErrorKind::Database(e));
from!(<ParseError>e => ErrorKind::Config(e));
from!(<ProtocolError>e => ErrorKind::Protocol(e));
from!(<io::Error>e => ErrorKind::Io(e));
from!(<UnsupportedAuth>e => ErrorKind::UnsupportedAuth(e));

from!(<DecodeError>e => match e {
    DecodeError::TypeMismatch(e) => ErrorKind::TypeMismatch(e),
    e => ErrorKind::Decode(e),
});

impl std::error::Error for Error { }

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.context.is_empty() {
            write!(f, "{}: ", self.context)?;
        }

        fmt::Display::fmt(&self.kind, f)?;

        if let std::backtrace::BacktraceStatus::Captured = self.backtrace.status() {
            let mut backtrace = self.backtrace.to_string();
            write!(f, "\n\n")?;
            writeln!(f, "Stack backtrace:")?;
            backtrace.truncate(backtrace.trim_end().len());
            write!(f, "{}", backtrace)?;
        }

        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl std::error::Error for ErrorKind { }

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preparation(e) => fmt::Display::fmt(e, f),
            Self::Execution(e) => fmt::Display::fmt(e, f),
            Self::Bind(e) => fmt::Display::fmt(e, f),
            Self::TypeMismatch(e) => fmt::Display::fmt(e, f),
            Self::Index(e) => fmt::Display::fmt(e, f),
            Self::State(e) => fmt::Display::fmt(e, f),
            Self::Database(e) => fmt::Display::fmt(e, f),
            Self::Decode(e) => fmt::Display::fmt(e, f),
            Self::Config(e) => fmt::Display::fmt(e, f),
            Self::Protocol(e) => fmt::Display::fmt(e, f),
            Self::Io(e) => fmt::Display::fmt(e, f),
            Self::UnsupportedAuth(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reclassify_server_error() {
        let err = Error::from(DatabaseError::new("42601", "syntax error")).preparation();
        assert!(matches!(err.kind(), ErrorKind::Preparation(_)));
        assert_eq!(err.database_error().unwrap().code(), "42601");
        assert!(err.to_string().starts_with("failed to prepare statement: ERROR: syntax error (42601)"));
        assert!(!err.is_connection_error());

        let err = Error::from(io::Error::from(io::ErrorKind::BrokenPipe)).execution();
        assert!(matches!(err.kind(), ErrorKind::Io(_)));
        assert!(err.is_connection_error());
    }

    #[test]
    fn type_mismatch_kind() {
        let err = Error::from(DecodeError::TypeMismatch(TypeMismatch::new::<i32>(
            crate::SqlType::Text,
        )));
        assert!(matches!(err.kind(), ErrorKind::TypeMismatch(_)));

        let err = Error::from(DecodeError::Null);
        assert!(matches!(err.kind(), ErrorKind::Decode(DecodeError::Null)));
    }
}
