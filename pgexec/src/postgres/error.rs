//! Protocol and server reported errors.
use bytes::{Buf, Bytes, TryGetError};
use std::fmt;

use super::BackendMessage;
use crate::ext::BytesExt;

/// An error when translating buffer from postgres
pub enum ProtocolError {
    Unexpected {
        expect: Option<u8>,
        found: u8,
        phase: Option<&'static str>,
    },
    UnknownAuth {
        auth: u32,
    },
    Malformed {
        reason: &'static str,
    },
}

impl ProtocolError {
    pub(crate) fn unknown(found: u8) -> ProtocolError {
        Self::Unexpected { expect: None, found, phase: None }
    }

    pub(crate) fn unexpected(expect: u8, found: u8) -> ProtocolError {
        Self::Unexpected { expect: Some(expect), found, phase: None }
    }

    pub(crate) fn unexpected_phase(found: u8, phase: &'static str) -> ProtocolError {
        Self::Unexpected { expect: None, found, phase: Some(phase) }
    }

    pub(crate) fn unknown_auth(auth: u32) -> ProtocolError {
        Self::UnknownAuth { auth }
    }

    pub(crate) fn malformed(reason: &'static str) -> ProtocolError {
        Self::Malformed { reason }
    }
}

impl From<TryGetError> for ProtocolError {
    fn from(_: TryGetError) -> Self {
        Self::malformed("message body too short")
    }
}

impl std::error::Error for ProtocolError { }

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ProtocolError::Unexpected { expect, found, phase } => {
                let found = BackendMessage::message_name(found);
                match expect {
                    Some(m) => write!(
                        f,
                        "Expected message `{}` found `{found}`",
                        BackendMessage::message_name(m),
                    )?,
                    None => write!(f, "Unexpected message `{found}`")?,
                }
                if let Some(phase) = phase {
                    write!(f, " in `{phase}`")?
                }
                Ok(())
            },
            ProtocolError::UnknownAuth { auth } => write!(f, "Unknown authentication request `{auth}`"),
            ProtocolError::Malformed { reason } => write!(f, "Malformed backend message: {reason}"),
        }
    }
}

impl fmt::Debug for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Diagnostic reported by the server in `ErrorResponse` or `NoticeResponse`.
///
/// <https://www.postgresql.org/docs/current/protocol-error-fields.html>
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseError {
    severity: String,
    code: String,
    message: String,
    detail: Option<String>,
    hint: Option<String>,
    position: Option<u32>,
}

impl DatabaseError {
    /// Create an `ERROR` severity diagnostic with SQLSTATE `code`.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: "ERROR".into(),
            code: code.into(),
            message: message.into(),
            detail: None,
            hint: None,
            position: None,
        }
    }

    /// Attach detail text.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Parse the identified fields of an `ErrorResponse` or `NoticeResponse` body.
    ///
    /// Field types that are not recognized are silently ignored.
    pub(crate) fn parse(mut body: Bytes) -> Result<Self, ProtocolError> {
        let mut me = Self::new(String::new(), String::new());
        me.severity.clear();

        while body.has_remaining() {
            let ty = body.get_u8();
            if ty == b'\0' {
                break;
            }
            let value = body.get_nul_string()?;
            match ty {
                // `V` is the non-localized severity, prefer it when present
                b'S' if me.severity.is_empty() => me.severity = value,
                b'V' => me.severity = value,
                b'C' => me.code = value,
                b'M' => me.message = value,
                b'D' => me.detail = Some(value),
                b'H' => me.hint = Some(value),
                b'P' => me.position = value.parse().ok(),
                _ => { },
            }
        }

        Ok(me)
    }

    /// Severity, e.g. `ERROR`, `FATAL`, `WARNING`.
    pub fn severity(&self) -> &str {
        &self.severity
    }

    /// The SQLSTATE code.
    ///
    /// <https://www.postgresql.org/docs/current/errcodes-appendix.html>
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Primary human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// 1-based character index into the statement text.
    pub fn position(&self) -> Option<u32> {
        self.position
    }

    /// Name of the SQLSTATE class, the first two characters of [`code`][DatabaseError::code].
    pub fn class_name(&self) -> &'static str {
        match self.code.get(..2).unwrap_or_default() {
            "00" => "Successful Completion",
            "01" => "Warning",
            "02" => "No Data",
            "08" => "Connection Exception",
            "0A" => "Feature Not Supported",
            "21" => "Cardinality Violation",
            "22" => "Data Exception",
            "23" => "Integrity Constraint Violation",
            "25" => "Invalid Transaction State",
            "26" => "Invalid SQL Statement Name",
            "28" => "Invalid Authorization Specification",
            "40" => "Transaction Rollback",
            "42" => "Syntax Error or Access Rule Violation",
            "53" => "Insufficient Resources",
            "54" => "Program Limit Exceeded",
            "55" => "Object Not In Prerequisite State",
            "57" => "Operator Intervention",
            "58" => "System Error",
            "XX" => "Internal Error",
            _ => "Unknown",
        }
    }
}

impl std::error::Error for DatabaseError { }

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.severity, self.message, self.code)?;
        if let Some(detail) = &self.detail {
            write!(f, ", detail: {detail}")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, ", hint: {hint}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use bytes::{BufMut, BytesMut};

    use super::DatabaseError;
    use crate::ext::BufMutExt;

    #[test]
    fn parse_error_fields() {
        let mut buf = BytesMut::new();
        for (ty, value) in [
            (b'S', "ERREUR"),
            (b'V', "ERROR"),
            (b'C', "42P01"),
            (b'M', "relation \"foo\" does not exist"),
            (b'P', "15"),
            (b'R', "parserOpenTable"),
        ] {
            buf.put_u8(ty);
            buf.put_nul_string(value);
        }
        buf.put_u8(0);

        let err = DatabaseError::parse(buf.freeze()).unwrap();
        assert_eq!(err.severity(), "ERROR");
        assert_eq!(err.code(), "42P01");
        assert_eq!(err.message(), "relation \"foo\" does not exist");
        assert_eq!(err.position(), Some(15));
        assert_eq!(err.detail(), None);
        assert_eq!(err.class_name(), "Syntax Error or Access Rule Violation");
        assert_eq!(err.to_string(), "ERROR: relation \"foo\" does not exist (42P01)");
    }
}
