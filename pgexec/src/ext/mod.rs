use bytes::{Buf, BufMut, Bytes};

use crate::postgres::ProtocolError;

/// Integer signess in postgres docs is awful.
pub trait UsizeExt {
    /// Length is `usize` in rust, while sometime postgres want `u32`,
    /// this will panic when overflow instead of wrapping.
    fn to_u32(self) -> u32;
    /// Length is `usize` in rust, while sometime postgres want `u16`,
    /// this will panic when overflow instead of wrapping.
    fn to_u16(self) -> u16;
}

/// Nul string operation.
pub trait StrExt {
    /// String length plus nul (1).
    fn nul_string_len(&self) -> u32;
}

/// Nul string operation in [`BufMut`]
pub trait BufMutExt {
    /// Write string and nul termination.
    fn put_nul_string(&mut self, string: &str);
}

/// Checked read operation in [`Bytes`].
///
/// Integers are read with [`Buf::try_get_u16`] and friends, this covers the rest.
pub trait BytesExt {
    /// Try to read nul terminated string.
    fn get_nul_string(&mut self) -> Result<String, ProtocolError>;

    /// Try to split `len` bytes from the front.
    fn try_split_to(&mut self, len: usize) -> Result<Bytes, ProtocolError>;
}

impl UsizeExt for usize {
    fn to_u32(self) -> u32 {
        self.try_into().expect("message size too large for protocol")
    }

    fn to_u16(self) -> u16 {
        self.try_into().expect("message size too large for protocol")
    }
}

impl StrExt for str {
    fn nul_string_len(&self) -> u32 {
        self.len().to_u32() + 1/* nul */
    }
}

impl<B: BufMut> BufMutExt for B {
    fn put_nul_string(&mut self, string: &str) {
        self.put(string.as_bytes());
        self.put_u8(b'\0');
    }
}

impl BytesExt for Bytes {
    fn get_nul_string(&mut self) -> Result<String, ProtocolError> {
        let Some(end) = self.iter().position(|e| matches!(e, b'\0')) else {
            return Err(ProtocolError::malformed("string is not nul terminated"));
        };
        let me = self.split_to(end);
        Buf::advance(self, 1); // nul
        String::from_utf8(me.into()).map_err(|_| ProtocolError::malformed("string is not utf8"))
    }

    fn try_split_to(&mut self, len: usize) -> Result<Bytes, ProtocolError> {
        if self.len() < len {
            return Err(ProtocolError::malformed("value length exceed message body"));
        }
        Ok(self.split_to(len))
    }
}

#[cfg(test)]
mod test {
    use bytes::{Buf, BufMut, Bytes, BytesMut};

    use crate::postgres::ProtocolError;

    use super::{BufMutExt, BytesExt};

    #[test]
    fn nul_string() {
        let mut buf = BytesMut::new();
        buf.put_nul_string("user");
        buf.put_nul_string("postgres");
        let mut bytes = buf.freeze();
        assert_eq!(bytes.get_nul_string().unwrap(), "user");
        assert_eq!(bytes.get_nul_string().unwrap(), "postgres");
        assert!(bytes.is_empty());
    }

    #[test]
    fn short_body() {
        let mut bytes = Bytes::from_static(b"abc");
        assert!(bytes.get_nul_string().is_err());
        assert!(matches!(
            bytes.try_get_u32().map_err(ProtocolError::from),
            Err(ProtocolError::Malformed { .. }),
        ));
        assert!(bytes.try_split_to(4).is_err());
        assert_eq!(bytes.try_split_to(2).unwrap(), &b"ab"[..]);

        let mut buf = BytesMut::new();
        buf.put_i32(-1);
        assert_eq!(buf.freeze().try_get_i32().unwrap(), -1);
    }
}
