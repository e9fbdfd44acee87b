//! `SCRAM-SHA-256` client.
//!
//! <https://www.postgresql.org/docs/current/sasl-authentication.html#SASL-SCRAM-SHA-256>
use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::postgres::ProtocolError;

type HmacSha256 = Hmac<Sha256>;

/// base64 of gs2 header `n,,`, no channel binding.
const CHANNEL_BINDING: &str = "biws";

const NONCE_LEN: usize = 18;

/// Client side of one SCRAM exchange.
pub struct Scram {
    password: Vec<u8>,
    client_first_bare: String,
    nonce: String,
    server_signature: Option<[u8; 32]>,
}

impl Scram {
    pub const MECHANISM: &'static str = "SCRAM-SHA-256";

    /// Postgres ignores the user name in SCRAM messages, the startup user is used.
    pub fn new(password: &str) -> Self {
        let nonce = STANDARD.encode(rand::random::<[u8; NONCE_LEN]>());
        Self::with_nonce("", password, nonce)
    }

    fn with_nonce(user: &str, password: &str, nonce: String) -> Self {
        Self {
            password: password.as_bytes().to_vec(),
            client_first_bare: format!("n={user},r={nonce}"),
            nonce,
            server_signature: None,
        }
    }

    /// `client-first-message` sent in `SASLInitialResponse`.
    pub fn client_first(&self) -> String {
        format!("n,,{}", self.client_first_bare)
    }

    /// Compute `client-final-message` from `server-first-message`.
    pub fn client_final(&mut self, server_first: &[u8]) -> Result<String, ProtocolError> {
        let server_first = std::str::from_utf8(server_first)
            .map_err(|_| ProtocolError::malformed("scram message is not utf8"))?;

        let mut nonce = None;
        let mut salt = None;
        let mut iterations = None;
        for attr in server_first.split(',') {
            match attr.split_once('=') {
                Some(("r", value)) => nonce = Some(value),
                Some(("s", value)) => salt = Some(value),
                Some(("i", value)) => iterations = value.parse::<u32>().ok(),
                _ => {}
            }
        }

        let (Some(nonce), Some(salt), Some(iterations)) = (nonce, salt, iterations) else {
            return Err(ProtocolError::malformed("incomplete scram server-first-message"));
        };
        if !nonce.starts_with(&self.nonce) || nonce.len() == self.nonce.len() {
            return Err(ProtocolError::malformed("invalid scram server nonce"));
        }
        if iterations == 0 {
            return Err(ProtocolError::malformed("invalid scram iteration count"));
        }
        let salt = STANDARD
            .decode(salt)
            .map_err(|_| ProtocolError::malformed("invalid scram salt"))?;

        let salted = hi(&self.password, &salt, iterations);
        let client_key = hmac_sha256(&salted, b"Client Key");
        let stored_key: [u8; 32] = Sha256::digest(client_key).into();

        let without_proof = format!("c={CHANNEL_BINDING},r={nonce}");
        let auth_message = format!("{},{server_first},{without_proof}", self.client_first_bare);

        let client_signature = hmac_sha256(&stored_key, auth_message.as_bytes());
        let mut proof = client_key;
        for (p, s) in proof.iter_mut().zip(client_signature) {
            *p ^= s;
        }

        let server_key = hmac_sha256(&salted, b"Server Key");
        self.server_signature = Some(hmac_sha256(&server_key, auth_message.as_bytes()));

        Ok(format!("{without_proof},p={}", STANDARD.encode(proof)))
    }

    /// Verify `server-final-message` signature.
    pub fn verify(&self, server_final: &[u8]) -> Result<(), ProtocolError> {
        let Some(expected) = self.server_signature else {
            return Err(ProtocolError::malformed("scram final message before challenge"));
        };
        let Some(signature) = server_final.strip_prefix(b"v=") else {
            return Err(ProtocolError::malformed("scram server rejected authentication"));
        };
        let signature = STANDARD
            .decode(signature.trim_ascii_end())
            .map_err(|_| ProtocolError::malformed("invalid scram server signature"))?;
        if signature != expected {
            return Err(ProtocolError::malformed("scram server signature mismatch"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Scram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scram").field("nonce", &self.nonce).finish_non_exhaustive()
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// PBKDF2 with HMAC-SHA-256, one block.
fn hi(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(password).expect("hmac accepts any key length");
    mac.update(salt);
    mac.update(&1u32.to_be_bytes());
    let mut prev: [u8; 32] = mac.finalize().into_bytes().into();
    let mut result = prev;

    for _ in 1..iterations {
        prev = hmac_sha256(password, &prev);
        for (r, p) in result.iter_mut().zip(prev) {
            *r ^= p;
        }
    }

    result
}

#[cfg(test)]
mod test {
    use super::Scram;

    #[test]
    fn rfc7677_exchange() {
        let mut scram = Scram::with_nonce("user", "pencil", "rOprNGfwEbeRWgbNEkqO".into());
        assert_eq!(scram.client_first(), "n,,n=user,r=rOprNGfwEbeRWgbNEkqO");

        let client_final = scram
            .client_final(b"r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,s=W22ZaJ0SNY7soEsUEjb6gQ==,i=4096")
            .unwrap();
        assert_eq!(
            client_final,
            "c=biws,r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,p=dHzbZapWIk4jUhN+Ute9ytag9zjfMHgsqmmiz7AndVQ="
        );

        scram.verify(b"v=6rriTRBi23WpRR/wtup+mMhUZUn/dB5nLTJRsjl95G4=").unwrap();
        assert!(scram.verify(b"v=AAAA").is_err());
    }

    #[test]
    fn foreign_nonce() {
        let mut scram = Scram::with_nonce("", "pencil", "abc".into());
        assert!(scram.client_final(b"r=xyz123,s=QSXCR+Q6sek8bf92,i=4096").is_err());
        assert!(scram.client_final(b"r=abc123,i=4096").is_err());
    }
}
