//! Postgres startup phase.
//!
//! <https://www.postgresql.org/docs/current/protocol-flow.html#PROTOCOL-FLOW-START-UP>
use md5::{Digest, Md5};
use std::{collections::HashMap, fmt};

use super::{Config, scram::Scram, stream::PgStream};
use crate::{
    Result,
    common::verbose,
    postgres::{
        BackendMessage, ProtocolError,
        backend::{self, Authentication},
        frontend,
    },
};

/// Encoding requested for every session, text values are exchanged as utf8.
pub const CLIENT_ENCODING: &str = "UTF8";

/// Startup phase successful response.
#[derive(Debug)]
pub struct StartupResponse {
    pub key_data: Option<backend::BackendKeyData>,
    pub param_status: HashMap<String, String>,
}

/// Perform a startup message, authenticate, and wait for `ReadyForQuery`.
pub fn startup(config: &Config, stream: &mut PgStream) -> Result<StartupResponse> {
    let mut params = vec![("client_encoding", CLIENT_ENCODING)];
    if let Some(app_name) = config.app_name.as_deref() {
        params.push(("application_name", app_name));
    }

    stream.send_startup(frontend::Startup {
        user: &config.user,
        database: Some(&config.dbname),
        params: &params,
    });
    stream.flush()?;

    authenticate(config, stream)?;

    // After AuthenticationOk, the backend send some ParameterStatus messages,
    // BackendKeyData, and finally ReadyForQuery.
    let mut param_status = HashMap::new();
    let mut key_data = None;

    loop {
        use BackendMessage::*;
        match stream.recv()? {
            ReadyForQuery(_) => break,
            BackendKeyData(new_key_data) => key_data = Some(new_key_data),
            ParameterStatus(param) => {
                param_status.insert(param.name, param.value);
            }
            NegotiateProtocolVersion(_) => {}
            f => Err(f.unexpected("startup phase"))?,
        }
    }

    verbose!(params = param_status.len(), "startup complete");

    Ok(StartupResponse { key_data, param_status })
}

fn authenticate(config: &Config, stream: &mut PgStream) -> Result<()> {
    let mut scram = None;

    loop {
        use Authentication::*;
        let auth = stream.recv::<Authentication>()?;
        verbose!(method = auth.method_name(), "authentication");

        match auth {
            Ok => return Result::Ok(()),
            CleartextPassword => {
                stream.send(frontend::PasswordMessage { password: &config.pass });
            }
            MD5Password { salt } => {
                let password = md5_password(&config.user, &config.pass, salt);
                stream.send(frontend::PasswordMessage { password: &password });
            }
            SASL { mechanisms } => {
                let supported = mechanisms
                    .split(|e| *e == b'\0')
                    .any(|e| e == Scram::MECHANISM.as_bytes());
                if !supported {
                    Err(UnsupportedAuth { method: "sasl" })?
                }

                let client = Scram::new(&config.pass);
                stream.send(frontend::SASLInitialResponse {
                    mechanism: Scram::MECHANISM,
                    data: client.client_first().as_bytes(),
                });
                scram = Some(client);
            }
            SASLContinue { data } => {
                let Some(client) = scram.as_mut() else {
                    return Err(ProtocolError::malformed("sasl challenge without initial response").into());
                };
                let response = client.client_final(&data)?;
                stream.send(frontend::SASLResponse { data: response.as_bytes() });
            }
            SASLFinal { data } => {
                let Some(client) = scram.as_ref() else {
                    return Err(ProtocolError::malformed("sasl outcome without initial response").into());
                };
                client.verify(&data)?;
                continue;
            }
            auth => Err(UnsupportedAuth { method: auth.method_name() })?,
        }

        stream.flush()?;
    }
}

/// `concat('md5', md5(concat(md5(concat(password, username)), random-salt)))`
fn md5_password(user: &str, pass: &str, salt: [u8; 4]) -> String {
    let inner = hex::encode(Md5::new().chain_update(pass).chain_update(user).finalize());
    let outer = Md5::new().chain_update(inner).chain_update(salt).finalize();
    format!("md5{}", hex::encode(outer))
}

/// Server requested an authentication method that is not supported.
pub struct UnsupportedAuth {
    method: &'static str,
}

impl UnsupportedAuth {
    pub fn method(&self) -> &'static str {
        self.method
    }
}

impl std::error::Error for UnsupportedAuth { }

impl fmt::Display for UnsupportedAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported authentication method: {}", self.method)
    }
}

impl fmt::Debug for UnsupportedAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
