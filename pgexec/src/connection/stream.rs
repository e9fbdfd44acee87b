//! Blocking buffered socket.
use bytes::{Buf, BytesMut};
use std::{
    io::{self, Read, Write},
    net::TcpStream,
    path::Path,
};

use super::Config;
use crate::{
    Result,
    common::{verbose, warning},
    postgres::{
        BackendProtocol, FrontendProtocol, ProtocolError,
        backend::{ErrorResponse, NoticeResponse},
        frontend,
    },
};

const DEFAULT_BUF_CAPACITY: usize = 1024;

/// Either `TcpStream` or `UnixStream`.
#[derive(Debug)]
enum Socket {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Socket {
    fn connect_tcp(host: &str, port: u16) -> io::Result<Socket> {
        let socket = TcpStream::connect((host, port))?;
        socket.set_nodelay(true)?;
        Ok(Socket::Tcp(socket))
    }

    #[cfg(unix)]
    fn connect_socket(path: &str) -> io::Result<Socket> {
        Ok(Socket::Unix(std::os::unix::net::UnixStream::connect(path)?))
    }

    #[cfg(not(unix))]
    fn connect_socket(_: &str) -> io::Result<Socket> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "unix socket is not supported"))
    }

    fn shutdown(&self) -> io::Result<()> {
        match self {
            Socket::Tcp(t) => t.shutdown(std::net::Shutdown::Both),
            #[cfg(unix)]
            Socket::Unix(u) => u.shutdown(std::net::Shutdown::Both),
        }
    }
}

impl Read for Socket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Socket::Tcp(t) => t.read(buf),
            #[cfg(unix)]
            Socket::Unix(u) => u.read(buf),
        }
    }
}

impl Write for Socket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Socket::Tcp(t) => t.write(buf),
            #[cfg(unix)]
            Socket::Unix(u) => u.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Socket::Tcp(t) => t.flush(),
            #[cfg(unix)]
            Socket::Unix(u) => u.flush(),
        }
    }
}

/// Buffered connection to postgres.
#[derive(Debug)]
pub struct PgStream {
    socket: Socket,
    read_buf: BytesMut,
    write_buf: BytesMut,
}

impl PgStream {
    /// Open a unix socket when configured or when connecting to `localhost` with a
    /// local server socket present, otherwise a tcp connection.
    pub fn connect(config: &Config) -> io::Result<Self> {
        let local = format!("/run/postgresql/.s.PGSQL.{}", config.port);
        let socket = match config.socket.as_deref() {
            Some(path) => Socket::connect_socket(path)?,
            None if cfg!(unix) && config.host == "localhost" && Path::new(&local).exists() => {
                Socket::connect_socket(&local)?
            }
            None => Socket::connect_tcp(&config.host, config.port)?,
        };

        Ok(Self {
            socket,
            read_buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
            write_buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
        })
    }

    /// Buffer a message, call [`flush`][PgStream::flush] to send it.
    pub fn send<F: FrontendProtocol>(&mut self, message: F) {
        frontend::write(message, &mut self.write_buf);
    }

    pub fn send_startup(&mut self, startup: frontend::Startup) {
        startup.write(&mut self.write_buf);
    }

    pub fn flush(&mut self) -> io::Result<()> {
        if self.write_buf.is_empty() {
            return Ok(());
        }
        self.socket.write_all(&self.write_buf)?;
        self.write_buf.clear();
        self.socket.flush()
    }

    /// Receive a backend message.
    ///
    /// `NoticeResponse` is logged and skipped, `ErrorResponse` is returned as [`Err`].
    pub fn recv<B: BackendProtocol>(&mut self) -> Result<B> {
        loop {
            let (msgtype, body) = self.read_message()?;
            match msgtype {
                NoticeResponse::MSGTYPE => {
                    let _notice = NoticeResponse::decode(msgtype, body)?;
                    warning!("{}", _notice.notice);
                    continue;
                }
                ErrorResponse::MSGTYPE => {
                    let ErrorResponse { error } = ErrorResponse::decode(msgtype, body)?;
                    return Err(error.into());
                }
                _ => return Ok(B::decode(msgtype, body)?),
            }
        }
    }

    fn read_message(&mut self) -> Result<(u8, bytes::Bytes)> {
        loop {
            if let Some(mut header) = self.read_buf.get(..5) {
                let msgtype = header.get_u8();
                let len = header.get_i32();
                if len < 4 {
                    return Err(ProtocolError::malformed("message length less than 4").into());
                }
                let len = len as usize;

                if self.read_buf.len() - 1/*msgtype*/ >= len {
                    self.read_buf.advance(5);
                    let body = self.read_buf.split_to(len - 4).freeze();
                    verbose!(msgtype = %(msgtype as char), len, "recv");
                    return Ok((msgtype, body));
                }

                self.read_buf.reserve(1 + len - self.read_buf.len());
            }

            self.read_socket()?;
        }
    }

    fn read_socket(&mut self) -> io::Result<()> {
        let mut chunk = [0u8; DEFAULT_BUF_CAPACITY * 8];
        let n = self.socket.read(&mut chunk)?;
        if n == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        self.read_buf.extend_from_slice(&chunk[..n]);
        Ok(())
    }

    pub fn shutdown(&self) -> io::Result<()> {
        self.socket.shutdown()
    }
}
