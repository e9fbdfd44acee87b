//! Blocking Postgres Prepared Statement Executor
//!
//! A [`StatementExecutor`] drives one prepared statement through its lifecycle
//! over a [`Session`]: prepare, bind, execute, then fetch rows one at a time.
//!
//! # Examples
//!
//! ```no_run
//! use pgexec::{Connection, Encode, StatementExecutor};
//!
//! # fn app() -> pgexec::Result<()> {
//! let mut conn = Connection::connect_env()?;
//! let mut exe = StatementExecutor::new(&mut conn);
//!
//! exe.prepare("SELECT $1::int4 + 1, $2::text")?;
//! exe.bind_params([41i32.encode(), "Foo".encode()])?;
//! exe.execute()?;
//!
//! while exe.fetch()? {
//!     let sum: i32 = exe.get(0)?;
//!     let name: String = exe.get(1)?;
//!     assert_eq!(sum, 42);
//!     assert_eq!(name, "Foo");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Multiple executors sharing one connection:
//!
//! ```no_run
//! use std::cell::RefCell;
//! use pgexec::{Connection, StatementExecutor};
//!
//! # fn app() -> pgexec::Result<()> {
//! let conn = RefCell::new(Connection::connect_env()?);
//!
//! let mut insert = StatementExecutor::new(&conn);
//! insert.prepare("INSERT INTO foo(id) VALUES($1)")?;
//!
//! let mut count = StatementExecutor::new(&conn);
//! count.prepare("SELECT count(*) FROM foo")?;
//!
//! for i in 0..14 {
//!     insert.bind_params([i])?;
//!     insert.execute()?;
//!     assert_eq!(insert.affected_row_count()?, 1);
//! }
//!
//! count.execute()?;
//! count.fetch()?;
//! assert_eq!(count.get::<i64>(0)?, 14);
//! # Ok(())
//! # }
//! ```
mod common;
mod ext;

// Protocol
pub mod postgres;

// Encoding
pub mod types;
mod value;
mod param;
mod column;
mod decode;

// Component
pub mod sql;
mod statement;
pub mod session;

// Operation
pub mod executor;

// Connection
pub mod connection;

mod error;

pub use types::SqlType;
#[cfg(feature = "json")]
pub use types::Json;
pub use value::{Value, ValueRef};
pub use param::{Encode, InputParameter, Numeric};
pub use column::{MetaColumn, OutputParameter};
pub use decode::{Decode, DecodeError, TypeMismatch};
pub use statement::StatementName;
pub use postgres::DatabaseError;

pub use session::{RawRow, Session, StatementInfo};
pub use executor::{BindError, IndexError, State, StateError, StatementExecutor};
pub use connection::{Config, Connection};
pub use error::{Error, ErrorKind, Result};
