//! Access to the database server being enforced.
//!
//! The enforcement logic only talks to the server through the [Server] trait. Rows are decoded
//! into the plain structs below right at the query boundary.

mod mysql;
#[cfg(test)]
pub(crate) mod test;

use crate::error::ServerResult;
pub use mysql::MySqlServer;
use std::fmt::Display;
use std::future::Future;

/// An account that has privileges granted on one specific database (a row in `mysql.db`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Account {
    pub user: String,
    pub host: String,
}

impl Account {
    pub fn new(user: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
        }
    }
}

impl Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "'{}'@'{}'", self.user, self.host)
    }
}

/// Storage figures of one table. Both are `None` for tables without allocated storage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TableSize {
    pub data_length: Option<u64>,
    pub index_length: Option<u64>,
}

/// The write privilege flags of one database scoped grant row
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrivilegeRow {
    pub create: bool,
    pub insert: bool,
    pub update: bool,
}

impl PrivilegeRow {
    /// Whether any of the write privileges is in the denied position
    pub fn any_denied(&self) -> bool {
        !(self.create && self.insert && self.update)
    }
}

/// Server assigned identifier of a client session
pub type SessionId = u64;

/// Whether to hand the write privileges (`CREATE`, `INSERT`, `UPDATE`) out or take them away
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrivilegeAction {
    Grant,
    Revoke,
}

/// The administrative schema a query runs against.
///
/// Queries name their schema explicitly instead of switching the default database of the
/// connection, so no connection state needs restoring afterwards, also not on error paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdminScope {
    /// The authorization tables (`mysql`)
    Grants,
    /// The live server metadata (`information_schema`)
    Sessions,
}

impl AdminScope {
    pub fn schema(self) -> &'static str {
        match self {
            Self::Grants => "mysql",
            Self::Sessions => "information_schema",
        }
    }
}

/// The capabilities quota enforcement needs from the database server.
///
/// Every call runs one query or statement to completion. Implementations must not keep result
/// cursors open between calls.
pub trait Server {
    /// All databases on the server
    fn databases(&mut self) -> impl Future<Output = ServerResult<Vec<String>>>;

    /// Storage figures of all tables in `db`
    fn table_sizes(&mut self, db: &str) -> impl Future<Output = ServerResult<Vec<TableSize>>>;

    /// The write privilege flags of all grant rows scoped to `db`
    fn privilege_rows(&mut self, db: &str) -> impl Future<Output = ServerResult<Vec<PrivilegeRow>>>;

    /// All accounts with a grant row scoped to `db`
    fn scoped_accounts(&mut self, db: &str) -> impl Future<Output = ServerResult<Vec<Account>>>;

    /// Sessions of `user` currently connected to `db`
    fn sessions(
        &mut self,
        db: &str,
        user: &str,
    ) -> impl Future<Output = ServerResult<Vec<SessionId>>>;

    /// Grants or revokes the write privileges on `db.*` for `account`.
    ///
    /// Must succeed if the privileges already are in the requested state.
    fn set_write_privileges(
        &mut self,
        db: &str,
        account: &Account,
        action: PrivilegeAction,
    ) -> impl Future<Output = ServerResult<()>>;

    /// Terminates a session. Must succeed if the session is already gone.
    fn kill(&mut self, session: SessionId) -> impl Future<Output = ServerResult<()>>;
}
