use super::*;
use crate::error::ServerError;
use std::collections::BTreeMap;

/// In-memory stand-in for a database server
///
/// Models just enough of `SHOW TABLE STATUS`, `mysql.db` and the process list for the enforcement
/// logic. Records every call so tests can assert on what has been done.
#[derive(Debug, Default)]
pub struct TestServer {
    databases: BTreeMap<String, TestDatabase>,
    /// Enumerated by [Server::databases], but every other query reports them as missing
    vanished: Vec<String>,
    sessions: Vec<TestSession>,
    failures: Vec<(Op, String, fn() -> ServerError)>,
    /// Privilege changes failing for one account only
    account_failures: Vec<(String, Account, fn() -> ServerError)>,
    pub calls: Vec<Call>,
}

#[derive(Debug, Default)]
struct TestDatabase {
    tables: Vec<TableSize>,
    grants: Vec<(Account, PrivilegeRow)>,
}

#[derive(Debug, Clone)]
struct TestSession {
    id: SessionId,
    db: String,
    user: String,
}

/// Operation selector for failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Databases,
    TableSizes,
    PrivilegeRows,
    ScopedAccounts,
    Sessions,
    SetWritePrivileges,
    Kill,
}

/// A recorded call to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Databases,
    TableSizes(String),
    PrivilegeRows(String),
    ScopedAccounts(String),
    Sessions(String, String),
    SetWritePrivileges(String, Account, PrivilegeAction),
    Kill(SessionId),
}

impl Call {
    /// The database the call concerns, if any
    fn db(&self) -> Option<&str> {
        match self {
            Call::Databases | Call::Kill(_) => None,
            Call::TableSizes(db)
            | Call::PrivilegeRows(db)
            | Call::ScopedAccounts(db)
            | Call::Sessions(db, _)
            | Call::SetWritePrivileges(db, _, _) => Some(db),
        }
    }
}

const ALL_GRANTED: PrivilegeRow = PrivilegeRow {
    create: true,
    insert: true,
    update: true,
};

const ALL_DENIED: PrivilegeRow = PrivilegeRow {
    create: false,
    insert: false,
    update: false,
};

impl TestServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a database with tables of the given `(data_length, index_length)`
    pub fn with_database(mut self, name: &str, tables: &[(Option<u64>, Option<u64>)]) -> Self {
        self.databases.entry(name.to_owned()).or_default().tables = tables
            .iter()
            .map(|(data_length, index_length)| TableSize {
                data_length: *data_length,
                index_length: *index_length,
            })
            .collect();
        self
    }

    /// Adds a database consisting of one table using `bytes` of data
    pub fn with_usage(self, name: &str, bytes: u64) -> Self {
        self.with_database(name, &[(Some(bytes), Some(0))])
    }

    /// Adds a database scoped grant row, with the write privileges either all granted or all
    /// revoked
    pub fn with_grant(self, db: &str, user: &str, host: &str, limited: bool) -> Self {
        self.with_grant_row(
            db,
            user,
            host,
            if limited { ALL_DENIED } else { ALL_GRANTED },
        )
    }

    pub fn with_grant_row(mut self, db: &str, user: &str, host: &str, row: PrivilegeRow) -> Self {
        self.databases
            .entry(db.to_owned())
            .or_default()
            .grants
            .push((Account::new(user, host), row));
        self
    }

    pub fn with_session(mut self, id: SessionId, db: &str, user: &str) -> Self {
        self.sessions.push(TestSession {
            id,
            db: db.to_owned(),
            user: user.to_owned(),
        });
        self
    }

    /// Makes `db` disappear after enumeration
    pub fn with_vanished(mut self, db: &str) -> Self {
        self.vanished.push(db.to_owned());
        self
    }

    /// Makes `op` fail with the given error when called for `db`. For [Op::Kill], `db` is the
    /// database the session is connected to.
    pub fn with_failure(mut self, op: Op, db: &str, err: fn() -> ServerError) -> Self {
        self.failures.push((op, db.to_owned(), err));
        self
    }

    /// Makes privilege changes on `db` fail for one account only
    pub fn with_account_failure(
        mut self,
        db: &str,
        user: &str,
        host: &str,
        err: fn() -> ServerError,
    ) -> Self {
        self.account_failures.push((db.to_owned(), Account::new(user, host), err));
        self
    }

    /// Replaces the usage of a database, keeping its grants
    pub fn set_usage(&mut self, db: &str, bytes: u64) {
        self.databases.entry(db.to_owned()).or_default().tables = vec![TableSize {
            data_length: Some(bytes),
            index_length: Some(0),
        }];
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// All killed session ids in order
    pub fn killed(&self) -> Vec<SessionId> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Kill(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// All privilege changes in order
    pub fn privilege_changes(&self) -> Vec<(String, Account, PrivilegeAction)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::SetWritePrivileges(db, account, action) => {
                    Some((db.clone(), account.clone(), *action))
                }
                _ => None,
            })
            .collect()
    }

    /// Whether any call concerned `db`
    pub fn touched(&self, db: &str) -> bool {
        self.calls.iter().any(|c| c.db() == Some(db))
    }

    /// The current grant rows of `db`
    pub fn grant_rows(&self, db: &str) -> Vec<PrivilegeRow> {
        self.databases
            .get(db)
            .map(|d| d.grants.iter().map(|(_, row)| *row).collect())
            .unwrap_or_default()
    }

    /// Ids of the sessions still alive
    pub fn live_sessions(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|s| s.id).collect()
    }

    fn check(&self, op: Op, db: &str) -> ServerResult<()> {
        if let Some((_, _, err)) = self.failures.iter().find(|f| f.0 == op && f.1 == db) {
            return Err(err());
        }

        if self.vanished.iter().any(|v| v == db) {
            return Err(ServerError::unknown_database(db));
        }

        Ok(())
    }

    fn database(&self, db: &str) -> ServerResult<&TestDatabase> {
        self.databases
            .get(db)
            .ok_or_else(|| ServerError::unknown_database(db))
    }
}

impl Server for TestServer {
    async fn databases(&mut self) -> ServerResult<Vec<String>> {
        self.calls.push(Call::Databases);
        if let Some((_, _, err)) = self.failures.iter().find(|f| f.0 == Op::Databases) {
            return Err(err());
        }

        let mut dbs: Vec<_> = self
            .databases
            .keys()
            .cloned()
            .chain(self.vanished.iter().cloned())
            .collect();
        dbs.sort();
        dbs.dedup();

        Ok(dbs)
    }

    async fn table_sizes(&mut self, db: &str) -> ServerResult<Vec<TableSize>> {
        self.calls.push(Call::TableSizes(db.to_owned()));
        self.check(Op::TableSizes, db)?;

        Ok(self.database(db)?.tables.clone())
    }

    async fn privilege_rows(&mut self, db: &str) -> ServerResult<Vec<PrivilegeRow>> {
        self.calls.push(Call::PrivilegeRows(db.to_owned()));
        self.check(Op::PrivilegeRows, db)?;

        // Like a SELECT on mysql.db, an unknown database just has no rows
        Ok(self.grant_rows(db))
    }

    async fn scoped_accounts(&mut self, db: &str) -> ServerResult<Vec<Account>> {
        self.calls.push(Call::ScopedAccounts(db.to_owned()));
        self.check(Op::ScopedAccounts, db)?;

        Ok(self
            .databases
            .get(db)
            .map(|d| d.grants.iter().map(|(a, _)| a.clone()).collect())
            .unwrap_or_default())
    }

    async fn sessions(&mut self, db: &str, user: &str) -> ServerResult<Vec<SessionId>> {
        self.calls.push(Call::Sessions(db.to_owned(), user.to_owned()));
        self.check(Op::Sessions, db)?;

        Ok(self
            .sessions
            .iter()
            .filter(|s| s.db == db && s.user == user)
            .map(|s| s.id)
            .collect())
    }

    async fn set_write_privileges(
        &mut self,
        db: &str,
        account: &Account,
        action: PrivilegeAction,
    ) -> ServerResult<()> {
        self.calls.push(Call::SetWritePrivileges(
            db.to_owned(),
            account.clone(),
            action,
        ));
        self.check(Op::SetWritePrivileges, db)?;
        if let Some((_, _, err)) = self
            .account_failures
            .iter()
            .find(|f| f.0 == db && f.1 == *account)
        {
            return Err(err());
        }

        let new_row = match action {
            PrivilegeAction::Grant => ALL_GRANTED,
            PrivilegeAction::Revoke => ALL_DENIED,
        };

        if let Some(d) = self.databases.get_mut(db) {
            d.grants
                .iter_mut()
                .filter(|(a, _)| a == account)
                .for_each(|(_, row)| *row = new_row);
        }

        Ok(())
    }

    async fn kill(&mut self, session: SessionId) -> ServerResult<()> {
        self.calls.push(Call::Kill(session));

        let Some(pos) = self.sessions.iter().position(|s| s.id == session) else {
            // Already gone
            return Ok(());
        };

        let db = self.sessions[pos].db.clone();
        if let Some((_, _, err)) = self
            .failures
            .iter()
            .find(|f| f.0 == Op::Kill && f.1 == db)
        {
            return Err(err());
        }

        self.sessions.remove(pos);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn denied_flags() {
        assert!(!ALL_GRANTED.any_denied());
        assert!(ALL_DENIED.any_denied());
        assert!(
            PrivilegeRow {
                insert: false,
                ..ALL_GRANTED
            }
            .any_denied()
        );
    }

    #[test]
    fn account_display() {
        assert_eq!(Account::new("app", "%").to_string(), "'app'@'%'");
    }

    #[tokio::test]
    async fn kill_removes_session() {
        let mut server = TestServer::new()
            .with_session(1, "app1", "app")
            .with_session(2, "app1", "app");

        server.kill(1).await.unwrap();
        server.kill(1).await.unwrap();

        assert_eq!(server.live_sessions(), vec![2]);
        assert_eq!(server.killed(), vec![1, 1]);
    }
}
