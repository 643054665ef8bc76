//! [Server] implementation for MySQL compatible servers, based on `sqlx`.

use super::*;
use crate::config::MySqlParams;
use crate::error::ServerError;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlDatabaseError, MySqlRow};
use sqlx::{ConnectOptions, Connection, Row};

// Server error numbers, see the MySQL server error reference
const ER_ACCESS_DENIED_ERROR: u16 = 1045;
const ER_BAD_DB_ERROR: u16 = 1049;
const ER_NO_SUCH_THREAD: u16 = 1094;
const ER_NONEXISTING_GRANT: u16 = 1141;

/// A single exclusively owned connection to the server.
///
/// Opened at the beginning of a polling pass and closed at its end.
#[derive(Debug)]
pub struct MySqlServer {
    conn: MySqlConnection,
}

impl MySqlServer {
    pub async fn connect(params: &MySqlParams) -> ServerResult<Self> {
        let mut options = MySqlConnectOptions::new()
            .host(&params.host)
            .port(params.port)
            .username(&params.user);

        if let Some(ref password) = params.password {
            options = options.password(password);
        }

        if let Some(ref socket) = params.socket {
            options = options.socket(socket);
        }

        let conn = options.connect().await.map_err(|err| classify(err, None))?;

        Ok(Self { conn })
    }

    /// Closes the connection gracefully
    pub async fn close(self) -> ServerResult<()> {
        self.conn.close().await.map_err(|err| classify(err, None))
    }

    /// Runs a statement that returns no rows over the text protocol.
    ///
    /// Used for statements that don't support placeholders.
    async fn execute_raw(&mut self, sql: &str) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(sql).execute(&mut self.conn).await?;
        Ok(())
    }
}

impl Server for MySqlServer {
    async fn databases(&mut self) -> ServerResult<Vec<String>> {
        let rows = sqlx::raw_sql("SHOW DATABASES")
            .fetch_all(&mut self.conn)
            .await
            .map_err(|err| classify(err, None))?;

        rows.iter()
            .map(|row| row.try_get_unchecked::<String, _>(0))
            .collect::<Result<_, _>>()
            .map_err(|err| classify(err, None))
    }

    async fn table_sizes(&mut self, db: &str) -> ServerResult<Vec<TableSize>> {
        // Unlike information_schema.TABLES, this fails for a database that doesn't exist
        let sql = format!("SHOW TABLE STATUS FROM {}", quote_identifier(db));

        let rows = sqlx::raw_sql(&sql)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|err| classify(err, Some(db)))?;

        rows.iter()
            .map(|row| -> Result<_, sqlx::Error> {
                Ok(TableSize {
                    data_length: row.try_get_unchecked("Data_length")?,
                    index_length: row.try_get_unchecked("Index_length")?,
                })
            })
            .collect::<Result<_, _>>()
            .map_err(|err| classify(err, Some(db)))
    }

    async fn privilege_rows(&mut self, db: &str) -> ServerResult<Vec<PrivilegeRow>> {
        let sql = format!(
            "SELECT Create_priv, Insert_priv, Update_priv FROM {}.`db` WHERE Db = ?",
            quote_identifier(AdminScope::Grants.schema())
        );

        let rows = sqlx::query(&sql)
            .bind(db)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|err| classify(err, Some(db)))?;

        rows.iter()
            .map(|row| -> Result<_, sqlx::Error> {
                Ok(PrivilegeRow {
                    create: priv_flag(row, 0)?,
                    insert: priv_flag(row, 1)?,
                    update: priv_flag(row, 2)?,
                })
            })
            .collect::<Result<_, _>>()
            .map_err(|err| classify(err, Some(db)))
    }

    async fn scoped_accounts(&mut self, db: &str) -> ServerResult<Vec<Account>> {
        let sql = format!(
            "SELECT User, Host FROM {}.`db` WHERE Db = ?",
            quote_identifier(AdminScope::Grants.schema())
        );

        let rows = sqlx::query(&sql)
            .bind(db)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|err| classify(err, Some(db)))?;

        rows.iter()
            .map(|row| -> Result<_, sqlx::Error> {
                Ok(Account::new(
                    row.try_get_unchecked::<String, _>(0)?,
                    row.try_get_unchecked::<String, _>(1)?,
                ))
            })
            .collect::<Result<_, _>>()
            .map_err(|err| classify(err, Some(db)))
    }

    async fn sessions(&mut self, db: &str, user: &str) -> ServerResult<Vec<SessionId>> {
        let sql = format!(
            "SELECT ID FROM {}.`PROCESSLIST` WHERE DB = ? AND USER = ?",
            quote_identifier(AdminScope::Sessions.schema())
        );

        let rows = sqlx::query(&sql)
            .bind(db)
            .bind(user)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|err| classify(err, Some(db)))?;

        rows.iter()
            .map(|row| row.try_get_unchecked::<u64, _>(0))
            .collect::<Result<_, _>>()
            .map_err(|err| classify(err, Some(db)))
    }

    async fn set_write_privileges(
        &mut self,
        db: &str,
        account: &Account,
        action: PrivilegeAction,
    ) -> ServerResult<()> {
        let sql = privilege_statement(db, account, action);

        // Revoking privileges that are not held
        self.execute_raw(&sql)
            .await
            .or_else(|err| tolerate(error_number(&err), ER_NONEXISTING_GRANT, err, Some(db)))
    }

    async fn kill(&mut self, session: SessionId) -> ServerResult<()> {
        // The session ended in the meantime
        self.execute_raw(&format!("KILL {session}"))
            .await
            .or_else(|err| tolerate(error_number(&err), ER_NO_SUCH_THREAD, err, None))
    }
}

/// Decodes an `enum('N','Y')` privilege column
fn priv_flag(row: &MySqlRow, index: usize) -> Result<bool, sqlx::Error> {
    let value: String = row.try_get_unchecked(index)?;
    Ok(value.eq_ignore_ascii_case("Y"))
}

fn error_number(err: &sqlx::Error) -> Option<u16> {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .try_downcast_ref::<MySqlDatabaseError>()
            .map(MySqlDatabaseError::number),
        _ => None,
    }
}

/// Sorts a `sqlx` error into the categories the poll driver acts on.
///
/// `db` is the database the failed query was about, if any.
fn classify(err: sqlx::Error, db: Option<&str>) -> ServerError {
    classify_number(error_number(&err), err, db)
}

/// Like [classify], with the server error number already extracted from `err`
fn classify_number(number: Option<u16>, err: sqlx::Error, db: Option<&str>) -> ServerError {
    match number {
        Some(ER_ACCESS_DENIED_ERROR) => ServerError::access_denied(err),
        Some(ER_BAD_DB_ERROR) => match db {
            Some(db) => ServerError::unknown_database(db),
            None => ServerError::statement(err),
        },
        Some(_) => ServerError::statement(err),
        None => match err {
            // Decoding problems concern a single result, the connection is still fine
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::TypeNotFound { .. } => ServerError::statement(err),
            err => err.into(),
        },
    }
}

/// Treats the server error `tolerated` as success, since it means the statement's effect is
/// already in place. Everything else is classified.
fn tolerate(
    number: Option<u16>,
    tolerated: u16,
    err: sqlx::Error,
    db: Option<&str>,
) -> ServerResult<()> {
    if number == Some(tolerated) {
        log::debug!("Ignoring server error: {err}");
        return Ok(());
    }

    Err(classify_number(number, err, db))
}

fn privilege_statement(db: &str, account: &Account, action: PrivilegeAction) -> String {
    let (verb, preposition) = match action {
        PrivilegeAction::Grant => ("GRANT", "TO"),
        PrivilegeAction::Revoke => ("REVOKE", "FROM"),
    };

    format!(
        "{verb} CREATE, INSERT, UPDATE ON {}.* {preposition} {}@{}",
        quote_identifier(db),
        quote_literal(&account.user),
        quote_literal(&account.host)
    )
}

/// Quotes an identifier (database name) with backticks
fn quote_identifier(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// Quotes a string literal (user or host name) with single quotes
fn quote_literal(literal: &str) -> String {
    let mut quoted = String::with_capacity(literal.len() + 2);
    quoted.push('\'');

    for c in literal.chars() {
        match c {
            '\'' => quoted.push_str("''"),
            '\\' => quoted.push_str("\\\\"),
            c => quoted.push(c),
        }
    }

    quoted.push('\'');
    quoted
}
