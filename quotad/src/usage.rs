//! Measures the storage used by a database.

use crate::error::ServerResult;
use crate::server::{Server, TableSize};

/// Sums data and index length over all tables of `db`.
///
/// Tables without allocated storage report `NULL` figures, they count as zero.
pub(crate) async fn measure(server: &mut impl Server, db: &str) -> ServerResult<u64> {
    let tables = server.table_sizes(db).await?;
    let used = sum(&tables);

    log::debug!("Database {db} uses {used} bytes in {} tables", tables.len());

    Ok(used)
}

fn sum(tables: &[TableSize]) -> u64 {
    tables
        .iter()
        .map(|t| {
            t.data_length
                .unwrap_or_default()
                .saturating_add(t.index_length.unwrap_or_default())
        })
        .fold(0, u64::saturating_add)
}
