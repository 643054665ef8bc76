//! One polling pass over all databases of the server.

use crate::config::EnforcementConfig;
use crate::enforce::{self, Outcome, Transition};
use crate::error::{ServerError, SkipReason};
use crate::quota::{effective_quota, is_ignored};
use crate::server::Server;
use crate::usage;
use shared::log_error_chain;
use shared::types::QuotaValue;
use std::fmt::Display;

/// What a pass did with each database
#[derive(Debug, Default)]
pub struct PassReport {
    pub limited: Vec<String>,
    pub unlimited: Vec<String>,
    pub unchanged: Vec<String>,
    pub ignored: Vec<String>,
    pub skipped: Vec<(String, SkipReason)>,
    pub sessions_killed: usize,
}

impl Display for PassReport {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} limited, {} unlimited, {} unchanged, {} ignored, {} skipped, {} sessions killed",
            self.limited.len(),
            self.unlimited.len(),
            self.unchanged.len(),
            self.ignored.len(),
            self.skipped.len(),
            self.sessions_killed
        )
    }
}

/// Enforces the quota of every database on the server, one after the other.
///
/// Failures concerning a single database are recorded in the report and the pass continues. An
/// error is only returned if the server can't be used anymore, in which case the remaining
/// databases are not processed.
pub(crate) async fn run_pass(
    server: &mut impl Server,
    cfg: &EnforcementConfig,
) -> Result<PassReport, ServerError> {
    let mut report = PassReport::default();

    let databases = server.databases().await?;
    log::debug!("Checking {} databases", databases.len());

    for db in databases {
        if is_ignored(&db, cfg) {
            log::debug!("Ignoring database {db}");
            report.ignored.push(db);
            continue;
        }

        let quota = match effective_quota(&db, cfg) {
            Ok(QuotaValue::Unlimited) => {
                log::debug!("Database {db} has no quota");
                report.unchanged.push(db);
                continue;
            }
            Ok(quota) => quota,
            Err(err) => {
                let reason = SkipReason::from(err);
                log_error_chain!(reason, "Skipping database {}", db);
                report.skipped.push((db, reason));
                continue;
            }
        };

        let res = match usage::measure(server, &db).await {
            Ok(used) => enforce::enforce(server, &db, used, quota).await,
            Err(err) => Err(err),
        };

        match res {
            Ok(Outcome::Unchanged(_)) => report.unchanged.push(db),
            Ok(Outcome::Transitioned(transition, summary)) => {
                report.sessions_killed += summary.sessions_killed;
                match transition {
                    Transition::Limit => report.limited.push(db),
                    Transition::Unlimit => report.unlimited.push(db),
                }
            }
            Err(err) if err.aborts_pass() => return Err(err),
            Err(ServerError::UnknownDatabase { .. }) => {
                log::warn!("Database {db} was removed during the pass, skipping it");
                report.skipped.push((db, SkipReason::MissingDatabase));
            }
            Err(err) => {
                let reason = SkipReason::Server(err);
                log_error_chain!(reason, "Skipping database {}", db);
                report.skipped.push((db, reason));
            }
        }
    }

    log::info!("Pass finished: {report}");

    Ok(report)
}
