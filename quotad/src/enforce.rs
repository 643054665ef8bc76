//! The limited / unlimited state machine and its transitions.
//!
//! The state of a database is never stored, it is read from the grant rows every time. A
//! transition is only executed if the live state disagrees with what the quota demands, which
//! makes repeated checks of an unchanged database free of side effects.

use crate::error::ServerResult;
use crate::server::{Account, PrivilegeAction, Server};
use shared::log_error_chain;
use shared::types::{EnforcementState, QuotaValue};

/// A change of the enforcement state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Transition {
    Limit,
    Unlimit,
}

impl Transition {
    fn action(self) -> PrivilegeAction {
        match self {
            Self::Limit => PrivilegeAction::Revoke,
            Self::Unlimit => PrivilegeAction::Grant,
        }
    }

    fn target(self) -> EnforcementState {
        match self {
            Self::Limit => EnforcementState::Limited,
            Self::Unlimit => EnforcementState::Unlimited,
        }
    }
}

/// What happened during one transition
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct TransitionSummary {
    pub accounts: usize,
    pub sessions_killed: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// The live state already matched the quota
    Unchanged(EnforcementState),
    Transitioned(Transition, TransitionSummary),
}

/// Decides whether `usage` under `quota` requires leaving `state`.
///
/// An unlimited quota never causes a transition.
pub(crate) fn decide(
    usage: u64,
    quota: QuotaValue,
    state: EnforcementState,
) -> Option<Transition> {
    if quota.is_unlimited() {
        return None;
    }

    match (quota.is_reached_by(usage), state) {
        (true, EnforcementState::Unlimited) => Some(Transition::Limit),
        (false, EnforcementState::Limited) => Some(Transition::Unlimit),
        _ => None,
    }
}

/// Reads the live enforcement state of `db`.
///
/// `Limited` if any write privilege of any scoped grant row is revoked.
pub(crate) async fn read_state(
    server: &mut impl Server,
    db: &str,
) -> ServerResult<EnforcementState> {
    let rows = server.privilege_rows(db).await?;

    Ok(if rows.iter().any(|r| r.any_denied()) {
        EnforcementState::Limited
    } else {
        EnforcementState::Unlimited
    })
}

/// All accounts a transition of `db` acts on
pub(crate) async fn list_accounts(
    server: &mut impl Server,
    db: &str,
) -> ServerResult<Vec<Account>> {
    server.scoped_accounts(db).await
}

/// Revokes the write privileges of all accounts scoped to `db` and kills their sessions on it
pub(crate) async fn apply_limited(
    server: &mut impl Server,
    db: &str,
) -> ServerResult<TransitionSummary> {
    apply(server, db, Transition::Limit).await
}

/// Grants the write privileges back to all accounts scoped to `db` and kills their lingering
/// sessions on it
pub(crate) async fn apply_unlimited(
    server: &mut impl Server,
    db: &str,
) -> ServerResult<TransitionSummary> {
    apply(server, db, Transition::Unlimit).await
}

/// Checks `db` against its quota and transitions it if required.
pub(crate) async fn enforce(
    server: &mut impl Server,
    db: &str,
    usage: u64,
    quota: QuotaValue,
) -> ServerResult<Outcome> {
    let state = read_state(server, db).await?;

    let Some(transition) = decide(usage, quota, state) else {
        log::debug!("Database {db} is {state} and uses {usage} of {quota}, nothing to do");
        return Ok(Outcome::Unchanged(state));
    };

    match transition {
        Transition::Limit => log::warn!("Limiting {db}: uses {usage} of {quota}"),
        Transition::Unlimit => log::info!("Unlimiting {db}: uses {usage} of {quota}"),
    }

    let summary = match transition {
        Transition::Limit => apply_limited(server, db).await?,
        Transition::Unlimit => apply_unlimited(server, db).await?,
    };

    log::info!(
        "Database {db} is {} now, {} accounts changed, {} sessions killed",
        transition.target(),
        summary.accounts,
        summary.sessions_killed
    );

    Ok(Outcome::Transitioned(transition, summary))
}

/// Applies `transition` to every scoped account of `db`.
///
/// A failing account doesn't stop the others. The first failure is returned after all accounts
/// have been processed, unless it makes the connection unusable.
async fn apply(
    server: &mut impl Server,
    db: &str,
    transition: Transition,
) -> ServerResult<TransitionSummary> {
    let accounts = list_accounts(server, db).await?;

    if accounts.is_empty() {
        log::warn!("No accounts are scoped to {db}, nothing to {:?}", transition.action());
    }

    let mut summary = TransitionSummary {
        accounts: accounts.len(),
        sessions_killed: 0,
    };
    let mut first_err = None;
    let mut failed = vec![];

    for account in &accounts {
        match apply_to_account(server, db, account, transition.action()).await {
            Ok(killed) => summary.sessions_killed += killed,
            Err(err) if err.aborts_pass() => return Err(err),
            Err(err) => {
                log_error_chain!(
                    err,
                    "Applying {:?} to {} on {} failed",
                    transition.action(),
                    account,
                    db
                );
                failed.push(account.to_string());
                first_err.get_or_insert(err);
            }
        }
    }

    // The remaining revoked rows make the database read as limited from now on, so the failed
    // accounts are not retried
    if transition == Transition::Limit && !failed.is_empty() && failed.len() < accounts.len() {
        log::warn!(
            "Database {db} is limited, but {} still hold write privileges and need manual action",
            failed.join(", ")
        );
    }

    match first_err {
        Some(err) => Err(err),
        None => Ok(summary),
    }
}

/// Changes the privileges of one account, then kills its sessions on `db`.
///
/// Revoking first keeps a killed client from reconnecting with the old privileges. Statements
/// already running in a session may still complete. Returns the number of killed sessions.
async fn apply_to_account(
    server: &mut impl Server,
    db: &str,
    account: &Account,
    action: PrivilegeAction,
) -> ServerResult<usize> {
    server.set_write_privileges(db, account, action).await?;
    log::info!("{action:?} write privileges on {db} for {account}");

    let mut killed = 0;
    for id in server.sessions(db, &account.user).await? {
        match server.kill(id).await {
            Ok(()) => {
                log::info!("Killed session {id} of {account} on {db}");
                killed += 1;
            }
            Err(err) if err.aborts_pass() => return Err(err),
            Err(err) => {
                log_error_chain!(err, "Killing session {} of {} on {} failed", id, account, db);
            }
        }
    }

    Ok(killed)
}
