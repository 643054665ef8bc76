//! Resolves which quota applies to a database.

use crate::config::EnforcementConfig;
use shared::parser::quota_size::{self, QuotaParseError};
use shared::types::{QuotaValue, UNLIMITED_SENTINEL};

/// Whether `db` is excluded from enforcement altogether.
///
/// Only an explicit override of exactly `"-1"` excludes a database. Anything else, including
/// malformed lookalikes, goes through [effective_quota] and fails there.
pub(crate) fn is_ignored(db: &str, cfg: &EnforcementConfig) -> bool {
    cfg.databases
        .get(db)
        .is_some_and(|quota| quota == UNLIMITED_SENTINEL)
}

/// The quota applying to `db`: its override if there is one, the default quota otherwise.
pub(crate) fn effective_quota(
    db: &str,
    cfg: &EnforcementConfig,
) -> Result<QuotaValue, QuotaParseError> {
    let raw = cfg.databases.get(db).unwrap_or(&cfg.default_quota);
    quota_size::parse(raw)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::test::enforcement_config;

    #[test]
    fn ignored() {
        let cfg = enforcement_config(
            "10G",
            &[
                ("temp", "-1"),
                ("app2", "500M"),
                ("spaced", " -1"),
                ("double", "--1"),
                ("unit", "-1K"),
            ],
        );

        assert!(is_ignored("temp", &cfg));
        assert!(!is_ignored("app1", &cfg));
        assert!(!is_ignored("app2", &cfg));
        assert!(!is_ignored("spaced", &cfg));
        assert!(!is_ignored("double", &cfg));
        assert!(!is_ignored("unit", &cfg));
    }

    #[test]
    fn unlimited_default_is_not_ignored() {
        let cfg = enforcement_config("-1", &[]);

        assert!(!is_ignored("app1", &cfg));
        assert_eq!(effective_quota("app1", &cfg).unwrap(), QuotaValue::Unlimited);
    }

    #[test]
    fn resolution() {
        let cfg = enforcement_config("10G", &[("app2", "500M"), ("spaced", " -1")]);

        assert_eq!(
            effective_quota("app1", &cfg).unwrap(),
            QuotaValue::Bytes(10_000_000_000)
        );
        assert_eq!(
            effective_quota("app2", &cfg).unwrap(),
            QuotaValue::Bytes(500_000_000)
        );
        assert!(matches!(
            effective_quota("spaced", &cfg),
            Err(QuotaParseError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn invalid_default() {
        let cfg = enforcement_config("5X", &[("app2", "500M")]);

        assert_eq!(
            effective_quota("app1", &cfg),
            Err(QuotaParseError::InvalidFormat { input: "5X".into() })
        );
        // Overrides don't depend on the default
        assert_eq!(
            effective_quota("app2", &cfg).unwrap(),
            QuotaValue::Bytes(500_000_000)
        );
    }
}
