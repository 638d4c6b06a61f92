//! The verification entry points.
//!
//! `verify_call_sites` installs a fresh checker, then walks every registered
//! call site sequentially, awaiting each invocation before moving on. The
//! first failure stops the pass with the offending site named.

use std::sync::Arc;

use tracing::{debug, info};

use crate::checker::{SchemaChecker, install_checker};
use crate::error::{CheckError, CheckResult};
use crate::site::{CallSite, call_sites};

/// Verify every registered call site against the live schema.
pub async fn verify_call_sites() -> CheckResult<()> {
    let checker = Arc::new(SchemaChecker::new());
    let _guard = install_checker(checker.clone())?;
    verify_sites(&checker, call_sites()).await
}

/// Like [`verify_call_sites`], but each parameter position contributes only
/// its first representative value. Covers every site without walking the
/// combination space; useful as a fast smoke pass.
pub async fn verify_call_sites_first_only() -> CheckResult<()> {
    sqlprove::with_first_only(verify_call_sites()).await
}

pub(crate) async fn verify_sites(
    checker: &SchemaChecker,
    sites: impl Iterator<Item = &'static CallSite>,
) -> CheckResult<()> {
    for site in sites {
        if site.within_paging_helper {
            debug!(site = site.name, "skipping paging helper internals");
            continue;
        }
        let Some(invoke) = site.invoke else {
            return Err(CheckError::config(format!(
                "call site '{}' must be static-invokable",
                site.name
            )));
        };
        info!(site = site.name, "verifying call site");
        invoke()
            .await
            .map_err(|e| e.in_context(format!("call site '{}'", site.name)))?;
        // the invoke body drains after each combination; this catches
        // constructions made outside the loop
        checker
            .drain()
            .await
            .map_err(|e| e.in_context(format!("call site '{}'", site.name)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::{Operation, SiteFuture};

    fn ok_invoke() -> SiteFuture {
        Box::pin(async { Ok(()) })
    }

    fn failing_invoke() -> SiteFuture {
        Box::pin(async { Err(CheckError::config("boom")) })
    }

    const fn site(
        name: &'static str,
        within_paging_helper: bool,
        invoke: Option<fn() -> SiteFuture>,
    ) -> CallSite {
        CallSite {
            name,
            operation: Operation::TypedRead,
            within_paging_helper,
            invoke,
        }
    }

    #[tokio::test]
    async fn non_invokable_sites_are_an_error() {
        static SITES: [CallSite; 1] = [site("app::orphan", false, None)];
        let checker = SchemaChecker::new();
        let err = verify_sites(&checker, SITES.iter()).await.unwrap_err();
        assert!(err.to_string().contains("must be static-invokable"), "{err}");
        assert!(err.to_string().contains("app::orphan"), "{err}");
    }

    #[tokio::test]
    async fn paging_helpers_are_skipped_even_without_invoke() {
        static SITES: [CallSite; 2] = [
            site("app::page_clause", true, None),
            site("app::good", false, Some(ok_invoke)),
        ];
        let checker = SchemaChecker::new();
        verify_sites(&checker, SITES.iter()).await.unwrap();
    }

    #[tokio::test]
    async fn failures_name_the_call_site() {
        static SITES: [CallSite; 1] = [site("app::broken", false, Some(failing_invoke))];
        let checker = SchemaChecker::new();
        let err = verify_sites(&checker, SITES.iter()).await.unwrap_err();
        assert!(err.to_string().contains("call site 'app::broken'"), "{err}");
        assert!(matches!(err.root(), CheckError::Config(_)));
    }
}
