//! Call-site registry.
//!
//! Every function that builds queries registers itself as a [`CallSite`],
//! collected process-wide with `inventory`. The [`verify_site!`] macro does
//! the registration for free functions and generates an invoke body that
//! walks the parameter combination space.

use std::future::Future;
use std::pin::Pin;

use crate::error::CheckResult;

/// What a call site does against the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    TypedRead,
    TypedReadList,
    InsertBySchema,
    UpdateBySchema,
    DeleteBySchema,
    RawNonQuery,
    PagedQueries,
}

pub type SiteFuture = Pin<Box<dyn Future<Output = CheckResult<()>> + Send>>;

/// A registered query-building function.
pub struct CallSite {
    pub name: &'static str,
    pub operation: Operation,
    /// Internal helper of a paged-query pair; verified through its callers.
    pub within_paging_helper: bool,
    /// Invokes the site over its full parameter combination space, draining
    /// the installed checker after each call. `None` means the site cannot be
    /// invoked statically, which the harness reports as an error.
    pub invoke: Option<fn() -> SiteFuture>,
}

inventory::collect!(CallSite);

/// Every call site registered in the process, in link order.
pub fn call_sites() -> impl Iterator<Item = &'static CallSite> {
    inventory::iter::<CallSite>.into_iter()
}

/// Register a free function as a verifiable call site.
///
/// The function's parameter types drive the enumeration: each must implement
/// `TestValues`, and the site is invoked once per combination with the
/// installed checker drained after each call. Async sites are awaited and
/// must return a `Result` whose error converts into [`CheckError`]; sync
/// sites return their query objects, which the checker has already seen at
/// construction.
///
/// ```ignore
/// verify_site!(TypedReadList, fn posts_by_year(year: i32, drafts: bool));
/// verify_site!(RawNonQuery, async fn purge_drafts(before: chrono::NaiveDateTime));
/// verify_site!(PagedQueries, in_paging fn page_clause(offset: i64, limit: i64));
/// ```
///
/// [`CheckError`]: crate::CheckError
#[macro_export]
macro_rules! verify_site {
    ($op:ident, fn $func:ident($($arg:ident: $ty:ty),* $(,)?)) => {
        $crate::verify_site!(@submit $op, false, $func, || {
            ::std::boxed::Box::pin(async {
                for tuple in <($($ty,)*) as $crate::sqlprove::ArgSet>::combinations()? {
                    let ($($arg,)*) = tuple;
                    let _ = $func($($arg),*);
                    $crate::drain_installed().await?;
                }
                Ok(())
            })
        });
    };
    ($op:ident, async fn $func:ident($($arg:ident: $ty:ty),* $(,)?)) => {
        $crate::verify_site!(@submit $op, false, $func, || {
            ::std::boxed::Box::pin(async {
                for tuple in <($($ty,)*) as $crate::sqlprove::ArgSet>::combinations()? {
                    let ($($arg,)*) = tuple;
                    let _ = $func($($arg),*).await?;
                    $crate::drain_installed().await?;
                }
                Ok(())
            })
        });
    };
    ($op:ident, in_paging fn $func:ident($($arg:ident: $ty:ty),* $(,)?)) => {
        $crate::verify_site!(@submit $op, true, $func, || {
            ::std::boxed::Box::pin(async {
                for tuple in <($($ty,)*) as $crate::sqlprove::ArgSet>::combinations()? {
                    let ($($arg,)*) = tuple;
                    let _ = $func($($arg),*);
                    $crate::drain_installed().await?;
                }
                Ok(())
            })
        });
    };
    ($op:ident, in_paging async fn $func:ident($($arg:ident: $ty:ty),* $(,)?)) => {
        $crate::verify_site!(@submit $op, true, $func, || {
            ::std::boxed::Box::pin(async {
                for tuple in <($($ty,)*) as $crate::sqlprove::ArgSet>::combinations()? {
                    let ($($arg,)*) = tuple;
                    let _ = $func($($arg),*).await?;
                    $crate::drain_installed().await?;
                }
                Ok(())
            })
        });
    };
    (@submit $op:ident, $paging:expr, $func:ident, $invoke:expr) => {
        $crate::inventory::submit! {
            $crate::CallSite {
                name: concat!(module_path!(), "::", stringify!($func)),
                operation: $crate::Operation::$op,
                within_paging_helper: $paging,
                invoke: Some($invoke),
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    static CALLS: AtomicUsize = AtomicUsize::new(0);

    fn counting_site(_flag: bool, _n: i32) {
        CALLS.fetch_add(1, Ordering::SeqCst);
    }

    crate::verify_site!(TypedReadList, fn counting_site(flag: bool, n: i32));

    fn helper_site(_n: i64) {}

    crate::verify_site!(PagedQueries, in_paging fn helper_site(n: i64));

    fn find(name_suffix: &str) -> &'static CallSite {
        call_sites()
            .find(|site| site.name.ends_with(name_suffix))
            .expect("site not registered")
    }

    #[tokio::test]
    async fn macro_registers_and_invokes_over_all_combinations() {
        let site = find("::counting_site");
        assert_eq!(site.operation, Operation::TypedReadList);
        assert!(!site.within_paging_helper);

        // bool contributes two values, i32 one; no checker is installed so
        // the drains are no-ops
        CALLS.store(0, Ordering::SeqCst);
        site.invoke.expect("invokable")().await.unwrap();
        assert_eq!(CALLS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn paging_helpers_carry_the_flag() {
        let site = find("::helper_site");
        assert!(site.within_paging_helper);
        assert_eq!(site.operation, Operation::PagedQueries);
    }
}
