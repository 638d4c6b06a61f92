//! # sqlprove-verify
//!
//! The verification half of `sqlprove`: a test-path harness that proves every
//! registered query-building call site against a live database schema without
//! executing a single row-returning statement.
//!
//! The flow:
//!
//! 1. query-building functions register themselves with [`verify_site!`];
//! 2. [`verify_call_sites`] installs a [`SchemaChecker`] as the process-wide
//!    query hook and invokes each site over its parameter combination space;
//! 3. every constructed command lands in the checker's pending queue and is
//!    verified on drain: queries are prepared schema-only and their declared
//!    result shape compared against the observed columns; procedure calls
//!    have their parameters compared against `information_schema`.
//!
//! Failures carry the SQL, the `file:line` of the constructing call site, and
//! for shape mismatches a suggested declaration generated from the observed
//! columns.

pub mod checker;
pub mod error;
pub mod facts;
pub mod harness;
pub mod site;
pub mod suggest;

pub use checker::{
    CheckerGuard, QueryRecord, SchemaChecker, compare_proc_params, current_checker,
    drain_installed, install_checker,
};
pub use error::{CheckError, CheckResult};
pub use facts::{ProcParam, column_facts, derive_proc_params, sql_type_from_pg};
pub use harness::{verify_call_sites, verify_call_sites_first_only};
pub use site::{CallSite, Operation, SiteFuture, call_sites};
pub use suggest::suggested_declaration;

// re-exported for the expansion of `verify_site!`
pub use inventory;
pub use sqlprove;
