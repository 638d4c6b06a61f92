//! The schema checker.
//!
//! Installed as the process-wide query hook, the checker queues every
//! intercepted construction and verifies the queue when drained: queries are
//! prepared schema-only and their declared shape compared against the
//! observed columns; procedure commands have their supplied parameters
//! compared against the declared ones. Errors propagate with the query text
//! and the constructing call site attached; nothing is swallowed.

use std::panic::Location;
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;
use sqlprove::{
    Command, CommandKind, HookGuard, NonQueryIntercept, Param, QueryHook, QueryIntercept,
    ShapeCheck, install_hook, open, resolve_connection_string,
};
use tokio_postgres::Client;

use crate::error::{CheckError, CheckResult};
use crate::facts::{ProcParam, column_facts, derive_proc_params, sql_type_from_pg};
use crate::suggest::suggested_declaration;

/// One intercepted command, kept for downstream collaborators.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRecord {
    pub sql: String,
    pub connection_string: Option<String>,
    pub file: String,
    pub line: u32,
    pub result_type: Option<String>,
}

enum Pending {
    Query {
        command: Command,
        connection_string: Option<String>,
        location: &'static Location<'static>,
        shape: ShapeCheck,
    },
    NonQuery {
        command: Command,
        connection_string: Option<String>,
        location: &'static Location<'static>,
    },
}

/// Verifies intercepted commands against the live schema.
#[derive(Default)]
pub struct SchemaChecker {
    pending: Mutex<Vec<Pending>>,
    records: Mutex<Vec<QueryRecord>>,
}

impl QueryHook for SchemaChecker {
    fn on_query(&self, intercept: QueryIntercept) {
        self.records.lock().unwrap().push(QueryRecord {
            sql: intercept.command.text().to_string(),
            connection_string: intercept.connection_string.clone(),
            file: intercept.location.file().to_string(),
            line: intercept.location.line(),
            result_type: Some(intercept.shape.type_name.to_string()),
        });
        self.pending.lock().unwrap().push(Pending::Query {
            command: intercept.command,
            connection_string: intercept.connection_string,
            location: intercept.location,
            shape: intercept.shape,
        });
    }

    fn on_non_query(&self, intercept: NonQueryIntercept) {
        self.records.lock().unwrap().push(QueryRecord {
            sql: intercept.command.text().to_string(),
            connection_string: intercept.connection_string.clone(),
            file: intercept.location.file().to_string(),
            line: intercept.location.line(),
            result_type: None,
        });
        self.pending.lock().unwrap().push(Pending::NonQuery {
            command: intercept.command,
            connection_string: intercept.connection_string,
            location: intercept.location,
        });
    }
}

impl SchemaChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every command intercepted so far, in construction order.
    pub fn records(&self) -> Vec<QueryRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Number of intercepted commands awaiting verification.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Verify every queued command sequentially, emptying the queue.
    ///
    /// Verifying one command can queue more (builders introspect through the
    /// same seam), so the queue is re-checked until empty. The first failure
    /// aborts with the query context attached.
    pub async fn drain(&self) -> CheckResult<()> {
        loop {
            let batch = std::mem::take(&mut *self.pending.lock().unwrap());
            if batch.is_empty() {
                return Ok(());
            }
            for pending in batch {
                self.verify(pending).await?;
            }
        }
    }

    async fn verify(&self, pending: Pending) -> CheckResult<()> {
        match pending {
            Pending::Query {
                command,
                connection_string,
                location,
                shape,
            } => {
                let context = format!(
                    "check failed at {}:{} for {}\nsql: {}",
                    location.file(),
                    location.line(),
                    shape.type_name,
                    command.text()
                );
                verify_query(&command, connection_string.as_deref(), shape)
                    .await
                    .map_err(|e| e.in_context(context))
            }
            Pending::NonQuery {
                command,
                connection_string,
                location,
            } => {
                let context = format!(
                    "check failed at {}:{}\nsql: {}",
                    location.file(),
                    location.line(),
                    command.text()
                );
                verify_non_query(&command, connection_string.as_deref())
                    .await
                    .map_err(|e| e.in_context(context))
            }
        }
    }
}

async fn probe_client(connection_string: Option<&str>) -> CheckResult<Client> {
    let config = resolve_connection_string(connection_string)?;
    Ok(open(&config).await?)
}

async fn verify_query(
    command: &Command,
    connection_string: Option<&str>,
    shape: ShapeCheck,
) -> CheckResult<()> {
    let client = probe_client(connection_string).await?;
    // prepare describes the statement without executing it
    let statement = client.prepare(&command.positional_text()?).await?;
    let facts = column_facts(&client, statement.columns()).await?;
    (shape.check)(&facts)
        .map_err(|issue| CheckError::shape(&issue, Some(&suggested_declaration(&facts))))
}

async fn verify_non_query(command: &Command, connection_string: Option<&str>) -> CheckResult<()> {
    let client = probe_client(connection_string).await?;
    match command.kind() {
        CommandKind::Text => {
            client.prepare(&command.positional_text()?).await?;
            Ok(())
        }
        CommandKind::Procedure => {
            let declared = derive_proc_params(&client, command.text()).await?;
            compare_proc_params(command.text(), command.params(), &declared)
        }
    }
}

/// Compare supplied procedure parameters against the declared ones.
///
/// Every supplied parameter must match a declared one by name and type
/// (unbounded text is accepted against `character varying`), every declared
/// parameter must be supplied, and for textual parameters the sizes must
/// agree: `-1` on either side requires `-1` on the other, otherwise the
/// supplied size must cover the declared one.
pub fn compare_proc_params(
    procedure: &str,
    supplied: &[Param],
    declared: &[ProcParam],
) -> CheckResult<()> {
    for param in supplied {
        let name = param.name.to_lowercase();
        let Some(decl) = declared.iter().find(|d| d.name == name) else {
            return Err(CheckError::param_mismatch(format!(
                "procedure '{procedure}' has no parameter '{}'",
                param.name
            )));
        };
        let Some(declared_type) = sql_type_from_pg(&decl.data_type) else {
            return Err(CheckError::config(format!(
                "procedure '{procedure}' parameter '{name}' has unsupported type '{}'",
                decl.data_type
            )));
        };
        let supplied_type = param.value.sql_type();
        let accepted = supplied_type == declared_type
            || (supplied_type == sqlprove::SqlType::Text
                && declared_type == sqlprove::SqlType::Varchar);
        if !accepted {
            return Err(CheckError::param_mismatch(format!(
                "procedure '{procedure}' parameter '{name}' is declared {} but supplied {}",
                declared_type.name(),
                supplied_type.name()
            )));
        }
        if let Some(supplied_size) = param.value.size() {
            let ok = if decl.size == -1 || supplied_size == -1 {
                decl.size == supplied_size
            } else {
                supplied_size >= decl.size
            };
            if !ok {
                return Err(CheckError::param_mismatch(format!(
                    "procedure '{procedure}' parameter '{name}' is declared with size {} but supplied with size {supplied_size}",
                    decl.size
                )));
            }
        }
    }
    for decl in declared {
        if !decl.name.is_empty()
            && !supplied.iter().any(|p| p.name.to_lowercase() == decl.name)
        {
            return Err(CheckError::param_mismatch(format!(
                "procedure '{procedure}' parameter '{}' is not supplied",
                decl.name
            )));
        }
    }
    Ok(())
}

static CURRENT: RwLock<Option<Arc<SchemaChecker>>> = RwLock::new(None);

/// Uninstalls the checker (and the underlying query hook) on drop.
#[must_use]
pub struct CheckerGuard {
    _hook: HookGuard,
}

impl Drop for CheckerGuard {
    fn drop(&mut self) {
        *CURRENT.write().unwrap() = None;
    }
}

/// Install a checker as the process-wide query hook.
///
/// Fails if another hook is already active; verification passes must not
/// overlap.
pub fn install_checker(checker: Arc<SchemaChecker>) -> CheckResult<CheckerGuard> {
    let hook = install_hook(checker.clone())?;
    *CURRENT.write().unwrap() = Some(checker);
    Ok(CheckerGuard { _hook: hook })
}

/// The currently installed checker, if any.
pub fn current_checker() -> Option<Arc<SchemaChecker>> {
    CURRENT.read().unwrap().clone()
}

/// Drain the installed checker; a no-op when none is installed.
pub async fn drain_installed() -> CheckResult<()> {
    match current_checker() {
        Some(checker) => checker.drain().await,
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlprove::{PgValue, ToParam, Varchar};

    fn param(name: &str, value: PgValue) -> Param {
        Param {
            name: name.to_string(),
            value,
        }
    }

    fn declared(name: &str, data_type: &str, size: i32) -> ProcParam {
        ProcParam {
            name: name.to_string(),
            data_type: data_type.to_string(),
            size,
        }
    }

    #[test]
    fn matching_parameters_pass() {
        let supplied = vec![
            param("p_id", 1_i32.to_param()),
            param("p_text", Varchar::new("ab").to_param()),
        ];
        let decls = vec![
            declared("p_id", "integer", -1),
            declared("p_text", "character varying", 4000),
        ];
        assert!(compare_proc_params("set_post_text", &supplied, &decls).is_ok());
    }

    #[test]
    fn unknown_supplied_parameter_fails() {
        let supplied = vec![param("p_oops", 1_i32.to_param())];
        let decls = vec![declared("p_id", "integer", -1)];
        let err = compare_proc_params("p", &supplied, &decls).unwrap_err();
        assert!(matches!(err, CheckError::ParamMismatch(_)), "{err}");
    }

    #[test]
    fn missing_declared_parameter_fails() {
        let supplied = vec![param("p_id", 1_i32.to_param())];
        let decls = vec![
            declared("p_id", "integer", -1),
            declared("p_text", "text", -1),
        ];
        let err = compare_proc_params("p", &supplied, &decls).unwrap_err();
        assert!(err.to_string().contains("p_text"), "{err}");
    }

    #[test]
    fn wrong_type_fails() {
        let supplied = vec![param("p_id", true.to_param())];
        let decls = vec![declared("p_id", "integer", -1)];
        assert!(compare_proc_params("p", &supplied, &decls).is_err());
    }

    #[test]
    fn wide_text_is_accepted_against_varchar() {
        let supplied = vec![param("p_text", "ab".to_param())];
        let decls = vec![declared("p_text", "character varying", 10)];
        assert!(compare_proc_params("p", &supplied, &decls).is_ok());
    }

    #[test]
    fn undersized_text_fails() {
        let supplied = vec![param("p_text", PgValue::text_sized(Some("ab".into()), 5))];
        let decls = vec![declared("p_text", "character varying", 10)];
        let err = compare_proc_params("p", &supplied, &decls).unwrap_err();
        assert!(err.to_string().contains("size 10"), "{err}");
    }

    #[test]
    fn unbounded_must_match_unbounded() {
        // supplied -1 against a fixed declared size fails
        let supplied = vec![param("p_text", PgValue::text_unbounded(Some("ab".into())))];
        let decls = vec![declared("p_text", "character varying", 10)];
        assert!(compare_proc_params("p", &supplied, &decls).is_err());

        // declared -1 against a fixed supplied size fails
        let supplied = vec![param("p_text", PgValue::text_sized(Some("ab".into()), 4000))];
        let decls = vec![declared("p_text", "text", -1)];
        assert!(compare_proc_params("p", &supplied, &decls).is_err());

        // -1 on both sides passes
        let supplied = vec![param("p_text", PgValue::text_unbounded(Some("ab".into())))];
        let decls = vec![declared("p_text", "text", -1)];
        assert!(compare_proc_params("p", &supplied, &decls).is_ok());
    }

    #[test]
    fn oversized_supplied_text_passes() {
        let supplied = vec![param("p_text", PgValue::text_sized(Some("ab".into()), 100))];
        let decls = vec![declared("p_text", "character varying", 10)];
        assert!(compare_proc_params("p", &supplied, &decls).is_ok());
    }
}
