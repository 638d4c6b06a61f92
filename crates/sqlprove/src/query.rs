//! Typed queries, non-queries, and the checker interception seam.
//!
//! Constructing a [`Query`] or [`NonQuery`] notifies the installed
//! [`QueryHook`], handing it the command, the construction call site, and a
//! shape-check function for the declared result type. While a hook is
//! installed the read operations short-circuit with empty defaults; the
//! verification pass owns all database access. Verification-oriented call
//! sites should therefore return the query objects they build rather than
//! row values.

use std::marker::PhantomData;
use std::panic::Location;
use std::sync::{Arc, RwLock};

use crate::command::{Command, CommandKind};
use crate::error::{LiftError, LiftResult};
use crate::exec::{open, resolve_connection_string};
use crate::materialize::{plan_for, read_rows};
use crate::row::{ColumnFact, RowShape, ShapeIssue};

/// A monomorphized shape check for one result type.
#[derive(Clone, Copy)]
pub struct ShapeCheck {
    pub type_name: &'static str,
    pub check: fn(&[ColumnFact]) -> Result<(), ShapeIssue>,
}

/// Everything a hook learns when a query is constructed.
pub struct QueryIntercept {
    pub command: Command,
    pub connection_string: Option<String>,
    pub location: &'static Location<'static>,
    pub shape: ShapeCheck,
}

/// Everything a hook learns when a non-query is constructed.
pub struct NonQueryIntercept {
    pub command: Command,
    pub connection_string: Option<String>,
    pub location: &'static Location<'static>,
}

/// Observer of query construction.
pub trait QueryHook: Send + Sync {
    fn on_query(&self, intercept: QueryIntercept);

    fn on_non_query(&self, intercept: NonQueryIntercept);
}

static HOOK: RwLock<Option<Arc<dyn QueryHook>>> = RwLock::new(None);

/// Install a hook for the lifetime of the returned guard.
///
/// The slot is process-wide and exclusive: installing while another hook is
/// active is an error, so concurrent verification passes cannot observe each
/// other's queries.
pub fn install_hook(hook: Arc<dyn QueryHook>) -> LiftResult<HookGuard> {
    let mut slot = HOOK.write().unwrap();
    if slot.is_some() {
        return Err(LiftError::config("a query hook is already installed"));
    }
    *slot = Some(hook);
    Ok(HookGuard(()))
}

/// Whether a hook is currently installed.
pub fn hook_installed() -> bool {
    HOOK.read().unwrap().is_some()
}

pub(crate) fn installed_hook() -> Option<Arc<dyn QueryHook>> {
    HOOK.read().unwrap().clone()
}

/// Uninstalls the hook on drop.
#[must_use]
#[derive(Debug)]
pub struct HookGuard(());

impl Drop for HookGuard {
    fn drop(&mut self) {
        *HOOK.write().unwrap() = None;
    }
}

/// A command with a declared result shape.
#[must_use]
pub struct Query<R: RowShape> {
    command: Command,
    connection_string: Option<String>,
    location: &'static Location<'static>,
    _shape: PhantomData<fn() -> R>,
}

impl<R: RowShape + 'static> Query<R> {
    /// Construct at an explicit call site, notifying the installed hook.
    ///
    /// Prefer [`Command::query`]; this is for builders that capture their own
    /// caller location.
    pub fn located(
        command: Command,
        connection_string: Option<String>,
        location: &'static Location<'static>,
    ) -> Self {
        let query = Query {
            command,
            connection_string,
            location,
            _shape: PhantomData,
        };
        if let Some(hook) = installed_hook() {
            hook.on_query(QueryIntercept {
                command: query.command.clone(),
                connection_string: query.connection_string.clone(),
                location,
                shape: ShapeCheck {
                    type_name: std::any::type_name::<R>(),
                    check: R::check_columns,
                },
            });
        }
        query
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn connection_string(&self) -> Option<&str> {
        self.connection_string.as_deref()
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Execute and materialize every row.
    pub async fn read_all(&self) -> LiftResult<Vec<R>> {
        if hook_installed() {
            return Ok(Vec::new());
        }
        let config = resolve_connection_string(self.connection_string.as_deref())?;
        let client = open(&config).await?;
        let statement = client.prepare(&self.command.positional_text()?).await?;
        let plan = plan_for::<R>(&statement)?;
        let rows = client.query(&statement, &self.command.param_refs()).await?;
        read_rows(&rows, &plan)
    }

    /// Execute and materialize at most one row.
    pub async fn read_opt(&self) -> LiftResult<Option<R>> {
        let mut rows = self.read_all().await?;
        match rows.len() {
            0 | 1 => Ok(rows.pop()),
            n => Err(LiftError::RowCount(n)),
        }
    }

    /// Execute and materialize exactly one row.
    pub async fn read_one(&self) -> LiftResult<R> {
        self.read_opt()
            .await?
            .ok_or_else(|| LiftError::not_found("query returned no rows"))
    }
}

/// A command executed for its effect.
#[must_use]
pub struct NonQuery {
    command: Command,
    connection_string: Option<String>,
    location: &'static Location<'static>,
}

impl NonQuery {
    /// Construct at an explicit call site, notifying the installed hook.
    pub fn located(
        command: Command,
        connection_string: Option<String>,
        location: &'static Location<'static>,
    ) -> Self {
        let non_query = NonQuery {
            command,
            connection_string,
            location,
        };
        if let Some(hook) = installed_hook() {
            hook.on_non_query(NonQueryIntercept {
                command: non_query.command.clone(),
                connection_string: non_query.connection_string.clone(),
                location,
            });
        }
        non_query
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn connection_string(&self) -> Option<&str> {
        self.connection_string.as_deref()
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Execute and return the affected-row count.
    pub async fn execute(&self) -> LiftResult<u64> {
        if hook_installed() {
            return Ok(0);
        }
        let config = resolve_connection_string(self.connection_string.as_deref())?;
        let client = open(&config).await?;
        let text = match self.command.kind() {
            CommandKind::Text => self.command.positional_text()?,
            CommandKind::Procedure => self.command.call_text(),
        };
        let count = client.execute(&text, &self.command.param_refs()).await?;
        Ok(count)
    }
}
