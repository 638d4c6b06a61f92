//! SQL commands with named parameters.
//!
//! A [`Command`] is SQL text written with `@name` placeholders plus the
//! ordered values bound to those names. Text is appended incrementally, so
//! conditional fragments and their parameters travel together (see
//! [`Command::append_with`]). At execution the named placeholders are
//! rewritten to the driver's positional `$n` form.

use std::panic::Location;

use tokio_postgres::types::ToSql;

use crate::error::{LiftError, LiftResult};
use crate::param::{PgValue, ToParam};
use crate::query::{NonQuery, Query};
use crate::row::RowShape;

/// One bound parameter: a name and its value.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub value: PgValue,
}

/// How the command's text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Plain SQL text.
    Text,
    /// The text is a stored procedure name; parameters are its arguments.
    Procedure,
}

/// SQL text plus bound parameters.
#[derive(Debug, Clone)]
pub struct Command {
    kind: CommandKind,
    text: String,
    params: Vec<Param>,
}

impl Command {
    /// A text command starting from the given SQL.
    pub fn new(text: impl Into<String>) -> Self {
        Command {
            kind: CommandKind::Text,
            text: text.into(),
            params: Vec::new(),
        }
    }

    /// An empty text command, to be built up with [`Command::push_sql`].
    pub fn empty() -> Self {
        Command::new("")
    }

    /// A stored-procedure command.
    pub fn procedure(name: impl Into<String>) -> Self {
        Command {
            kind: CommandKind::Procedure,
            text: name.into(),
            params: Vec::new(),
        }
    }

    /// Append SQL text.
    pub fn push_sql(&mut self, sql: &str) -> &mut Self {
        self.text.push_str(sql);
        self
    }

    /// Bind one named parameter.
    pub fn add_param<T: ToParam + ?Sized>(&mut self, name: impl Into<String>, value: &T) -> &mut Self {
        self.params.push(Param {
            name: name.into(),
            value: value.to_param(),
        });
        self
    }

    /// Bind every field of a parameter record.
    pub fn bind(&mut self, params: &impl BindParams) -> &mut Self {
        params.bind(self);
        self
    }

    /// Append a SQL fragment together with the record that parameterizes it.
    pub fn append_with(&mut self, sql: &str, params: &impl BindParams) -> &mut Self {
        self.push_sql(sql);
        self.bind(params)
    }

    /// Replace the SQL text, keeping kind and bound parameters.
    ///
    /// Used by builders that bind a record first and generate the statement
    /// from what was bound.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Parameter refs compatible with `tokio-postgres`.
    pub fn param_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|p| &p.value as &(dyn ToSql + Sync))
            .collect()
    }

    /// The SQL text with every `@name` placeholder rewritten to its `$n`
    /// positional form.
    ///
    /// Single-quoted literals, double-quoted identifiers, and `--` comments
    /// are left untouched, as is any `@` not followed by an identifier (so
    /// operators like `@>` survive). Referencing an unbound name is a
    /// configuration error.
    pub fn positional_text(&self) -> LiftResult<String> {
        let mut out = String::with_capacity(self.text.len());
        let mut chars = self.text.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            match c {
                '\'' => {
                    out.push(c);
                    // skip literal; '' escapes a quote
                    while let Some((_, c)) = chars.next() {
                        out.push(c);
                        if c == '\'' {
                            if let Some(&(_, '\'')) = chars.peek() {
                                out.push('\'');
                                chars.next();
                            } else {
                                break;
                            }
                        }
                    }
                }
                '"' => {
                    out.push(c);
                    for (_, c) in chars.by_ref() {
                        out.push(c);
                        if c == '"' {
                            break;
                        }
                    }
                }
                '-' if matches!(chars.peek(), Some(&(_, '-'))) => {
                    out.push(c);
                    for (_, c) in chars.by_ref() {
                        out.push(c);
                        if c == '\n' {
                            break;
                        }
                    }
                }
                '@' if matches!(chars.peek(), Some(&(_, c)) if c.is_ascii_alphabetic() || c == '_') => {
                    let start = i + 1;
                    let mut end = start;
                    while let Some(&(j, c)) = chars.peek() {
                        if c.is_ascii_alphanumeric() || c == '_' {
                            end = j + c.len_utf8();
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    let name = &self.text[start..end];
                    let position = self
                        .params
                        .iter()
                        .position(|p| p.name == name)
                        .ok_or_else(|| {
                            LiftError::config(format!("parameter '@{name}' is not bound"))
                        })?;
                    out.push('$');
                    out.push_str(&(position + 1).to_string());
                }
                _ => out.push(c),
            }
        }
        Ok(out)
    }

    /// The `CALL` statement invoking a procedure command.
    pub fn call_text(&self) -> String {
        let args: Vec<String> = (1..=self.params.len()).map(|n| format!("${n}")).collect();
        format!("CALL {}({})", self.text, args.join(", "))
    }

    /// Promote this command to a typed query.
    #[track_caller]
    pub fn query<R: RowShape + 'static>(self) -> Query<R> {
        Query::located(self, None, Location::caller())
    }

    /// Promote this command to a typed query against a specific connection
    /// string.
    #[track_caller]
    pub fn query_on<R: RowShape + 'static>(self, connection_string: impl Into<String>) -> Query<R> {
        Query::located(self, Some(connection_string.into()), Location::caller())
    }

    /// Promote this command to a row-returning-free statement.
    #[track_caller]
    pub fn non_query(self) -> NonQuery {
        NonQuery::located(self, None, Location::caller())
    }

    /// Like [`Command::non_query`], against a specific connection string.
    #[track_caller]
    pub fn non_query_on(self, connection_string: impl Into<String>) -> NonQuery {
        NonQuery::located(self, Some(connection_string.into()), Location::caller())
    }
}

/// A record whose fields bind as named parameters.
///
/// Usually derived; each field becomes one `@field_name` parameter, and
/// `#[lift(flatten)]` splices a nested record's parameters in.
pub trait BindParams {
    fn bind(&self, command: &mut Command);
}

impl<T: BindParams> BindParams for crate::param::Bag<T> {
    fn bind(&self, command: &mut Command) {
        self.0.bind(command);
    }
}

impl<T: BindParams> BindParams for &T {
    fn bind(&self, command: &mut Command) {
        (*self).bind(command);
    }
}
