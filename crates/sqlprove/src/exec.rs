//! Connection resolution.
//!
//! Connection strings come from an installed resolver function; queries may
//! carry a per-query override. There is no pooling: each execution opens a
//! connection and spawns its driver task.

use std::sync::{Arc, RwLock};

use tokio_postgres::{Client, NoTls};

use crate::error::{LiftError, LiftResult};

type ConnectionStringFn = dyn Fn() -> String + Send + Sync;

static RESOLVER: RwLock<Option<Arc<ConnectionStringFn>>> = RwLock::new(None);

/// Install the process-wide connection-string resolver.
pub fn set_connection_string_fn(f: impl Fn() -> String + Send + Sync + 'static) {
    *RESOLVER.write().unwrap() = Some(Arc::new(f));
}

/// Remove the installed resolver.
pub fn clear_connection_string_fn() {
    *RESOLVER.write().unwrap() = None;
}

/// The connection string for an execution: the override if given, otherwise
/// the installed resolver's answer. No resolver is a configuration error.
pub fn resolve_connection_string(override_: Option<&str>) -> LiftResult<String> {
    if let Some(config) = override_ {
        return Ok(config.to_string());
    }
    let resolver = RESOLVER.read().unwrap().clone();
    match resolver {
        Some(f) => Ok(f()),
        None => Err(LiftError::config(
            "no connection string resolver installed; call set_connection_string_fn",
        )),
    }
}

/// Open a connection and spawn its driver task.
pub async fn open(config: &str) -> LiftResult<Client> {
    let (client, connection) = tokio_postgres::connect(config, NoTls).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!(error = %e, "postgres connection task failed");
        }
    });
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_beats_resolver_and_absence_is_config_error() {
        // Not installed in this test binary unless set here.
        clear_connection_string_fn();
        assert!(resolve_connection_string(None).unwrap_err().is_config());
        assert_eq!(
            resolve_connection_string(Some("host=a")).unwrap(),
            "host=a"
        );

        set_connection_string_fn(|| "host=b".to_string());
        assert_eq!(resolve_connection_string(None).unwrap(), "host=b");
        assert_eq!(
            resolve_connection_string(Some("host=a")).unwrap(),
            "host=a"
        );
        clear_connection_string_fn();
    }
}
