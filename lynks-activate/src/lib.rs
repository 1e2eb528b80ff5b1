//! User activation against the Lynks database.
//!
//! Activation flips `USER_PROFILE.ACTIVATED` to true for one username with a
//! single parameterized update. A username that matches no row is an outcome,
//! not an error.
//!
//! The task talks to the database through `sqlx`'s `Any` driver: Postgres in
//! production, any other installed driver (SQLite in tests) through the same
//! code path.
use lynks_common::{LynksError, Result};
use lynks_config::DatabaseSettings;
use sqlx::{AnyConnection, Connection};
use tracing::{debug, info, warn};
use url::Url;

/// The only statement this crate runs. `$1` is the username.
pub const ACTIVATE_USER_SQL: &str = "UPDATE USER_PROFILE SET ACTIVATED = TRUE WHERE USERNAME = $1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// `rows` records now carry `ACTIVATED = TRUE`.
    Activated { rows: u64 },
    /// No record has this username; nothing changed.
    NotFound,
}

/// Run the activation update on an open connection inside a transaction.
///
/// The transaction is committed before returning; on error it is dropped
/// and therefore rolled back.
pub async fn activate_user(conn: &mut AnyConnection, username: &str) -> Result<ActivationOutcome> {
    let mut tx = conn.begin().await.map_err(db_error("begin"))?;
    let res = sqlx::query(ACTIVATE_USER_SQL)
        .bind(username)
        .execute(&mut *tx)
        .await
        .map_err(db_error("update"))?;
    tx.commit().await.map_err(db_error("commit"))?;

    let rows = res.rows_affected();
    debug!(username = %username, rows, "activation.update");
    Ok(if rows == 0 {
        ActivationOutcome::NotFound
    } else {
        ActivationOutcome::Activated { rows }
    })
}

/// Postgres URL for `settings`. User, password and database name are
/// percent-encoded, so they may contain any character.
pub fn connection_url(settings: &DatabaseSettings) -> Result<Url> {
    let invalid = |what: &str| {
        LynksError::Configuration(format!("cannot use database {what} in a connection url"))
    };
    let mut url = Url::parse(&format!("postgres://{}:{}/", settings.host, settings.port))
        .map_err(|e| LynksError::Configuration(format!("invalid database address: {e}")))?;
    url.set_username(&settings.user)
        .map_err(|_| invalid("user"))?;
    url.set_password(Some(&settings.password))
        .map_err(|_| invalid("password"))?;
    url.path_segments_mut()
        .map_err(|_| invalid("name"))?
        .clear()
        .push(&settings.database);
    Ok(url)
}

/// One activation run: connect, update, commit, close.
#[derive(Debug, Clone)]
pub struct ActivationTask {
    url: Url,
}

impl ActivationTask {
    pub fn new(settings: &DatabaseSettings) -> Result<Self> {
        Ok(Self {
            url: connection_url(settings)?,
        })
    }

    /// Task against an explicit database URL (`sqlite::memory:` works too).
    pub fn from_url(url: Url) -> Self {
        Self { url }
    }

    /// Connect, activate `username` and release the connection on every path.
    pub async fn run(&self, username: &str) -> Result<ActivationOutcome> {
        sqlx::any::install_default_drivers();

        let mut conn = AnyConnection::connect(self.url.as_str())
            .await
            .map_err(|e| {
                warn!(target_db = %redacted(&self.url), error = %e, "activation.connect_failed");
                db_error("connect")(e)
            })?;
        info!(target_db = %redacted(&self.url), "activation.connected");

        let outcome = activate_user(&mut conn, username).await;
        if let Err(e) = conn.close().await {
            warn!(error = %e, "activation.close_failed");
        }

        match &outcome {
            Ok(ActivationOutcome::Activated { rows }) => {
                info!(username = %username, rows = *rows, "activation.activated")
            }
            Ok(ActivationOutcome::NotFound) => {
                info!(username = %username, "activation.not_found")
            }
            Err(e) => warn!(username = %username, error = %e, "activation.failed"),
        }
        outcome
    }
}

fn db_error(operation: &'static str) -> impl Fn(sqlx::Error) -> LynksError {
    move |source| LynksError::Database {
        operation,
        source: Box::new(source),
    }
}

/// The URL without credentials, for logs.
fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    let _ = shown.set_password(None);
    let _ = shown.set_username("");
    shown.to_string()
}
