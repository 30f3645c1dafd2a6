//! Connection Manager: opens a validated session with retry and backoff.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::{PersistenceError, Result};
use crate::postgres::PgConnector;
use crate::retry::{RetryPolicy, retry};
use crate::session::{Connector, Session};

/// Builds [`ConnectionHandle`]s from an explicit configuration.
pub struct ConnectionManager {
    config: DatabaseConfig,
    policy: RetryPolicy,
    connector: Arc<dyn Connector>,
}

impl ConnectionManager {
    pub fn new(config: DatabaseConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            policy: RetryPolicy::default(),
            connector,
        }
    }

    /// Manager backed by `tokio-postgres`.
    pub fn postgres(config: DatabaseConfig) -> Self {
        Self::new(config, Arc::new(PgConnector))
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Opens a session and runs `SELECT 1` on it.
    ///
    /// Transient connection failures are retried per the policy; anything
    /// else, and the last transient failure once the budget is spent, is
    /// returned unchanged.
    pub async fn connect(&self) -> Result<ConnectionHandle> {
        let target = self.config.redacted_url();
        let connector = &self.connector;
        let config = &self.config;

        let session = retry(
            &self.policy,
            "connect",
            PersistenceError::is_retryable,
            |attempt| async move {
                tracing::debug!(attempt, "opening database session");
                let session = connector.open(config).await?;
                if let Err(err) = session.ping().await {
                    let _ = session.close().await;
                    return Err(err);
                }
                Ok(session)
            },
        )
        .await?;

        info!(target_url = %target, "database connection established");
        Ok(ConnectionHandle {
            session: Some(session),
        })
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("config", &self.config)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// An open session with explicit, idempotent close.
pub struct ConnectionHandle {
    session: Option<Box<dyn Session>>,
}

impl ConnectionHandle {
    /// A handle that was never opened.
    pub fn closed() -> Self {
        Self { session: None }
    }

    /// Wraps an already-validated session.
    pub fn from_session(session: Box<dyn Session>) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn session(&self) -> Result<&dyn Session> {
        self.session.as_deref().ok_or(PersistenceError::HandleClosed)
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Releases the session. Safe to call more than once.
    pub async fn close(&mut self) -> Result<()> {
        match self.session.take() {
            Some(session) => {
                session.close().await?;
                info!("database connection closed");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("open", &self.is_open())
            .finish()
    }
}

/// Connects to PostgreSQL with the default retry policy.
pub async fn connect(config: DatabaseConfig) -> Result<ConnectionHandle> {
    ConnectionManager::postgres(config).connect().await
}
