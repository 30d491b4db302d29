//! Database Test Utilities
//!
//! Starts PostgreSQL in a testcontainer, applies the workspace migrations, and
//! hands out pools and clocked outbox repositories for integration tests.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};
use tokio::sync::OnceCell;

use core_kernel::ManualClock;
use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresOutboxRepository};

const POSTGRES_IMAGE: &str = "postgres";
const POSTGRES_TAG: &str = "16-alpine";
const POSTGRES_USER: &str = "test_user";
const POSTGRES_PASSWORD: &str = "test_password";
const POSTGRES_DB: &str = "commerce_test";

pub type TestResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Connection settings for the test database
#[derive(Debug, Clone)]
pub struct TestDatabaseConfig {
    pub user: String,
    pub password: String,
    pub database: String,
    pub host: String,
    pub port: u16,
}

impl Default for TestDatabaseConfig {
    fn default() -> Self {
        Self {
            user: POSTGRES_USER.to_string(),
            password: POSTGRES_PASSWORD.to_string(),
            database: POSTGRES_DB.to_string(),
            host: "localhost".to_string(),
            port: 5432,
        }
    }
}

impl TestDatabaseConfig {
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

/// A migrated PostgreSQL instance running in a container
pub struct TestDatabase {
    _container: ContainerAsync<GenericImage>,
    pub config: TestDatabaseConfig,
    pub pool: PgPool,
}

impl TestDatabase {
    /// Starts a container and applies all migrations
    pub async fn new() -> TestResult<Self> {
        let container = GenericImage::new(POSTGRES_IMAGE, POSTGRES_TAG)
            .with_exposed_port(5432.tcp())
            .with_wait_for(WaitFor::message_on_stderr(
                "database system is ready to accept connections",
            ))
            .with_env_var("POSTGRES_USER", POSTGRES_USER)
            .with_env_var("POSTGRES_PASSWORD", POSTGRES_PASSWORD)
            .with_env_var("POSTGRES_DB", POSTGRES_DB)
            .start()
            .await?;

        let config = TestDatabaseConfig {
            host: container.get_host().await?.to_string(),
            port: container.get_host_port_ipv4(5432).await?,
            ..TestDatabaseConfig::default()
        };

        let pool = connect_with_retry(&config).await?;
        run_migrations(&pool).await?;

        Ok(Self {
            _container: container,
            config,
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Removes every envelope and resets the insertion sequence
    pub async fn clear_data(&self) -> TestResult<()> {
        sqlx::query("TRUNCATE TABLE outbox_events RESTART IDENTITY")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Empties the table and returns a repository driven by `clock`
    pub async fn fresh_repository(&self, clock: &ManualClock) -> TestResult<PostgresOutboxRepository> {
        self.clear_data().await?;
        Ok(PostgresOutboxRepository::with_clock(
            self.pool.clone(),
            Arc::new(clock.clone()),
        ))
    }
}

// The server restarts once after initdb, so the first "ready" line can come
// before it accepts connections.
async fn connect_with_retry(config: &TestDatabaseConfig) -> TestResult<PgPool> {
    let settings = DatabaseConfig::new(config.connection_url())
        .max_connections(16)
        .connect_timeout(Duration::from_secs(5))
        .application_name("test_utils");

    let mut attempts = 0;
    loop {
        match create_pool(settings.clone()).await {
            Ok(pool) => return Ok(pool),
            Err(_) if attempts < 10 => {
                attempts += 1;
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

static SHARED_TEST_DB: OnceCell<Arc<TestDatabase>> = OnceCell::const_new();

/// Returns a database shared by every test in the binary
pub async fn get_shared_test_database() -> TestResult<Arc<TestDatabase>> {
    SHARED_TEST_DB
        .get_or_try_init(|| async { TestDatabase::new().await.map(Arc::new) })
        .await
        .cloned()
}

/// Starts a database used by a single test only
pub async fn create_isolated_test_database() -> TestResult<TestDatabase> {
    TestDatabase::new().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_connection_url() {
        let url = TestDatabaseConfig::default().connection_url();

        assert!(url.starts_with("postgres://"));
        assert!(url.contains(POSTGRES_USER));
        assert!(url.contains(POSTGRES_DB));
    }
}
