//! Database Layer with Connection Pooling and Safe Transactions
//!
//! SQLite storage for metrics, tenant limits, usage and alerts:
//! - Connection pooling via r2d2 for concurrent access
//! - Panic-safe transactions with automatic rollback
//! - Version-stamped schema
//! - WAL mode for concurrent readers alongside a single writer

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use super::{MetricsStore, TenantStore};
use crate::constants::storage::CONNECTION_TIMEOUT_SECS;
use crate::cost::{AlertKey, AlertRecord, AlertSink, TenantLimits, UsageRow, WarningLimitType};
use crate::routing::{MetricsScope, Observation, ProviderKey, ProviderMetrics, record_outcome};
use crate::types::{
    BillingPeriod, GovernorError, Result, ResultExt, TenantId, log_filter_error,
};

/// Shared database handle for async contexts.
pub type SharedDatabase = Arc<Database>;

const SCHEMA: &str = include_str!("schema.sql");

/// Current schema version, stored in `user_version`
const SCHEMA_VERSION: u32 = 1;

const METRICS_COLUMNS: &str = "scope_kind, tenant_id, provider, model, ewma_latency_ms, \
     ewma_quality, ewma_cost_per_1k, ewma_success_rate, sample_count";

/// Connection pool configuration
///
/// Pool size is dynamically calculated based on CPU cores.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: u32,
    /// Minimum idle connections to keep ready
    pub min_idle: u32,
    /// Timeout for acquiring a connection (seconds)
    pub connection_timeout_secs: u64,
}

impl PoolConfig {
    const MIN_POOL_SIZE: u32 = 2;
    const MAX_POOL_SIZE: u32 = 16;

    /// Formula: clamp(cores, MIN, MAX)
    pub fn optimal_pool_size() -> u32 {
        let cores = std::thread::available_parallelism()
            .map(|p| p.get() as u32)
            .unwrap_or(4);
        cores.clamp(Self::MIN_POOL_SIZE, Self::MAX_POOL_SIZE)
    }

    pub fn auto() -> Self {
        let max_size = Self::optimal_pool_size();
        Self {
            max_size,
            min_idle: (max_size / 4).max(1),
            connection_timeout_secs: CONNECTION_TIMEOUT_SECS,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::auto()
    }
}

/// Thread-safe database with connection pooling.
///
/// Cloning is cheap: clones share the same pool.
#[derive(Clone)]
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open database with connection pooling at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, PoolConfig::default())
    }

    /// Open database with custom pool configuration.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: PoolConfig) -> Result<Self> {
        let manager =
            SqliteConnectionManager::file(path.as_ref()).with_init(Self::configure_connection);

        let pool = Pool::builder()
            .max_size(config.max_size)
            .min_idle(Some(config.min_idle))
            .connection_timeout(std::time::Duration::from_secs(
                config.connection_timeout_secs,
            ))
            .build(manager)
            .map_err(|e| {
                GovernorError::Storage(format!("Failed to create connection pool: {}", e))
            })?;

        Ok(Self { pool })
    }

    /// Open an in-memory database for testing or temporary use.
    ///
    /// Limited to one connection; every in-memory connection is its own database.
    pub fn open_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory();

        let pool = Pool::builder().max_size(1).build(manager).map_err(|e| {
            GovernorError::Storage(format!("Failed to create in-memory pool: {}", e))
        })?;

        Ok(Self { pool })
    }

    fn configure_connection(conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -16000;
            PRAGMA busy_timeout = 5000;
            PRAGMA wal_autocheckpoint = 1000;
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            GovernorError::Storage(format!("Failed to acquire database connection: {}", e))
        })
    }

    fn schema_version(conn: &Connection) -> u32 {
        conn.pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0)
    }

    /// Initialize database schema.
    ///
    /// Every statement in the schema is idempotent, so this is safe to call on
    /// each open. A database stamped with a newer version is refused.
    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        let existing = Self::schema_version(&conn);

        if existing > SCHEMA_VERSION {
            return Err(GovernorError::Storage(format!(
                "Database schema version {} is newer than supported version {}",
                existing, SCHEMA_VERSION
            )));
        }

        conn.execute_batch(SCHEMA)
            .with_context("Failed to initialize database schema")?;

        if existing < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)
                .with_context("Failed to set schema version")?;
        }

        Ok(())
    }

    /// Get a raw connection for advanced operations.
    pub fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.conn()
    }

    /// Execute a closure inside an immediate transaction.
    ///
    /// Commits on `Ok`, rolls back on `Err` or panic.
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + std::panic::UnwindSafe,
    {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .with_context("Failed to start transaction")?;

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(&tx)));

        match result {
            Ok(Ok(value)) => {
                tx.commit().with_context("Failed to commit transaction")?;
                Ok(value)
            }
            // Rolled back on drop
            Ok(Err(e)) => Err(e),
            Err(panic_payload) => {
                let panic_msg = panic_payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic_payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "Unknown panic".to_string());

                tracing::error!("Transaction panicked: {}", panic_msg);
                Err(GovernorError::Storage(format!(
                    "Transaction panicked: {}",
                    panic_msg
                )))
            }
        }
    }

    // =========================================================================
    // Metrics Rows
    // =========================================================================

    fn scope_params(scope: &MetricsScope) -> (&'static str, &str) {
        (
            scope.kind(),
            scope.tenant_id().map(TenantId::as_str).unwrap_or(""),
        )
    }

    fn map_metrics_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProviderMetrics> {
        let scope_kind: String = row.get(0)?;
        let tenant_id: String = row.get(1)?;
        let scope = match scope_kind.as_str() {
            "tenant" => MetricsScope::tenant(tenant_id),
            _ => MetricsScope::Global,
        };
        let sample_count: i64 = row.get(8)?;

        Ok(ProviderMetrics {
            scope,
            key: ProviderKey::new(row.get::<_, String>(2)?, row.get::<_, String>(3)?),
            ewma_latency_ms: row.get(4)?,
            ewma_quality: row.get(5)?,
            ewma_cost_per_1k: row.get(6)?,
            ewma_success_rate: row.get(7)?,
            sample_count: sample_count.max(0) as u64,
        })
    }

    fn read_metrics(
        conn: &Connection,
        scope: &MetricsScope,
        key: &ProviderKey,
    ) -> Result<Option<ProviderMetrics>> {
        let (kind, tenant) = Self::scope_params(scope);
        let sql = format!(
            "SELECT {} FROM provider_metrics
             WHERE scope_kind = ?1 AND tenant_id = ?2 AND provider = ?3 AND model = ?4",
            METRICS_COLUMNS
        );
        conn.query_row(
            &sql,
            params![kind, tenant, key.provider, key.model],
            Self::map_metrics_row,
        )
        .optional()
        .with_context_fn(|| format!("Failed to load metrics for {} {}", scope, key))
    }

    fn write_metrics(conn: &Connection, row: &ProviderMetrics) -> Result<()> {
        let (kind, tenant) = Self::scope_params(&row.scope);
        let sample_count = i64::try_from(row.sample_count).unwrap_or(i64::MAX);

        conn.execute(
            "INSERT INTO provider_metrics
             (scope_kind, tenant_id, provider, model, ewma_latency_ms, ewma_quality,
              ewma_cost_per_1k, ewma_success_rate, sample_count, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(scope_kind, tenant_id, provider, model) DO UPDATE SET
                ewma_latency_ms = excluded.ewma_latency_ms,
                ewma_quality = excluded.ewma_quality,
                ewma_cost_per_1k = excluded.ewma_cost_per_1k,
                ewma_success_rate = excluded.ewma_success_rate,
                sample_count = excluded.sample_count,
                updated_at = excluded.updated_at",
            params![
                kind,
                tenant,
                row.key.provider,
                row.key.model,
                row.ewma_latency_ms,
                row.ewma_quality,
                row.ewma_cost_per_1k,
                row.ewma_success_rate,
                sample_count,
                Utc::now().to_rfc3339(),
            ],
        )
        .with_context_fn(|| format!("Failed to store metrics for {} {}", row.scope, row.key))?;
        Ok(())
    }

    // =========================================================================
    // Alerts
    // =========================================================================

    fn insert_alert_blocking(&self, alert: &AlertRecord) -> Result<()> {
        // Raw rusqlite error is kept so constraint codes stay inspectable
        self.conn()?.execute(
            "INSERT INTO cost_alerts
             (id, tenant_id, period, feature_key, limit_type, percent, threshold, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                alert.id,
                alert.key.tenant_id.as_str(),
                alert.key.period.as_str(),
                alert.key.feature_key,
                alert.key.limit_type.as_str(),
                alert.percent,
                alert.threshold,
                alert.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Alerts raised for a tenant, oldest first. Unreadable rows are skipped.
    pub fn list_alerts(&self, tenant: &TenantId) -> Result<Vec<AlertRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, period, feature_key, limit_type, percent, threshold, created_at
                 FROM cost_alerts WHERE tenant_id = ?1 ORDER BY created_at, id",
            )
            .with_context("Failed to prepare alerts query")?;

        let alerts = stmt
            .query_map(params![tenant.as_str()], |row| {
                let limit_type: String = row.get(3)?;
                let created_at: String = row.get(6)?;
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    limit_type,
                    row.get::<_, f64>(4)?,
                    row.get::<_, f64>(5)?,
                    created_at,
                ))
            })?
            .filter_map(|r| log_filter_error(r, "reading alert row"))
            .filter_map(
                |(id, period, feature_key, limit_type, percent, threshold, created_at)| {
                    let limit_type = parse_limit_type(&limit_type)?;
                    let created_at = log_filter_error(
                        DateTime::parse_from_rfc3339(&created_at),
                        "parsing alert timestamp",
                    )?
                    .with_timezone(&Utc);
                    Some(AlertRecord {
                        id,
                        key: AlertKey {
                            tenant_id: tenant.clone(),
                            period: BillingPeriod::from_label(period),
                            feature_key,
                            limit_type,
                        },
                        percent,
                        threshold,
                        created_at,
                    })
                },
            )
            .collect();

        Ok(alerts)
    }
}

fn parse_limit_type(value: &str) -> Option<WarningLimitType> {
    match value {
        "token" => Some(WarningLimitType::Token),
        "cost" => Some(WarningLimitType::Cost),
        "both" => Some(WarningLimitType::Both),
        other => {
            tracing::debug!("Unknown alert limit type: {}", other);
            None
        }
    }
}

// =============================================================================
// Store Implementations
// =============================================================================

impl MetricsStore for Database {
    fn get_metrics(
        &self,
        scope: &MetricsScope,
        key: &ProviderKey,
    ) -> Result<Option<ProviderMetrics>> {
        let conn = self.conn()?;
        Self::read_metrics(&conn, scope, key)
    }

    fn load_metrics(
        &self,
        scope: &MetricsScope,
        keys: &[ProviderKey],
    ) -> Result<Vec<ProviderMetrics>> {
        let conn = self.conn()?;
        let mut rows = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(row) = Self::read_metrics(&conn, scope, key)? {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    fn upsert_metrics(&self, row: &ProviderMetrics) -> Result<()> {
        let conn = self.conn()?;
        Self::write_metrics(&conn, row)
    }

    fn list_metrics(&self, scope: Option<&MetricsScope>) -> Result<Vec<ProviderMetrics>> {
        let conn = self.conn()?;
        let order = "ORDER BY scope_kind, tenant_id, provider, model";

        let rows = match scope {
            Some(scope) => {
                let (kind, tenant) = Self::scope_params(scope);
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM provider_metrics WHERE scope_kind = ?1 AND tenant_id = ?2 {}",
                    METRICS_COLUMNS, order
                ))?;
                let rows = stmt
                    .query_map(params![kind, tenant], Self::map_metrics_row)?
                    .collect::<std::result::Result<Vec<_>, _>>();
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM provider_metrics {}",
                    METRICS_COLUMNS, order
                ))?;
                let rows = stmt
                    .query_map([], Self::map_metrics_row)?
                    .collect::<std::result::Result<Vec<_>, _>>();
                rows
            }
        };

        rows.with_context("Failed to list metrics")
    }

    fn apply_observation(
        &self,
        scope: &MetricsScope,
        key: &ProviderKey,
        observation: &Observation,
    ) -> Result<ProviderMetrics> {
        self.transaction(|conn| {
            let previous = Self::read_metrics(conn, scope, key)?;
            let updated =
                record_outcome(previous.as_ref(), scope.clone(), key.clone(), observation);
            Self::write_metrics(conn, &updated)?;
            Ok(updated)
        })
    }

    fn apply_observation_scopes(
        &self,
        scopes: &[MetricsScope],
        key: &ProviderKey,
        observation: &Observation,
    ) -> Result<Vec<ProviderMetrics>> {
        self.transaction(|conn| {
            let mut rows = Vec::with_capacity(scopes.len());
            for scope in scopes {
                let previous = Self::read_metrics(conn, scope, key)?;
                let updated =
                    record_outcome(previous.as_ref(), scope.clone(), key.clone(), observation);
                Self::write_metrics(conn, &updated)?;
                rows.push(updated);
            }
            Ok(rows)
        })
    }
}

impl TenantStore for Database {
    fn tenant_limits(&self, tenant: &TenantId) -> Result<Option<TenantLimits>> {
        self.conn()?
            .query_row(
                "SELECT monthly_token_limit, monthly_cost_limit, warning_threshold_percent
                 FROM tenant_limits WHERE tenant_id = ?1",
                params![tenant.as_str()],
                |row| {
                    Ok(TenantLimits {
                        monthly_token_limit: row.get(0)?,
                        monthly_cost_limit: row.get(1)?,
                        warning_threshold_percent: row.get(2)?,
                    })
                },
            )
            .optional()
            .with_context_fn(|| format!("Failed to load limits for tenant {}", tenant))
    }

    fn set_tenant_limits(&self, tenant: &TenantId, limits: &TenantLimits) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT INTO tenant_limits
                 (tenant_id, monthly_token_limit, monthly_cost_limit,
                  warning_threshold_percent, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(tenant_id) DO UPDATE SET
                    monthly_token_limit = excluded.monthly_token_limit,
                    monthly_cost_limit = excluded.monthly_cost_limit,
                    warning_threshold_percent = excluded.warning_threshold_percent,
                    updated_at = excluded.updated_at",
                params![
                    tenant.as_str(),
                    limits.monthly_token_limit,
                    limits.monthly_cost_limit,
                    limits.warning_threshold_percent,
                    Utc::now().to_rfc3339(),
                ],
            )
            .with_context_fn(|| format!("Failed to store limits for tenant {}", tenant))?;

        tracing::debug!("Stored limits for tenant {}", tenant);
        Ok(())
    }

    fn usage_rows(&self, tenant: &TenantId, period: &BillingPeriod) -> Result<Vec<UsageRow>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT tokens_used, provider, model FROM usage_events
                 WHERE tenant_id = ?1 AND period = ?2 ORDER BY id",
            )
            .with_context("Failed to prepare usage query")?;

        let rows = stmt
            .query_map(params![tenant.as_str(), period.as_str()], |row| {
                let tokens: i64 = row.get(0)?;
                Ok(UsageRow {
                    tokens_used: tokens.max(0) as u64,
                    provider: row.get(1)?,
                    model: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>();

        rows.with_context_fn(|| format!("Failed to load usage for tenant {} in {}", tenant, period))
    }

    fn append_usage(
        &self,
        tenant: &TenantId,
        period: &BillingPeriod,
        row: &UsageRow,
    ) -> Result<()> {
        let tokens = i64::try_from(row.tokens_used).unwrap_or(i64::MAX);
        self.conn()?
            .execute(
                "INSERT INTO usage_events (tenant_id, period, tokens_used, provider, model, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    tenant.as_str(),
                    period.as_str(),
                    tokens,
                    row.provider,
                    row.model,
                    Utc::now().to_rfc3339(),
                ],
            )
            .with_context_fn(|| format!("Failed to append usage for tenant {}", tenant))?;
        Ok(())
    }
}

#[async_trait]
impl AlertSink for Database {
    async fn insert_alert(&self, alert: &AlertRecord) -> Result<()> {
        let db = self.clone();
        let alert = alert.clone();
        tokio::task::spawn_blocking(move || db.insert_alert_blocking(&alert)).await?
    }
}
