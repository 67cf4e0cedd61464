mod decode;
pub(crate) mod pool;
pub(crate) mod procedure;
pub(crate) mod types;

use std::time::Instant;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{ConnectOptions, PgPool, Postgres, Transaction};

use crate::core::config::DatabaseSettings;
use crate::core::metrics;
pub(crate) use pool::PoolSlot;
pub(crate) use procedure::{
    GatewayError, ProcedureCall, ProcedureResult, Row, SqlType, SqlValue,
};

/// The single channel to persisted state: named routines with typed
/// parameters. Handlers depend on this seam, not on a concrete pool.
#[async_trait]
pub(crate) trait ProcedureExecutor: Send + Sync {
    async fn execute(&self, call: ProcedureCall) -> Result<ProcedureResult, GatewayError>;

    /// Obtains the pool (creating it if needed) and round-trips a trivial query.
    async fn check_connection(&self) -> Result<(), GatewayError>;

    /// Releases the pool. Idempotent.
    async fn close(&self);
}

pub(crate) struct ProcedureGateway {
    settings: DatabaseSettings,
    slot: PoolSlot<PgPool>,
}

impl ProcedureGateway {
    pub(crate) fn new(settings: DatabaseSettings) -> Self {
        Self { settings, slot: PoolSlot::new() }
    }

    async fn lease(&self) -> Result<pool::PoolLease<PgPool>, GatewayError> {
        self.slot.get_or_connect(|| connect(&self.settings)).await.map_err(|err| {
            tracing::error!(error = %err, "Failed to establish database pool");
            GatewayError::Connection(err)
        })
    }

    async fn run(&self, call: &ProcedureCall) -> Result<ProcedureResult, GatewayError> {
        let lease = self.lease().await?;
        let outcome = run_in_transaction(&lease.pool, call).await;

        if let Err(err) = &outcome {
            if err.is_connection_failure() {
                self.slot.invalidate(lease.generation).await;
            }
        }
        outcome
    }
}

#[async_trait]
impl ProcedureExecutor for ProcedureGateway {
    async fn execute(&self, call: ProcedureCall) -> Result<ProcedureResult, GatewayError> {
        call.validate()?;

        let started = Instant::now();
        let timeout = self.settings.request_timeout;
        let outcome = tokio::time::timeout(timeout, self.run(&call))
            .await
            .unwrap_or(Err(GatewayError::Timeout(timeout)));
        let elapsed = started.elapsed();

        match &outcome {
            Ok(result) => {
                tracing::debug!(
                    procedure = call.name(),
                    result_sets = result.record_sets.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Procedure executed"
                );
                metrics::record_procedure(call.name(), "ok", elapsed);
            }
            Err(err) => {
                tracing::error!(
                    procedure = call.name(),
                    error = %err,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Procedure failed"
                );
                metrics::record_procedure(call.name(), err.metric_label(), elapsed);
            }
        }

        outcome
    }

    async fn check_connection(&self) -> Result<(), GatewayError> {
        let lease = self.lease().await?;
        if let Err(err) = sqlx::query("SELECT 1").execute(&lease.pool).await {
            let err = GatewayError::from_sqlx("health_check", err);
            if err.is_connection_failure() {
                self.slot.invalidate(lease.generation).await;
            }
            return Err(err);
        }
        Ok(())
    }

    async fn close(&self) {
        if !self.slot.close().await {
            tracing::debug!("No database pool to close");
        }
    }
}

async fn connect(settings: &DatabaseSettings) -> Result<PgPool, sqlx::Error> {
    let mut connect_options: PgConnectOptions = settings.database_url().parse()?;

    if settings.database_url.is_none() {
        connect_options = connect_options.ssl_mode(ssl_mode(settings));
    }

    connect_options = connect_options
        .application_name("exam-portal")
        .log_statements(tracing::log::LevelFilter::Off);

    PgPoolOptions::new()
        .max_connections(settings.pool_max)
        .min_connections(settings.pool_min)
        .acquire_timeout(settings.connection_timeout)
        .idle_timeout(settings.idle_timeout)
        .test_before_acquire(true)
        .connect_with(connect_options)
        .await
}

fn ssl_mode(settings: &DatabaseSettings) -> PgSslMode {
    match (settings.encrypt, settings.trust_server_certificate) {
        (false, _) => PgSslMode::Prefer,
        (true, true) => PgSslMode::Require,
        (true, false) => PgSslMode::VerifyFull,
    }
}

async fn run_in_transaction(
    pool: &PgPool,
    call: &ProcedureCall,
) -> Result<ProcedureResult, GatewayError> {
    let map_err = |err| GatewayError::from_sqlx(call.name(), err);

    let mut tx = pool.begin().await.map_err(map_err)?;
    let record_sets = fetch_record_sets(&mut tx, call).await.map_err(map_err)?;
    tx.commit().await.map_err(map_err)?;

    let mut output = Row::default();
    if let Some(first) = record_sets.first().and_then(|rows| rows.first()) {
        for param in call.outputs() {
            let value = first.get(&param.name).cloned().unwrap_or(serde_json::Value::Null);
            output.insert(param.name.clone(), value);
        }
    }

    Ok(ProcedureResult { record_sets, output })
}

async fn fetch_record_sets(
    tx: &mut Transaction<'_, Postgres>,
    call: &ProcedureCall,
) -> Result<Vec<Vec<Row>>, sqlx::Error> {
    let statement = call.statement();
    let mut query = sqlx::query(&statement);
    for param in call.inputs() {
        query = match (&param.value, param.sql_type) {
            (SqlValue::Int(value), _) => query.bind(*value),
            (SqlValue::Text(value), _) => query.bind(value.clone()),
            (SqlValue::Date(value), _) => query.bind(*value),
            (SqlValue::Null, SqlType::Int) => query.bind(None::<i32>),
            (SqlValue::Null, SqlType::Date) => query.bind(None::<time::Date>),
            (SqlValue::Null, SqlType::VarChar(_) | SqlType::Text) => query.bind(None::<String>),
        };
    }

    let rows = query.fetch_all(&mut **tx).await?;

    let Some(cursors) = decode::cursor_names(&rows)? else {
        return Ok(vec![decode::decode_rows(&rows)?]);
    };

    let mut record_sets = Vec::with_capacity(cursors.len());
    for cursor in cursors {
        let fetch = format!("FETCH ALL FROM \"{}\"", cursor.replace('"', "\"\""));
        let fetched = sqlx::query(&fetch).fetch_all(&mut **tx).await?;
        record_sets.push(decode::decode_rows(&fetched)?);
    }
    Ok(record_sets)
}
