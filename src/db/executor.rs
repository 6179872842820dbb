//! Query execution.
//!
//! Every statement goes through `QueryExecutor`, which bounds how many
//! statements run at once and how long each may take. Row limits are applied
//! while fetching: the SQL text reaches the driver unchanged.

use crate::db::registry::ManagedConnection;
use crate::error::{DbError, DbResult};
use crate::models::{DEFAULT_QUERY_TIMEOUT_SECS, MAX_ROW_LIMIT, QueryParam, ResultRow};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Default number of statements allowed in flight at once.
pub const DEFAULT_MAX_CONCURRENT_QUERIES: usize = 4;

#[derive(Debug, Clone)]
pub struct QueryExecutor {
    query_timeout: Duration,
    max_row_limit: u64,
    permits: Arc<Semaphore>,
}

impl QueryExecutor {
    /// Create an executor with default settings.
    pub fn new() -> Self {
        Self::with_settings(
            Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            MAX_ROW_LIMIT,
            DEFAULT_MAX_CONCURRENT_QUERIES,
        )
    }

    /// Create an executor with custom settings.
    ///
    /// `max_row_limit` is capped at `MAX_ROW_LIMIT`; `max_concurrent` is at
    /// least one.
    pub fn with_settings(query_timeout: Duration, max_row_limit: u64, max_concurrent: usize) -> Self {
        Self {
            query_timeout,
            max_row_limit: max_row_limit.min(MAX_ROW_LIMIT),
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    pub fn max_row_limit(&self) -> u64 {
        self.max_row_limit
    }

    /// Resolve a caller's limit: the default when absent, capped at the
    /// maximum. Zero is honoured as zero.
    pub fn effective_limit(&self, requested: Option<u64>, default: u64) -> u64 {
        requested.unwrap_or(default).min(self.max_row_limit)
    }

    /// Run a read and return at most `limit` rows.
    pub async fn execute_read(
        &self,
        conn: &ManagedConnection,
        sql: &str,
        params: &[QueryParam],
        limit: u64,
    ) -> DbResult<Vec<ResultRow>> {
        let max_rows = usize::try_from(limit.min(self.max_row_limit)).unwrap_or(usize::MAX);
        let start = Instant::now();

        debug!(
            database = %conn.database(),
            sql = %sql,
            params = params.len(),
            limit = max_rows,
            "Executing query"
        );

        let raw = self
            .guarded("query execution", conn.handle().fetch(sql, params, max_rows))
            .await?;

        let mut rows = raw.into_result_rows();
        rows.truncate(max_rows);

        debug!(
            rows = rows.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query complete"
        );
        Ok(rows)
    }

    /// Run a write and commit it, returning the affected row count.
    pub async fn execute_write(
        &self,
        conn: &ManagedConnection,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<u64> {
        debug!(
            database = %conn.database(),
            sql = %sql,
            params = params.len(),
            "Executing write operation"
        );

        self.guarded("write operation", conn.handle().execute(sql, params))
            .await
    }

    /// Run `work` under a permit and the query timeout.
    pub async fn guarded<T, F>(&self, operation: &str, work: F) -> DbResult<T>
    where
        F: Future<Output = DbResult<T>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| DbError::internal("Query executor is shut down"))?;

        match timeout(self.query_timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    operation = %operation,
                    timeout_secs = self.query_timeout.as_secs(),
                    "Statement timed out"
                );
                Err(DbError::timeout(operation, self.query_timeout.as_secs()))
            }
        }
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_ROW_LIMIT;

    #[test]
    fn test_executor_defaults() {
        let executor = QueryExecutor::new();
        assert_eq!(
            executor.query_timeout(),
            Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS)
        );
        assert_eq!(executor.max_row_limit(), MAX_ROW_LIMIT);
    }

    #[test]
    fn test_executor_limit_capped() {
        let executor = QueryExecutor::with_settings(Duration::from_secs(5), 99999, 2);
        assert_eq!(executor.max_row_limit(), MAX_ROW_LIMIT);
    }

    #[test]
    fn test_effective_limit() {
        let executor = QueryExecutor::with_settings(Duration::from_secs(5), 500, 2);
        assert_eq!(executor.effective_limit(None, DEFAULT_ROW_LIMIT), 100);
        assert_eq!(executor.effective_limit(Some(7), DEFAULT_ROW_LIMIT), 7);
        assert_eq!(executor.effective_limit(Some(0), DEFAULT_ROW_LIMIT), 0);
        assert_eq!(executor.effective_limit(Some(100_000), DEFAULT_ROW_LIMIT), 500);
    }

    #[tokio::test]
    async fn test_guarded_times_out() {
        let executor = QueryExecutor::with_settings(Duration::from_millis(20), 10, 1);
        let result: DbResult<()> = executor
            .guarded("query execution", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        let err = result.unwrap_err();
        assert!(matches!(err, DbError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_guarded_limits_concurrency() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let executor = Arc::new(QueryExecutor::with_settings(Duration::from_secs(5), 10, 2));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let executor = Arc::clone(&executor);
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    executor
                        .guarded("query execution", async {
                            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            running.fetch_sub(1, Ordering::SeqCst);
                            Ok(())
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
