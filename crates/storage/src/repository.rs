//! The canonical `patient_details` table.
//!
//! Runs on any sqlx `Any` backend: PostgreSQL in deployment, SQLite for
//! local runs and tests. Statements only use syntax both accept.

use sqlx::any::{install_default_drivers, AnyPoolOptions};
use sqlx::{Any, AnyPool, FromRow, Transaction};
use tracing::{debug, info, instrument, warn};

use patient_common::{Detail, PatientError, PatientResult};

/// Rows per multi-row INSERT; keeps bind parameters under SQLite's 999 limit.
const INSERT_BATCH_ROWS: usize = 200;

/// Database connection pool and `patient_details` operations.
#[derive(Clone)]
pub struct PatientRepository {
    pool: AnyPool,
}

/// Row counts from a completed replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceSummary {
    pub removed: u64,
    pub inserted: u64,
}

impl PatientRepository {
    /// Connect from a database URL (`postgres://...` or `sqlite:...`).
    pub async fn connect(database_url: &str) -> PatientResult<Self> {
        install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| PatientError::Database(format!("Connection failed: {}", e)))?;

        Ok(Self { pool })
    }

    /// A private in-memory SQLite database, for tests and local runs.
    ///
    /// Every SQLite in-memory connection is a separate database, so the pool
    /// holds exactly one connection and never recycles it.
    pub async fn in_memory() -> PatientResult<Self> {
        install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| PatientError::Database(format!("Connection failed: {}", e)))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Create the table and index if they do not exist yet.
    pub async fn ensure_schema(&self) -> PatientResult<()> {
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| PatientError::Database(format!("Schema setup failed: {}", e)))?;
            }
        }

        Ok(())
    }

    /// Cheap connectivity check.
    pub async fn ping(&self) -> PatientResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| PatientError::Database(format!("Ping failed: {}", e)))?;
        Ok(())
    }

    /// Records for `area` whose date lies in `[start_date, end_date]`.
    ///
    /// No match is an empty vec, not an error.
    #[instrument(skip(self))]
    pub async fn fetch_range(
        &self,
        area: &str,
        start_date: u32,
        end_date: u32,
    ) -> PatientResult<Vec<Detail>> {
        let rows = sqlx::query_as::<_, DetailRow>(
            "SELECT date, area, value, country FROM patient_details \
             WHERE area = $1 AND date BETWEEN $2 AND $3 \
             ORDER BY date",
        )
        .bind(area)
        .bind(i64::from(start_date))
        .bind(i64::from(end_date))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            PatientError::Query(format!(
                "area={}, start_date={}, end_date={}: {}",
                area, start_date, end_date, e
            ))
        })?;

        let details = rows
            .into_iter()
            .map(Detail::try_from)
            .collect::<PatientResult<Vec<_>>>()?;

        debug!(rows = details.len(), "Fetched patient details");
        Ok(details)
    }

    /// Total number of stored rows.
    pub async fn count(&self) -> PatientResult<u64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM patient_details")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PatientError::Query(format!("Count failed: {}", e)))?;

        Ok(count.max(0) as u64)
    }

    /// Replace the whole table with `records` in one transaction.
    ///
    /// Readers see either the previous generation or the new one. Any failure
    /// rolls the transaction back and leaves the previous generation intact.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub async fn replace_all(&self, records: &[Detail]) -> PatientResult<ReplaceSummary> {
        let mut tx = self.pool.begin().await.map_err(|e| replace_error("begin", e))?;

        match Self::replace_in(&mut tx, records).await {
            Ok(summary) => {
                tx.commit().await.map_err(|e| replace_error("commit", e))?;
                info!(
                    removed = summary.removed,
                    inserted = summary.inserted,
                    "Replaced patient details"
                );
                Ok(summary)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "Rollback failed; connection will discard the transaction");
                }
                Err(e)
            }
        }
    }

    async fn replace_in(
        tx: &mut Transaction<'_, Any>,
        records: &[Detail],
    ) -> PatientResult<ReplaceSummary> {
        // DELETE rather than TRUNCATE: it is transactional on every backend.
        let removed = sqlx::query("DELETE FROM patient_details")
            .execute(&mut **tx)
            .await
            .map_err(|e| replace_error("truncate", e))?
            .rows_affected();

        let mut inserted = 0u64;
        for batch in records.chunks(INSERT_BATCH_ROWS) {
            let sql = insert_statement(batch.len());
            let mut query = sqlx::query(&sql);
            for detail in batch {
                query = query
                    .bind(i64::from(detail.date))
                    .bind(detail.area.as_str())
                    .bind(i64::from(detail.value))
                    .bind(detail.country.as_str());
            }

            inserted += query
                .execute(&mut **tx)
                .await
                .map_err(|e| replace_error("insert", e))?
                .rows_affected();
        }

        Ok(ReplaceSummary { removed, inserted })
    }
}

fn replace_error(step: &'static str, err: sqlx::Error) -> PatientError {
    PatientError::Replace {
        step,
        message: err.to_string(),
    }
}

/// `INSERT ... VALUES ($1, $2, $3, $4), ($5, ...)` for `rows` rows.
fn insert_statement(rows: usize) -> String {
    let mut sql =
        String::from("INSERT INTO patient_details (date, area, value, country) VALUES ");
    for row in 0..rows {
        if row > 0 {
            sql.push_str(", ");
        }
        let base = row * 4;
        sql.push_str(&format!(
            "(${}, ${}, ${}, ${})",
            base + 1,
            base + 2,
            base + 3,
            base + 4
        ));
    }
    sql
}

/// Internal row type for database queries.
#[derive(FromRow)]
struct DetailRow {
    date: i64,
    area: String,
    value: i64,
    country: String,
}

impl TryFrom<DetailRow> for Detail {
    type Error = PatientError;

    fn try_from(row: DetailRow) -> PatientResult<Self> {
        let out_of_range = |column: &str, v: i64| {
            PatientError::Query(format!("{} out of range in stored row: {}", column, v))
        };

        Ok(Detail {
            date: u32::try_from(row.date).map_err(|_| out_of_range("date", row.date))?,
            area: row.area,
            value: u32::try_from(row.value).map_err(|_| out_of_range("value", row.value))?,
            country: row.country,
        })
    }
}

/// Database schema SQL. No primary key: uniqueness of (area, date) comes
/// from full-replace refreshes.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS patient_details (
    date BIGINT NOT NULL,
    area TEXT NOT NULL,
    value BIGINT NOT NULL,
    country TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_patient_details_area_date ON patient_details(area, date);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_statement_numbers_placeholders() {
        assert_eq!(
            insert_statement(2),
            "INSERT INTO patient_details (date, area, value, country) VALUES \
             ($1, $2, $3, $4), ($5, $6, $7, $8)"
        );
    }

    #[test]
    fn test_batch_stays_under_parameter_limit() {
        assert!(INSERT_BATCH_ROWS * 4 <= 999);
    }

    #[test]
    fn test_row_conversion_rejects_negative_values() {
        let row = DetailRow {
            date: 20230101,
            area: "北海道".into(),
            value: -1,
            country: "日本".into(),
        };
        assert!(matches!(Detail::try_from(row), Err(PatientError::Query(_))));
    }
}
