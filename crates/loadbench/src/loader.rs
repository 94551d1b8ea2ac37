//! Transactional batch persistence
//!
//! [`BatchLoader`] is the seam between the run loop and the database. The
//! production implementation, [`SqlLoader`], talks to Postgres, MySQL or
//! SQLite through one `sqlx` connection and commits every batch in its own
//! transaction: either all rows of a batch land or the run fails.

use crate::error::{LoadError, Result};
use crate::record::{ColumnValue, ParseMode, RawRecord, TypedRecord, PRODUCT_COLUMNS};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::any::AnyArguments;
use sqlx::query::Query;
use sqlx::{Any, AnyConnection, Connection};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Upper bound on rows per multi-row `INSERT` statement
pub const MULTI_ROW_CHUNK: usize = 500;

/// Persists one batch atomically
#[async_trait]
pub trait BatchLoader: Send {
    /// Insert `batch` inside a single transaction and commit it
    ///
    /// `first_row` is the 1-based file position of `batch[0]`, used when a
    /// row has to be reported. Returns the number of rows committed.
    async fn load(&mut self, batch: &[RawRecord], first_row: usize) -> Result<u64>;
}

/// SQL flavour, derived from the connection URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    pub fn from_url(url: &str) -> Result<Self> {
        let scheme = url.split(':').next().unwrap_or_default().to_lowercase();
        match scheme.as_str() {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "sqlite" => Ok(Dialect::Sqlite),
            _ => Err(LoadError::Config(format!(
                "Unsupported database URL scheme '{scheme}'; expected postgres, mysql or sqlite"
            ))),
        }
    }

    /// Display name used in result records
    pub fn label(self) -> &'static str {
        match self {
            Dialect::Postgres => "PostgreSQL",
            Dialect::MySql => "MySQL",
            Dialect::Sqlite => "SQLite",
        }
    }

    /// Identifier as written into SQL
    ///
    /// Postgres identifiers stay unquoted so they fold to lowercase and match
    /// tables created without quotes. MySQL and SQLite compare column names
    /// case-insensitively even when quoted.
    pub fn quote(self, ident: &str) -> String {
        match self {
            Dialect::MySql => format!("`{ident}`"),
            Dialect::Sqlite => format!("\"{ident}\""),
            Dialect::Postgres => ident.to_string(),
        }
    }

    /// Placeholder for the `n`th (1-based) bound parameter
    fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${n}"),
            Dialect::MySql | Dialect::Sqlite => "?".to_string(),
        }
    }

    pub fn truncate_sql(self, table: &str) -> String {
        match self {
            // SQLite has no TRUNCATE
            Dialect::Sqlite => format!("DELETE FROM {}", self.quote(table)),
            Dialect::Postgres | Dialect::MySql => format!("TRUNCATE TABLE {}", self.quote(table)),
        }
    }

    /// `INSERT` statement covering `rows` product rows
    pub fn insert_sql(self, table: &str, rows: usize) -> String {
        let columns = PRODUCT_COLUMNS
            .iter()
            .map(|c| self.quote(c))
            .collect::<Vec<_>>()
            .join(", ");

        let width = PRODUCT_COLUMNS.len();
        let tuples = (0..rows)
            .map(|row| {
                let params = (1..=width)
                    .map(|col| self.placeholder(row * width + col))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({params})")
            })
            .collect::<Vec<_>>()
            .join(", ");

        format!("INSERT INTO {} ({columns}) VALUES {tuples}", self.quote(table))
    }
}

/// How rows are turned into statements inside a batch transaction
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum InsertMode {
    /// One parameterized `INSERT` per row
    #[default]
    PerRow,
    /// Multi-row `VALUES` lists of up to [`MULTI_ROW_CHUNK`] rows
    MultiRow,
}

impl std::str::FromStr for InsertMode {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "per-row" | "row" => Ok(InsertMode::PerRow),
            "multi-row" | "multi" => Ok(InsertMode::MultiRow),
            _ => Err(LoadError::Config(format!("Invalid insert mode: {s}"))),
        }
    }
}

impl std::fmt::Display for InsertMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InsertMode::PerRow => write!(f, "per-row"),
            InsertMode::MultiRow => write!(f, "multi-row"),
        }
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass
pub fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        },
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(LoadError::Config(format!(
            "Invalid table name '{table}': use letters, digits and '_' only"
        )))
    }
}

/// [`BatchLoader`] over a single `sqlx` connection
pub struct SqlLoader {
    conn: AnyConnection,
    dialect: Dialect,
    table: String,
    insert_mode: InsertMode,
    parse_mode: ParseMode,
    commit_timeout: Option<Duration>,
    row_sql: String,
    chunk_sql: String,
}

impl SqlLoader {
    /// Open one connection to `url` targeting `table`
    pub async fn connect(url: &str, table: &str) -> Result<Self> {
        let dialect = Dialect::from_url(url)?;
        validate_table_name(table)?;

        sqlx::any::install_default_drivers();
        let conn = AnyConnection::connect(url).await?;
        info!(?dialect, table, "Connected to database");

        Self::from_connection(conn, dialect, table)
    }

    /// Wrap an already-open connection
    pub fn from_connection(conn: AnyConnection, dialect: Dialect, table: &str) -> Result<Self> {
        validate_table_name(table)?;

        Ok(Self {
            conn,
            dialect,
            table: table.to_string(),
            insert_mode: InsertMode::default(),
            parse_mode: ParseMode::default(),
            commit_timeout: None,
            row_sql: dialect.insert_sql(table, 1),
            chunk_sql: dialect.insert_sql(table, MULTI_ROW_CHUNK),
        })
    }

    pub fn with_insert_mode(mut self, mode: InsertMode) -> Self {
        self.insert_mode = mode;
        self
    }

    pub fn with_parse_mode(mut self, mode: ParseMode) -> Self {
        self.parse_mode = mode;
        self
    }

    /// Deadline for one batch, from `BEGIN` through `COMMIT`
    pub fn with_commit_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.commit_timeout = timeout;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Empty the target table before a run
    pub async fn truncate(&mut self) -> Result<()> {
        let sql = self.dialect.truncate_sql(&self.table);
        sqlx::query(&sql).execute(&mut self.conn).await?;
        info!(table = %self.table, "Truncated target table");
        Ok(())
    }

    /// Rows currently in the target table
    pub async fn row_count(&mut self) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.dialect.quote(&self.table));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&mut self.conn).await?;
        Ok(count.max(0) as u64)
    }

    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }

    async fn persist(&mut self, batch: &[RawRecord], first_row: usize) -> Result<u64> {
        let mut tx = self.conn.begin().await?;

        match self.insert_mode {
            InsertMode::PerRow => {
                for (offset, raw) in batch.iter().enumerate() {
                    let record = TypedRecord::parse(raw, first_row + offset, self.parse_mode)?;
                    bind_record(sqlx::query(&self.row_sql), &record)
                        .execute(&mut *tx)
                        .await?;
                }
            },
            InsertMode::MultiRow => {
                for (chunk_index, chunk) in batch.chunks(MULTI_ROW_CHUNK).enumerate() {
                    let chunk_first = first_row + chunk_index * MULTI_ROW_CHUNK;
                    let records = chunk
                        .iter()
                        .enumerate()
                        .map(|(offset, raw)| {
                            TypedRecord::parse(raw, chunk_first + offset, self.parse_mode)
                        })
                        .collect::<Result<Vec<_>>>()?;

                    let tail_sql;
                    let sql = if chunk.len() == MULTI_ROW_CHUNK {
                        &self.chunk_sql
                    } else {
                        tail_sql = self.dialect.insert_sql(&self.table, chunk.len());
                        &tail_sql
                    };

                    let mut query = sqlx::query(sql);
                    for record in &records {
                        query = bind_record(query, record);
                    }
                    query.execute(&mut *tx).await?;
                }
            },
        }

        tx.commit().await?;
        Ok(batch.len() as u64)
    }
}

#[async_trait]
impl BatchLoader for SqlLoader {
    #[instrument(level = "debug", skip_all, fields(rows = batch.len(), first_row = first_row))]
    async fn load(&mut self, batch: &[RawRecord], first_row: usize) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        let committed = match self.commit_timeout {
            Some(deadline) => tokio::time::timeout(deadline, self.persist(batch, first_row))
                .await
                .map_err(|_| LoadError::Timeout {
                    secs: deadline.as_secs(),
                })??,
            None => self.persist(batch, first_row).await?,
        };

        debug!(committed, "Batch committed");
        Ok(committed)
    }
}

fn bind_record<'q>(
    mut query: Query<'q, Any, AnyArguments<'q>>,
    record: &TypedRecord<'q>,
) -> Query<'q, Any, AnyArguments<'q>> {
    for value in record.values() {
        query = match value {
            ColumnValue::Text(text) => query.bind(text),
            ColumnValue::Float(number) => query.bind(number),
            ColumnValue::Int(number) => query.bind(number),
        };
    }
    query
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_from_url() {
        assert_eq!(
            Dialect::from_url("mysql://root:@localhost:3306/benchmark").unwrap(),
            Dialect::MySql
        );
        assert_eq!(
            Dialect::from_url("postgresql://localhost/bench").unwrap(),
            Dialect::Postgres
        );
        assert_eq!(Dialect::from_url("sqlite::memory:").unwrap(), Dialect::Sqlite);
        assert!(Dialect::from_url("mssql://localhost").is_err());
    }

    #[test]
    fn test_insert_sql_placeholders() {
        let mysql = Dialect::MySql.insert_sql("products", 1);
        assert!(mysql.starts_with("INSERT INTO `products` (`Id`, `Name`"));
        assert!(mysql.contains("`InternalID`"));
        assert_eq!(mysql.matches('?').count(), 13);

        let pg = Dialect::Postgres.insert_sql("products", 2);
        assert!(pg.starts_with("INSERT INTO products (Id, Name,"));
        assert!(pg.contains("Availability, InternalID)"));
        assert!(!pg.contains('"'));
        assert!(pg.contains("($1, $2,"));
        assert!(pg.ends_with("$25, $26)"));
        assert_eq!(pg.matches("), (").count(), 1);

        let sqlite = Dialect::Sqlite.insert_sql("products", 1);
        assert!(sqlite.starts_with("INSERT INTO \"products\" (\"Id\", \"Name\""));
        assert!(sqlite.contains("\"InternalID\""));
    }

    #[test]
    fn test_truncate_sql() {
        assert_eq!(
            Dialect::Sqlite.truncate_sql("products"),
            "DELETE FROM \"products\""
        );
        assert_eq!(
            Dialect::MySql.truncate_sql("products_mysql"),
            "TRUNCATE TABLE `products_mysql`"
        );
        assert_eq!(
            Dialect::Postgres.truncate_sql("products_pg"),
            "TRUNCATE TABLE products_pg"
        );
    }

    #[test]
    fn test_table_name_validation() {
        assert!(validate_table_name("products_mysql_boring_plain").is_ok());
        assert!(validate_table_name("_staging").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("1products").is_err());
        assert!(validate_table_name("products; DROP TABLE users").is_err());
    }

    #[test]
    fn test_insert_mode_from_str() {
        assert_eq!("multi_row".parse::<InsertMode>().unwrap(), InsertMode::MultiRow);
        assert_eq!("row".parse::<InsertMode>().unwrap(), InsertMode::PerRow);
        assert!("copy".parse::<InsertMode>().is_err());
    }
}
