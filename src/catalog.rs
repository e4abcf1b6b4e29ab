//! Read-only introspection of existing database files.
//!
//! The browsing server and the CLI work on files they have no descriptor
//! for; [`Catalog`] discovers tables and columns from `sqlite_master` and
//! `pragma_table_info`.

use crate::error::{ModelError, ModelResult};
use crate::export;
use crate::filter::Filter;
use crate::row;
use crate::schema::{DbSchema, TableSchema};
use crate::transpiler;
use crate::value::{self, Value};

use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::SqliteConnection;
use std::path::{Path, PathBuf};

/// Rows of one table, ready to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRows {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub count: usize,
}

/// Read-only handle on an existing database file.
#[derive(Debug, Clone)]
pub struct Catalog {
    pool: SqlitePool,
    path: PathBuf,
}

impl Catalog {
    /// Open `path` read-only. The file must already exist.
    pub async fn open(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ModelError::Connection(format!(
                "database file {} does not exist",
                path.display()
            )));
        }

        let options = SqliteConnectOptions::new().filename(path).read_only(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| ModelError::Connection(format!("cannot open {}: {}", path.display(), e)))?;

        tracing::debug!(db = %path.display(), "opened catalog");
        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn table_names(&self) -> ModelResult<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        table_names(&mut conn).await
    }

    /// Schema of one table; unknown tables are a schema error.
    pub async fn describe(&self, table: &str) -> ModelResult<TableSchema> {
        let mut conn = self.pool.acquire().await?;
        describe(&mut conn, table).await
    }

    /// Schema of every user table.
    pub async fn schema(&self) -> ModelResult<DbSchema> {
        let mut conn = self.pool.acquire().await?;
        introspect(&mut conn, &self.path.display().to_string()).await
    }

    /// Rows of `table` matching `filter`.
    pub async fn fetch_rows(&self, table: &str, filter: &Filter) -> ModelResult<TableRows> {
        let mut conn = self.pool.acquire().await?;
        let schema = describe(&mut conn, table).await?;
        let stmt = transpiler::select(&schema, filter)?;
        let rows = value::bind_all(&stmt.sql, &stmt.params)
            .fetch_all(&mut *conn)
            .await?;

        let rows = rows
            .iter()
            .map(row::decode_values)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TableRows {
            table: schema.name.clone(),
            columns: schema.columns().into_iter().map(String::from).collect(),
            count: rows.len(),
            rows,
        })
    }

    /// SQL dump of the file.
    pub async fn export(&self, schema_only: bool) -> ModelResult<String> {
        let mut conn = self.pool.acquire().await?;
        export::dump(&mut conn, schema_only).await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// User tables, excluding SQLite's internal `sqlite_%` tables.
pub(crate) async fn table_names(conn: &mut SqliteConnection) -> ModelResult<Vec<String>> {
    let names: Vec<(String,)> = sqlx::query_as(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(names.into_iter().map(|(name,)| name).collect())
}

pub(crate) async fn table_exists(conn: &mut SqliteConnection, table: &str) -> ModelResult<bool> {
    // Drained with fetch_all so the statement finishes and releases its read lock.
    let found: Vec<(i64,)> =
        sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_all(&mut *conn)
            .await?;
    Ok(!found.is_empty())
}

pub(crate) async fn describe(conn: &mut SqliteConnection, table: &str) -> ModelResult<TableSchema> {
    if !table_names(conn).await?.iter().any(|t| t == table) {
        return Err(ModelError::unknown_table(table));
    }

    let columns: Vec<(String, String, i64)> =
        sqlx::query_as("SELECT name, type, pk FROM pragma_table_info(?) ORDER BY cid")
            .bind(table)
            .fetch_all(&mut *conn)
            .await?;

    let mut keys: Vec<(i64, String)> = columns
        .iter()
        .filter(|(_, _, pk)| *pk > 0)
        .map(|(name, _, pk)| (*pk, name.clone()))
        .collect();
    keys.sort();

    let schema = columns
        .into_iter()
        .fold(TableSchema::new(table), |t, (name, ty, _)| t.field(name, ty));
    Ok(keys
        .into_iter()
        .fold(schema, |t, (_, key)| t.primary_key(key)))
}

/// Descriptor for the whole file, named `db_name`.
pub(crate) async fn introspect(conn: &mut SqliteConnection, db_name: &str) -> ModelResult<DbSchema> {
    let mut schema = DbSchema::new(db_name);
    for table in table_names(conn).await? {
        schema = schema.with_table(describe(conn, &table).await?);
    }
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Affinity;
    use pretty_assertions::assert_eq;
    use sqlx::Connection;

    async fn seeded(dir: &Path) -> PathBuf {
        let path = dir.join("shop.db");
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
        for sql in [
            "CREATE TABLE items (id INTEGER PRIMARY KEY, name text, price real)",
            "CREATE TABLE pairs (a int, b int, PRIMARY KEY (b, a))",
            "INSERT INTO items VALUES (1, 'pen', 1.5), (2, 'ink', 3.0)",
        ] {
            sqlx::query(sql).execute(&mut conn).await.unwrap();
        }
        conn.close().await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Catalog::open(tmp.path().join("nope.db")).await.unwrap_err();
        assert!(matches!(err, ModelError::Connection(_)));
    }

    #[tokio::test]
    async fn test_describe() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = Catalog::open(seeded(tmp.path()).await).await.unwrap();

        assert_eq!(catalog.table_names().await.unwrap(), ["items", "pairs"]);

        let items = catalog.describe("items").await.unwrap();
        assert_eq!(items.columns(), ["id", "name", "price"]);
        assert_eq!(items.primary_key, ["id"]);
        let price = items.column_type("price").unwrap();
        assert!(price.declared().eq_ignore_ascii_case("real"));
        assert_eq!(price.affinity(), Affinity::Real);
        assert!(items.has_rowid_key());

        let pairs = catalog.describe("pairs").await.unwrap();
        assert_eq!(pairs.primary_key, ["b", "a"]);

        let err = catalog.describe("missing").await.unwrap_err();
        assert!(matches!(err, ModelError::Schema(_)));
    }

    #[tokio::test]
    async fn test_fetch_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = Catalog::open(seeded(tmp.path()).await).await.unwrap();

        let rows = catalog
            .fetch_rows("items", &Filter::new().gt("price", 2))
            .await
            .unwrap();
        assert_eq!(rows.columns, ["id", "name", "price"]);
        assert_eq!(
            rows.rows,
            vec![vec![Value::Int(2), Value::Text("ink".into()), Value::Float(3.0)]]
        );
        assert_eq!(rows.count, 1);

        let limited = catalog
            .fetch_rows("items", &Filter::new().limit(1))
            .await
            .unwrap();
        assert_eq!(limited.count, 1);
    }
}
