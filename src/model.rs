//! Models: schema-bound CRUD over one SQLite connection.
//!
//! A [`Model`] owns exactly one connection. Writes open an implicit
//! transaction that stays pending until [`Model::commit`], [`Model::close`]
//! or the end of a [`Model::scoped`] block; reads issued while no write is
//! pending run in autocommit mode.

use crate::catalog;
use crate::error::{ModelError, ModelResult};
use crate::export;
use crate::filter::Filter;
use crate::paths;
use crate::row::{self, Row};
use crate::schema::{DbSchema, TableSchema};
use crate::transpiler::{self, Aggregate, Statement, ToSql};
use crate::value::{self, Record, Value};

use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{ConnectOptions, Connection, SqliteConnection};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Options for opening a [`Model`].
///
/// # Example
///
/// ```rust,ignore
/// let model = ModelOptions::new()
///     .location("/var/lib/reviews")
///     .timeout(Duration::from_secs(5))
///     .open(schema)
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct ModelOptions {
    location: Option<PathBuf>,
    db_name: Option<String>,
    validate_before_write: bool,
    timeout: Option<Duration>,
    connect_on_open: bool,
    exact_path: Option<PathBuf>,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            location: None,
            db_name: None,
            validate_before_write: false,
            timeout: None,
            connect_on_open: true,
            exact_path: None,
        }
    }
}

impl ModelOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory for database files whose name has no path separator.
    pub fn location(mut self, dir: impl Into<PathBuf>) -> Self {
        self.location = Some(dir.into());
        self
    }

    /// Use this file name instead of the descriptor's `db_name`.
    pub fn db_name(mut self, name: impl Into<String>) -> Self {
        self.db_name = Some(name.into());
        self
    }

    /// Check primary keys and value affinity before each write. Off by
    /// default; SQLite itself still enforces uniqueness.
    pub fn validate_before_write(mut self, validate: bool) -> Self {
        self.validate_before_write = validate;
        self
    }

    /// Busy timeout handed to SQLite.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// When false, the model starts closed and the first call to
    /// [`Model::connect`] (or [`Model::scoped`]) opens the file.
    pub fn connect_on_open(mut self, connect: bool) -> Self {
        self.connect_on_open = connect;
        self
    }

    pub(crate) fn exact_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.exact_path = Some(path.into());
        self
    }

    /// Validate `schema`, resolve the file path and (unless disabled)
    /// connect.
    pub async fn open(self, schema: DbSchema) -> ModelResult<Model> {
        schema.validate()?;

        let path = match self.exact_path {
            Some(path) => path,
            None => {
                let name = self.db_name.as_deref().unwrap_or(&schema.db_name);
                paths::resolve_from_env(name, self.location.as_deref())
            }
        };
        paths::ensure_parent(&path)?;

        let table = schema.default_table().map(|t| t.name.clone());
        let mut model = Model {
            schema,
            path,
            conn: None,
            pending: false,
            table,
            validate: self.validate_before_write,
            timeout: self.timeout,
        };
        if self.connect_on_open {
            model.connect().await?;
        }
        Ok(model)
    }
}

/// A database bound to a schema descriptor.
pub struct Model {
    schema: DbSchema,
    path: PathBuf,
    conn: Option<SqliteConnection>,
    pending: bool,
    table: Option<String>,
    validate: bool,
    timeout: Option<Duration>,
}

impl Model {
    /// Open with default [`ModelOptions`].
    pub async fn open(schema: DbSchema) -> ModelResult<Self> {
        ModelOptions::new().open(schema).await
    }

    /// Open an existing database file without a descriptor; the schema is
    /// read back from the file. A file with a single table selects it.
    pub async fn discover(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let mut conn = connect_existing(path, false).await?;
        let mut schema = catalog::introspect(&mut conn, &path.display().to_string()).await?;
        conn.close().await?;

        if let [table] = schema.tables.as_mut_slice() {
            table.default = true;
        }
        ModelOptions::new().exact_path(path).open(schema).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &DbSchema {
        &self.schema
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Open the connection if it is closed, creating missing tables.
    pub async fn connect(&mut self) -> ModelResult<()> {
        if self.conn.is_some() {
            return Ok(());
        }

        let mut options = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true);
        if let Some(timeout) = self.timeout {
            options = options.busy_timeout(timeout);
        }
        let mut conn = options.connect().await.map_err(|e| {
            ModelError::Connection(format!("cannot open {}: {}", self.path.display(), e))
        })?;

        for table in &self.schema.tables {
            if !catalog::table_exists(&mut conn, &table.name).await? {
                sqlx::query(&table.to_sql()).execute(&mut conn).await?;
                tracing::info!(table = %table.name, db = %self.path.display(), "created table");
            }
        }

        tracing::debug!(db = %self.path.display(), "connected");
        self.conn = Some(conn);
        Ok(())
    }

    /// Select the table later operations act on.
    pub fn set_table(&mut self, name: &str) -> ModelResult<()> {
        if self.schema.table(name).is_none() {
            return Err(ModelError::unknown_table(name));
        }
        self.table = Some(name.to_string());
        Ok(())
    }

    /// Builder form of [`Model::set_table`].
    pub fn with_table(mut self, name: &str) -> ModelResult<Self> {
        self.set_table(name)?;
        Ok(self)
    }

    /// The active table, if one is selected.
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    fn active_table(&self) -> ModelResult<&TableSchema> {
        self.table
            .as_deref()
            .and_then(|name| self.schema.table(name))
            .ok_or_else(|| ModelError::Schema("no table set for operation".into()))
    }

    fn conn_mut(&mut self) -> ModelResult<&mut SqliteConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| ModelError::Connection("connection is closed".into()))
    }

    /// Insert one row; returns its rowid.
    pub async fn write(&mut self, record: &Record) -> ModelResult<i64> {
        let table = self.active_table()?;
        let stmt = transpiler::insert(table, record)?;
        if self.validate {
            check_keys(table, record)?;
            check_affinity(table, record)?;
        }

        let conn = self.begin_write().await?;
        let result = value::bind_all(&stmt.sql, &stmt.params)
            .execute(&mut *conn)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Alias for [`Model::write`].
    pub async fn create(&mut self, record: &Record) -> ModelResult<i64> {
        self.write(record).await
    }

    /// Rows matching `filter`, in table column order.
    pub async fn read(&mut self, filter: &Filter) -> ModelResult<Vec<Row>> {
        let stmt = transpiler::select(self.active_table()?, filter)?;
        let rows = self.fetch(&stmt).await?;
        Ok(row::decode_all(&rows)?)
    }

    /// [`Model::read`] plus the column names.
    pub async fn read_with_header(&mut self, filter: &Filter) -> ModelResult<(Vec<String>, Vec<Row>)> {
        let header = self
            .active_table()?
            .columns()
            .into_iter()
            .map(String::from)
            .collect();
        let rows = self.read(filter).await?;
        Ok((header, rows))
    }

    /// Set `values` on the rows matching `condition`. An empty condition is
    /// refused; use [`Model::update_all`] for that.
    pub async fn update(&mut self, condition: &Filter, values: &Record) -> ModelResult<u64> {
        let table = self.active_table()?;
        let stmt = transpiler::update(table, condition, values)?;
        if self.validate {
            check_affinity(table, values)?;
        }
        self.execute(&stmt).await
    }

    /// Set `values` on every row of the table.
    pub async fn update_all(&mut self, values: &Record) -> ModelResult<u64> {
        let table = self.active_table()?;
        let stmt = transpiler::update_all(table, values)?;
        if self.validate {
            check_affinity(table, values)?;
        }
        self.execute(&stmt).await
    }

    /// Delete the rows matching `filter`; an empty filter deletes all rows.
    pub async fn remove(&mut self, filter: &Filter) -> ModelResult<u64> {
        let stmt = transpiler::delete(self.active_table()?, filter)?;
        self.execute(&stmt).await
    }

    /// Alias for [`Model::remove`].
    pub async fn delete(&mut self, filter: &Filter) -> ModelResult<u64> {
        self.remove(filter).await
    }

    pub async fn count(&mut self, filter: &Filter) -> ModelResult<u64> {
        let value = self.aggregate(Aggregate::Count, filter).await?;
        Ok(value.as_i64().map(|n| n.max(0) as u64).unwrap_or(0))
    }

    /// Smallest value of `column`; `Null` when nothing matches.
    pub async fn min(&mut self, column: &str, filter: &Filter) -> ModelResult<Value> {
        self.aggregate(Aggregate::Min(column.to_string()), filter).await
    }

    /// Largest value of `column`; `Null` when nothing matches.
    pub async fn max(&mut self, column: &str, filter: &Filter) -> ModelResult<Value> {
        self.aggregate(Aggregate::Max(column.to_string()), filter).await
    }

    pub async fn avg(&mut self, column: &str, filter: &Filter) -> ModelResult<Option<f64>> {
        let value = self.aggregate(Aggregate::Avg(column.to_string()), filter).await?;
        Ok(value.as_f64())
    }

    async fn aggregate(&mut self, agg: Aggregate, filter: &Filter) -> ModelResult<Value> {
        let stmt = transpiler::aggregate(self.active_table()?, &agg, filter)?;
        let rows = self.fetch(&stmt).await?;
        match rows.first() {
            Some(row) => Ok(value::decode(row, 0)?),
            None => Ok(Value::Null),
        }
    }

    /// Commit the pending write transaction, if any.
    pub async fn commit(&mut self) -> ModelResult<()> {
        if !self.pending {
            return Ok(());
        }
        let conn = self.conn_mut()?;
        sqlx::query("COMMIT").execute(&mut *conn).await?;
        self.pending = false;
        tracing::debug!(db = %self.path.display(), "committed");
        Ok(())
    }

    /// Commit and release the connection. Closing a closed model is a no-op.
    pub async fn close(&mut self) -> ModelResult<()> {
        if self.conn.is_none() {
            return Ok(());
        }
        let committed = self.commit().await;
        self.pending = false;
        if let Some(conn) = self.conn.take() {
            conn.close().await?;
            tracing::debug!(db = %self.path.display(), "closed");
        }
        committed
    }

    /// Run `f` with an open connection, then commit and close on every exit
    /// path. An error from `f` takes precedence over one from closing.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// model
    ///     .scoped(async |m: &mut Model| -> ModelResult<()> {
    ///         m.write(&Record::new().set("rid", 1)).await?;
    ///         Ok(())
    ///     })
    ///     .await?;
    /// ```
    pub async fn scoped<T>(
        &mut self,
        f: impl AsyncFnOnce(&mut Model) -> ModelResult<T>,
    ) -> ModelResult<T> {
        self.connect().await?;
        let result = f(self).await;
        let closed = self.close().await;
        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Err(e), _) | (Ok(_), Err(e)) => Err(e),
        }
    }

    /// User tables present in the file, by name.
    pub async fn table_names(&mut self) -> ModelResult<Vec<String>> {
        catalog::table_names(self.conn_mut()?).await
    }

    pub async fn table_exists(&mut self, name: &str) -> ModelResult<bool> {
        catalog::table_exists(self.conn_mut()?, name).await
    }

    /// Write an SQL dump of the database to `path`.
    pub async fn export(&mut self, path: impl AsRef<Path>, schema_only: bool) -> ModelResult<()> {
        let path = path.as_ref();
        let dump = export::dump(self.conn_mut()?, schema_only).await?;
        tokio::fs::write(path, dump).await?;
        tracing::info!(to = %path.display(), schema_only, "exported database");
        Ok(())
    }

    async fn begin_write(&mut self) -> ModelResult<&mut SqliteConnection> {
        let begin = !self.pending;
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| ModelError::Connection("connection is closed".into()))?;
        if begin {
            sqlx::query("BEGIN").execute(&mut *conn).await?;
            self.pending = true;
        }
        Ok(conn)
    }

    async fn execute(&mut self, stmt: &Statement) -> ModelResult<u64> {
        let conn = self.begin_write().await?;
        let result = value::bind_all(&stmt.sql, &stmt.params)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    async fn fetch(&mut self, stmt: &Statement) -> ModelResult<Vec<SqliteRow>> {
        let conn = self.conn_mut()?;
        Ok(value::bind_all(&stmt.sql, &stmt.params)
            .fetch_all(&mut *conn)
            .await?)
    }
}

impl Drop for Model {
    fn drop(&mut self) {
        if self.pending {
            tracing::warn!(
                db = %self.path.display(),
                "model dropped with uncommitted writes; they are rolled back"
            );
        }
    }
}

/// Open an existing file; it is never created.
pub(crate) async fn connect_existing(path: &Path, read_only: bool) -> ModelResult<SqliteConnection> {
    if !path.is_file() {
        return Err(ModelError::Connection(format!(
            "database file {} does not exist",
            path.display()
        )));
    }
    SqliteConnectOptions::new()
        .filename(path)
        .read_only(read_only)
        .connect()
        .await
        .map_err(|e| ModelError::Connection(format!("cannot open {}: {}", path.display(), e)))
}

fn check_keys(table: &TableSchema, record: &Record) -> ModelResult<()> {
    if table.has_rowid_key() {
        return Ok(());
    }
    for key in &table.primary_key {
        if record.get(key).is_none_or(Value::is_null) {
            return Err(ModelError::Write(format!(
                "primary key '{}' of table '{}' is missing",
                key, table.name
            )));
        }
    }
    Ok(())
}

fn check_affinity(table: &TableSchema, record: &Record) -> ModelResult<()> {
    for (column, value) in record.iter() {
        let Some(ty) = table.column_type(column) else {
            continue;
        };
        if !ty.affinity().accepts(value) {
            return Err(ModelError::Write(format!(
                "{} value {} does not fit column '{}' ({})",
                value.kind(),
                value,
                column,
                ty.declared()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TableSchema;

    fn reviews() -> TableSchema {
        TableSchema::new("reviews")
            .field("rid", "int")
            .field("header", "text")
            .field("rating", "int")
            .primary_key("rid")
    }

    #[test]
    fn test_missing_primary_key() {
        let err = check_keys(&reviews(), &Record::new().set("header", "x")).unwrap_err();
        assert!(matches!(err, ModelError::Write(_)));
        let err = check_keys(&reviews(), &Record::new().set("rid", Value::Null)).unwrap_err();
        assert!(matches!(err, ModelError::Write(_)));
    }

    #[test]
    fn test_rowid_key_may_be_omitted() {
        let table = TableSchema::new("t")
            .field("id", "INTEGER")
            .field("name", "text")
            .primary_key("id");
        assert!(check_keys(&table, &Record::new().set("name", "a")).is_ok());
    }

    #[test]
    fn test_affinity_check() {
        let ok = Record::new().set("rid", 1).set("rating", "5");
        assert!(check_affinity(&reviews(), &ok).is_ok());
        let bad = Record::new().set("rating", "five");
        assert!(matches!(
            check_affinity(&reviews(), &bad),
            Err(ModelError::Write(_))
        ));
    }

    #[tokio::test]
    async fn test_validation_is_opt_in() {
        let tmp = tempfile::tempdir().unwrap();
        let schema = DbSchema::new("reviews.db").with_table(reviews().default_table());

        let mut plain = ModelOptions::new()
            .location(tmp.path())
            .open(schema.clone())
            .await
            .unwrap();
        plain.write(&Record::new().set("header", "no key")).await.unwrap();
        plain.close().await.unwrap();

        let mut checked = ModelOptions::new()
            .location(tmp.path())
            .validate_before_write(true)
            .open(schema)
            .await
            .unwrap();
        let err = checked
            .write(&Record::new().set("header", "no key"))
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Write(_)));
    }

    #[tokio::test]
    async fn test_closed_model_refuses_crud() {
        let tmp = tempfile::tempdir().unwrap();
        let schema = DbSchema::new("reviews.db").with_table(reviews().default_table());
        let mut model = ModelOptions::new()
            .location(tmp.path())
            .connect_on_open(false)
            .open(schema)
            .await
            .unwrap();
        assert!(!model.is_connected());
        let err = model.read(&Filter::all()).await.unwrap_err();
        assert!(matches!(err, ModelError::Connection(_)));

        model.connect().await.unwrap();
        assert!(model.read(&Filter::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_active_table() {
        let tmp = tempfile::tempdir().unwrap();
        let schema = DbSchema::new("reviews.db").with_table(reviews());
        let mut model = ModelOptions::new()
            .location(tmp.path())
            .open(schema)
            .await
            .unwrap();
        assert_eq!(model.table(), None);
        match model.read(&Filter::all()).await {
            Err(ModelError::Schema(msg)) => assert_eq!(msg, "no table set for operation"),
            other => panic!("expected schema error, got {:?}", other.map(|r| r.len())),
        }
        assert!(matches!(model.set_table("nope"), Err(ModelError::Schema(_))));
        model.set_table("reviews").unwrap();
        assert_eq!(model.table(), Some("reviews"));
    }
}
