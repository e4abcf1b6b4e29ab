//! SQL transpiler.
//!
//! Turns a table schema plus a [`Filter`]/[`Record`] into a parameterized
//! [`Statement`]. Every function here is pure; column names are checked
//! against the schema before any SQL text is produced.

use crate::error::{ModelError, ModelResult};
use crate::filter::{Condition, Filter};
use crate::schema::{Affinity, TableSchema};
use crate::value::{Record, Value};

/// Trait for converting nodes to SQL.
pub trait ToSql {
    /// Convert this node to a SQL string.
    fn to_sql(&self) -> String;
}

/// SQL text plus the values bound to its `?` placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Aggregate functions the engine computes over a filtered table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Min(String),
    Max(String),
    Avg(String),
}

impl Aggregate {
    fn column(&self) -> Option<&str> {
        match self {
            Aggregate::Count => None,
            Aggregate::Min(c) | Aggregate::Max(c) | Aggregate::Avg(c) => Some(c),
        }
    }
}

impl ToSql for Aggregate {
    fn to_sql(&self) -> String {
        match self {
            Aggregate::Count => "COUNT(*)".to_string(),
            Aggregate::Min(c) => format!("MIN({})", quote_ident(c)),
            Aggregate::Max(c) => format!("MAX({})", quote_ident(c)),
            Aggregate::Avg(c) => format!("AVG({})", quote_ident(c)),
        }
    }
}

/// `CREATE TABLE IF NOT EXISTS` for the declared table.
impl ToSql for TableSchema {
    fn to_sql(&self) -> String {
        let inline_key = self.primary_key.len() == 1;
        let mut defs: Vec<String> = self
            .columns()
            .into_iter()
            .filter_map(|name| self.column_type(name).map(|ty| (name, ty)))
            .map(|(name, ty)| {
                let mut def = format!("{} {}", quote_ident(name), ty.declared());
                if self.is_primary_key(name) {
                    if inline_key {
                        def.push_str(" PRIMARY KEY");
                    }
                } else if ty.affinity() == Affinity::Text {
                    def.push_str(" DEFAULT ''");
                }
                def
            })
            .collect();

        if self.primary_key.len() > 1 {
            let keys: Vec<String> = self.primary_key.iter().map(|k| quote_ident(k)).collect();
            defs.push(format!("PRIMARY KEY ({})", keys.join(", ")));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(&self.name),
            defs.join(", ")
        )
    }
}

/// `SELECT * FROM t [WHERE ...] [LIMIT ? [OFFSET ?]]`
pub fn select(table: &TableSchema, filter: &Filter) -> ModelResult<Statement> {
    let mut sql = format!("SELECT * FROM {}", quote_ident(&table.name));
    let mut params = Vec::new();
    push_where(table, filter, &mut sql, &mut params)?;

    match filter.limit_offset() {
        (Some(limit), Some(offset)) => {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(paging_value(limit)?);
            params.push(paging_value(offset)?);
        }
        (Some(limit), None) => {
            sql.push_str(" LIMIT ?");
            params.push(paging_value(limit)?);
        }
        // SQLite only accepts OFFSET after a LIMIT.
        (None, Some(offset)) => {
            sql.push_str(" LIMIT -1 OFFSET ?");
            params.push(paging_value(offset)?);
        }
        (None, None) => {}
    }

    Ok(Statement { sql, params })
}

/// `INSERT INTO t (...) VALUES (...)` with the provided fields in table order.
pub fn insert(table: &TableSchema, record: &Record) -> ModelResult<Statement> {
    if record.is_empty() {
        return Err(ModelError::Query(format!(
            "no values given for insert into '{}'",
            table.name
        )));
    }
    for column in record.columns() {
        table.check_column(column)?;
    }

    let (columns, params): (Vec<String>, Vec<Value>) = table
        .columns()
        .into_iter()
        .filter_map(|name| record.get(name).map(|v| (quote_ident(name), v.clone())))
        .unzip();
    let placeholders = vec!["?"; columns.len()].join(", ");

    Ok(Statement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&table.name),
            columns.join(", "),
            placeholders
        ),
        params,
    })
}

/// `UPDATE t SET ... WHERE ...`; an empty condition is refused.
pub fn update(table: &TableSchema, condition: &Filter, values: &Record) -> ModelResult<Statement> {
    if condition.is_empty() {
        return Err(ModelError::Update(format!(
            "refusing to update every row of '{}' without a condition",
            table.name
        )));
    }
    render_update(table, condition, values)
}

/// `UPDATE t SET ...` over the whole table.
pub fn update_all(table: &TableSchema, values: &Record) -> ModelResult<Statement> {
    render_update(table, &Filter::all(), values)
}

fn render_update(table: &TableSchema, condition: &Filter, values: &Record) -> ModelResult<Statement> {
    reject_paging(condition, "UPDATE")?;
    if values.is_empty() {
        return Err(ModelError::Query(format!(
            "no values given for update of '{}'",
            table.name
        )));
    }

    let mut assignments = Vec::with_capacity(values.len());
    let mut params = Vec::with_capacity(values.len() + condition.len());
    for (column, value) in values.iter() {
        table.check_column(column)?;
        assignments.push(format!("{} = ?", quote_ident(column)));
        params.push(value.clone());
    }

    let mut sql = format!(
        "UPDATE {} SET {}",
        quote_ident(&table.name),
        assignments.join(", ")
    );
    push_where(table, condition, &mut sql, &mut params)?;
    Ok(Statement { sql, params })
}

/// `DELETE FROM t [WHERE ...]`
pub fn delete(table: &TableSchema, filter: &Filter) -> ModelResult<Statement> {
    reject_paging(filter, "DELETE")?;
    let mut sql = format!("DELETE FROM {}", quote_ident(&table.name));
    let mut params = Vec::new();
    push_where(table, filter, &mut sql, &mut params)?;
    Ok(Statement { sql, params })
}

/// `SELECT <aggregate> FROM t [WHERE ...]`
pub fn aggregate(table: &TableSchema, agg: &Aggregate, filter: &Filter) -> ModelResult<Statement> {
    reject_paging(filter, "aggregate")?;
    if let Some(column) = agg.column() {
        table.check_column(column)?;
    }
    let mut sql = format!("SELECT {} FROM {}", agg.to_sql(), quote_ident(&table.name));
    let mut params = Vec::new();
    push_where(table, filter, &mut sql, &mut params)?;
    Ok(Statement { sql, params })
}

fn push_where(
    table: &TableSchema,
    filter: &Filter,
    sql: &mut String,
    params: &mut Vec<Value>,
) -> ModelResult<()> {
    if filter.is_empty() {
        return Ok(());
    }

    let mut clauses = Vec::with_capacity(filter.len());
    for (column, condition) in filter.conditions() {
        table.check_column(column)?;
        let col = quote_ident(column);
        let clause = match condition {
            Condition::Eq(Value::Null) => format!("{} IS NULL", col),
            Condition::Ne(Value::Null) => format!("{} IS NOT NULL", col),
            Condition::Between(low, high) => {
                params.push(low.clone());
                params.push(high.clone());
                format!("{} BETWEEN ? AND ?", col)
            }
            Condition::Eq(v)
            | Condition::Ne(v)
            | Condition::Gt(v)
            | Condition::Gte(v)
            | Condition::Lt(v)
            | Condition::Lte(v) => {
                params.push(v.clone());
                format!("{} {} ?", col, condition.operator())
            }
        };
        clauses.push(clause);
    }

    sql.push_str(" WHERE ");
    sql.push_str(&clauses.join(" AND "));
    Ok(())
}

fn reject_paging(filter: &Filter, statement: &str) -> ModelResult<()> {
    if filter.has_paging() {
        return Err(ModelError::Query(format!(
            "limit/offset only apply to reads, not {}",
            statement
        )));
    }
    Ok(())
}

fn paging_value(n: u64) -> ModelResult<Value> {
    i64::try_from(n)
        .map(Value::Int)
        .map_err(|_| ModelError::Query(format!("limit/offset {} is out of range", n)))
}

/// Quote an identifier unless it is a plain word that is not a keyword.
pub fn quote_ident(name: &str) -> String {
    let mut chars = name.chars();
    let plain = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if plain && !is_keyword(name) {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

fn is_keyword(word: &str) -> bool {
    let upper = word.to_ascii_uppercase();
    SQLITE_KEYWORDS.contains(&upper.as_str())
}

const SQLITE_KEYWORDS: &[&str] = &[
    "ABORT", "ACTION", "ADD", "AFTER", "ALL", "ALTER", "ALWAYS", "ANALYZE", "AND", "AS", "ASC",
    "ATTACH", "AUTOINCREMENT", "BEFORE", "BEGIN", "BETWEEN", "BY", "CASCADE", "CASE", "CAST",
    "CHECK", "COLLATE", "COLUMN", "COMMIT", "CONFLICT", "CONSTRAINT", "CREATE", "CROSS",
    "CURRENT", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "DATABASE", "DEFAULT",
    "DEFERRABLE", "DEFERRED", "DELETE", "DESC", "DETACH", "DISTINCT", "DO", "DROP", "EACH",
    "ELSE", "END", "ESCAPE", "EXCEPT", "EXCLUDE", "EXCLUSIVE", "EXISTS", "EXPLAIN", "FAIL",
    "FILTER", "FIRST", "FOLLOWING", "FOR", "FOREIGN", "FROM", "FULL", "GENERATED", "GLOB",
    "GROUP", "GROUPS", "HAVING", "IF", "IGNORE", "IMMEDIATE", "IN", "INDEX", "INDEXED",
    "INITIALLY", "INNER", "INSERT", "INSTEAD", "INTERSECT", "INTO", "IS", "ISNULL", "JOIN",
    "KEY", "LAST", "LEFT", "LIKE", "LIMIT", "MATCH", "MATERIALIZED", "NATURAL", "NO", "NOT",
    "NOTHING", "NOTNULL", "NULL", "NULLS", "OF", "OFFSET", "ON", "OR", "ORDER", "OTHERS",
    "OUTER", "OVER", "PARTITION", "PLAN", "PRAGMA", "PRECEDING", "PRIMARY", "QUERY", "RAISE",
    "RANGE", "RECURSIVE", "REFERENCES", "REGEXP", "REINDEX", "RELEASE", "RENAME", "REPLACE",
    "RESTRICT", "RETURNING", "RIGHT", "ROLLBACK", "ROW", "ROWS", "SAVEPOINT", "SELECT", "SET",
    "TABLE", "TEMP", "TEMPORARY", "THEN", "TIES", "TO", "TRANSACTION", "TRIGGER", "UNBOUNDED",
    "UNION", "UNIQUE", "UPDATE", "USING", "VACUUM", "VALUES", "VIEW", "VIRTUAL", "WHEN", "WHERE",
    "WINDOW", "WITH", "WITHOUT",
];
