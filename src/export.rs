//! SQL text dumps, in the shape of the `sqlite3` shell's `.dump`.

use crate::error::ModelResult;
use crate::row;
use crate::transpiler::quote_ident;
use sqlx::SqliteConnection;

/// Render the whole database as SQL that rebuilds it.
///
/// Tables come first (each `CREATE` followed by its rows unless
/// `schema_only`), then indexes, triggers and views.
pub async fn dump(conn: &mut SqliteConnection, schema_only: bool) -> ModelResult<String> {
    let mut out = String::from("BEGIN TRANSACTION;\n");

    let tables: Vec<(String, String)> = sqlx::query_as(
        "SELECT name, sql FROM sqlite_master \
         WHERE type = 'table' AND sql NOT NULL \
         ORDER BY name = 'sqlite_sequence', name",
    )
    .fetch_all(&mut *conn)
    .await?;

    for (name, sql) in &tables {
        let internal = name.starts_with("sqlite_");
        if internal && name != "sqlite_sequence" {
            continue;
        }
        if internal {
            if schema_only {
                continue;
            }
            out.push_str("DELETE FROM sqlite_sequence;\n");
        } else {
            out.push_str(sql);
            out.push_str(";\n");
        }
        if !schema_only {
            push_rows(conn, name, &mut out).await?;
        }
    }

    let others: Vec<(String,)> = sqlx::query_as(
        "SELECT sql FROM sqlite_master \
         WHERE type IN ('index', 'trigger', 'view') AND sql NOT NULL \
         ORDER BY CASE type WHEN 'index' THEN 0 WHEN 'trigger' THEN 1 ELSE 2 END, name",
    )
    .fetch_all(&mut *conn)
    .await?;
    for (sql,) in others {
        out.push_str(&sql);
        out.push_str(";\n");
    }

    out.push_str("COMMIT;\n");
    tracing::debug!(tables = tables.len(), schema_only, "rendered dump");
    Ok(out)
}

async fn push_rows(conn: &mut SqliteConnection, table: &str, out: &mut String) -> ModelResult<()> {
    let sql = format!("SELECT * FROM {}", quote_ident(table));
    let quoted = table.replace('"', "\"\"");
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
    for row in &rows {
        let literals: Vec<String> = row::decode_values(row)?
            .iter()
            .map(|v| v.sql_literal())
            .collect();
        out.push_str(&format!(
            "INSERT INTO \"{}\" VALUES({});\n",
            quoted,
            literals.join(",")
        ));
    }
    Ok(())
}
