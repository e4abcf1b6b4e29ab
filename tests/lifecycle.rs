//! Connection lifecycle: commit, close, reconnect, scoped use, discovery.

use litemodel::prelude::*;
use pretty_assertions::assert_eq;
use std::path::Path;

fn schema() -> DbSchema {
    DbSchema::new("notes.db")
        .with_table(
            TableSchema::new("notes")
                .field("id", "INTEGER")
                .field("body", "text")
                .primary_key("id")
                .default_table(),
        )
        .with_table(
            TableSchema::new("tags")
                .field("note", "int")
                .field("tag", "varchar(32)")
                .primary_key("note")
                .primary_key("tag"),
        )
        .with_table(TableSchema::new("unused").field("x", "blob"))
}

async fn open(dir: &Path) -> ModelResult<Model> {
    ModelOptions::new()
        .location(dir)
        .validate_before_write(true)
        .open(schema())
        .await
}

#[tokio::test]
async fn test_open_creates_tables() -> ModelResult<()> {
    let dir = tempfile::tempdir()?;
    let mut model = open(dir.path()).await?;

    assert_eq!(model.path(), dir.path().join("notes.db"));
    assert!(model.path().is_file());
    assert_eq!(model.table_names().await?, ["notes", "tags", "unused"]);
    assert!(model.table_exists("tags").await?);
    assert!(!model.table_exists("missing").await?);
    Ok(())
}

#[tokio::test]
async fn test_location_directories_are_created() -> ModelResult<()> {
    let dir = tempfile::tempdir()?;
    let nested = dir.path().join("a").join("b");
    let model = ModelOptions::new().location(&nested).open(schema()).await?;
    assert!(model.path().starts_with(&nested));
    assert!(nested.join("notes.db").is_file());
    Ok(())
}

#[tokio::test]
async fn test_uncreatable_location() -> ModelResult<()> {
    let dir = tempfile::tempdir()?;
    let file = dir.path().join("not-a-dir");
    std::fs::write(&file, "")?;
    let err = ModelOptions::new()
        .location(file.join("db"))
        .open(schema())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ModelError::Connection(_)));
    Ok(())
}

#[tokio::test]
async fn test_commit_makes_writes_visible() -> ModelResult<()> {
    let dir = tempfile::tempdir()?;
    let mut writer = open(dir.path()).await?;
    let id = writer.write(&Record::new().set("body", "first")).await?;
    assert_eq!(id, 1);

    let mut reader = open(dir.path()).await?;
    writer.commit().await?;
    let rows = reader.read(&Filter::all()).await?;
    assert_eq!(rows[0], vec![Value::Int(1), Value::Text("first".into())]);

    writer.close().await?;
    reader.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_closed_model() -> ModelResult<()> {
    let dir = tempfile::tempdir()?;
    let mut model = open(dir.path()).await?;
    model.write(&Record::new().set("body", "kept")).await?;
    model.close().await?;
    assert!(!model.is_connected());

    let err = model.write(&Record::new().set("body", "lost")).await.unwrap_err();
    assert!(matches!(err, ModelError::Connection(_)));
    let err = model.count(&Filter::all()).await.unwrap_err();
    assert!(matches!(err, ModelError::Connection(_)));

    // Closing twice is fine.
    model.close().await?;

    model.connect().await?;
    assert_eq!(model.count(&Filter::all()).await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_scoped_commits_and_closes() -> ModelResult<()> {
    let dir = tempfile::tempdir()?;
    let mut model = ModelOptions::new()
        .location(dir.path())
        .connect_on_open(false)
        .open(schema())
        .await?;

    let written = model
        .scoped(async |m: &mut Model| -> ModelResult<u64> {
            m.write(&Record::new().set("body", "a")).await?;
            m.write(&Record::new().set("body", "b")).await?;
            m.count(&Filter::all()).await
        })
        .await?;
    assert_eq!(written, 2);
    assert!(!model.is_connected());

    let mut fresh = open(dir.path()).await?;
    assert_eq!(fresh.count(&Filter::all()).await?, 2);
    Ok(())
}

#[tokio::test]
async fn test_scoped_error_wins() -> ModelResult<()> {
    let dir = tempfile::tempdir()?;
    let mut model = open(dir.path()).await?;

    let err = model
        .scoped(async |m: &mut Model| -> ModelResult<()> {
            m.write(&Record::new().set("id", 1).set("body", "a")).await?;
            m.write(&Record::new().set("id", 1).set("body", "dup")).await?;
            Ok(())
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::Write(_)));
    assert!(!model.is_connected());

    // The write before the failure was still committed on the way out.
    let mut fresh = open(dir.path()).await?;
    let rows = fresh.read(&Filter::all()).await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("body"), Some(&Value::Text("a".into())));
    Ok(())
}

#[tokio::test]
async fn test_switch_tables() -> ModelResult<()> {
    let dir = tempfile::tempdir()?;
    let mut model = open(dir.path()).await?;

    model.set_table("tags")?;
    model.write(&Record::new().set("note", 1).set("tag", "rust")).await?;
    model.write(&Record::new().set("note", 1).set("tag", "sql")).await?;
    let err = model
        .write(&Record::new().set("note", 1).set("tag", "rust"))
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::Write(_)));

    // Composite keys need every column.
    let err = model.write(&Record::new().set("note", 2)).await.unwrap_err();
    assert!(matches!(err, ModelError::Write(_)));

    assert_eq!(model.count(&Filter::new().eq("note", 1)).await?, 2);

    let mut model = model.with_table("notes")?;
    assert_eq!(model.count(&Filter::all()).await?, 0);
    assert!(matches!(model.set_table("nope"), Err(ModelError::Schema(_))));
    assert_eq!(model.table(), Some("notes"));
    Ok(())
}

#[tokio::test]
async fn test_export() -> ModelResult<()> {
    let dir = tempfile::tempdir()?;
    let mut model = open(dir.path()).await?;
    model.write(&Record::new().set("body", "it's here")).await?;
    model.commit().await?;

    let full = dir.path().join("full.sql");
    model.export(&full, false).await?;
    let dump = std::fs::read_to_string(&full)?;
    assert!(dump.starts_with("BEGIN TRANSACTION;\n"));
    assert!(dump.contains("CREATE TABLE notes (id INTEGER PRIMARY KEY, body text DEFAULT '')"));
    assert!(dump.contains("INSERT INTO \"notes\" VALUES(1,'it''s here');"));
    assert!(dump.ends_with("COMMIT;\n"));

    let schema_only = dir.path().join("schema.sql");
    model.export(&schema_only, true).await?;
    let dump = std::fs::read_to_string(&schema_only)?;
    assert!(dump.contains("CREATE TABLE tags"));
    assert!(!dump.contains("INSERT INTO"));
    Ok(())
}

#[tokio::test]
async fn test_discover() -> ModelResult<()> {
    let dir = tempfile::tempdir()?;
    let mut model = open(dir.path()).await?;
    model.write(&Record::new().set("body", "x")).await?;
    model.close().await?;

    let mut found = Model::discover(dir.path().join("notes.db")).await?;
    assert_eq!(found.schema().table_names(), ["notes", "tags", "unused"]);
    assert_eq!(found.table(), None);

    found.set_table("notes")?;
    let tags = found.schema().table("tags").unwrap();
    assert_eq!(tags.primary_key, ["note", "tag"]);
    assert_eq!(found.read(&Filter::all()).await?.len(), 1);

    let err = Model::discover(dir.path().join("missing.db")).await.err().unwrap();
    assert!(matches!(err, ModelError::Connection(_)));
    Ok(())
}
