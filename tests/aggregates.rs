//! count/min/max/avg over a table of squares.

use litemodel::prelude::*;
use tempfile::TempDir;

async fn squares(dir: &TempDir) -> ModelResult<Model> {
    let schema = DbSchema::from_toml_str(
        r#"
        db_name = "squares.db"

        [[tables]]
        name = "square"
        primary_key = "num"
        default = true

        [tables.fields]
        num = "int"
        square = "int"
        "#,
    )?;
    let mut model = ModelOptions::new().location(dir.path()).open(schema).await?;
    for num in 1..=3i64 {
        model
            .write(&Record::new().set("num", num).set("square", num * num))
            .await?;
    }
    model.commit().await?;
    Ok(model)
}

#[tokio::test]
async fn test_count() -> ModelResult<()> {
    let dir = tempfile::tempdir()?;
    let mut model = squares(&dir).await?;

    assert_eq!(model.count(&Filter::all()).await?, 3);
    assert_eq!(model.count(&Filter::new().eq("square", 4)).await?, 1);
    assert_eq!(model.count(&Filter::new().between("square", 4, 9)).await?, 2);
    assert_eq!(model.count(&Filter::new().gt("square", 9)).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_min_max() -> ModelResult<()> {
    let dir = tempfile::tempdir()?;
    let mut model = squares(&dir).await?;

    assert_eq!(model.min("square", &Filter::all()).await?, Value::Int(1));
    assert_eq!(model.max("square", &Filter::all()).await?, Value::Int(9));
    assert_eq!(
        model.max("square", &Filter::new().lte("num", 2)).await?,
        Value::Int(4)
    );
    assert_eq!(
        model.min("square", &Filter::new().gt("num", 5)).await?,
        Value::Null
    );
    Ok(())
}

#[tokio::test]
async fn test_avg() -> ModelResult<()> {
    let dir = tempfile::tempdir()?;
    let mut model = squares(&dir).await?;

    assert_eq!(
        model.avg("square", &Filter::new().between("num", 1, 2)).await?,
        Some(2.5)
    );
    let all = model.avg("square", &Filter::all()).await?.unwrap();
    assert!((all - 14.0 / 3.0).abs() < 1e-9);
    assert_eq!(model.avg("square", &Filter::new().eq("num", 7)).await?, None);
    Ok(())
}

#[tokio::test]
async fn test_paging_rejected_for_aggregates() -> ModelResult<()> {
    let dir = tempfile::tempdir()?;
    let mut model = squares(&dir).await?;

    let err = model.count(&Filter::new().limit(1)).await.unwrap_err();
    assert!(matches!(err, ModelError::Query(_)));
    Ok(())
}

#[tokio::test]
async fn test_empty_table() -> ModelResult<()> {
    let dir = tempfile::tempdir()?;
    let mut model = squares(&dir).await?;
    model.remove(&Filter::all()).await?;

    assert_eq!(model.count(&Filter::all()).await?, 0);
    assert_eq!(model.max("square", &Filter::all()).await?, Value::Null);
    assert_eq!(model.avg("square", &Filter::all()).await?, None);
    Ok(())
}
