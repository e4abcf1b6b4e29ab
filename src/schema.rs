//! Schema descriptors.
//!
//! A [`DbSchema`] names the database file and declares its tables. It is plain
//! data: build it in code, or load it from TOML/JSON.
//!
//! ```toml
//! db_name = "reviews.db"
//!
//! [[tables]]
//! name = "reviews"
//! primary_key = "rid"
//! default = true
//!
//! [tables.fields]
//! rid = "uuid"
//! header = "text"
//! rating = "int"
//! desc = "text"
//! ```

use crate::error::{ModelError, ModelResult};
use crate::value::Value;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// SQLite column affinity, derived from a declared type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Integer,
    Text,
    Blob,
    Real,
    Numeric,
}

impl Affinity {
    /// Apply SQLite's affinity rules to a declared type name.
    pub fn of(declared: &str) -> Self {
        let ty = declared.to_ascii_uppercase();
        if ty.contains("INT") {
            Affinity::Integer
        } else if ty.contains("CHAR") || ty.contains("CLOB") || ty.contains("TEXT") {
            Affinity::Text
        } else if ty.contains("BLOB") || ty.trim().is_empty() {
            Affinity::Blob
        } else if ty.contains("REAL") || ty.contains("FLOA") || ty.contains("DOUB") {
            Affinity::Real
        } else {
            Affinity::Numeric
        }
    }

    /// Whether `value` is a plausible thing to store in a column of this
    /// affinity.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Affinity::Blob, _) => true,
            (_, Value::Blob(_)) => false,
            (Affinity::Integer, Value::Float(n)) => n.fract() == 0.0,
            (Affinity::Integer, Value::Text(s)) => s.trim().parse::<i64>().is_ok(),
            (Affinity::Real, Value::Text(s)) => s.trim().parse::<f64>().is_ok(),
            _ => true,
        }
    }
}

impl fmt::Display for Affinity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Affinity::Integer => write!(f, "INTEGER"),
            Affinity::Text => write!(f, "TEXT"),
            Affinity::Blob => write!(f, "BLOB"),
            Affinity::Real => write!(f, "REAL"),
            Affinity::Numeric => write!(f, "NUMERIC"),
        }
    }
}

/// A declared column type. The declared name is passed to `CREATE TABLE`
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ColumnType {
    declared: String,
    affinity: Affinity,
}

impl ColumnType {
    pub fn new(declared: impl Into<String>) -> Self {
        let declared = declared.into();
        let affinity = Affinity::of(&declared);
        Self { declared, affinity }
    }

    pub fn declared(&self) -> &str {
        &self.declared
    }

    pub fn affinity(&self) -> Affinity {
        self.affinity
    }
}

impl From<String> for ColumnType {
    fn from(s: String) -> Self {
        ColumnType::new(s)
    }
}

impl From<&str> for ColumnType {
    fn from(s: &str) -> Self {
        ColumnType::new(s)
    }
}

impl From<ColumnType> for String {
    fn from(ty: ColumnType) -> Self {
        ty.declared
    }
}

/// Column name → declared type, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<(String, ColumnType)>);

impl Fields {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnType)> {
        self.0.iter().map(|(name, ty)| (name.as_str(), ty))
    }

    pub fn get(&self, name: &str) -> Option<&ColumnType> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, ty)| ty)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn push(&mut self, name: String, ty: ColumnType) {
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = ty,
            None => self.0.push((name, ty)),
        }
    }
}

impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, ty) in &self.0 {
            map.serialize_entry(name, ty)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Fields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = Fields;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of column names to declared types")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Fields, A::Error> {
                let mut fields = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, ty)) = access.next_entry::<String, ColumnType>()? {
                    if fields.iter().any(|(n, _): &(String, ColumnType)| *n == name) {
                        return Err(de::Error::custom(format!("duplicate column '{}'", name)));
                    }
                    fields.push((name, ty));
                }
                Ok(Fields(fields))
            }
        }

        deserializer.deserialize_map(FieldsVisitor)
    }
}

/// One table declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    #[serde(default)]
    pub fields: Fields,
    /// Explicit column order; defaults to the declaration order of `fields`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col_order: Option<Vec<String>>,
    /// One column name, or a list for a composite key.
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub primary_key: Vec<String>,
    /// Marks the table a new model selects on open.
    #[serde(default, skip_serializing_if = "is_false")]
    pub default: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(key) => vec![key],
        OneOrMany::Many(keys) => keys,
    })
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Fields::default(),
            col_order: None,
            primary_key: Vec::new(),
            default: false,
        }
    }

    pub fn field(mut self, name: impl Into<String>, ty: impl Into<ColumnType>) -> Self {
        self.fields.push(name.into(), ty.into());
        self
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key.push(column.into());
        self
    }

    pub fn col_order<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.col_order = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn default_table(mut self) -> Self {
        self.default = true;
        self
    }

    /// Column names in table order.
    pub fn columns(&self) -> Vec<&str> {
        match &self.col_order {
            Some(order) => order.iter().map(String::as_str).collect(),
            None => self.fields.iter().map(|(name, _)| name).collect(),
        }
    }

    pub fn column_type(&self, name: &str) -> Option<&ColumnType> {
        self.fields.get(name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.fields.contains(name)
    }

    /// Fail with a schema error unless `name` is declared on this table.
    pub fn check_column(&self, name: &str) -> ModelResult<()> {
        if self.has_column(name) {
            Ok(())
        } else {
            Err(ModelError::unknown_column(&self.name, name))
        }
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_key.iter().any(|k| k == column)
    }

    /// A lone `INTEGER PRIMARY KEY` aliases the rowid and fills itself in.
    pub fn has_rowid_key(&self) -> bool {
        match self.primary_key.as_slice() {
            [key] => self
                .column_type(key)
                .is_some_and(|ty| ty.declared().eq_ignore_ascii_case("INTEGER")),
            _ => false,
        }
    }

    pub fn validate(&self) -> ModelResult<()> {
        let table = &self.name;
        if table.trim().is_empty() {
            return Err(ModelError::Schema("table name must not be empty".into()));
        }
        if self.fields.is_empty() {
            return Err(ModelError::Schema(format!("table '{}' declares no fields", table)));
        }
        for (name, ty) in self.fields.iter() {
            if name.trim().is_empty() {
                return Err(ModelError::Schema(format!(
                    "table '{}' has a column with an empty name",
                    table
                )));
            }
            let plain = ty
                .declared()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '(' | ')' | ','));
            if !plain {
                return Err(ModelError::Schema(format!(
                    "column '{}' on table '{}' has an invalid type '{}'",
                    name,
                    table,
                    ty.declared()
                )));
            }
        }
        for key in &self.primary_key {
            if !self.has_column(key) {
                return Err(ModelError::Schema(format!(
                    "primary key '{}' is not a field of table '{}'",
                    key, table
                )));
            }
        }
        if let Some(order) = &self.col_order {
            let unique: HashSet<&str> = order.iter().map(String::as_str).collect();
            let covers = order.len() == self.fields.len()
                && unique.len() == order.len()
                && order.iter().all(|c| self.has_column(c));
            if !covers {
                return Err(ModelError::Schema(format!(
                    "col_order of table '{}' must list every field exactly once",
                    table
                )));
            }
        }
        Ok(())
    }
}

/// Database descriptor: file name plus table declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbSchema {
    /// File name, or a path when it contains a separator.
    pub db_name: String,
    #[serde(default)]
    pub tables: Vec<TableSchema>,
}

impl DbSchema {
    pub fn new(db_name: impl Into<String>) -> Self {
        Self {
            db_name: db_name.into(),
            tables: Vec::new(),
        }
    }

    pub fn with_table(mut self, table: TableSchema) -> Self {
        self.tables.push(table);
        self
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn default_table(&self) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.default)
    }

    pub fn validate(&self) -> ModelResult<()> {
        if self.db_name.trim().is_empty() {
            return Err(ModelError::Schema("db_name must not be empty".into()));
        }
        let mut seen = HashSet::new();
        for table in &self.tables {
            table.validate()?;
            if !seen.insert(table.name.as_str()) {
                return Err(ModelError::Schema(format!(
                    "table '{}' is declared twice",
                    table.name
                )));
            }
        }
        if self.tables.iter().filter(|t| t.default).count() > 1 {
            return Err(ModelError::Schema(
                "at most one table may be marked default".into(),
            ));
        }
        Ok(())
    }

    pub fn from_toml_str(s: &str) -> ModelResult<Self> {
        let schema: DbSchema = toml::from_str(s)
            .map_err(|e| ModelError::Schema(format!("Failed to parse schema: {}", e)))?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn from_json_str(s: &str) -> ModelResult<Self> {
        let schema: DbSchema = serde_json::from_str(s)
            .map_err(|e| ModelError::Schema(format!("Failed to parse schema: {}", e)))?;
        schema.validate()?;
        Ok(schema)
    }

    /// Load a descriptor file; `.json` files are read as JSON, anything else
    /// as TOML.
    pub fn load(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let schema = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content)?,
            _ => Self::from_toml_str(&content)?,
        };
        tracing::debug!(
            path = %path.display(),
            tables = schema.tables.len(),
            "loaded schema descriptor"
        );
        Ok(schema)
    }
}
