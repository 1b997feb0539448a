use crate::collect::RowCount;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Column types understood by the in-memory cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Uuid,
    Text,
    /// `set<text>`
    TextSet,
    Blob,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Uuid => "uuid",
            ColumnType::Text => "text",
            ColumnType::TextSet => "set<text>",
            ColumnType::Blob => "blob",
        };
        f.write_str(name)
    }
}

/// A bound value.
///
/// Sets are shared through an `Arc`, so the same collection can be bound to
/// any number of statements without being copied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Uuid(Uuid),
    Text(String),
    TextSet(Arc<BTreeSet<String>>),
    Blob(Vec<u8>),
    Null,
}

impl Value {
    /// The column type this value belongs in, `None` for `Null`.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Uuid(_) => Some(ColumnType::Uuid),
            Value::Text(_) => Some(ColumnType::Text),
            Value::TextSet(_) => Some(ColumnType::TextSet),
            Value::Blob(_) => Some(ColumnType::Blob),
            Value::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Uuid> for Value {
    fn from(id: Uuid) -> Self {
        Value::Uuid(id)
    }
}

impl From<Arc<BTreeSet<String>>> for Value {
    fn from(set: Arc<BTreeSet<String>>) -> Self {
        Value::TextSet(set)
    }
}

/// Definition of a table: ordered columns and a single primary key column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    columns: Vec<(String, ColumnType)>,
    primary_key: String,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: primary_key.into(),
        }
    }

    pub fn column(mut self, name: impl Into<String>, ty: ColumnType) -> Self {
        self.columns.push((name.into(), ty));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[(String, ColumnType)] {
        &self.columns
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Position and type of `column`.
    pub fn position(&self, column: &str) -> Option<(usize, ColumnType)> {
        self.columns
            .iter()
            .position(|(name, _)| name == column)
            .map(|i| (i, self.columns[i].1))
    }
}

impl fmt::Display for TableSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.name)?;
        for (i, (name, ty)) in self.columns.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", name, ty)?;
            if *name == self.primary_key {
                f.write_str(" PRIMARY KEY")?;
            }
        }
        f.write_str(")")
    }
}

/// A request understood by [`MemorySession`](super::MemorySession).
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable {
        schema: TableSchema,
        if_not_exists: bool,
    },
    /// Upsert by primary key. `values[i]` is bound to `columns[i]`.
    Insert {
        table: String,
        columns: Vec<String>,
        values: Vec<Value>,
    },
    /// Rows in insertion order, at most `limit` of them.
    Select {
        table: String,
        limit: Option<usize>,
    },
}

impl Statement {
    pub fn create_table(schema: TableSchema) -> Self {
        Statement::CreateTable {
            schema,
            if_not_exists: false,
        }
    }

    pub fn create_table_if_not_exists(schema: TableSchema) -> Self {
        Statement::CreateTable {
            schema,
            if_not_exists: true,
        }
    }

    pub fn insert(table: impl Into<String>, columns: &[&str], values: Vec<Value>) -> Self {
        Statement::Insert {
            table: table.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            values,
        }
    }

    pub fn select(table: impl Into<String>, limit: Option<usize>) -> Self {
        Statement::Select {
            table: table.into(),
            limit,
        }
    }
}

/// One row, values in schema column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row(pub(crate) Vec<Value>);

impl Row {
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }
}

/// Result of executing a [`Statement`]. Empty for schema and insert statements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl RowCount for QueryResult {
    fn row_count(&self) -> usize {
        self.rows.len()
    }
}
