use super::statement::{QueryResult, Row, TableSchema, Value};
use super::MemoryError;
use std::collections::{HashMap, HashSet};

pub(crate) struct Table {
    schema: TableSchema,
    rows: Vec<Row>,
    by_key: HashMap<Value, usize>,
}

impl Table {
    pub(crate) fn create(schema: TableSchema) -> Result<Self, MemoryError> {
        if schema.columns().is_empty() {
            return Err(MemoryError::Invalid(format!(
                "table {} has no columns",
                schema.name()
            )));
        }
        let mut seen = HashSet::new();
        for (name, _) in schema.columns() {
            if !seen.insert(name.as_str()) {
                return Err(MemoryError::Invalid(format!(
                    "duplicate column {} in {}",
                    name,
                    schema.name()
                )));
            }
        }
        if schema.position(schema.primary_key()).is_none() {
            return Err(MemoryError::Invalid(format!(
                "primary key {} is not a column of {}",
                schema.primary_key(),
                schema.name()
            )));
        }
        Ok(Self {
            schema,
            rows: Vec::new(),
            by_key: HashMap::new(),
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    /// Writes the given columns of the row identified by the primary key.
    /// Columns that are not mentioned keep their previous value.
    pub(crate) fn upsert(&mut self, columns: &[String], values: Vec<Value>) -> Result<(), MemoryError> {
        if columns.len() != values.len() {
            return Err(MemoryError::Invalid(format!(
                "expected {} values, got {}",
                columns.len(),
                values.len()
            )));
        }

        let mut bound = Vec::with_capacity(columns.len());
        let mut key = None;
        for (column, value) in columns.iter().zip(values) {
            let (position, ty) = self.schema.position(column).ok_or_else(|| {
                MemoryError::Invalid(format!(
                    "unknown column {} in {}",
                    column,
                    self.schema.name()
                ))
            })?;
            if let Some(actual) = value.column_type() {
                if actual != ty {
                    return Err(MemoryError::Invalid(format!(
                        "column {} is {}, got {}",
                        column, ty, actual
                    )));
                }
            }
            if column == self.schema.primary_key() {
                key = Some(value.clone());
            }
            bound.push((position, value));
        }

        let key = match key {
            Some(key) if !key.is_null() => key,
            _ => {
                return Err(MemoryError::Invalid(format!(
                    "missing primary key {}",
                    self.schema.primary_key()
                )))
            }
        };

        let slot = match self.by_key.get(&key) {
            Some(&slot) => slot,
            None => {
                self.rows
                    .push(Row(vec![Value::Null; self.schema.columns().len()]));
                let slot = self.rows.len() - 1;
                self.by_key.insert(key, slot);
                slot
            }
        };
        let row = &mut self.rows[slot].0;
        for (position, value) in bound {
            row[position] = value;
        }
        Ok(())
    }

    pub(crate) fn select(&self, limit: Option<usize>) -> QueryResult {
        let take = limit.unwrap_or(self.rows.len());
        let columns = self
            .schema
            .columns()
            .iter()
            .map(|(name, _)| name.clone())
            .collect();
        QueryResult::new(columns, self.rows.iter().take(take).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::RowCount;
    use crate::memory::ColumnType;
    use uuid::Uuid;

    fn table() -> Table {
        Table::create(
            TableSchema::new("t", "id")
                .column("id", ColumnType::Uuid)
                .column("name", ColumnType::Text),
        )
        .unwrap()
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_upsert_merges_columns() {
        let mut t = table();
        let id = Uuid::now_v7();
        t.upsert(&cols(&["id", "name"]), vec![id.into(), "a".into()])
            .unwrap();
        t.upsert(&cols(&["id"]), vec![id.into()]).unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t.select(None).rows()[0].get(1), Some(&Value::from("a")));
    }

    #[test]
    fn test_select_limit_keeps_insertion_order() {
        let mut t = table();
        let ids: Vec<Uuid> = (0..5).map(|_| Uuid::now_v7()).collect();
        for id in &ids {
            t.upsert(&cols(&["id"]), vec![(*id).into()]).unwrap();
        }
        let result = t.select(Some(3));
        assert_eq!(result.row_count(), 3);
        assert_eq!(result.rows()[2].get(0), Some(&Value::Uuid(ids[2])));
        assert_eq!(t.select(Some(10)).row_count(), 5);
    }

    #[test]
    fn test_rejects_bad_rows() {
        let mut t = table();
        assert!(t.upsert(&cols(&["id"]), vec![]).is_err());
        assert!(t.upsert(&cols(&["name"]), vec!["x".into()]).is_err());
        assert!(t.upsert(&cols(&["id"]), vec!["not a uuid".into()]).is_err());
        assert!(t.upsert(&cols(&["id"]), vec![Value::Null]).is_err());
        assert!(t
            .upsert(&cols(&["id", "extra"]), vec![Uuid::now_v7().into(), "x".into()])
            .is_err());
        assert_eq!(t.len(), 0);
    }

    #[test]
    fn test_create_checks_schema() {
        assert!(Table::create(TableSchema::new("t", "id")).is_err());
        assert!(Table::create(TableSchema::new("t", "id").column("x", ColumnType::Text)).is_err());
        assert!(Table::create(
            TableSchema::new("t", "x")
                .column("x", ColumnType::Text)
                .column("x", ColumnType::Blob)
        )
        .is_err());
    }
}
