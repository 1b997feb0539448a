//! The songs benchmark: bootstrap a table, then time a batch of inserts and
//! a batch of selects.

use crate::collect::{AcceptAll, Collector, ExpectRows};
use crate::config::BatchConfig;
use crate::error::Error;
use crate::memory::{ColumnType, QueryResult, Statement, TableSchema, Value};
use crate::report::BatchReport;
use crate::session::{Session, SessionHandle};
use crate::run_batch;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

pub const KEYSPACE: &str = "examples";
pub const TABLE: &str = "songs";
/// Rows every select must return.
pub const SELECT_LIMIT: usize = 3;

const INSERT_COLUMNS: [&str; 5] = ["id", "title", "album", "artist", "tags"];
const TITLE: &str = "La Petite Tonkinoise";
const ALBUM: &str = "Bye Bye Blackbird";
const ARTIST: &str = "Joséphine Baker";

/// `songs (id uuid PRIMARY KEY, title text, album text, artist text, tags set<text>, data blob)`
pub fn songs_schema() -> TableSchema {
    TableSchema::new(TABLE, "id")
        .column("id", ColumnType::Uuid)
        .column("title", ColumnType::Text)
        .column("album", ColumnType::Text)
        .column("artist", ColumnType::Text)
        .column("tags", ColumnType::TextSet)
        .column("data", ColumnType::Blob)
}

/// The tag set bound to every insert, built once.
pub fn default_tags() -> Arc<BTreeSet<String>> {
    Arc::new(["jazz", "2013"].iter().map(|t| t.to_string()).collect())
}

/// `n` inserts, each with a fresh time-ordered id and the shared `tags`.
pub fn insert_statements(n: usize, tags: &Arc<BTreeSet<String>>) -> Vec<Statement> {
    (0..n)
        .map(|_| {
            Statement::insert(
                TABLE,
                &INSERT_COLUMNS,
                vec![
                    Value::Uuid(Uuid::now_v7()),
                    Value::from(TITLE),
                    Value::from(ALBUM),
                    Value::from(ARTIST),
                    Value::TextSet(tags.clone()),
                ],
            )
        })
        .collect()
}

pub fn select_statements(n: usize) -> Vec<Statement> {
    (0..n)
        .map(|_| Statement::select(TABLE, Some(SELECT_LIMIT)))
        .collect()
}

/// Reports of both phases of a run.
#[derive(Debug, Clone)]
pub struct PerfSummary {
    pub insert: BatchReport,
    pub select: BatchReport,
}

impl PerfSummary {
    pub fn failed(&self) -> usize {
        self.insert.failed() + self.select.failed()
    }
}

impl fmt::Display for PerfSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "insert: {}", self.insert)?;
        write!(f, "select: {}", self.select)
    }
}

/// Runs the benchmark on an open session.
///
/// Creating the table is a precondition: if it fails nothing else runs.
/// Selects are checked with [`ExpectRows`], so what happens on a short read
/// follows `config.validation()`.
#[tracing::instrument(skip_all, fields(concurrency = config.concurrency()))]
pub async fn run<S>(
    session: &SessionHandle<S>,
    config: &BatchConfig,
) -> Result<PerfSummary, Error<S::Error>>
where
    S: Session<Request = Statement, Payload = QueryResult>,
{
    session
        .execute(Statement::create_table_if_not_exists(songs_schema()))
        .await
        .map_err(Error::Bootstrap)?;

    let n = config.concurrency();
    let tags = default_tags();

    let insert = run_batch(
        session,
        insert_statements(n, &tags),
        &Collector::from_config(config, AcceptAll),
    )
    .await?;
    tracing::info!("insert: {}", insert);

    let select = run_batch(
        session,
        select_statements(n),
        &Collector::from_config(config, ExpectRows(SELECT_LIMIT)),
    )
    .await?;
    tracing::info!("select: {}", select);

    Ok(PerfSummary { insert, select })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_insert_statements_share_tags() {
        let tags = default_tags();
        let statements = insert_statements(4, &tags);
        assert_eq!(statements.len(), 4);
        assert_eq!(Arc::strong_count(&tags), 5);

        let ids: HashSet<Value> = statements
            .iter()
            .map(|s| match s {
                Statement::Insert { values, .. } => values[0].clone(),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_select_statements() {
        assert!(select_statements(0).is_empty());
        assert_eq!(
            select_statements(2),
            vec![
                Statement::select(TABLE, Some(3)),
                Statement::select(TABLE, Some(3))
            ]
        );
    }

    #[test]
    fn test_schema_matches_inserts() {
        let schema = songs_schema();
        for column in INSERT_COLUMNS.iter() {
            assert!(schema.position(column).is_some());
        }
        assert_eq!(schema.primary_key(), "id");
    }
}
