#![allow(dead_code)]

use anyhow::anyhow;
use sluice_core::{Connection, ConnectionSource, Cursor, Result, Row, RowNames, Statement, Value};
use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

#[derive(Default, Debug)]
pub struct Counts {
    pub connected: AtomicUsize,
    pub disconnected: AtomicUsize,
    pub prepared: AtomicUsize,
    pub executed: AtomicUsize,
    pub fetched: AtomicUsize,
    pub statements_closed: AtomicUsize,
    pub cursors_closed: AtomicUsize,
    pub begun: AtomicUsize,
    pub committed: AtomicUsize,
    pub rolled_back: AtomicUsize,
}

impl Counts {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
    pub fn connected(&self) -> usize {
        Self::get(&self.connected)
    }
    pub fn disconnected(&self) -> usize {
        Self::get(&self.disconnected)
    }
    pub fn prepared(&self) -> usize {
        Self::get(&self.prepared)
    }
    pub fn executed(&self) -> usize {
        Self::get(&self.executed)
    }
    pub fn fetched(&self) -> usize {
        Self::get(&self.fetched)
    }
    pub fn statements_closed(&self) -> usize {
        Self::get(&self.statements_closed)
    }
    pub fn cursors_closed(&self) -> usize {
        Self::get(&self.cursors_closed)
    }
    pub fn committed(&self) -> usize {
        Self::get(&self.committed)
    }
    pub fn rolled_back(&self) -> usize {
        Self::get(&self.rolled_back)
    }
    pub fn begun(&self) -> usize {
        Self::get(&self.begun)
    }
}

#[derive(Default, Debug, Clone)]
pub struct Failures {
    pub connect: bool,
    pub prepare: bool,
    /// Fail the n-th fetch (1 based) across the whole source.
    pub fetch: Option<usize>,
    pub commit: bool,
    pub rollback: bool,
}

/// Scripted in memory database holding the `person(name, score)` table.
#[derive(Clone)]
pub struct MockSource {
    pub counts: Arc<Counts>,
    pub failures: Arc<Failures>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::failing(Failures::default())
    }

    pub fn failing(failures: Failures) -> Self {
        Self {
            counts: Default::default(),
            failures: Arc::new(failures),
        }
    }
}

impl ConnectionSource for MockSource {
    type Connection = MockConnection;

    fn connection(&self) -> Result<MockConnection> {
        if self.failures.connect {
            return Err(anyhow!("Connection refused"));
        }
        self.counts.connected.fetch_add(1, Ordering::SeqCst);
        Ok(MockConnection {
            counts: self.counts.clone(),
            failures: self.failures.clone(),
        })
    }
}

pub const PEOPLE: [(&str, i64); 4] = [("FRED", 21), ("JOSEPH", 34), ("MARMADUKE", 21), ("ANNE", 9)];

pub struct MockConnection {
    counts: Arc<Counts>,
    failures: Arc<Failures>,
}

impl Connection for MockConnection {
    type Statement = MockStatement;

    fn prepare(&mut self, sql: &str) -> Result<MockStatement> {
        if self.failures.prepare {
            return Err(anyhow!("Prepare failed"));
        }
        let query = match sql {
            "select 1" => Query::One,
            "select name, score from person" => Query::All,
            "select score from person where name = ?" => Query::ScoreByName,
            "select name from person where score = ?" => Query::NameByScore,
            _ if sql.starts_with("select ?") => Query::Echo,
            _ => return Err(anyhow!("no such table in `{}`", sql)),
        };
        self.counts.prepared.fetch_add(1, Ordering::SeqCst);
        Ok(MockStatement {
            query,
            placeholders: sql.matches('?').count(),
            counts: self.counts.clone(),
            failures: self.failures.clone(),
        })
    }

    fn begin(&mut self) -> Result<()> {
        self.counts.begun.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.failures.commit {
            return Err(anyhow!("Commit failed"));
        }
        self.counts.committed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.failures.rollback {
            return Err(anyhow!("Rollback failed"));
        }
        self.counts.rolled_back.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(self) -> Result<()> {
        self.counts.disconnected.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

enum Query {
    One,
    All,
    ScoreByName,
    NameByScore,
    Echo,
}

pub struct MockStatement {
    query: Query,
    placeholders: usize,
    counts: Arc<Counts>,
    failures: Arc<Failures>,
}

impl Statement for MockStatement {
    type Cursor = MockCursor;

    fn execute(&mut self, values: &[Value]) -> Result<MockCursor> {
        if values.len() != self.placeholders {
            return Err(anyhow!(
                "Expected {} values, got {}",
                self.placeholders,
                values.len()
            ));
        }
        self.counts.executed.fetch_add(1, Ordering::SeqCst);
        let labels = |names: &[&str]| -> RowNames { names.iter().map(|v| v.to_string()).collect() };
        let rows: VecDeque<Row> = match self.query {
            Query::One => [Row::new(labels(&["1"]), Box::new([Value::Int64(Some(1))]))].into(),
            Query::All => {
                let names = labels(&["name", "score"]);
                PEOPLE
                    .iter()
                    .map(|(name, score)| {
                        Row::new(
                            names.clone(),
                            Box::new([Value::from(*name), Value::from(*score)]),
                        )
                    })
                    .collect()
            }
            Query::ScoreByName => {
                let names = labels(&["score"]);
                PEOPLE
                    .iter()
                    .filter(|(name, _)| values[0] == Value::from(*name))
                    .map(|(_, score)| Row::new(names.clone(), Box::new([Value::from(*score)])))
                    .collect()
            }
            Query::NameByScore => {
                let names = labels(&["name"]);
                PEOPLE
                    .iter()
                    .filter(|(_, score)| values[0] == Value::from(*score))
                    .map(|(name, _)| Row::new(names.clone(), Box::new([Value::from(*name)])))
                    .collect()
            }
            Query::Echo => {
                let names: RowNames = (0..values.len()).map(|i| format!("?{}", i + 1)).collect();
                [Row::new(names, values.into())].into()
            }
        };
        Ok(MockCursor {
            rows,
            counts: self.counts.clone(),
            failures: self.failures.clone(),
        })
    }

    fn close(self) -> Result<()> {
        self.counts.statements_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockCursor {
    rows: VecDeque<Row>,
    counts: Arc<Counts>,
    failures: Arc<Failures>,
}

impl Cursor for MockCursor {
    fn fetch(&mut self) -> Result<Option<Row>> {
        let fetched = self.counts.fetched.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failures.fetch == Some(fetched) {
            return Err(anyhow!("Disk I/O error"));
        }
        Ok(self.rows.pop_front())
    }

    fn close(self) -> Result<()> {
        self.counts.cursors_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
