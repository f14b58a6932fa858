use crate::{Result, Value, error::syntax};
use std::{
    collections::HashMap,
    sync::{Arc, LazyLock, RwLock},
};

/// One placeholder declared in the SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSpec {
    /// Position of the placeholder in the text (from 0).
    pub index: usize,
    /// Name of a `:name` placeholder, `None` for a bare `?`.
    pub name: Option<String>,
}

/// Placeholder metadata of a SQL statement.
///
/// Recognizes bare `?` markers and `:name` markers, skipping quoted strings, quoted
/// identifiers, comments and `::` casts. Named markers are rewritten to `?` in
/// [`SqlInfo::parsed_sql`], drivers only ever see positional placeholders.
#[derive(Debug, PartialEq, Eq)]
pub struct SqlInfo {
    sql: String,
    parsed_sql: String,
    parameters: Vec<ParameterSpec>,
    names: Vec<String>,
    slots: Vec<usize>,
}

static CACHE: LazyLock<RwLock<HashMap<String, Arc<SqlInfo>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

const CACHE_LIMIT: usize = 1024;

#[derive(Clone, Copy)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment,
}

impl SqlInfo {
    /// Analyze `sql`, memoized per statement text.
    pub fn parse(sql: &str) -> Result<Arc<SqlInfo>> {
        if let Ok(cache) = CACHE.read()
            && let Some(info) = cache.get(sql)
        {
            return Ok(info.clone());
        }
        let info = Arc::new(Self::analyze(sql)?);
        if let Ok(mut cache) = CACHE.write() {
            if cache.len() >= CACHE_LIMIT {
                cache.clear();
            }
            cache.insert(sql.to_string(), info.clone());
        }
        Ok(info)
    }

    /// Analyze `sql` without touching the cache.
    pub fn analyze(sql: &str) -> Result<SqlInfo> {
        let bytes = sql.as_bytes();
        let mut parsed_sql = String::with_capacity(sql.len());
        let mut parameters = Vec::new();
        let mut state = State::Normal;
        let mut copied = 0;
        let mut idx = 0;
        while idx < bytes.len() {
            let b = bytes[idx];
            match state {
                State::Normal => match b {
                    b'\'' => state = State::SingleQuoted,
                    b'"' => state = State::DoubleQuoted,
                    b'-' if bytes.get(idx + 1) == Some(&b'-') => {
                        state = State::LineComment;
                        idx += 1;
                    }
                    b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                        state = State::BlockComment;
                        idx += 1;
                    }
                    b'?' => parameters.push(ParameterSpec {
                        index: parameters.len(),
                        name: None,
                    }),
                    b':' if bytes.get(idx + 1) == Some(&b':') => idx += 1,
                    b':' => {
                        let end = scan_identifier(bytes, idx + 1);
                        if end == idx + 1 {
                            return Err(syntax(
                                sql,
                                format!("named parameter at byte {} has an empty name", idx),
                            ));
                        }
                        parameters.push(ParameterSpec {
                            index: parameters.len(),
                            name: Some(sql[idx + 1..end].to_string()),
                        });
                        parsed_sql.push_str(&sql[copied..idx]);
                        parsed_sql.push('?');
                        copied = end;
                        idx = end;
                        continue;
                    }
                    _ => {}
                },
                State::SingleQuoted => {
                    if b == b'\'' {
                        if bytes.get(idx + 1) == Some(&b'\'') {
                            idx += 1;
                        } else {
                            state = State::Normal;
                        }
                    }
                }
                State::DoubleQuoted => {
                    if b == b'"' {
                        if bytes.get(idx + 1) == Some(&b'"') {
                            idx += 1;
                        } else {
                            state = State::Normal;
                        }
                    }
                }
                State::LineComment => {
                    if b == b'\n' {
                        state = State::Normal;
                    }
                }
                State::BlockComment => {
                    if b == b'*' && bytes.get(idx + 1) == Some(&b'/') {
                        state = State::Normal;
                        idx += 1;
                    }
                }
            }
            idx += 1;
        }
        parsed_sql.push_str(&sql[copied..]);

        let named = parameters.iter().filter(|v| v.name.is_some()).count();
        if named > 0 && named < parameters.len() {
            return Err(syntax(
                sql,
                "named and positional parameters cannot be mixed in the same statement",
            ));
        }
        let mut names: Vec<String> = Vec::new();
        let mut slots = Vec::with_capacity(parameters.len());
        for (i, parameter) in parameters.iter().enumerate() {
            let Some(name) = &parameter.name else {
                slots.push(i);
                continue;
            };
            let slot = match names.iter().position(|v| v == name) {
                Some(slot) => slot,
                None => {
                    names.push(name.clone());
                    names.len() - 1
                }
            };
            slots.push(slot);
        }
        Ok(SqlInfo {
            sql: sql.to_string(),
            parsed_sql,
            parameters,
            names,
            slots,
        })
    }

    /// The original SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The SQL text with every named marker replaced by `?`.
    pub fn parsed_sql(&self) -> &str {
        &self.parsed_sql
    }

    /// Every placeholder occurrence, in text order.
    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    /// Distinct parameter names in order of first appearance, empty for positional statements.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_named(&self) -> bool {
        !self.names.is_empty()
    }

    /// Number of values a parameter group must hold: the placeholder count for
    /// positional statements, the distinct name count for named ones.
    pub fn parameter_count(&self) -> usize {
        if self.is_named() {
            self.names.len()
        } else {
            self.parameters.len()
        }
    }

    /// Index of `name` inside a named parameter group.
    pub fn name_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|v| v == name)
    }

    /// Spread a parameter group over the placeholders, in placeholder order.
    ///
    /// A name used more than once in the text receives the same value each time.
    pub fn placeholder_values(&self, group: &[Value]) -> Vec<Value> {
        self.slots
            .iter()
            .filter_map(|slot| group.get(*slot).cloned())
            .collect()
    }
}

fn scan_identifier(bytes: &[u8], start: usize) -> usize {
    match bytes.get(start) {
        Some(b) if b.is_ascii_alphabetic() || *b == b'_' => {}
        _ => return start,
    }
    let mut idx = start + 1;
    while idx < bytes.len() && (bytes[idx].is_ascii_alphanumeric() || bytes[idx] == b'_') {
        idx += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QueryError;

    #[test]
    fn positional() {
        let info = SqlInfo::analyze("select score from person where name=? and score > ?").unwrap();
        assert_eq!(info.parameter_count(), 2);
        assert!(!info.is_named());
        assert_eq!(info.parsed_sql(), info.sql());
        assert_eq!(
            info.parameters()[1],
            ParameterSpec {
                index: 1,
                name: None
            }
        );
    }

    #[test]
    fn named_are_rewritten() {
        let info =
            SqlInfo::analyze("select * from person where name=:name or nick = :name and x>:min_2")
                .unwrap();
        assert_eq!(
            info.parsed_sql(),
            "select * from person where name=? or nick = ? and x>?"
        );
        assert_eq!(info.parameters().len(), 3);
        assert_eq!(info.names(), ["name", "min_2"]);
        assert_eq!(info.parameter_count(), 2);
        assert_eq!(
            info.placeholder_values(&[Value::Int64(Some(1)), Value::Int64(Some(2))]),
            [
                Value::Int64(Some(1)),
                Value::Int64(Some(1)),
                Value::Int64(Some(2))
            ]
        );
    }

    #[test]
    fn literals_comments_and_casts_are_skipped() {
        let info = SqlInfo::analyze(
            "select '?:a', \"we:ird?\", x::text -- what?\n/* :b ? */ from t where a = ?",
        )
        .unwrap();
        assert_eq!(info.parameter_count(), 1);
        assert!(!info.is_named());
        let info = SqlInfo::analyze("select 'it''s ?' from t where a = :a").unwrap();
        assert_eq!(info.names(), ["a"]);
        assert_eq!(info.parsed_sql(), "select 'it''s ?' from t where a = ?");
    }

    #[test]
    fn no_placeholders() {
        let info = SqlInfo::analyze("select score from person").unwrap();
        assert_eq!(info.parameter_count(), 0);
        assert!(info.parameters().is_empty());
    }

    #[test]
    fn malformed_name() {
        let error = SqlInfo::analyze("select * from t where a = : b").unwrap_err();
        assert!(error.downcast_ref::<QueryError>().unwrap().is_syntax());
        assert!(SqlInfo::analyze("select * from t where a = :1").is_err());
    }

    #[test]
    fn mixed_placeholders() {
        let error = SqlInfo::analyze("select * from t where a = :a and b = ?").unwrap_err();
        assert!(matches!(
            error.downcast_ref::<QueryError>(),
            Some(QueryError::Syntax { .. })
        ));
    }

    #[test]
    fn parse_is_memoized() {
        let sql = "select name from person where score = ? /* memo */";
        let first = SqlInfo::parse(sql).unwrap();
        let second = SqlInfo::parse(sql).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
