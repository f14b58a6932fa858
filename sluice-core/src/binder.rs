use crate::{Result, SqlInfo, Value, error::configuration};
use futures::{
    Stream, StreamExt,
    stream::{self, BoxStream},
};
use std::{fmt, sync::Arc};

/// A value to bind, optionally tagged with the name of the placeholder it targets.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: Option<String>,
    pub value: Value,
}

impl Parameter {
    pub fn named(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: Some(name.into()),
            value: value.into(),
        }
    }
    pub fn has_name(&self) -> bool {
        self.name.is_some()
    }
}

impl<T: Into<Value>> From<T> for Parameter {
    fn from(value: T) -> Self {
        Self {
            name: None,
            value: value.into(),
        }
    }
}

/// The values of one statement execution, in declared order.
pub type ParameterGroup = Vec<Value>;

/// The ordered, possibly asynchronous, sequence of groups a query executes.
pub type ParameterGroups = BoxStream<'static, Result<ParameterGroup>>;

/// The binding mode of a query, fixed by the first binding call.
#[derive(Default)]
pub enum Binding {
    #[default]
    Unbound,
    /// Flat list already split in validated groups.
    Flat(Vec<ParameterGroup>),
    /// Named values accumulated one by one, grouped on execution.
    Named(Vec<Parameter>),
    /// Externally supplied groups, in call order.
    Streamed(Vec<ParameterGroups>),
}

impl Binding {
    pub fn mode(&self) -> &'static str {
        match self {
            Binding::Unbound => "no",
            Binding::Flat(..) => "flat list",
            Binding::Named(..) => "named",
            Binding::Streamed(..) => "streamed group",
        }
    }

    fn switch(&self, mode: &'static str) -> Result<()> {
        if matches!(self, Binding::Unbound) || self.mode() == mode {
            return Ok(());
        }
        Err(configuration(format!(
            "Cannot bind {} parameters after {} parameters were bound",
            mode,
            self.mode()
        )))
    }

    /// Append a flat list, split into groups of the declared parameter count.
    pub fn flat(&mut self, info: &SqlInfo, values: Vec<Parameter>) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        self.switch("flat list")?;
        let count = info.parameter_count();
        if count == 0 {
            return Err(configuration(format!(
                "No parameters present in sql but {} values were supplied: {}",
                values.len(),
                info.sql()
            )));
        }
        if values.len() % count != 0 {
            return Err(configuration(format!(
                "The number of values ({}) should be a multiple of the number of parameters ({}) in sql: {}",
                values.len(),
                count,
                info.sql()
            )));
        }
        if info.is_named() && values.iter().any(|v| !v.has_name()) {
            return Err(configuration(format!(
                "Every value must be named because the sql declares named parameters: {}",
                info.sql()
            )));
        }
        let mut groups = Vec::with_capacity(values.len() / count);
        let mut values = values.into_iter();
        loop {
            let chunk: Vec<Parameter> = values.by_ref().take(count).collect();
            if chunk.is_empty() {
                break;
            }
            groups.push(group(info, chunk)?);
        }
        match self {
            Binding::Flat(existing) => existing.extend(groups),
            _ => *self = Binding::Flat(groups),
        }
        Ok(())
    }

    /// Accumulate one named value.
    pub fn named(&mut self, info: &SqlInfo, parameter: Parameter) -> Result<()> {
        self.switch("named")?;
        let Some(name) = &parameter.name else {
            return Err(configuration("A named parameter must carry a name"));
        };
        if info.name_index(name).is_none() {
            return Err(configuration(format!(
                "Parameter `{}` is not declared in sql: {}",
                name,
                info.sql()
            )));
        }
        match self {
            Binding::Named(values) => values.push(parameter),
            _ => *self = Binding::Named(vec![parameter]),
        }
        Ok(())
    }

    /// Append externally grouped values.
    pub fn streamed(&mut self, groups: ParameterGroups) -> Result<()> {
        self.switch("streamed group")?;
        match self {
            Binding::Streamed(streams) => streams.push(groups),
            _ => *self = Binding::Streamed(vec![groups]),
        }
        Ok(())
    }

    /// Turn the binding into the group sequence to execute.
    ///
    /// Flat and named groups are fully validated here, before any statement is prepared.
    /// Streamed groups are checked one by one as they arrive.
    pub fn resolve(self, info: &Arc<SqlInfo>) -> Result<ParameterGroups> {
        let count = info.parameter_count();
        match self {
            Binding::Unbound if count == 0 => Ok(stream::iter([Ok(Vec::new())]).boxed()),
            Binding::Unbound => Err(configuration(format!(
                "The sql declares {} parameters but none were bound: {}",
                count,
                info.sql()
            ))),
            Binding::Flat(groups) => Ok(stream::iter(groups.into_iter().map(Ok)).boxed()),
            Binding::Named(values) => {
                if values.len() % count != 0 {
                    return Err(configuration(format!(
                        "The number of named values ({}) should be a multiple of the number of parameters ({}) in sql: {}",
                        values.len(),
                        count,
                        info.sql()
                    )));
                }
                let mut groups = Vec::with_capacity(values.len() / count);
                let mut values = values.into_iter();
                loop {
                    let chunk: Vec<Parameter> = values.by_ref().take(count).collect();
                    if chunk.is_empty() {
                        break;
                    }
                    groups.push(group(info, chunk)?);
                }
                Ok(stream::iter(groups.into_iter().map(Ok)).boxed())
            }
            Binding::Streamed(streams) => {
                let info = info.clone();
                Ok(stream::iter(streams)
                    .flatten()
                    .map(move |group| {
                        let group = group?;
                        if group.len() != info.parameter_count() {
                            return Err(configuration(format!(
                                "A parameter group holds {} values but the sql declares {} parameters: {}",
                                group.len(),
                                info.parameter_count(),
                                info.sql()
                            )));
                        }
                        Ok(group)
                    })
                    .boxed())
            }
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Unbound => f.write_str("Unbound"),
            Binding::Flat(groups) => f.debug_tuple("Flat").field(groups).finish(),
            Binding::Named(values) => f.debug_tuple("Named").field(values).finish(),
            Binding::Streamed(streams) => write!(f, "Streamed({} streams)", streams.len()),
        }
    }
}

/// Build one group, reordering named values into the declared name order.
fn group(info: &SqlInfo, chunk: Vec<Parameter>) -> Result<ParameterGroup> {
    if !info.is_named() {
        return Ok(chunk.into_iter().map(|v| v.value).collect());
    }
    let mut slots: Vec<Option<Value>> = vec![None; info.parameter_count()];
    for parameter in chunk {
        let name = parameter.name.unwrap_or_default();
        let Some(index) = info.name_index(&name) else {
            return Err(configuration(format!(
                "Parameter `{}` is not declared in sql: {}",
                name,
                info.sql()
            )));
        };
        if slots[index].is_some() {
            return Err(configuration(format!(
                "Parameter `{}` appears twice in the same group for sql: {}",
                name,
                info.sql()
            )));
        }
        slots[index] = Some(parameter.value);
    }
    slots
        .into_iter()
        .zip(info.names())
        .map(|(value, name)| {
            value.ok_or_else(|| {
                configuration(format!(
                    "Parameter `{}` is missing from a group for sql: {}",
                    name,
                    info.sql()
                ))
            })
        })
        .collect()
}

/// Adapt any stream of value lists into [`ParameterGroups`].
pub fn parameter_groups<S, G>(groups: S) -> ParameterGroups
where
    S: Stream<Item = Result<G>> + Send + 'static,
    G: IntoIterator,
    G::Item: Into<Value>,
{
    groups
        .map(|group| group.map(|v| v.into_iter().map(Into::into).collect()))
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QueryError;
    use futures::{TryStreamExt, executor::block_on};

    fn kind(error: &crate::Error) -> &QueryError {
        error.downcast_ref::<QueryError>().unwrap()
    }

    fn collect(binding: Binding, info: &Arc<SqlInfo>) -> Result<Vec<ParameterGroup>> {
        block_on(binding.resolve(info)?.try_collect())
    }

    #[test]
    fn flat_list_is_grouped() {
        let info = SqlInfo::parse("select score from person where name=?").unwrap();
        let mut binding = Binding::default();
        binding
            .flat(&info, vec!["FRED".into(), "JOSEPH".into()])
            .unwrap();
        binding.flat(&info, vec!["MARMADUKE".into()]).unwrap();
        let groups = collect(binding, &info).unwrap();
        assert_eq!(
            groups,
            [
                vec![Value::from("FRED")],
                vec![Value::from("JOSEPH")],
                vec![Value::from("MARMADUKE")]
            ]
        );
    }

    #[test]
    fn flat_list_must_be_a_multiple() {
        let info = SqlInfo::parse("select * from t where a = ? and b = ?").unwrap();
        let mut binding = Binding::default();
        let error = binding
            .flat(&info, vec![1.into(), 2.into(), 3.into()])
            .unwrap_err();
        assert!(kind(&error).is_configuration());
    }

    #[test]
    fn values_without_placeholders() {
        let info = SqlInfo::parse("select score from person").unwrap();
        let mut binding = Binding::default();
        let error = binding
            .flat(&info, vec!["FRED".into(), "JOSEPH".into()])
            .unwrap_err();
        assert!(kind(&error).is_configuration());
        binding.flat(&info, vec![]).unwrap();
        assert_eq!(collect(binding, &info).unwrap(), [Vec::<Value>::new()]);
    }

    #[test]
    fn named_sql_needs_named_values() {
        let info = SqlInfo::parse("select score from person where name=:name").unwrap();
        let mut binding = Binding::default();
        let error = binding
            .flat(&info, vec!["FRED".into(), "JOSEPH".into()])
            .unwrap_err();
        assert!(kind(&error).is_configuration());
        binding
            .flat(
                &info,
                vec![
                    Parameter::named("name", "FRED"),
                    Parameter::named("name", "JOSEPH"),
                ],
            )
            .unwrap();
        assert_eq!(collect(binding, &info).unwrap().len(), 2);
    }

    #[test]
    fn named_values_are_reordered() {
        let info = SqlInfo::parse("select * from t where a = :a and b = :b").unwrap();
        let mut binding = Binding::default();
        for (name, value) in [("b", 2), ("a", 1), ("a", 3), ("b", 4)] {
            binding.named(&info, Parameter::named(name, value)).unwrap();
        }
        assert_eq!(
            collect(binding, &info).unwrap(),
            [
                vec![Value::Int64(Some(1)), Value::Int64(Some(2))],
                vec![Value::Int64(Some(3)), Value::Int64(Some(4))]
            ]
        );
    }

    #[test]
    fn named_leftovers_fail_on_resolve() {
        let info = SqlInfo::parse("select * from t where a = :a and b = :b").unwrap();
        let mut binding = Binding::default();
        binding.named(&info, Parameter::named("a", 1)).unwrap();
        let error = binding.resolve(&info).err().unwrap();
        assert!(kind(&error).is_configuration());
        let mut binding = Binding::default();
        binding.named(&info, Parameter::named("a", 1)).unwrap();
        binding.named(&info, Parameter::named("a", 2)).unwrap();
        let error = binding.resolve(&info).err().unwrap();
        assert!(kind(&error).is_configuration());
        let error = Binding::default()
            .named(&info, Parameter::named("c", 1))
            .unwrap_err();
        assert!(kind(&error).is_configuration());
    }

    #[test]
    fn modes_are_exclusive() {
        let info = SqlInfo::parse("select score from person where name=:name").unwrap();
        let mut binding = Binding::default();
        binding
            .named(&info, Parameter::named("name", "FRED"))
            .unwrap();
        let error = binding
            .flat(&info, vec![Parameter::named("name", "JOSEPH")])
            .unwrap_err();
        assert!(kind(&error).is_configuration());
        let error = binding.streamed(stream::empty().boxed()).unwrap_err();
        assert!(kind(&error).is_configuration());
        assert_eq!(binding.mode(), "named");
    }

    #[test]
    fn unbound_statement_with_parameters() {
        let info = SqlInfo::parse("select score from person where name=?").unwrap();
        let error = Binding::default().resolve(&info).err().unwrap();
        assert!(kind(&error).is_configuration());
    }

    #[test]
    fn streamed_groups_are_checked_lazily() {
        let info = SqlInfo::parse("select score from person where name=?").unwrap();
        let mut binding = Binding::default();
        binding
            .streamed(parameter_groups(stream::iter([
                Ok(vec!["FRED"]),
                Ok(vec!["FRED", "JOSEPH"]),
            ])))
            .unwrap();
        let mut groups = binding.resolve(&info).unwrap();
        assert!(block_on(groups.try_next()).unwrap().is_some());
        let error = block_on(groups.try_next()).unwrap_err();
        assert!(kind(&error).is_configuration());
    }
}
