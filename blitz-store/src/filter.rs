use serde_json::Value;

/// Typed filter passed to the record store.
///
/// Clauses are composed as tagged variants rather than query-string
/// fragments, so field names and values never get concatenated into the
/// backend's wire syntax by this crate.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every row.
    All,
    /// Field present and equal to the value.
    Eq(&'static str, Value),
    /// Field different from the value; an absent field matches.
    Ne(&'static str, Value),
    /// Field present and contained in the set.
    In(&'static str, Vec<Value>),
    /// Field absent or null.
    Missing(&'static str),
    /// Every clause matches. An empty conjunction matches everything.
    And(Vec<Filter>),
    /// At least one clause matches. An empty disjunction matches nothing.
    Or(Vec<Filter>),
}

impl Filter {
    /// Evaluate this filter against a row. Backends that hold rows locally
    /// (the memory store, caches) use this as their query engine.
    pub fn matches(&self, row: &Value) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, value) => row.get(field) == Some(value),
            Filter::Ne(field, value) => row.get(field) != Some(value),
            Filter::In(field, values) => {
                row.get(field).is_some_and(|found| values.contains(found))
            }
            Filter::Missing(field) => row.get(field).is_none_or(Value::is_null),
            Filter::And(clauses) => clauses.iter().all(|clause| clause.matches(row)),
            Filter::Or(clauses) => clauses.iter().any(|clause| clause.matches(row)),
        }
    }
}
