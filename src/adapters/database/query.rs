use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    /// Matches documents whose field is present and differs from the value.
    NotEq(String, Value),
    /// Matches documents whose array field holds the value.
    ArrayContains(String, Value),
}

impl Filter {
    #[must_use]
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Self::Eq(field, value) => doc.get(field) == Some(value),
            Self::NotEq(field, value) => doc.get(field).is_some_and(|v| !v.is_null() && v != value),
            Self::ArrayContains(field, value) => {
                doc.get(field).and_then(Value::as_array).is_some_and(|items| items.contains(value))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Equality-filtered, optionally ordered and limited query over one collection.
///
/// Field names address top-level document fields only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.to_string(), value.into()));
        self
    }

    #[must_use]
    pub fn not_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::NotEq(field.to_string(), value.into()));
        self
    }

    #[must_use]
    pub fn array_contains(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::ArrayContains(field.to_string(), value.into()));
        self
    }

    #[must_use]
    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn matches(&self, doc: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
    }

    /// Filters, sorts and truncates `(id, document)` pairs already ordered by id.
    #[must_use]
    pub fn apply<'a, I>(&self, docs: I) -> Vec<(String, Value)>
    where
        I: IntoIterator<Item = (&'a String, &'a Value)>,
    {
        let mut hits: Vec<(String, Value)> =
            docs.into_iter().filter(|(_, doc)| self.matches(doc)).map(|(id, doc)| (id.clone(), doc.clone())).collect();

        if let Some((field, direction)) = &self.order_by {
            // Stable sort keeps id order between equal keys.
            hits.sort_by(|(_, a), (_, b)| {
                let ord = compare_values(a.get(field), b.get(field));
                match direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }

        if let Some(limit) = self.limit {
            hits.truncate(limit);
        }
        hits
    }
}

/// Total order over optional JSON values: missing < null < bool < number < string < others.
#[must_use]
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    const fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(Value::Array(_)) => 5,
            Some(Value::Object(_)) => 6,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or_default(), y.as_f64().unwrap_or_default());
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
