//! Backend-independent filter expressions.
//!
//! A [`Predicate`] is a small expression tree of field comparisons combined
//! with `And` / `Or` / `Not`. Backends that can translate it into a native
//! query do so (push-down); every other backend evaluates it client-side
//! with [`Predicate::matches`] against the entity's serialized form.
//!
//! ```
//! use depot_types::{Field, Predicate};
//! use serde_json::json;
//!
//! let adults_named_a = Field::new("age").ge(18).and(Field::new("name").starts_with("A"));
//! assert!(adults_named_a.matches(&json!({"name": "Ana", "age": 30})));
//! assert!(!adults_named_a.matches(&json!({"name": "Ana", "age": 12})));
//! ```

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;

/// Comparison operator between a field and a literal value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// The literal is an array; the field must equal one of its elements.
    In,
    /// Substring match on strings, membership on arrays.
    Contains,
    StartsWith,
}

impl Comparison {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::In => "in",
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
        }
    }
}

/// A boolean expression over an entity's fields.
///
/// Fields are dotted paths into the serialized entity (`"address.city"`,
/// `"tags.0"`). Comparing values of different JSON kinds yields `false`;
/// it is never an error. Numbers compare numerically regardless of their
/// integer or float representation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// Matches every entity.
    Always,
    Compare {
        field: String,
        cmp: Comparison,
        value: Value,
    },
    /// The field is present and not `null`.
    Exists { field: String },
    And { all: Vec<Predicate> },
    Or { any: Vec<Predicate> },
    Not { inner: Box<Predicate> },
}

impl Predicate {
    /// Conjunction. Nested `And`s are flattened and `Always` is absorbed.
    pub fn and(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::Always, p) | (p, Predicate::Always) => p,
            (Predicate::And { mut all }, Predicate::And { all: rest }) => {
                all.extend(rest);
                Predicate::And { all }
            }
            (Predicate::And { mut all }, p) => {
                all.push(p);
                Predicate::And { all }
            }
            (p, Predicate::And { mut all }) => {
                all.insert(0, p);
                Predicate::And { all }
            }
            (a, b) => Predicate::And { all: vec![a, b] },
        }
    }

    /// Disjunction. Nested `Or`s are flattened.
    pub fn or(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::Always, _) | (_, Predicate::Always) => Predicate::Always,
            (Predicate::Or { mut any }, Predicate::Or { any: rest }) => {
                any.extend(rest);
                Predicate::Or { any }
            }
            (Predicate::Or { mut any }, p) => {
                any.push(p);
                Predicate::Or { any }
            }
            (a, b) => Predicate::Or { any: vec![a, b] },
        }
    }

    /// Logical negation. A double negation collapses.
    pub fn negate(self) -> Predicate {
        match self {
            Predicate::Not { inner } => *inner,
            p => Predicate::Not { inner: Box::new(p) },
        }
    }

    /// Evaluate against an already-serialized document.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::Compare { field, cmp, value } => compare(resolve(doc, field), *cmp, value),
            Predicate::Exists { field } => resolve(doc, field).is_some_and(|v| !v.is_null()),
            Predicate::And { all } => all.iter().all(|p| p.matches(doc)),
            Predicate::Or { any } => any.iter().any(|p| p.matches(doc)),
            Predicate::Not { inner } => !inner.matches(doc),
        }
    }

    /// Serialize `entity` and evaluate against it.
    pub fn evaluate<T: Serialize>(&self, entity: &T) -> Result<bool, TypeError> {
        let doc =
            serde_json::to_value(entity).map_err(|e| TypeError::Serialization(e.to_string()))?;
        Ok(self.matches(&doc))
    }

    /// All field paths referenced by this predicate, in first-seen order.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::Always => {}
            Predicate::Compare { field, .. } | Predicate::Exists { field } => {
                if !out.contains(&field.as_str()) {
                    out.push(field);
                }
            }
            Predicate::And { all: ps } | Predicate::Or { any: ps } => {
                ps.iter().for_each(|p| p.collect_fields(out))
            }
            Predicate::Not { inner } => inner.collect_fields(out),
        }
    }
}

impl std::ops::Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Predicate {
        self.negate()
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |f: &mut fmt::Formatter<'_>, ps: &[Predicate], sep: &str| -> fmt::Result {
            write!(f, "(")?;
            for (i, p) in ps.iter().enumerate() {
                if i > 0 {
                    write!(f, " {sep} ")?;
                }
                write!(f, "{p}")?;
            }
            write!(f, ")")
        };
        match self {
            Predicate::Always => write!(f, "true"),
            Predicate::Compare { field, cmp, value } => {
                write!(f, "{field} {} {value}", cmp.symbol())
            }
            Predicate::Exists { field } => write!(f, "exists({field})"),
            Predicate::And { all } => join(f, all, "and"),
            Predicate::Or { any } => join(f, any, "or"),
            Predicate::Not { inner } => write!(f, "not {inner}"),
        }
    }
}

/// Builder for comparisons against one field path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field(String);

impl Field {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &str {
        &self.0
    }

    fn compare(&self, cmp: Comparison, value: impl Into<Value>) -> Predicate {
        Predicate::Compare {
            field: self.0.clone(),
            cmp,
            value: value.into(),
        }
    }

    pub fn eq(&self, value: impl Into<Value>) -> Predicate {
        self.compare(Comparison::Eq, value)
    }

    pub fn ne(&self, value: impl Into<Value>) -> Predicate {
        self.compare(Comparison::Ne, value)
    }

    pub fn lt(&self, value: impl Into<Value>) -> Predicate {
        self.compare(Comparison::Lt, value)
    }

    pub fn le(&self, value: impl Into<Value>) -> Predicate {
        self.compare(Comparison::Le, value)
    }

    pub fn gt(&self, value: impl Into<Value>) -> Predicate {
        self.compare(Comparison::Gt, value)
    }

    pub fn ge(&self, value: impl Into<Value>) -> Predicate {
        self.compare(Comparison::Ge, value)
    }

    pub fn is_in<I, V>(&self, values: I) -> Predicate
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.compare(Comparison::In, Value::Array(values))
    }

    pub fn contains(&self, value: impl Into<Value>) -> Predicate {
        self.compare(Comparison::Contains, value)
    }

    pub fn starts_with(&self, prefix: impl Into<String>) -> Predicate {
        self.compare(Comparison::StartsWith, Value::String(prefix.into()))
    }

    pub fn exists(&self) -> Predicate {
        Predicate::Exists {
            field: self.0.clone(),
        }
    }
}

/// Resolve a dotted path. Numeric segments index into arrays.
pub fn resolve<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn compare(actual: Option<&Value>, cmp: Comparison, expected: &Value) -> bool {
    match cmp {
        Comparison::Eq => match actual {
            None => expected.is_null(),
            Some(v) => values_equal(v, expected),
        },
        Comparison::Ne => !compare(actual, Comparison::Eq, expected),
        Comparison::Lt => order(actual, expected) == Some(Ordering::Less),
        Comparison::Le => matches!(order(actual, expected), Some(Ordering::Less | Ordering::Equal)),
        Comparison::Gt => order(actual, expected) == Some(Ordering::Greater),
        Comparison::Ge => {
            matches!(order(actual, expected), Some(Ordering::Greater | Ordering::Equal))
        }
        Comparison::In => match (actual, expected) {
            (Some(v), Value::Array(options)) => options.iter().any(|o| values_equal(v, o)),
            _ => false,
        },
        Comparison::Contains => match (actual, expected) {
            (Some(Value::String(s)), Value::String(needle)) => s.contains(needle.as_str()),
            (Some(Value::Array(items)), needle) => items.iter().any(|i| values_equal(i, needle)),
            _ => false,
        },
        Comparison::StartsWith => match (actual, expected) {
            (Some(Value::String(s)), Value::String(prefix)) => s.starts_with(prefix.as_str()),
            _ => false,
        },
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => order(Some(a), b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

/// Ordering between two scalars of the same JSON kind; `None` otherwise.
fn order(actual: Option<&Value>, expected: &Value) -> Option<Ordering> {
    match (actual?, expected) {
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
                Some(x.cmp(&y))
            } else if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
                Some(x.cmp(&y))
            } else {
                a.as_f64()?.partial_cmp(&b.as_f64()?)
            }
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}
