//! Predicate to SQL translation.
//!
//! Rows are stored as a JSON document column (`doc jsonb`) next to the
//! primary key and a row version. A [`Predicate`] becomes a `WHERE` clause
//! over that column in the PostgreSQL jsonb dialect, with literals bound as
//! positional parameters.
//!
//! Every leaf is written so that it never yields SQL `NULL` where the
//! client-side evaluator yields `false`; negation additionally coalesces so
//! `NOT` agrees with [`Predicate::matches`] on missing fields.

use std::fmt;

use depot_types::{Comparison, Predicate};
use serde_json::Value;

/// A parameterized SQL statement.
#[derive(Clone, Debug, PartialEq)]
pub struct SqlQuery {
    pub text: String,
    pub params: Vec<Value>,
}

impl fmt::Display for SqlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// `SELECT` for the rows of `table` matching `predicate`.
pub fn select(table: &str, predicate: &Predicate) -> SqlQuery {
    let mut params = Vec::new();
    let mut text = format!("SELECT id, doc, version FROM {}", quote_ident(table));
    if !matches!(predicate, Predicate::Always) {
        text.push_str(" WHERE ");
        text.push_str(&where_clause(predicate, &mut params));
    }
    text.push_str(" ORDER BY id");
    SqlQuery { text, params }
}

/// Render `predicate` as a boolean SQL expression, appending its literals
/// to `params`.
pub fn where_clause(predicate: &Predicate, params: &mut Vec<Value>) -> String {
    match predicate {
        Predicate::Always => "TRUE".into(),
        Predicate::Compare { field, cmp, value } => compare(field, *cmp, value, params),
        Predicate::Exists { field } => {
            let json = json_path(field);
            format!("({json} IS NOT NULL AND jsonb_typeof({json}) <> 'null')")
        }
        Predicate::And { all } => join(all, "AND", "TRUE", params),
        Predicate::Or { any } => join(any, "OR", "FALSE", params),
        Predicate::Not { inner } => {
            format!("NOT COALESCE({}, FALSE)", where_clause(inner, params))
        }
    }
}

fn join(parts: &[Predicate], op: &str, empty: &str, params: &mut Vec<Value>) -> String {
    if parts.is_empty() {
        return empty.into();
    }
    let rendered: Vec<String> = parts.iter().map(|p| where_clause(p, params)).collect();
    format!("({})", rendered.join(&format!(" {op} ")))
}

fn bind(params: &mut Vec<Value>, value: Value) -> String {
    params.push(value);
    format!("${}", params.len())
}

fn compare(field: &str, cmp: Comparison, value: &Value, params: &mut Vec<Value>) -> String {
    let json = json_path(field);
    let text = text_path(field);
    match cmp {
        Comparison::Eq | Comparison::Ne => {
            let op = if cmp == Comparison::Eq { "=" } else { "<>" };
            let p = bind(params, value.clone());
            format!("COALESCE({json}, 'null'::jsonb) {op} {p}::jsonb")
        }
        Comparison::Lt | Comparison::Le | Comparison::Gt | Comparison::Ge => {
            let op = cmp.symbol();
            match value {
                Value::Number(_) => {
                    let p = bind(params, value.clone());
                    format!("(jsonb_typeof({json}) = 'number' AND ({text})::numeric {op} {p})")
                }
                Value::String(_) => {
                    let p = bind(params, value.clone());
                    format!("(jsonb_typeof({json}) = 'string' AND {text} COLLATE \"C\" {op} {p})")
                }
                Value::Bool(_) => {
                    let p = bind(params, value.clone());
                    format!("(jsonb_typeof({json}) = 'boolean' AND ({text})::boolean {op} {p})")
                }
                Value::Null if matches!(cmp, Comparison::Le | Comparison::Ge) => {
                    format!("jsonb_typeof({json}) = 'null'")
                }
                _ => "FALSE".into(),
            }
        }
        Comparison::In => match value {
            Value::Array(options) if !options.is_empty() => {
                let placeholders: Vec<String> = options
                    .iter()
                    .map(|o| format!("{}::jsonb", bind(params, o.clone())))
                    .collect();
                format!("{json} IN ({})", placeholders.join(", "))
            }
            _ => "FALSE".into(),
        },
        Comparison::Contains => {
            let element = bind(params, value.clone());
            let in_array = format!(
                "(jsonb_typeof({json}) = 'array' AND {json} @> jsonb_build_array({element}::jsonb))"
            );
            match value {
                Value::String(_) => {
                    let needle = bind(params, value.clone());
                    format!(
                        "((jsonb_typeof({json}) = 'string' AND strpos({text}, {needle}) > 0) OR {in_array})"
                    )
                }
                _ => in_array,
            }
        }
        Comparison::StartsWith => match value {
            Value::String(_) => {
                let p = bind(params, value.clone());
                format!("(jsonb_typeof({json}) = 'string' AND starts_with({text}, {p}))")
            }
            _ => "FALSE".into(),
        },
    }
}

/// `doc #> '{a,b}'`: the jsonb value at a dotted path.
fn json_path(field: &str) -> String {
    format!("doc #> {}", path_literal(field))
}

/// `doc #>> '{a,b}'`: the same value as text.
fn text_path(field: &str) -> String {
    format!("doc #>> {}", path_literal(field))
}

fn path_literal(field: &str) -> String {
    let segments: Vec<String> = field.split('.').map(array_element).collect();
    let array = format!("{{{}}}", segments.join(","));
    format!("'{}'", array.replace('\'', "''"))
}

/// One element of a PostgreSQL text-array literal.
fn array_element(segment: &str) -> String {
    let needs_quotes = segment.is_empty()
        || segment
            .chars()
            .any(|c| matches!(c, ',' | '{' | '}' | '"' | '\\' | ' '));
    if needs_quotes {
        let escaped = segment.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{escaped}\"")
    } else {
        segment.to_string()
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use depot_types::Field;
    use serde_json::json;

    use super::*;

    fn render(p: &Predicate) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = where_clause(p, &mut params);
        (sql, params)
    }

    #[test]
    fn select_without_filter() {
        let q = select("users", &Predicate::Always);
        assert_eq!(q.text, "SELECT id, doc, version FROM \"users\" ORDER BY id");
        assert!(q.params.is_empty());
    }

    #[test]
    fn numeric_comparison_binds_parameter() {
        let q = select("users", &Field::new("age").ge(18));
        assert_eq!(
            q.text,
            "SELECT id, doc, version FROM \"users\" WHERE \
             (jsonb_typeof(doc #> '{age}') = 'number' AND (doc #>> '{age}')::numeric >= $1) \
             ORDER BY id"
        );
        assert_eq!(q.params, vec![json!(18)]);
    }

    #[test]
    fn equality_treats_missing_as_null() {
        let (sql, params) = render(&Field::new("address.city").eq("Oslo"));
        assert_eq!(sql, "COALESCE(doc #> '{address,city}', 'null'::jsonb) = $1::jsonb");
        assert_eq!(params, vec![json!("Oslo")]);
    }

    #[test]
    fn composition_numbers_parameters_in_order() {
        let p = Field::new("age")
            .gt(3)
            .and(Field::new("name").starts_with("A").or(Field::new("tags").contains("vip")))
            .and(!Field::new("deleted").exists());
        let (sql, params) = render(&p);
        assert!(sql.starts_with("(("), "{sql}");
        assert!(sql.contains(" AND NOT COALESCE("), "{sql}");
        assert!(sql.contains("starts_with(doc #>> '{name}', $2)"), "{sql}");
        assert!(sql.contains("jsonb_build_array($3::jsonb)"), "{sql}");
        assert!(sql.contains("strpos(doc #>> '{tags}', $4)"), "{sql}");
        assert_eq!(params, vec![json!(3), json!("A"), json!("vip"), json!("vip")]);
    }

    /// Null and missing-field edge cases. Each row gives the clause and the
    /// outcome for `{}`, `{"f": null}` and `{"f": 20}`, which is what both
    /// the SQL and [`Predicate::matches`] must produce.
    #[test]
    fn null_and_missing_field_edge_cases() {
        struct Case {
            predicate: Predicate,
            sql: &'static str,
            params: Vec<Value>,
            outcomes: [bool; 3],
        }

        let cases = vec![
            Case {
                predicate: !Field::new("f").gt(17),
                sql: "NOT COALESCE((jsonb_typeof(doc #> '{f}') = 'number' \
                      AND (doc #>> '{f}')::numeric > $1), FALSE)",
                params: vec![json!(17)],
                outcomes: [true, true, false],
            },
            Case {
                predicate: !Field::new("f").eq(20),
                sql: "NOT COALESCE(COALESCE(doc #> '{f}', 'null'::jsonb) = $1::jsonb, FALSE)",
                params: vec![json!(20)],
                outcomes: [true, true, false],
            },
            Case {
                predicate: !Field::new("f").exists(),
                sql: "NOT COALESCE((doc #> '{f}' IS NOT NULL \
                      AND jsonb_typeof(doc #> '{f}') <> 'null'), FALSE)",
                params: vec![],
                outcomes: [true, true, false],
            },
            Case {
                predicate: Field::new("f").eq(Value::Null),
                sql: "COALESCE(doc #> '{f}', 'null'::jsonb) = $1::jsonb",
                params: vec![Value::Null],
                outcomes: [true, true, false],
            },
            Case {
                predicate: Field::new("f").ne(Value::Null),
                sql: "COALESCE(doc #> '{f}', 'null'::jsonb) <> $1::jsonb",
                params: vec![Value::Null],
                outcomes: [false, false, true],
            },
            Case {
                predicate: Field::new("f").le(Value::Null),
                sql: "jsonb_typeof(doc #> '{f}') = 'null'",
                params: vec![],
                outcomes: [false, true, false],
            },
            Case {
                predicate: Field::new("f").ge(Value::Null),
                sql: "jsonb_typeof(doc #> '{f}') = 'null'",
                params: vec![],
                outcomes: [false, true, false],
            },
            Case {
                predicate: Field::new("f").lt(Value::Null),
                sql: "FALSE",
                params: vec![],
                outcomes: [false, false, false],
            },
            Case {
                predicate: !Field::new("f").le(Value::Null),
                sql: "NOT COALESCE(jsonb_typeof(doc #> '{f}') = 'null', FALSE)",
                params: vec![],
                outcomes: [true, false, true],
            },
        ];

        let docs = [json!({}), json!({"f": null}), json!({"f": 20})];
        for case in cases {
            let (sql, params) = render(&case.predicate);
            assert_eq!(sql, case.sql, "{}", case.predicate);
            assert_eq!(params, case.params, "{}", case.predicate);
            for (doc, expected) in docs.iter().zip(case.outcomes) {
                assert_eq!(
                    case.predicate.matches(doc),
                    expected,
                    "{} on {doc}",
                    case.predicate
                );
            }
        }
    }

    #[test]
    fn empty_in_list_is_false() {
        let (sql, params) = render(&Field::new("x").is_in(Vec::<i32>::new()));
        assert_eq!(sql, "FALSE");
        assert!(params.is_empty());
    }

    #[test]
    fn in_list_binds_each_option() {
        let (sql, params) = render(&Field::new("status").is_in(["open", "held"]));
        assert_eq!(sql, "doc #> '{status}' IN ($1::jsonb, $2::jsonb)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn kind_mismatched_ordering_is_false() {
        let (sql, _) = render(&Field::new("tags").lt(json!([1, 2])));
        assert_eq!(sql, "FALSE");
    }

    #[test]
    fn empty_conjunction_and_disjunction() {
        assert_eq!(render(&Predicate::And { all: vec![] }).0, "TRUE");
        assert_eq!(render(&Predicate::Or { any: vec![] }).0, "FALSE");
    }

    #[test]
    fn awkward_identifiers_are_quoted() {
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        let (sql, _) = render(&Field::new("o'brien.a,b").exists());
        assert!(sql.contains("'{o''brien,\"a,b\"}'"), "{sql}");
    }
}
