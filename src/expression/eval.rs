// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! General evaluator for parsed extraction expressions.
//!
//! Evaluation is lazy: each filter produces a boxed iterator of results and
//! pipes are chained with `flat_map`, so a consumer that stops early never
//! evaluates the remaining branches.

use std::iter;

use serde_json::{Map, Value};

use super::parser::{CmpOp, Filter};
use crate::error::ExpressionError;

pub(crate) type Outputs<'a> = Box<dyn Iterator<Item = Result<Value, ExpressionError>> + 'a>;

fn single<'a>(result: Result<Value, ExpressionError>) -> Outputs<'a> {
    Box::new(iter::once(result))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn fail<'a>(message: String) -> Outputs<'a> {
    single(Err(ExpressionError::Evaluation(message)))
}

/// Runs `filter` against `input`.
pub(crate) fn run(filter: &Filter, input: Value) -> Outputs<'_> {
    match filter {
        Filter::Identity => single(Ok(input)),
        Filter::Field(name) => single(field(&input, name)),
        Filter::Index(index) => single(index_array(&input, *index)),
        Filter::Iterate => iterate(input),
        Filter::Literal(value) => single(Ok(value.clone())),
        Filter::Pipe(left, right) => {
            Box::new(run(left, input).flat_map(move |result| match result {
                Ok(value) => run(right, value),
                Err(err) => single(Err(err)),
            }))
        }
        Filter::Try(inner) => Box::new(run(inner, input).map_while(Result::ok).map(Ok)),
        Filter::Object(fields) => build_object(fields, &input),
        Filter::Select(condition) => {
            let candidate = input.clone();
            Box::new(run(condition, candidate).filter_map(move |result| match result {
                Ok(value) if is_truthy(&value) => Some(Ok(input.clone())),
                Ok(_) => None,
                Err(err) => Some(Err(err)),
            }))
        }
        Filter::Compare(left, op, right) => compare(left, *op, right, &input),
        Filter::Not => single(Ok(Value::Bool(!is_truthy(&input)))),
        Filter::Length => single(length(&input)),
        Filter::Keys => single(keys(&input)),
        Filter::Empty => Box::new(iter::empty()),
    }
}

/// Looks up an object key; absent keys and null inputs yield null.
pub(crate) fn field(input: &Value, name: &str) -> Result<Value, ExpressionError> {
    match input {
        Value::Object(map) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
        Value::Null => Ok(Value::Null),
        other => Err(ExpressionError::Evaluation(format!(
            "cannot index {} with {name:?}",
            type_name(other)
        ))),
    }
}

fn index_array(input: &Value, index: i64) -> Result<Value, ExpressionError> {
    match input {
        Value::Array(items) => {
            let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
            let resolved = if index < 0 { len + index } else { index };
            Ok(usize::try_from(resolved)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or(Value::Null))
        }
        Value::Null => Ok(Value::Null),
        other => Err(ExpressionError::Evaluation(format!(
            "cannot index {} with number",
            type_name(other)
        ))),
    }
}

fn iterate<'a>(input: Value) -> Outputs<'a> {
    match input {
        Value::Array(items) => Box::new(items.into_iter().map(Ok)),
        Value::Object(map) => Box::new(map.into_iter().map(|(_, value)| Ok(value))),
        other => fail(format!("cannot iterate over {}", type_name(&other))),
    }
}

/// Builds objects from the cartesian product of every field's outputs.
fn build_object<'a>(fields: &'a [(String, Filter)], input: &Value) -> Outputs<'a> {
    let mut partials = vec![Map::new()];
    for (key, filter) in fields {
        let values = match run(filter, input.clone()).collect::<Result<Vec<_>, _>>() {
            Ok(values) => values,
            Err(err) => return single(Err(err)),
        };
        partials = partials
            .into_iter()
            .flat_map(|partial| {
                values.iter().map(move |value| {
                    let mut next = partial.clone();
                    next.insert(key.clone(), value.clone());
                    next
                })
            })
            .collect();
    }
    Box::new(partials.into_iter().map(|map| Ok(Value::Object(map))))
}

fn compare<'a>(left: &'a Filter, op: CmpOp, right: &'a Filter, input: &Value) -> Outputs<'a> {
    let lhs = match run(left, input.clone()).collect::<Result<Vec<_>, _>>() {
        Ok(values) => values,
        Err(err) => return single(Err(err)),
    };
    let rhs = match run(right, input.clone()).collect::<Result<Vec<_>, _>>() {
        Ok(values) => values,
        Err(err) => return single(Err(err)),
    };
    let mut results = Vec::with_capacity(lhs.len() * rhs.len());
    for r in &rhs {
        for l in &lhs {
            let equal = values_equal(l, r);
            results.push(Ok(Value::Bool(match op {
                CmpOp::Eq => equal,
                CmpOp::Ne => !equal,
            })));
        }
    }
    Box::new(results.into_iter())
}

/// Structural equality that treats `1` and `1.0` as the same number.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(key, a)| y.get(key).is_some_and(|b| values_equal(a, b)))
        }
        _ => a == b,
    }
}

fn is_truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

fn length(input: &Value) -> Result<Value, ExpressionError> {
    match input {
        Value::Null => Ok(Value::from(0)),
        Value::Number(n) => Ok(n
            .as_i64()
            .map(|i| Value::from(i.unsigned_abs()))
            .or_else(|| n.as_f64().map(|f| Value::from(f.abs())))
            .unwrap_or(Value::Null)),
        Value::String(s) => Ok(Value::from(s.chars().count())),
        Value::Array(items) => Ok(Value::from(items.len())),
        Value::Object(map) => Ok(Value::from(map.len())),
        Value::Bool(_) => Err(ExpressionError::Evaluation(
            "boolean has no length".to_string(),
        )),
    }
}

fn keys(input: &Value) -> Result<Value, ExpressionError> {
    match input {
        Value::Object(map) => {
            let mut names: Vec<&String> = map.keys().collect();
            names.sort();
            Ok(Value::Array(
                names.into_iter().map(|k| Value::String(k.clone())).collect(),
            ))
        }
        Value::Array(items) => Ok(Value::Array((0..items.len()).map(Value::from).collect())),
        other => Err(ExpressionError::Evaluation(format!(
            "{} has no keys",
            type_name(other)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::expression::parser::parse;

    fn eval(expr: &str, input: Value) -> Vec<Result<Value, ExpressionError>> {
        let filter = parse(expr).unwrap();
        run(&filter, input).collect()
    }

    fn eval_ok(expr: &str, input: Value) -> Vec<Value> {
        eval(expr, input).into_iter().map(Result::unwrap).collect()
    }

    #[test]
    fn missing_field_is_null() {
        assert_eq!(eval_ok(".missing", json!({"a": 1})), vec![Value::Null]);
        assert_eq!(eval_ok(".a.b", json!({})), vec![Value::Null]);
    }

    #[test]
    fn field_on_scalar_is_an_error() {
        let results = eval(".a", json!(42));
        assert!(matches!(results[0], Err(ExpressionError::Evaluation(_))));
    }

    #[test]
    fn iterate_and_pipe() {
        let input = json!({"nodes": [{"addr": 1}, {"addr": 2}]});
        assert_eq!(eval_ok(".nodes[] | .addr", input), vec![json!(1), json!(2)]);
    }

    #[test]
    fn negative_index_counts_from_end() {
        assert_eq!(eval_ok(".[-1]", json!([1, 2, 3])), vec![json!(3)]);
        assert_eq!(eval_ok(".[5]", json!([1])), vec![Value::Null]);
    }

    #[test]
    fn try_suppresses_errors() {
        assert!(eval_ok(".nodes[]?", json!({"nodes": 3})).is_empty());
        assert_eq!(eval_ok("(.[] | .a)?", json!([{"a": 1}, 2])), vec![json!(1)]);
    }

    #[test]
    fn select_filters_inputs() {
        let input = json!({"nodes": [
            {"type": "htr", "addr": 1, "status": {"mode": "auto"}},
            {"type": "acm", "addr": 2}
        ]});
        assert_eq!(
            eval_ok(".nodes[] | select(.status != null) | .addr", input),
            vec![json!(1)]
        );
    }

    #[test]
    fn object_construction_shorthand() {
        let input = json!({"type": "htr", "addr": 3, "status": {"k": "v"}, "name": "Hall"});
        assert_eq!(
            eval_ok("{type, addr, status}", input),
            vec![json!({"type": "htr", "addr": 3, "status": {"k": "v"}})]
        );
    }

    #[test]
    fn object_construction_is_cartesian() {
        let input = json!({"a": [1, 2], "b": ["x", "y"]});
        assert_eq!(eval_ok("{a: .a[], b: .b[]}", input).len(), 4);
    }

    #[test]
    fn numeric_comparison_ignores_representation() {
        assert_eq!(eval_ok(". == 1", json!(1.0)), vec![json!(true)]);
    }

    #[test]
    fn builtins() {
        assert_eq!(eval_ok(".a | length", json!({"a": "héllo"})), vec![json!(5)]);
        assert_eq!(eval_ok("keys", json!({"b": 1, "a": 2})), vec![json!(["a", "b"])]);
        assert_eq!(eval_ok(".a | not", json!({"a": false})), vec![json!(true)]);
        assert!(eval_ok("empty", json!(1)).is_empty());
    }

    #[test]
    fn pipe_is_lazy() {
        let filter = parse(".[] | .a").unwrap();
        let mut outputs = run(&filter, json!([{"a": 1}, 7]));
        assert_eq!(outputs.next().unwrap().unwrap(), json!(1));
        assert!(outputs.next().unwrap().is_err());
    }
}
