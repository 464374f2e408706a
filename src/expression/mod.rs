// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Extraction expressions evaluated against realtime event bodies.
//!
//! Subscriptions describe what they want out of an event with a small,
//! jq-style path language:
//!
//! - `.away_status` - a single top-level field
//! - `.htr_system.setup.power_limit` - nested access
//! - `.nodes[] | select(.status != null) | {type, addr, status}` - iteration,
//!   pipes, filters and object construction
//!
//! Expressions are compiled once with [`CompiledExpression::compile`]. A bare
//! `.field` expression compiles to a direct key lookup; everything else goes
//! through the general evaluator. Both strategies produce the same matches.
//!
//! # Examples
//!
//! ```
//! use serde_json::json;
//! use smartbox_lib::expression::CompiledExpression;
//!
//! let expr = CompiledExpression::compile(".nodes[] | .addr").unwrap();
//! let body = json!({"nodes": [{"addr": 1}, {"addr": 2}]});
//!
//! let addrs: Vec<_> = expr.evaluate(&body).collect();
//! assert_eq!(addrs, vec![json!(1), json!(2)]);
//! ```

mod eval;
mod parser;

use std::fmt;

use serde_json::Value;

use crate::error::ExpressionError;
use parser::Filter;

/// How a compiled expression is evaluated.
#[derive(Debug, Clone, PartialEq)]
enum Strategy {
    /// Direct lookup of one top-level key.
    Field(String),
    /// Full evaluator.
    General(Filter),
}

/// A parsed extraction expression, ready to be evaluated many times.
#[derive(Clone, PartialEq)]
pub struct CompiledExpression {
    source: String,
    strategy: Strategy,
}

impl CompiledExpression {
    /// Compiles an expression.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError::Syntax`] if the expression cannot be parsed.
    pub fn compile(source: impl Into<String>) -> Result<Self, ExpressionError> {
        let source = source.into();
        let strategy = match parser::parse(&source)? {
            Filter::Field(name) => Strategy::Field(name),
            filter => Strategy::General(filter),
        };
        Ok(Self { source, strategy })
    }

    /// Compiles an expression that always uses the general evaluator.
    #[cfg(test)]
    pub(crate) fn compile_general(source: &str) -> Result<Self, ExpressionError> {
        Ok(Self {
            source: source.to_string(),
            strategy: Strategy::General(parser::parse(source)?),
        })
    }

    /// Returns the expression source.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns `true` if this expression uses the direct key lookup.
    #[must_use]
    pub fn is_fast_path(&self) -> bool {
        matches!(self.strategy, Strategy::Field(_))
    }

    /// Evaluates the expression against `value`.
    ///
    /// The returned iterator is lazy. `null` results are treated as absent and
    /// skipped; an evaluation error ends the sequence.
    #[must_use]
    pub fn evaluate<'a>(&'a self, value: &Value) -> Matches<'a> {
        let state = match &self.strategy {
            Strategy::Field(name) => MatchState::Single(
                value
                    .as_object()
                    .and_then(|map| map.get(name))
                    .filter(|v| !v.is_null())
                    .cloned(),
            ),
            Strategy::General(filter) => MatchState::General(eval::run(filter, value.clone())),
        };
        Matches {
            source: &self.source,
            state,
        }
    }

    /// Evaluates the expression, surfacing evaluation errors.
    ///
    /// Unlike [`evaluate`](Self::evaluate), `null` results are kept.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError::Evaluation`] if the expression cannot be
    /// applied to `value`.
    pub fn evaluate_strict(&self, value: &Value) -> Result<Vec<Value>, ExpressionError> {
        match &self.strategy {
            Strategy::Field(name) => eval::field(value, name).map(|v| vec![v]),
            Strategy::General(filter) => eval::run(filter, value.clone()).collect(),
        }
    }
}

impl fmt::Debug for CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CompiledExpression({:?}, fast_path={})",
            self.source,
            self.is_fast_path()
        )
    }
}

impl fmt::Display for CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for CompiledExpression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

enum MatchState<'a> {
    Single(Option<Value>),
    General(eval::Outputs<'a>),
    Done,
}

/// Lazy sequence of values produced by [`CompiledExpression::evaluate`].
pub struct Matches<'a> {
    source: &'a str,
    state: MatchState<'a>,
}

impl Iterator for Matches<'_> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match &mut self.state {
            MatchState::Single(value) => value.take(),
            MatchState::General(outputs) => loop {
                match outputs.next() {
                    Some(Ok(Value::Null)) => {}
                    Some(Ok(value)) => return Some(value),
                    Some(Err(err)) => {
                        tracing::trace!(expression = %self.source, error = %err, "Expression stopped matching");
                        self.state = MatchState::Done;
                        return None;
                    }
                    None => return None,
                }
            },
            MatchState::Done => None,
        }
    }
}

impl fmt::Debug for Matches<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matches")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn simple_field_uses_fast_path() {
        let expr = CompiledExpression::compile(".simple").unwrap();
        assert!(expr.is_fast_path());
        assert_eq!(
            expr.evaluate(&json!({"simple": "value"})).collect::<Vec<_>>(),
            vec![json!("value")]
        );
    }

    #[test]
    fn piped_expression_uses_general_path() {
        let expr = CompiledExpression::compile(".complex | .nested").unwrap();
        assert!(!expr.is_fast_path());
        assert_eq!(
            expr.evaluate(&json!({"complex": {"nested": "value"}}))
                .collect::<Vec<_>>(),
            vec![json!("value")]
        );
    }

    #[test]
    fn nested_access_is_not_fast_path() {
        assert!(!CompiledExpression::compile(".a.b").unwrap().is_fast_path());
        assert!(!CompiledExpression::compile(".").unwrap().is_fast_path());
    }

    #[test]
    fn absent_field_yields_nothing() {
        let expr = CompiledExpression::compile(".data").unwrap();
        assert_eq!(expr.evaluate(&json!({"other": 1})).count(), 0);
    }

    #[test]
    fn fast_and_general_paths_agree_for_identifiers() {
        let inputs = [
            json!({"data": "value"}),
            json!({"data": null}),
            json!({"data": {"nested": [1, 2]}}),
            json!({"data": 0}),
            json!({"data": false}),
            json!({"other": "value"}),
            json!({}),
            json!(null),
            json!(42),
            json!("data"),
            json!([{"data": 1}]),
            json!(true),
        ];
        for expr in [".data", ".other", "._private1", ".\"data\""] {
            let fast = CompiledExpression::compile(expr).unwrap();
            let general = CompiledExpression::compile_general(expr).unwrap();
            assert!(fast.is_fast_path());
            assert!(!general.is_fast_path());
            for input in &inputs {
                assert_eq!(
                    fast.evaluate(input).collect::<Vec<_>>(),
                    general.evaluate(input).collect::<Vec<_>>(),
                    "{expr} disagrees on {input}"
                );
            }
        }
    }

    #[test]
    fn evaluation_error_ends_sequence() {
        let expr = CompiledExpression::compile(".[] | .a").unwrap();
        let matches: Vec<_> = expr.evaluate(&json!([{"a": 1}, 5, {"a": 2}])).collect();
        assert_eq!(matches, vec![json!(1)]);
    }

    #[test]
    fn strict_evaluation_reports_errors() {
        let expr = CompiledExpression::compile(".a").unwrap();
        assert!(expr.evaluate_strict(&json!(5)).is_err());
        assert_eq!(expr.evaluate_strict(&json!({})).unwrap(), vec![Value::Null]);
    }

    #[test]
    fn debug_and_display() {
        let expr = CompiledExpression::compile(".simple").unwrap();
        assert_eq!(
            format!("{expr:?}"),
            "CompiledExpression(\".simple\", fast_path=true)"
        );
        assert_eq!(expr.to_string(), ".simple");
    }

    #[test]
    fn from_str_compiles() {
        let expr: CompiledExpression = ".nodes[]".parse().unwrap();
        assert_eq!(expr.evaluate(&json!({"nodes": [1, 2]})).count(), 2);
    }

    #[test]
    fn invalid_expression_fails_to_compile() {
        assert!(CompiledExpression::compile(".a |").is_err());
    }
}
