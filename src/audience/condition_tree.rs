//! A tiny interpreter for the nested-array condition language used by audiences:
//!
//! ```text
//! ["and", ["or", leaf, leaf], ["not", leaf]]
//! ```
//!
//! The tree is generic over its leaf type. Audience conditions use
//! [`Condition`](super::Condition) leaves, while audience selections (which audiences a rule
//! targets) use [`AudienceId`](super::AudienceId) leaves.
use serde::{
    de::{DeserializeOwned, Error as _},
    ser::SerializeSeq,
    Deserialize, Deserializer, Serialize, Serializer,
};
use serde_json::Value;

use super::Tristate;

/// A boolean expression over leaves of type `L`.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionTree<L> {
    /// All operands must be `True`.
    And(Vec<ConditionTree<L>>),
    /// At least one operand must be `True`. Arrays without a leading operator are read as `Or`.
    Or(Vec<ConditionTree<L>>),
    /// Negation. Valid only with exactly one operand; other arities evaluate to `Unknown`.
    Not(Vec<ConditionTree<L>>),
    Leaf(L),
}

#[derive(Debug, Clone, Copy)]
enum Operator {
    And,
    Or,
    Not,
}

impl Operator {
    fn parse(token: &str) -> Option<Operator> {
        match token {
            "and" => Some(Operator::And),
            "or" => Some(Operator::Or),
            "not" => Some(Operator::Not),
            _ => None,
        }
    }
}

impl<L> ConditionTree<L> {
    /// Evaluate the tree, delegating every leaf to `leaf_evaluator`.
    ///
    /// `and` stops at the first `False` operand and `or` stops at the first `True` operand, so
    /// `leaf_evaluator` is not called for the remaining operands. Evaluation holds no state beyond
    /// its arguments.
    pub fn evaluate<F>(&self, mut leaf_evaluator: F) -> Tristate
    where
        F: FnMut(&L) -> Tristate,
    {
        self.evaluate_with(&mut leaf_evaluator)
    }

    fn evaluate_with<F>(&self, leaf_evaluator: &mut F) -> Tristate
    where
        F: FnMut(&L) -> Tristate,
    {
        match self {
            ConditionTree::And(operands) => {
                let mut saw_unknown = false;
                for operand in operands {
                    match operand.evaluate_with(leaf_evaluator) {
                        Tristate::False => return Tristate::False,
                        Tristate::Unknown => saw_unknown = true,
                        Tristate::True => {}
                    }
                }
                if saw_unknown {
                    Tristate::Unknown
                } else {
                    Tristate::True
                }
            }
            ConditionTree::Or(operands) => {
                let mut saw_unknown = false;
                for operand in operands {
                    match operand.evaluate_with(leaf_evaluator) {
                        Tristate::True => return Tristate::True,
                        Tristate::Unknown => saw_unknown = true,
                        Tristate::False => {}
                    }
                }
                if saw_unknown {
                    Tristate::Unknown
                } else {
                    Tristate::False
                }
            }
            ConditionTree::Not(operands) => match operands.as_slice() {
                [operand] => !operand.evaluate_with(leaf_evaluator),
                _ => Tristate::Unknown,
            },
            ConditionTree::Leaf(leaf) => leaf_evaluator(leaf),
        }
    }

    /// Iterate over all leaves, depth-first.
    pub fn leaves(&self) -> Vec<&L> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a L>) {
        match self {
            ConditionTree::And(operands)
            | ConditionTree::Or(operands)
            | ConditionTree::Not(operands) => {
                for operand in operands {
                    operand.collect_leaves(leaves);
                }
            }
            ConditionTree::Leaf(leaf) => leaves.push(leaf),
        }
    }
}

impl<L: DeserializeOwned> ConditionTree<L> {
    /// Build a tree from its JSON form.
    ///
    /// A top-level JSON string holding an encoded array (the legacy `conditions` format of the
    /// datafile) is decoded first. Nested strings are leaves.
    ///
    /// A top-level empty array means "no conditions" and becomes an empty `and`, which is `True`.
    /// Operator-only arrays such as `["or"]` or `["not"]` keep their operator.
    pub fn from_json(value: Value) -> Result<ConditionTree<L>, serde_json::Error> {
        let value = match value {
            Value::String(encoded) => match serde_json::from_str::<Value>(&encoded) {
                Ok(decoded @ Value::Array(_)) => decoded,
                _ => Value::String(encoded),
            },
            other => other,
        };
        if value.as_array().is_some_and(Vec::is_empty) {
            return Ok(ConditionTree::And(Vec::new()));
        }
        ConditionTree::from_value(value)
    }

    fn from_value(value: Value) -> Result<ConditionTree<L>, serde_json::Error> {
        let Value::Array(items) = value else {
            return serde_json::from_value(value).map(ConditionTree::Leaf);
        };

        let mut items = items.into_iter().peekable();
        let operator = match items.peek() {
            Some(Value::String(token)) => Operator::parse(token),
            _ => None,
        };
        if operator.is_some() {
            items.next();
        }

        let operands = items
            .map(ConditionTree::from_value)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(match operator.unwrap_or(Operator::Or) {
            Operator::And => ConditionTree::And(operands),
            Operator::Or => ConditionTree::Or(operands),
            Operator::Not => ConditionTree::Not(operands),
        })
    }
}

impl<'de, L: DeserializeOwned> Deserialize<'de> for ConditionTree<L> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        ConditionTree::from_json(value).map_err(D::Error::custom)
    }
}

impl<L: Serialize> Serialize for ConditionTree<L> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (operator, operands) = match self {
            ConditionTree::And(operands) => ("and", operands),
            ConditionTree::Or(operands) => ("or", operands),
            ConditionTree::Not(operands) => ("not", operands),
            ConditionTree::Leaf(leaf) => return leaf.serialize(serializer),
        };
        let mut seq = serializer.serialize_seq(Some(operands.len() + 1))?;
        seq.serialize_element(operator)?;
        for operand in operands {
            seq.serialize_element(operand)?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::ConditionTree;
    use crate::audience::Tristate::{self, False, True, Unknown};

    fn tree(value: serde_json::Value) -> ConditionTree<String> {
        ConditionTree::from_json(value).unwrap()
    }

    fn leaf_value(leaf: &String) -> Tristate {
        match leaf.as_str() {
            "t" => True,
            "f" => False,
            _ => Unknown,
        }
    }

    #[test]
    fn and_operator() {
        assert_eq!(tree(json!(["and", "t", "t"])).evaluate(leaf_value), True);
        assert_eq!(tree(json!(["and", "t", "f"])).evaluate(leaf_value), False);
        assert_eq!(tree(json!(["and", "t", "u"])).evaluate(leaf_value), Unknown);
        assert_eq!(tree(json!(["and", "u", "f"])).evaluate(leaf_value), False);
    }

    #[test]
    fn or_operator() {
        assert_eq!(tree(json!(["or", "f", "f"])).evaluate(leaf_value), False);
        assert_eq!(tree(json!(["or", "f", "t"])).evaluate(leaf_value), True);
        assert_eq!(tree(json!(["or", "f", "u"])).evaluate(leaf_value), Unknown);
        assert_eq!(tree(json!(["or", "u", "t"])).evaluate(leaf_value), True);
    }

    #[test]
    fn not_operator() {
        assert_eq!(tree(json!(["not", "t"])).evaluate(leaf_value), False);
        assert_eq!(tree(json!(["not", "f"])).evaluate(leaf_value), True);
        assert_eq!(tree(json!(["not", "u"])).evaluate(leaf_value), Unknown);
    }

    #[test]
    fn not_with_wrong_arity_is_unknown() {
        assert_eq!(tree(json!(["not"])).evaluate(leaf_value), Unknown);
        assert_eq!(tree(json!(["not", "t", "t"])).evaluate(leaf_value), Unknown);
        assert_eq!(tree(json!(["not", "f", "f"])).evaluate(leaf_value), Unknown);
    }

    #[test]
    fn and_short_circuits_on_false() {
        let mut calls = Vec::new();
        let result = tree(json!(["and", "t", "f", "t", "u"])).evaluate(|leaf: &String| {
            calls.push(leaf.clone());
            leaf_value(leaf)
        });
        assert_eq!(result, False);
        assert_eq!(calls, vec!["t", "f"]);
    }

    #[test]
    fn or_short_circuits_on_true() {
        let mut calls = 0;
        let result = tree(json!(["or", "u", "t", "f", "t"])).evaluate(|leaf: &String| {
            calls += 1;
            leaf_value(leaf)
        });
        assert_eq!(result, True);
        assert_eq!(calls, 2);
    }

    #[test]
    fn nested_expressions() {
        let conditions = tree(json!(["and", ["or", "f", "t"], ["not", ["and", "t", "f"]]]));
        assert_eq!(conditions.evaluate(leaf_value), True);

        let conditions = tree(json!(["or", ["and", "t", "u"], ["not", "t"]]));
        assert_eq!(conditions.evaluate(leaf_value), Unknown);
    }

    #[test]
    fn array_without_operator_is_implicit_or() {
        let conditions = tree(json!(["f", "t"]));
        assert_eq!(conditions, ConditionTree::Or(vec![
            ConditionTree::Leaf("f".to_owned()),
            ConditionTree::Leaf("t".to_owned()),
        ]));
        assert_eq!(conditions.evaluate(leaf_value), True);
    }

    #[test]
    fn empty_operands() {
        assert_eq!(tree(json!(["and"])).evaluate(leaf_value), True);
        assert_eq!(tree(json!(["or"])).evaluate(leaf_value), False);
        assert_eq!(tree(json!(["not"])).evaluate(leaf_value), Unknown);
    }

    #[test]
    fn empty_array_has_no_conditions() {
        assert_eq!(tree(json!([])), ConditionTree::And(vec![]));
        assert_eq!(tree(json!([])).evaluate(leaf_value), True);
        assert_eq!(tree(json!("[]")).evaluate(leaf_value), True);
        // Only the top level is special.
        assert_eq!(tree(json!(["and", []])).evaluate(leaf_value), False);
    }

    #[test]
    fn bare_leaf() {
        assert_eq!(tree(json!("t")).evaluate(leaf_value), True);
    }

    #[test]
    fn decodes_string_encoded_conditions() {
        let encoded = json!("[\"and\", \"t\", [\"not\", \"f\"]]");
        let conditions = tree(encoded);
        assert_eq!(conditions, tree(json!(["and", "t", ["not", "f"]])));
        assert_eq!(conditions.evaluate(leaf_value), True);
    }

    #[test]
    fn serializes_back_to_nested_arrays() {
        let conditions = tree(json!(["and", ["or", "a", "b"], ["not", "c"]]));
        assert_eq!(
            serde_json::to_value(&conditions).unwrap(),
            json!(["and", ["or", "a", "b"], ["not", "c"]])
        );
    }

    #[test]
    fn collects_leaves_in_order() {
        let conditions = tree(json!(["and", ["or", "a", "b"], ["not", "c"]]));
        assert_eq!(conditions.leaves(), vec!["a", "b", "c"]);
    }
}
