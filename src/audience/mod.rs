//! Audience evaluation.
//!
//! An [`Audience`] is a named [`ConditionTree`] over [`Condition`] leaves. Flags and experiments
//! target audiences with another `ConditionTree` whose leaves are [`AudienceId`]s.
//! [`AudienceEvaluator`] walks both levels, routes every leaf to an evaluator by its `type` and
//! combines the results with three-valued logic ([`Tristate`]).
use serde::{Deserialize, Serialize};

mod condition_tree;
mod custom_attribute;
mod error;
mod evaluator;
mod odp_segment;
mod semantic_version;
mod tristate;

pub use condition_tree::ConditionTree;
pub use custom_attribute::{CustomAttributeConditionEvaluator, MatchType};
pub use error::ConditionError;
pub use evaluator::{AudienceEvaluator, BoxError, ConditionEvaluator, ConditionType};
pub use odp_segment::OdpSegmentConditionEvaluator;
pub use semantic_version::compare_versions;
pub use tristate::Tristate;

/// Audience id as referenced from targeting expressions.
pub type AudienceId = String;

/// A reusable predicate over user attributes and segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Audience {
    pub id: AudienceId,
    pub name: String,
    /// Accepts both a JSON array and a JSON string holding the array.
    pub conditions: ConditionTree<Condition>,
}

/// A leaf condition of an audience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Attribute name (for `custom_attribute`) or a descriptive name (for segments).
    #[serde(default)]
    pub name: String,
    /// Selects the evaluator, e.g. `custom_attribute` or `third_party_dimension`.
    #[serde(rename = "type")]
    pub condition_type: String,
    /// Selects the operator within the evaluator. Each evaluator has its own default.
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub match_type: Option<String>,
    #[serde(default)]
    pub value: ConditionValue,
}

impl Condition {
    /// Serialized form used in diagnostics.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

/// Value a condition compares against.
///
/// Unlike [`AttributeValue`](crate::AttributeValue), condition values come from the datafile and
/// may be anything JSON can express. Unsupported shapes are kept in [`ConditionValue::Other`], so
/// the evaluator can report them instead of failing to parse the whole audience.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Boolean(bool),
    Number(f64),
    String(String),
    #[default]
    Null,
    Other(serde_json::Value),
}

impl ConditionValue {
    pub fn as_str(&self) -> Option<&str> {
        if let ConditionValue::String(s) = self {
            Some(s.as_str())
        } else {
            None
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        if let ConditionValue::Number(n) = self {
            Some(*n)
        } else {
            None
        }
    }
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<f64> for ConditionValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for ConditionValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// Targeting expression for a list of audience ids without explicit operators: the user must
/// belong to any of them.
pub fn any_of_audiences<I, S>(audience_ids: I) -> ConditionTree<AudienceId>
where
    I: IntoIterator<Item = S>,
    S: Into<AudienceId>,
{
    ConditionTree::Or(
        audience_ids
            .into_iter()
            .map(|id| ConditionTree::Leaf(id.into()))
            .collect(),
    )
}
