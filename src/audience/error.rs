/// Reasons a single condition could not be evaluated to `True` or `False`.
///
/// Each variant carries the serialized condition (and attribute name where relevant) and has a
/// stable [`key`](ConditionError::key) that is attached to every log line reporting it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConditionError {
    /// The user has no attribute with the condition's name.
    #[error("audience condition {condition} evaluated to UNKNOWN because no value was passed for user attribute \"{attribute}\"")]
    MissingAttributeValue { condition: String, attribute: String },

    /// The user attribute is present but `null`.
    #[error("audience condition {condition} evaluated to UNKNOWN because a null value was passed for user attribute \"{attribute}\"")]
    NullAttributeValue { condition: String, attribute: String },

    /// The user attribute type cannot be used with the condition.
    #[error("audience condition {condition} evaluated to UNKNOWN because a value of type \"{actual_type}\" was passed for user attribute \"{attribute}\"")]
    UnexpectedType {
        condition: String,
        attribute: String,
        actual_type: &'static str,
    },

    /// The user attribute is a number outside of [-2^53, 2^53] (or not finite).
    #[error("audience condition {condition} evaluated to UNKNOWN because the number value for user attribute \"{attribute}\" is not in the range [-2^53, +2^53]")]
    OutOfBounds { condition: String, attribute: String },

    /// The condition value is not usable with the condition's match type.
    #[error("audience condition {condition} has an unsupported condition value. You may need to upgrade to a newer release of the SDK")]
    UnexpectedConditionValue { condition: String },

    /// The condition uses a match type that is not supported.
    #[error("audience condition {condition} uses an unknown match type. You may need to upgrade to a newer release of the SDK")]
    UnknownMatchType { condition: String },

    /// The condition uses a condition type no evaluator is registered for.
    #[error("audience condition {condition} uses an unknown condition type. You may need to upgrade to a newer release of the SDK")]
    UnknownConditionType { condition: String },

    /// A version string is not a valid semantic version.
    #[error("\"{version}\" is not a valid semantic version")]
    InvalidSemanticVersion { condition: String, version: String },

    /// A custom condition evaluator failed (returned an error or panicked).
    #[error("condition evaluator for type \"{condition_type}\" failed: {message}")]
    EvaluatorFailed {
        condition_type: String,
        message: String,
    },
}

impl ConditionError {
    /// Stable identifier of the problem, independent of the interpolated values.
    pub fn key(&self) -> &'static str {
        match self {
            ConditionError::MissingAttributeValue { .. } => "MISSING_ATTRIBUTE_VALUE",
            ConditionError::NullAttributeValue { .. } => "UNEXPECTED_TYPE_NULL",
            ConditionError::UnexpectedType { .. } => "UNEXPECTED_TYPE",
            ConditionError::OutOfBounds { .. } => "OUT_OF_BOUNDS",
            ConditionError::UnexpectedConditionValue { .. } => "UNEXPECTED_CONDITION_VALUE",
            ConditionError::UnknownMatchType { .. } => "UNKNOWN_MATCH_TYPE",
            ConditionError::UnknownConditionType { .. } => "UNKNOWN_CONDITION_TYPE",
            ConditionError::InvalidSemanticVersion { .. } => "INVALID_SEMANTIC_VERSION",
            ConditionError::EvaluatorFailed { .. } => "CONDITION_EVALUATOR_FAILED",
        }
    }

    /// Missing and null attributes are routine (the user simply didn't provide the attribute), so
    /// they are logged at a lower level than configuration or type problems.
    pub fn is_normal(&self) -> bool {
        matches!(
            self,
            ConditionError::MissingAttributeValue { .. } | ConditionError::NullAttributeValue { .. }
        )
    }

    /// Log the error with its stable key.
    pub(crate) fn log(&self) {
        if self.is_normal() {
            log::debug!(target: "optimizely", message = self.key(); "{self}");
        } else {
            log::warn!(target: "optimizely", message = self.key(); "{self}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ConditionError;

    #[test]
    fn message_interpolates_condition_and_attribute() {
        let err = ConditionError::MissingAttributeValue {
            condition: r#"{"name":"age"}"#.to_owned(),
            attribute: "age".to_owned(),
        };
        assert_eq!(err.key(), "MISSING_ATTRIBUTE_VALUE");
        assert_eq!(
            err.to_string(),
            r#"audience condition {"name":"age"} evaluated to UNKNOWN because no value was passed for user attribute "age""#
        );
    }
}
