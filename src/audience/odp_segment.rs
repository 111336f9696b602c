use super::{Condition, ConditionError, Tristate};
use crate::UserContext;

const QUALIFIED_MATCH_TYPE: &str = "qualified";

/// Evaluates `third_party_dimension` conditions: whether the user qualifies for an ODP segment.
#[derive(Debug, Clone, Copy, Default)]
pub struct OdpSegmentConditionEvaluator;

impl OdpSegmentConditionEvaluator {
    pub fn evaluate(&self, condition: &Condition, user: &UserContext) -> Tristate {
        match self.try_evaluate(condition, user) {
            Ok(result) => result.into(),
            Err(err) => {
                err.log();
                Tristate::Unknown
            }
        }
    }

    /// Only the `qualified` match type (also the default) is supported. A non-string segment
    /// name never matches.
    pub fn try_evaluate(
        &self,
        condition: &Condition,
        user: &UserContext,
    ) -> Result<bool, ConditionError> {
        match condition.match_type.as_deref() {
            None | Some(QUALIFIED_MATCH_TYPE) => {}
            Some(_) => {
                return Err(ConditionError::UnknownMatchType {
                    condition: condition.to_json_string(),
                })
            }
        }

        Ok(condition
            .value
            .as_str()
            .is_some_and(|segment| user.is_qualified_for(segment)))
    }
}
