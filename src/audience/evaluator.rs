use std::{
    collections::HashMap,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

use super::{
    Audience, AudienceId, Condition, ConditionError, ConditionTree, CustomAttributeConditionEvaluator,
    OdpSegmentConditionEvaluator, Tristate,
};
use crate::UserContext;

/// Error type returned by caller-supplied [`ConditionEvaluator`]s.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Extension point for condition types the SDK doesn't know about.
///
/// Custom evaluators are untrusted: errors and panics are caught by [`AudienceEvaluator`] and
/// turned into [`Tristate::Unknown`].
///
/// Closures with a matching signature implement this trait:
/// ```
/// # use optimizely_core::{audience::{Condition, ConditionEvaluator, Tristate, BoxError}, UserContext};
/// let evaluator = |condition: &Condition, user: &UserContext| -> Result<Tristate, BoxError> {
///     Ok(Tristate::from(user.user_id() == condition.name))
/// };
/// # fn check(_: impl ConditionEvaluator) {}
/// # check(evaluator);
/// ```
pub trait ConditionEvaluator: Send + Sync {
    fn evaluate(&self, condition: &Condition, user: &UserContext) -> Result<Tristate, BoxError>;
}

impl<F> ConditionEvaluator for F
where
    F: Fn(&Condition, &UserContext) -> Result<Tristate, BoxError> + Send + Sync,
{
    fn evaluate(&self, condition: &Condition, user: &UserContext) -> Result<Tristate, BoxError> {
        self(condition, user)
    }
}

/// Condition `type` tag. Built-in types are closed variants, anything else is routed to
/// caller-supplied evaluators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionType<'a> {
    CustomAttribute,
    ThirdPartyDimension,
    Other(&'a str),
}

impl<'a> ConditionType<'a> {
    pub fn parse(name: &'a str) -> ConditionType<'a> {
        match name {
            "custom_attribute" => ConditionType::CustomAttribute,
            "third_party_dimension" => ConditionType::ThirdPartyDimension,
            other => ConditionType::Other(other),
        }
    }

    pub fn as_str(&self) -> &'a str {
        match self {
            ConditionType::CustomAttribute => "custom_attribute",
            ConditionType::ThirdPartyDimension => "third_party_dimension",
            ConditionType::Other(name) => name,
        }
    }

    pub fn is_built_in(&self) -> bool {
        !matches!(self, ConditionType::Other(_))
    }
}

/// Decides whether a user belongs to the audiences a flag or experiment targets.
///
/// `AudienceEvaluator` holds no per-evaluation state, so a single instance can serve concurrent
/// evaluations.
#[derive(Clone, Default)]
pub struct AudienceEvaluator {
    custom_attribute: CustomAttributeConditionEvaluator,
    odp_segment: OdpSegmentConditionEvaluator,
    /// Evaluators for non-built-in condition types.
    additional: HashMap<String, Arc<dyn ConditionEvaluator>>,
}

impl AudienceEvaluator {
    pub fn new() -> AudienceEvaluator {
        AudienceEvaluator::default()
    }

    /// Create an evaluator that also routes the given condition types to caller-supplied
    /// evaluators.
    ///
    /// Built-in types (`custom_attribute`, `third_party_dimension`) cannot be overridden: such
    /// entries are dropped with a warning.
    pub fn with_evaluators(
        evaluators: HashMap<String, Arc<dyn ConditionEvaluator>>,
    ) -> AudienceEvaluator {
        let additional = evaluators
            .into_iter()
            .filter(|(condition_type, _)| {
                let built_in = ConditionType::parse(condition_type).is_built_in();
                if built_in {
                    log::warn!(target: "optimizely",
                               condition_type = condition_type.as_str();
                               "ignoring custom evaluator for built-in condition type");
                }
                !built_in
            })
            .collect();

        AudienceEvaluator {
            additional,
            ..Default::default()
        }
    }

    /// Evaluate whether `user` satisfies `audience_conditions`.
    ///
    /// No targeting (absent expression or `[]`) includes everyone. Unknown audience ids and
    /// conditions that can't be evaluated contribute `Unknown`, which only becomes `false` at
    /// the very end.
    pub fn evaluate(
        &self,
        audience_conditions: Option<&ConditionTree<AudienceId>>,
        audiences: &HashMap<AudienceId, Audience>,
        user: &UserContext,
    ) -> bool {
        let Some(audience_conditions) = audience_conditions else {
            return true;
        };

        audience_conditions
            .evaluate(|audience_id| self.evaluate_audience(audience_id, audiences, user))
            .is_true()
    }

    /// Evaluate a single audience, returning `Unknown` if it doesn't exist.
    pub fn evaluate_audience(
        &self,
        audience_id: &str,
        audiences: &HashMap<AudienceId, Audience>,
        user: &UserContext,
    ) -> Tristate {
        let Some(audience) = audiences.get(audience_id) else {
            log::debug!(target: "optimizely", audience_id; "audience not found, evaluating to UNKNOWN");
            return Tristate::Unknown;
        };

        if log::log_enabled!(target: "optimizely", log::Level::Debug) {
            let conditions = serde_json::to_string(&audience.conditions).unwrap_or_default();
            log::debug!(target: "optimizely",
                        audience_id;
                        "starting to evaluate audience \"{audience_id}\" with conditions: {conditions}");
        }

        let result = audience
            .conditions
            .evaluate(|condition| self.evaluate_condition(condition, user));

        log::info!(target: "optimizely",
                   audience_id,
                   result;
                   "audience \"{audience_id}\" evaluated to {result}");

        result
    }

    /// Route a leaf condition to the evaluator registered for its type.
    pub fn evaluate_condition(&self, condition: &Condition, user: &UserContext) -> Tristate {
        match ConditionType::parse(&condition.condition_type) {
            ConditionType::CustomAttribute => self.custom_attribute.evaluate(condition, user),
            ConditionType::ThirdPartyDimension => self.odp_segment.evaluate(condition, user),
            ConditionType::Other(condition_type) => match self.additional.get(condition_type) {
                Some(evaluator) => {
                    evaluate_untrusted(evaluator.as_ref(), condition_type, condition, user)
                }
                None => {
                    ConditionError::UnknownConditionType {
                        condition: condition.to_json_string(),
                    }
                    .log();
                    Tristate::Unknown
                }
            },
        }
    }
}

impl std::fmt::Debug for AudienceEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudienceEvaluator")
            .field("additional", &self.additional.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn evaluate_untrusted(
    evaluator: &dyn ConditionEvaluator,
    condition_type: &str,
    condition: &Condition,
    user: &UserContext,
) -> Tristate {
    let message = match catch_unwind(AssertUnwindSafe(|| evaluator.evaluate(condition, user))) {
        Ok(Ok(result)) => return result,
        Ok(Err(err)) => err.to_string(),
        Err(panic) => panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "evaluator panicked".to_owned()),
    };

    ConditionError::EvaluatorFailed {
        condition_type: condition_type.to_owned(),
        message,
    }
    .log();
    Tristate::Unknown
}
