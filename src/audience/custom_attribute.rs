use std::cmp::Ordering;

use super::{
    semantic_version::try_compare_versions, Condition, ConditionError, ConditionValue, Tristate,
};
use crate::{AttributeValue, UserContext};

/// Largest magnitude a number may have and still be compared exactly (2^53).
const MAX_SAFE_NUMBER: f64 = 9_007_199_254_740_992.0;

fn is_safe_number(value: f64) -> bool {
    value.is_finite() && value.abs() <= MAX_SAFE_NUMBER
}

/// Operators supported by `custom_attribute` conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchType {
    Exact,
    Exists,
    Gt,
    Ge,
    Lt,
    Le,
    Substring,
    SemverEq,
    SemverGt,
    SemverGe,
    SemverLt,
    SemverLe,
}

impl MatchType {
    /// Match type used when the condition doesn't specify one.
    pub const DEFAULT: MatchType = MatchType::Exact;

    pub fn from_name(name: &str) -> Option<MatchType> {
        Some(match name {
            "exact" => MatchType::Exact,
            "exists" => MatchType::Exists,
            "gt" => MatchType::Gt,
            "ge" => MatchType::Ge,
            "lt" => MatchType::Lt,
            "le" => MatchType::Le,
            "substring" => MatchType::Substring,
            "semver_eq" => MatchType::SemverEq,
            "semver_gt" => MatchType::SemverGt,
            "semver_ge" => MatchType::SemverGe,
            "semver_lt" => MatchType::SemverLt,
            "semver_le" => MatchType::SemverLe,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Exact => "exact",
            MatchType::Exists => "exists",
            MatchType::Gt => "gt",
            MatchType::Ge => "ge",
            MatchType::Lt => "lt",
            MatchType::Le => "le",
            MatchType::Substring => "substring",
            MatchType::SemverEq => "semver_eq",
            MatchType::SemverGt => "semver_gt",
            MatchType::SemverGe => "semver_ge",
            MatchType::SemverLt => "semver_lt",
            MatchType::SemverLe => "semver_le",
        }
    }
}

/// Evaluates `custom_attribute` conditions against user attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomAttributeConditionEvaluator;

impl CustomAttributeConditionEvaluator {
    /// Evaluate `condition` for `user`. Problems are logged and yield [`Tristate::Unknown`].
    pub fn evaluate(&self, condition: &Condition, user: &UserContext) -> Tristate {
        match self.try_evaluate(condition, user) {
            Ok(result) => result.into(),
            Err(err) => {
                err.log();
                Tristate::Unknown
            }
        }
    }

    /// Evaluate `condition` for `user`, returning the reason when the condition cannot be
    /// evaluated.
    ///
    /// `exists` never fails: it is `true` iff the attribute is present and not null.
    pub fn try_evaluate(
        &self,
        condition: &Condition,
        user: &UserContext,
    ) -> Result<bool, ConditionError> {
        let match_type = match condition.match_type.as_deref() {
            None => MatchType::DEFAULT,
            Some(name) => {
                MatchType::from_name(name).ok_or_else(|| ConditionError::UnknownMatchType {
                    condition: condition.to_json_string(),
                })?
            }
        };

        let attribute = user.attributes().get(&condition.name);

        if match_type == MatchType::Exists {
            return Ok(attribute.is_some_and(|value| !value.is_null()));
        }

        let Some(user_value) = attribute else {
            return Err(ConditionError::MissingAttributeValue {
                condition: condition.to_json_string(),
                attribute: condition.name.clone(),
            });
        };

        let checked = CheckedCondition {
            condition,
            user_value,
        };

        match match_type {
            MatchType::Exists => Ok(!user_value.is_null()),
            MatchType::Exact => checked.exact(),
            MatchType::Gt => checked.numeric(|user, target| user > target),
            MatchType::Ge => checked.numeric(|user, target| user >= target),
            MatchType::Lt => checked.numeric(|user, target| user < target),
            MatchType::Le => checked.numeric(|user, target| user <= target),
            MatchType::Substring => checked.substring(),
            MatchType::SemverEq => checked.semver(Ordering::is_eq),
            MatchType::SemverGt => checked.semver(Ordering::is_gt),
            MatchType::SemverGe => checked.semver(Ordering::is_ge),
            MatchType::SemverLt => checked.semver(Ordering::is_lt),
            MatchType::SemverLe => checked.semver(Ordering::is_le),
        }
    }
}

/// A condition paired with the (present) user value it is matched against.
struct CheckedCondition<'a> {
    condition: &'a Condition,
    user_value: &'a AttributeValue,
}

impl CheckedCondition<'_> {
    fn exact(&self) -> Result<bool, ConditionError> {
        match &self.condition.value {
            ConditionValue::String(_) | ConditionValue::Boolean(_) => {}
            ConditionValue::Number(n) if is_safe_number(*n) => {}
            _ => return Err(self.unexpected_condition_value()),
        }

        match (&self.condition.value, self.user_value) {
            (_, AttributeValue::Null) => Err(self.null_attribute_value()),
            (ConditionValue::String(target), AttributeValue::String(user)) => Ok(target == user),
            (ConditionValue::Boolean(target), AttributeValue::Boolean(user)) => Ok(target == user),
            (ConditionValue::Number(target), AttributeValue::Number(user)) => {
                if !is_safe_number(*user) {
                    return Err(self.out_of_bounds());
                }
                Ok(target == user)
            }
            _ => Err(self.unexpected_type()),
        }
    }

    fn numeric(&self, compare: impl FnOnce(f64, f64) -> bool) -> Result<bool, ConditionError> {
        let Some(target) = self
            .condition
            .value
            .as_number()
            .filter(|n| is_safe_number(*n))
        else {
            return Err(self.unexpected_condition_value());
        };

        match self.user_value {
            AttributeValue::Null => Err(self.null_attribute_value()),
            AttributeValue::Number(user) if !is_safe_number(*user) => Err(self.out_of_bounds()),
            AttributeValue::Number(user) => Ok(compare(*user, target)),
            _ => Err(self.unexpected_type()),
        }
    }

    fn substring(&self) -> Result<bool, ConditionError> {
        let target = self.string_condition_value()?;
        let user = self.string_user_value()?;
        Ok(user.contains(target))
    }

    fn semver(&self, accept: impl FnOnce(Ordering) -> bool) -> Result<bool, ConditionError> {
        let target = self.string_condition_value()?;
        let user = self.string_user_value()?;
        let ordering = try_compare_versions(target, user).map_err(|version| {
            ConditionError::InvalidSemanticVersion {
                condition: self.condition.to_json_string(),
                version: version.to_owned(),
            }
        })?;
        Ok(accept(ordering))
    }

    fn string_condition_value(&self) -> Result<&str, ConditionError> {
        self.condition
            .value
            .as_str()
            .ok_or_else(|| self.unexpected_condition_value())
    }

    fn string_user_value(&self) -> Result<&str, ConditionError> {
        match self.user_value {
            AttributeValue::String(user) => Ok(user),
            AttributeValue::Null => Err(self.null_attribute_value()),
            _ => Err(self.unexpected_type()),
        }
    }

    fn unexpected_condition_value(&self) -> ConditionError {
        ConditionError::UnexpectedConditionValue {
            condition: self.condition.to_json_string(),
        }
    }

    fn null_attribute_value(&self) -> ConditionError {
        ConditionError::NullAttributeValue {
            condition: self.condition.to_json_string(),
            attribute: self.condition.name.clone(),
        }
    }

    fn unexpected_type(&self) -> ConditionError {
        ConditionError::UnexpectedType {
            condition: self.condition.to_json_string(),
            attribute: self.condition.name.clone(),
            actual_type: self.user_value.type_name(),
        }
    }

    fn out_of_bounds(&self) -> ConditionError {
        ConditionError::OutOfBounds {
            condition: self.condition.to_json_string(),
            attribute: self.condition.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CustomAttributeConditionEvaluator, MatchType};
    use crate::{
        audience::{Condition, ConditionValue, Tristate},
        AttributeValue, UserContext,
    };

    fn custom_condition(match_type: Option<&str>, value: impl Into<ConditionValue>) -> Condition {
        Condition {
            name: "attr".to_owned(),
            condition_type: "custom_attribute".to_owned(),
            match_type: match_type.map(str::to_owned),
            value: value.into(),
        }
    }

    fn user(value: impl Into<AttributeValue>) -> UserContext {
        UserContext::new("user-1").with_attribute("attr", value)
    }

    fn null_user() -> UserContext {
        UserContext::new("user-1").with_attribute("attr", AttributeValue::Null)
    }

    fn eval(condition: &Condition, user: &UserContext) -> Tristate {
        CustomAttributeConditionEvaluator.evaluate(condition, user)
    }

    fn error_key(condition: &Condition, user: &UserContext) -> &'static str {
        CustomAttributeConditionEvaluator
            .try_evaluate(condition, user)
            .unwrap_err()
            .key()
    }

    #[test]
    fn match_type_names_round_trip() {
        for name in [
            "exact",
            "exists",
            "gt",
            "ge",
            "lt",
            "le",
            "substring",
            "semver_eq",
            "semver_gt",
            "semver_ge",
            "semver_lt",
            "semver_le",
        ] {
            assert_eq!(MatchType::from_name(name).unwrap().as_str(), name);
        }
        assert_eq!(MatchType::from_name("regex"), None);
    }

    #[test]
    fn unknown_match_type() {
        let condition = custom_condition(Some("regex"), "^chrome");
        assert_eq!(eval(&condition, &user("chrome")), Tristate::Unknown);
        assert_eq!(error_key(&condition, &user("chrome")), "UNKNOWN_MATCH_TYPE");
    }

    #[test]
    fn missing_attribute_is_unknown() {
        let condition = custom_condition(Some("exact"), "chrome");
        let user = UserContext::new("user-1");
        assert_eq!(eval(&condition, &user), Tristate::Unknown);
        assert_eq!(error_key(&condition, &user), "MISSING_ATTRIBUTE_VALUE");
    }

    #[test]
    fn exact_defaults_when_match_is_absent() {
        let condition = custom_condition(None, "chrome");
        assert_eq!(eval(&condition, &user("chrome")), Tristate::True);
        assert_eq!(eval(&condition, &user("firefox")), Tristate::False);
    }

    #[test]
    fn exact_is_type_safe() {
        let condition = custom_condition(Some("exact"), 9000.0);
        assert_eq!(eval(&condition, &user(9000.0)), Tristate::True);
        assert_eq!(eval(&condition, &user(8999.0)), Tristate::False);
        assert_eq!(eval(&condition, &user("9000")), Tristate::Unknown);
        assert_eq!(error_key(&condition, &user("9000")), "UNEXPECTED_TYPE");

        let condition = custom_condition(Some("exact"), true);
        assert_eq!(eval(&condition, &user(true)), Tristate::True);
        assert_eq!(eval(&condition, &user(false)), Tristate::False);
        assert_eq!(error_key(&condition, &user(1.0)), "UNEXPECTED_TYPE");
    }

    #[test]
    fn exact_null_user_value() {
        let condition = custom_condition(Some("exact"), "chrome");
        assert_eq!(eval(&condition, &null_user()), Tristate::Unknown);
        assert_eq!(error_key(&condition, &null_user()), "UNEXPECTED_TYPE_NULL");
    }

    #[test]
    fn exact_invalid_condition_value() {
        for value in [
            ConditionValue::Null,
            ConditionValue::Number(f64::INFINITY),
            ConditionValue::Number(2f64.powi(53) * 2.0),
            ConditionValue::Other(serde_json::json!({"a": 1})),
        ] {
            let condition = custom_condition(Some("exact"), value);
            assert_eq!(
                error_key(&condition, &user("chrome")),
                "UNEXPECTED_CONDITION_VALUE"
            );
        }
    }

    #[test]
    fn exact_out_of_bounds_user_value() {
        let condition = custom_condition(Some("exact"), 9000.0);
        for value in [f64::INFINITY, f64::NEG_INFINITY, 2f64.powi(53) + 2.0, f64::NAN] {
            assert_eq!(eval(&condition, &user(value)), Tristate::Unknown);
            assert_eq!(error_key(&condition, &user(value)), "OUT_OF_BOUNDS");
        }
        // 2^53 itself is in bounds.
        let condition = custom_condition(Some("exact"), 2f64.powi(53));
        assert_eq!(eval(&condition, &user(2f64.powi(53))), Tristate::True);
    }

    #[test]
    fn exists_never_unknown() {
        let condition = custom_condition(Some("exists"), ConditionValue::Null);
        assert_eq!(eval(&condition, &UserContext::new("user-1")), Tristate::False);
        assert_eq!(eval(&condition, &null_user()), Tristate::False);
        assert_eq!(eval(&condition, &user("")), Tristate::True);
        assert_eq!(eval(&condition, &user(0.0)), Tristate::True);
        assert_eq!(eval(&condition, &user(false)), Tristate::True);
    }

    #[test]
    fn numeric_comparisons() {
        let gt = custom_condition(Some("gt"), 10.0);
        let ge = custom_condition(Some("ge"), 10.0);
        let lt = custom_condition(Some("lt"), 10.0);
        let le = custom_condition(Some("le"), 10.0);

        assert_eq!(eval(&gt, &user(10.5)), Tristate::True);
        assert_eq!(eval(&gt, &user(10.0)), Tristate::False);
        assert_eq!(eval(&ge, &user(10.0)), Tristate::True);
        assert_eq!(eval(&ge, &user(9.99)), Tristate::False);
        assert_eq!(eval(&lt, &user(9.0)), Tristate::True);
        assert_eq!(eval(&lt, &user(10.0)), Tristate::False);
        assert_eq!(eval(&le, &user(10.0)), Tristate::True);
        assert_eq!(eval(&le, &user(11.0)), Tristate::False);
    }

    #[test]
    fn numeric_rejections() {
        let gt = custom_condition(Some("gt"), 10.0);
        assert_eq!(error_key(&gt, &user("11")), "UNEXPECTED_TYPE");
        assert_eq!(error_key(&gt, &user(true)), "UNEXPECTED_TYPE");
        assert_eq!(error_key(&gt, &null_user()), "UNEXPECTED_TYPE_NULL");
        assert_eq!(error_key(&gt, &user(f64::INFINITY)), "OUT_OF_BOUNDS");
        assert_eq!(error_key(&gt, &user(-(2f64.powi(53)) - 2.0)), "OUT_OF_BOUNDS");

        for value in [
            ConditionValue::from("10"),
            ConditionValue::Null,
            ConditionValue::Number(f64::NEG_INFINITY),
        ] {
            let condition = custom_condition(Some("lt"), value);
            assert_eq!(error_key(&condition, &user(5.0)), "UNEXPECTED_CONDITION_VALUE");
        }
    }

    #[test]
    fn substring_match() {
        let condition = custom_condition(Some("substring"), "chrome");
        assert_eq!(eval(&condition, &user("chrome 119")), Tristate::True);
        assert_eq!(eval(&condition, &user("firefox")), Tristate::False);
        assert_eq!(error_key(&condition, &user(10.0)), "UNEXPECTED_TYPE");
        assert_eq!(error_key(&condition, &null_user()), "UNEXPECTED_TYPE_NULL");

        let condition = custom_condition(Some("substring"), 10.0);
        assert_eq!(error_key(&condition, &user("10")), "UNEXPECTED_CONDITION_VALUE");
    }

    #[test]
    fn semver_operators() {
        let semver = |match_type: &str, target: &str, version: &str| {
            eval(&custom_condition(Some(match_type), target), &user(version))
        };

        assert_eq!(semver("semver_gt", "1.8.1", "1.9"), Tristate::True);
        assert_eq!(semver("semver_eq", "1.9", "1.9.1"), Tristate::True);
        assert_eq!(semver("semver_eq", "1.9.1", "1.9"), Tristate::False);
        assert_eq!(semver("semver_ge", "2.0.0", "2.0.0"), Tristate::True);
        assert_eq!(semver("semver_ge", "2.0.0", "2.0.0-beta"), Tristate::False);
        assert_eq!(semver("semver_lt", "2.0.0", "2.0.0-beta"), Tristate::True);
        assert_eq!(semver("semver_lt", "2.0.0", "2.0.1"), Tristate::False);
        assert_eq!(semver("semver_le", "2.0", "2.0.9"), Tristate::True);
        assert_eq!(semver("semver_le", "2.0", "2.1"), Tristate::False);
    }

    #[test]
    fn semver_rejections() {
        let condition = custom_condition(Some("semver_eq"), "1.2.3");
        assert_eq!(error_key(&condition, &user(1.2)), "UNEXPECTED_TYPE");
        assert_eq!(error_key(&condition, &null_user()), "UNEXPECTED_TYPE_NULL");
        assert_eq!(error_key(&condition, &user("1.2 .3")), "INVALID_SEMANTIC_VERSION");
        assert_eq!(eval(&condition, &user("1.2.3.4")), Tristate::Unknown);
    }
}
