use std::fmt;

use serde::Serialize;

/// Result of evaluating a condition: `True`, `False`, or `Unknown` when the condition cannot be
/// evaluated (missing attribute, type mismatch, unknown operator, ...).
///
/// `Unknown` is not falsy. It propagates through [`and`](Tristate::and), [`or`](Tristate::or) and
/// negation by the rules of three-valued logic and only collapses to `false` at the audience
/// boundary ([`Tristate::is_true`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tristate {
    True,
    False,
    Unknown,
}

impl Tristate {
    /// Three-valued conjunction. `False` dominates, then `Unknown`.
    pub fn and(self, other: Tristate) -> Tristate {
        match (self, other) {
            (Tristate::False, _) | (_, Tristate::False) => Tristate::False,
            (Tristate::True, Tristate::True) => Tristate::True,
            _ => Tristate::Unknown,
        }
    }

    /// Three-valued disjunction. `True` dominates, then `Unknown`.
    pub fn or(self, other: Tristate) -> Tristate {
        match (self, other) {
            (Tristate::True, _) | (_, Tristate::True) => Tristate::True,
            (Tristate::False, Tristate::False) => Tristate::False,
            _ => Tristate::Unknown,
        }
    }

    /// Collapse to a plain boolean. Only `True` is true.
    pub fn is_true(self) -> bool {
        self == Tristate::True
    }

    pub fn is_unknown(self) -> bool {
        self == Tristate::Unknown
    }

    /// Convert back into the `Option<bool>` encoding.
    pub fn to_option(self) -> Option<bool> {
        match self {
            Tristate::True => Some(true),
            Tristate::False => Some(false),
            Tristate::Unknown => None,
        }
    }
}

impl std::ops::Not for Tristate {
    type Output = Tristate;

    fn not(self) -> Tristate {
        match self {
            Tristate::True => Tristate::False,
            Tristate::False => Tristate::True,
            Tristate::Unknown => Tristate::Unknown,
        }
    }
}

impl From<bool> for Tristate {
    fn from(value: bool) -> Tristate {
        if value {
            Tristate::True
        } else {
            Tristate::False
        }
    }
}

impl From<Option<bool>> for Tristate {
    fn from(value: Option<bool>) -> Tristate {
        value.map_or(Tristate::Unknown, Tristate::from)
    }
}

impl fmt::Display for Tristate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tristate::True => "TRUE",
            Tristate::False => "FALSE",
            Tristate::Unknown => "UNKNOWN",
        })
    }
}

impl log::kv::ToValue for Tristate {
    fn to_value(&self) -> log::kv::Value {
        log::kv::Value::from_display(self)
    }
}

#[cfg(test)]
mod tests {
    use super::Tristate::{self, False, True, Unknown};

    const ALL: [Tristate; 3] = [True, False, Unknown];

    #[test]
    fn and_truth_table() {
        for a in ALL {
            for b in ALL {
                let expected = match (a.to_option(), b.to_option()) {
                    (Some(false), _) | (_, Some(false)) => False,
                    (Some(true), Some(true)) => True,
                    _ => Unknown,
                };
                assert_eq!(a.and(b), expected, "{a} AND {b}");
                assert_eq!(b.and(a), expected, "{b} AND {a}");
            }
        }
    }

    #[test]
    fn or_truth_table() {
        for a in ALL {
            for b in ALL {
                let expected = match (a.to_option(), b.to_option()) {
                    (Some(true), _) | (_, Some(true)) => True,
                    (Some(false), Some(false)) => False,
                    _ => Unknown,
                };
                assert_eq!(a.or(b), expected, "{a} OR {b}");
            }
        }
    }

    #[test]
    fn negation() {
        assert_eq!(!True, False);
        assert_eq!(!False, True);
        assert_eq!(!Unknown, Unknown);
    }

    #[test]
    fn displays_as_log_strings() {
        assert_eq!(True.to_string(), "TRUE");
        assert_eq!(False.to_string(), "FALSE");
        assert_eq!(Unknown.to_string(), "UNKNOWN");
    }

    #[test]
    fn only_true_collapses_to_true() {
        assert!(True.is_true());
        assert!(!False.is_true());
        assert!(!Unknown.is_true());
    }
}
