//! Semantic version comparison for `semver_*` match types.
//!
//! The comparison is more lenient than SemVer 2.0: the target (condition) version may
//! be shorter than the user version and then only its components are compared, so target `"1.9"`
//! equals user `"1.9.1"`.
use std::{cmp::Ordering, sync::OnceLock};

use regex::Regex;

fn version_prefix_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^\d+(\.\d+){0,2}$").expect("version prefix regex should be valid")
    })
}

#[derive(Debug)]
struct SemanticVersion<'a> {
    /// Up to three numeric components followed by the pre-release/build suffix, if any.
    parts: Vec<&'a str>,
    pre_release: bool,
    build: bool,
}

impl<'a> SemanticVersion<'a> {
    fn parse(version: &'a str) -> Option<SemanticVersion<'a>> {
        if version.chars().any(char::is_whitespace) {
            return None;
        }

        let pre_release_at = version.find('-');
        let build_at = version.find('+');
        let (pre_release, build) = match (pre_release_at, build_at) {
            (Some(pre_release_at), Some(build_at)) => {
                (pre_release_at < build_at, build_at < pre_release_at)
            }
            (Some(_), None) => (true, false),
            (None, Some(_)) => (false, true),
            (None, None) => (false, false),
        };

        let (prefix, suffix) = if pre_release {
            version.split_once('-')?
        } else if build {
            version.split_once('+')?
        } else {
            (version, "")
        };

        if !version_prefix_regex().is_match(prefix) {
            return None;
        }

        let mut parts: Vec<&str> = prefix.split('.').collect();
        if !suffix.is_empty() {
            parts.push(suffix);
        }

        Some(SemanticVersion {
            parts,
            pre_release,
            build,
        })
    }
}

fn is_numeric(part: &str) -> bool {
    !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit())
}

/// Compare two digit strings of any length.
fn compare_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Compare `user_version` against `condition_version`.
///
/// Returns the ordering of the *user* version relative to the condition version, or `None` if
/// either string is not a valid version.
pub fn compare_versions(condition_version: &str, user_version: &str) -> Option<Ordering> {
    try_compare_versions(condition_version, user_version).ok()
}

/// Same as [`compare_versions`] but reports which version string is invalid.
pub(crate) fn try_compare_versions<'a>(
    condition_version: &'a str,
    user_version: &'a str,
) -> Result<Ordering, &'a str> {
    let user = SemanticVersion::parse(user_version).ok_or(user_version)?;
    let condition = SemanticVersion::parse(condition_version).ok_or(condition_version)?;

    for (idx, condition_part) in condition.parts.iter().enumerate() {
        let Some(user_part) = user.parts.get(idx) else {
            // User version is shorter. A bare release is less than the condition, but if the
            // condition carries a suffix the user's release version sorts above it.
            return Ok(if condition.pre_release || condition.build {
                Ordering::Greater
            } else {
                Ordering::Less
            });
        };

        if is_numeric(user_part) && is_numeric(condition_part) {
            match compare_numeric(user_part, condition_part) {
                Ordering::Equal => continue,
                ordering => return Ok(ordering),
            }
        }

        match user_part.cmp(condition_part) {
            Ordering::Less => {
                return Ok(if condition.pre_release && !user.pre_release {
                    Ordering::Greater
                } else {
                    Ordering::Less
                });
            }
            Ordering::Greater => {
                return Ok(if !condition.pre_release && user.pre_release {
                    Ordering::Less
                } else {
                    Ordering::Greater
                });
            }
            Ordering::Equal => {}
        }
    }

    // A pre-release sorts below the release with the same components.
    if user.pre_release && !condition.pre_release {
        return Ok(Ordering::Less);
    }

    Ok(Ordering::Equal)
}
