use std::collections::HashSet;

use crate::{AttributeValue, Attributes};

/// The user an audience is evaluated against: an id, custom attributes and (optionally) the ODP
/// segments the user was found to qualify for.
///
/// `UserContext` is a plain value. Evaluators only ever borrow it, so one context can be shared by
/// concurrent evaluations without synchronization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserContext {
    user_id: String,
    attributes: Attributes,
    /// `None` until segments have been fetched for the user.
    qualified_segments: Option<HashSet<String>>,
}

impl UserContext {
    /// Create a new user context with no attributes and no qualified segments.
    pub fn new(user_id: impl Into<String>) -> UserContext {
        UserContext {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    /// Replace user attributes with `attributes`.
    pub fn with_attributes(mut self, attributes: Attributes) -> UserContext {
        self.attributes = attributes;
        self
    }

    /// Set a single attribute.
    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> UserContext {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Replace qualified segments with `segments`.
    pub fn with_qualified_segments<I, S>(mut self, segments: I) -> UserContext
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_qualified_segments(Some(segments.into_iter().map(Into::into).collect()));
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Returns `None` if segments have not been fetched for this user.
    pub fn qualified_segments(&self) -> Option<&HashSet<String>> {
        self.qualified_segments.as_ref()
    }

    /// Update qualified segments, usually with the result of
    /// [`OdpManager::fetch_qualified_segments`](crate::odp::OdpManager::fetch_qualified_segments).
    pub fn set_qualified_segments(&mut self, segments: Option<HashSet<String>>) {
        self.qualified_segments = segments;
    }

    /// Check whether the user qualifies for `segment`. Always `false` when segments have not been
    /// fetched.
    pub fn is_qualified_for(&self, segment: &str) -> bool {
        self.qualified_segments
            .as_ref()
            .is_some_and(|segments| segments.contains(segment))
    }
}
