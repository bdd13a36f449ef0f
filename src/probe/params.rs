//! Probe request parameters.

use serde::Deserialize;

use super::ProbeError;

/// Raw query string of a `/probe` request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeQuery {
    pub target: Option<String>,
    pub tags: Option<String>,
    pub path: Option<String>,
}

/// Validated snapshot filter for one probe.
///
/// At least one of the fields is set. Values are not checked beyond
/// emptiness; restic decides what it accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeParameters {
    target: Option<String>,
    tags: Vec<String>,
    path: Option<String>,
}

impl ProbeParameters {
    /// Builds parameters from the query, rejecting a query with no filter.
    pub fn from_query(query: ProbeQuery) -> Result<Self, ProbeError> {
        let target = query.target.filter(|t| !t.is_empty());
        let path = query.path.filter(|p| !p.is_empty());
        let tags = match query.tags.as_deref() {
            Some(tags) if !tags.is_empty() => tags.split(',').map(str::to_string).collect(),
            _ => Vec::new(),
        };

        if target.is_none() && path.is_none() && tags.is_empty() {
            return Err(ProbeError::MissingParameter);
        }

        Ok(Self { target, tags, path })
    }

    /// Host filter, if any.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Tag filters in the order they were given.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Path filter, if any.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}
