use std::collections::HashSet;

use crate::error::GpaError;

#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    blocked: HashSet<String>,
    deceased: HashSet<String>,
}

impl AccessPolicy {
    pub fn new<I, J>(blocked: I, deceased: J) -> Self
    where
        I: IntoIterator<Item = String>,
        J: IntoIterator<Item = String>,
    {
        Self {
            blocked: blocked.into_iter().collect(),
            deceased: deceased.into_iter().collect(),
        }
    }

    /// Returns the identifier to look up upstream, or the policy response
    /// that short-circuits the request.
    ///
    /// One leading zero is stripped for the lookup. The block list only
    /// applies to identifiers supplied without that zero.
    pub fn check<'a>(&self, stnum: &'a str) -> Result<&'a str, GpaError> {
        let zero_prefixed = stnum.starts_with('0');
        let stripped = if zero_prefixed { &stnum[1..] } else { stnum };

        if !zero_prefixed && self.blocked.contains(stripped) {
            return Err(GpaError::AccessDenied);
        }

        if self.deceased.contains(stripped) {
            return Err(GpaError::DeceasedNotice);
        }

        Ok(stripped)
    }
}
