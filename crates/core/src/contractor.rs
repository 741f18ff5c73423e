//! Contractor identity as seen by the dispatch core.
//!
//! Contractor records are owned by the identity collaborator; this core only
//! reads them. Skill strings are case-insensitive and deduplicated.

use serde::{Deserialize, Serialize};

use crate::types::DbId;

/// Read-only contractor identity snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contractor {
    pub id: DbId,
    pub email: String,
    pub display_name: String,
    pub skills: Vec<String>,
    pub is_active: bool,
    pub is_verified: bool,
}

/// Normalize a skill list: trim, lowercase, drop empties, dedupe preserving
/// first-seen order.
pub fn normalize_skills<I, S>(skills: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for skill in skills {
        let normalized = skill.as_ref().trim().to_lowercase();
        if !normalized.is_empty() && seen.insert(normalized.clone()) {
            out.push(normalized);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skills_are_trimmed_lowercased_and_deduped() {
        let skills = normalize_skills(["  Crane ", "crane", "ELECTRICAL", "", "rigging"]);
        assert_eq!(skills, vec!["crane", "electrical", "rigging"]);
    }
}
