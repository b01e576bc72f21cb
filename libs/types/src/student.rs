//! Student entity
//!
//! A student proposes to branches in the order of its submitted
//! preference list. An empty list means nothing was submitted; the caller
//! replaces it with the default order before running a match.

use crate::ids::{BranchId, StudentId};
use crate::priority::PriorityKey;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    /// All India Rank, lower is better. `None` ranks behind everyone.
    #[serde(default)]
    pub air_rank: Option<u32>,
    /// Branch ids, most preferred first
    #[serde(default)]
    pub preferences: Vec<BranchId>,
}

impl Student {
    pub fn new(id: StudentId, air_rank: Option<u32>) -> Self {
        Self {
            id,
            air_rank,
            preferences: Vec::new(),
        }
    }

    /// Builder-style setter for the preference list
    pub fn with_preferences(mut self, preferences: Vec<BranchId>) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn has_submitted(&self) -> bool {
        !self.preferences.is_empty()
    }

    pub fn priority_key(&self) -> PriorityKey {
        PriorityKey::new(self.id, self.air_rank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_student_without_preferences_has_not_submitted() {
        let student = Student::new(StudentId::new(1), Some(120));
        assert!(!student.has_submitted());

        let student = student.with_preferences(vec![BranchId::new(3)]);
        assert!(student.has_submitted());
    }

    #[test]
    fn test_student_deserializes_with_missing_fields() {
        let student: Student = serde_json::from_str(r#"{"id": 7}"#).unwrap();
        assert_eq!(student.id, StudentId::new(7));
        assert_eq!(student.air_rank, None);
        assert!(student.preferences.is_empty());
    }

    #[test]
    fn test_priority_key_carries_rank() {
        let student = Student::new(StudentId::new(2), Some(15));
        let key = student.priority_key();
        assert_eq!(key.student, StudentId::new(2));
        assert_eq!(key.air_rank, Some(15));
    }
}
