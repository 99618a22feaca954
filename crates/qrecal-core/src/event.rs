//! The three independent error channels a read carries.

use serde::{Deserialize, Serialize};

/// Error channel recalibrated independently of the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventModel {
    /// Base mismatch.
    #[serde(rename = "M")]
    Substitution,
    /// Extra base in the read.
    #[serde(rename = "I")]
    Insertion,
    /// Base missing from the read.
    #[serde(rename = "D")]
    Deletion,
}

impl EventModel {
    /// All models, in the order reads are recalibrated.
    pub const ALL: [EventModel; 3] = [Self::Substitution, Self::Insertion, Self::Deletion];

    /// Dense index, used for per-model arrays.
    pub fn index(self) -> usize {
        match self {
            Self::Substitution => 0,
            Self::Insertion => 1,
            Self::Deletion => 2,
        }
    }
}

impl std::fmt::Display for EventModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Substitution => write!(f, "substitution"),
            Self::Insertion => write!(f, "insertion"),
            Self::Deletion => write!(f, "deletion"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_are_dense() {
        for (i, event) in EventModel::ALL.iter().enumerate() {
            assert_eq!(event.index(), i);
        }
    }

    #[test]
    fn test_serde_uses_report_codes() {
        let json = serde_json::to_string(&EventModel::ALL).unwrap();
        assert_eq!(json, r#"["M","I","D"]"#);
        let back: Vec<EventModel> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EventModel::ALL);
    }
}
