use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn all() -> &'static [Priority] {
        &[
            Priority::Low,
            Priority::Normal,
            Priority::High,
            Priority::Urgent,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = crate::error::KanbanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(crate::error::KanbanError::InvalidInput(format!(
                "unknown priority '{other}' (expected low, normal, high or urgent)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_parse_display() {
        for p in Priority::all() {
            let parsed: Priority = p.as_str().parse().unwrap();
            assert_eq!(parsed, *p);
            assert_eq!(p.to_string(), p.as_str());
        }
        assert!("critical".parse::<Priority>().is_err());
    }

    #[test]
    fn priority_orders_by_urgency() {
        assert!(Priority::Low < Priority::Normal);
        assert!(Priority::High < Priority::Urgent);
        assert_eq!(Priority::default(), Priority::Normal);
    }
}
