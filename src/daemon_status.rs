use serde::{Deserialize, Serialize};

/// Lifecycle state of the supervised daemon.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumIs,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DaemonStatus {
    #[default]
    Absent,
    Running,
    Stopping,
}

impl DaemonStatus {
    pub fn style(&self) -> String {
        let s = self.to_string();
        match self {
            DaemonStatus::Absent => console::style(s).dim().to_string(),
            DaemonStatus::Running => console::style(s).green().to_string(),
            DaemonStatus::Stopping => console::style(s).yellow().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daemon_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&DaemonStatus::Running).unwrap(),
            "\"running\""
        );
        assert_eq!(DaemonStatus::Absent.to_string(), "absent");
        let parsed: DaemonStatus = serde_json::from_str("\"stopping\"").unwrap();
        assert!(parsed.is_stopping());
        assert!(DaemonStatus::default().is_absent());
    }
}
