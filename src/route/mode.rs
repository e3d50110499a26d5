use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::common::RoadnavError;

/// How already discovered nodes are handled during expansion
#[derive(
    Debug, Default, Eq, PartialEq, Copy, Clone, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionPolicy {
    /// A node is finalized the first time it is discovered, later cheaper
    /// paths to it are ignored
    #[default]
    #[serde(alias = "first")]
    FirstDiscovery,
    /// Update parent and cost of discovered nodes when a cheaper path is
    /// found before they are expanded
    #[serde(alias = "relaxed")]
    Relax,
}

impl ExpansionPolicy {
    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::FirstDiscovery => "A*",
            Self::Relax => "A*+R",
        }
    }
}

impl std::fmt::Display for ExpansionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FirstDiscovery => {
                write!(f, "A* search, nodes fixed on first discovery")
            }
            Self::Relax => write!(f, "A* search with edge relaxation"),
        }
    }
}

impl FromStr for ExpansionPolicy {
    type Err = RoadnavError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "first_discovery" | "first" => Ok(Self::FirstDiscovery),
            "relax" | "relaxed" => Ok(Self::Relax),
            other => Err(RoadnavError::Internal(format!(
                "Failed to parse expansion policy: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_policy() -> Result<(), RoadnavError> {
        assert_eq!("relax".parse::<ExpansionPolicy>()?, ExpansionPolicy::Relax);
        assert_eq!(
            "First-Discovery".parse::<ExpansionPolicy>()?,
            ExpansionPolicy::FirstDiscovery
        );
        assert!("dijkstra".parse::<ExpansionPolicy>().is_err());
        Ok(())
    }

    #[test]
    fn policy_serde_names() -> Result<(), RoadnavError> {
        let policy: ExpansionPolicy = serde_json::from_str("\"first\"")?;
        assert_eq!(policy, ExpansionPolicy::FirstDiscovery);
        assert_eq!(
            serde_json::to_string(&ExpansionPolicy::Relax)?,
            "\"relax\""
        );
        Ok(())
    }
}
