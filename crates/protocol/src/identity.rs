// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Federation identity: the enumerated specialist kinds and their well-known
//! ports.

use serde::{Deserialize, Serialize};

/// Enumerated specialist kinds the federation knows how to route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Finance,
    Marketing,
    Sales,
    Ceo,
    Hub,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Finance => "finance",
            Self::Marketing => "marketing",
            Self::Sales => "sales",
            Self::Ceo => "ceo",
            Self::Hub => "hub",
        }
    }

    /// Default API port for this kind.
    pub fn default_api_port(&self) -> u16 {
        match self {
            Self::Hub => 8080,
            Self::Finance => 8081,
            Self::Marketing => 8082,
            Self::Sales => 8083,
            Self::Ceo => 8084,
        }
    }

    /// Secondary port serving `/attestation` for this kind.
    pub fn attestation_port(&self) -> u16 {
        match self {
            Self::Hub => 29343,
            Self::Finance => 29344,
            Self::Marketing => 29345,
            Self::Sales => 29346,
            Self::Ceo => 29347,
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "finance" => Ok(Self::Finance),
            "marketing" => Ok(Self::Marketing),
            "sales" => Ok(Self::Sales),
            "ceo" => Ok(Self::Ceo),
            "hub" => Ok(Self::Hub),
            other => Err(format!("unknown agent kind: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            AgentKind::Finance,
            AgentKind::Marketing,
            AgentKind::Sales,
            AgentKind::Ceo,
            AgentKind::Hub,
        ] {
            assert_eq!(AgentKind::from_str(kind.as_str()).unwrap(), kind);
        }
        assert!(AgentKind::from_str("operations").is_err());
    }

    #[test]
    fn test_well_known_ports() {
        assert_eq!(AgentKind::Hub.attestation_port(), 29343);
        assert_eq!(AgentKind::Finance.attestation_port(), 29344);
        assert_eq!(AgentKind::Ceo.attestation_port(), 29347);
    }
}
