//! Deployment environment tag.
//!
//! Every credentialed operation is scoped to either the `test` or `live`
//! Stripe account. The two environments are reconciled independently and
//! never cross-written.

use serde::{Deserialize, Serialize};

/// Which Stripe account (and webhook secret) an operation is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Test,
    Live,
}

impl Environment {
    /// The string tag stored in mapping records (`"test"` or `"live"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Live => "live",
        }
    }

    /// Both environments, in the order they are tried for webhook
    /// signature verification (live first).
    #[must_use]
    pub const fn all() -> [Self; 2] {
        [Self::Live, Self::Test]
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "test" => Ok(Self::Test),
            "live" => Ok(Self::Live),
            _ => Err(format!("invalid environment: {s} (expected test|live)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_round_trip() {
        assert_eq!("test".parse::<Environment>(), Ok(Environment::Test));
        assert_eq!("live".parse::<Environment>(), Ok(Environment::Live));
        assert!("prod".parse::<Environment>().is_err());
        assert_eq!(Environment::Test.to_string(), "test");
    }

    #[test]
    fn test_environment_serde() {
        assert_eq!(
            serde_json::to_string(&Environment::Live).expect("serializes"),
            "\"live\""
        );
        let env: Environment = serde_json::from_str("\"test\"").expect("deserializes");
        assert_eq!(env, Environment::Test);
    }

    #[test]
    fn test_live_tried_first() {
        assert_eq!(Environment::all(), [Environment::Live, Environment::Test]);
    }
}
