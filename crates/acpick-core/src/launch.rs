//! Picker launch modes.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Construction-time choice of the picker's initial behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LaunchMode {
    /// Start collapsed on the default account (or with no accounts).
    #[default]
    Default,
    /// Start with the full account list expanded.
    ChooseAccount,
    /// Sign in immediately with a preselected account; UI only on demand.
    Seamless,
}

impl LaunchMode {
    pub fn all() -> &'static [LaunchMode] {
        &[
            LaunchMode::Default,
            LaunchMode::ChooseAccount,
            LaunchMode::Seamless,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            LaunchMode::Default => "default",
            LaunchMode::ChooseAccount => "choose-account",
            LaunchMode::Seamless => "seamless",
        }
    }
}

impl FromStr for LaunchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LaunchMode::all()
            .iter()
            .copied()
            .find(|mode| mode.display_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "unknown launch mode '{s}' (expected default, choose-account or seamless)"
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_launch_mode() {
        assert_eq!("default".parse::<LaunchMode>().unwrap(), LaunchMode::Default);
        assert_eq!(
            "Choose-Account".parse::<LaunchMode>().unwrap(),
            LaunchMode::ChooseAccount
        );
        assert_eq!(" seamless ".parse::<LaunchMode>().unwrap(), LaunchMode::Seamless);
        assert!("expanded".parse::<LaunchMode>().is_err());
    }
}
