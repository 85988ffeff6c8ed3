use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Portal role, as carried in the user profile's `user_type`.
///
/// Wire form is the upper-snake-case name (`"LAND_OFFICER"`).
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Accounts are created as citizens unless an administrator says otherwise.
    #[default]
    Citizen,
    LandOfficer,
    Admin,
    Notary,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Citizen, Role::LandOfficer, Role::Admin, Role::Notary];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Citizen => "CITIZEN",
            Role::LandOfficer => "LAND_OFFICER",
            Role::Admin => "ADMIN",
            Role::Notary => "NOTARY",
        }
    }

    /// Human-readable label used by the navigation bar.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Citizen => "Citizen",
            Role::LandOfficer => "Land Officer",
            Role::Admin => "Administrator",
            Role::Notary => "Notary",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == normalized)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_are_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&Role::LandOfficer).unwrap(),
            "\"LAND_OFFICER\""
        );
        let role: Role = serde_json::from_str("\"ADMIN\"").unwrap();
        assert_eq!(role, Role::Admin);
    }

    #[test]
    fn parse_is_lenient_about_case_and_separators() {
        assert_eq!("land-officer".parse::<Role>().unwrap(), Role::LandOfficer);
        assert_eq!(" citizen ".parse::<Role>().unwrap(), Role::Citizen);
        assert!("superuser".parse::<Role>().is_err());
    }
}
