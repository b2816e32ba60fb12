//! Public hash keys (`<prefix>_<random>`) assigned to every new entity.

use std::fmt;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

const RANDOM_LEN: usize = 25;

/// Entity families that receive hash keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashKeyPrefix {
    Company,
    Role,
    User,
    Team,
    SelectStatus,
    Manuscript,
    Schedule,
    Applicant,
}

impl HashKeyPrefix {
    pub const fn as_str(self) -> &'static str {
        match self {
            HashKeyPrefix::Company => "company",
            HashKeyPrefix::Role => "role",
            HashKeyPrefix::User => "user",
            HashKeyPrefix::Team => "team",
            HashKeyPrefix::SelectStatus => "select_status",
            HashKeyPrefix::Manuscript => "manuscript",
            HashKeyPrefix::Schedule => "schedule",
            HashKeyPrefix::Applicant => "applicant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashKey(pub String);

impl HashKey {
    pub fn generate(prefix: HashKeyPrefix) -> Self {
        let random: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(RANDOM_LEN)
            .map(char::from)
            .collect();
        Self(format!("{}_{}", prefix.as_str(), random))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the key carries the given prefix and a well-formed random part.
    pub fn has_prefix(&self, prefix: HashKeyPrefix) -> bool {
        self.0
            .strip_prefix(prefix.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
            .map(|random| {
                (1..=RANDOM_LEN).contains(&random.len())
                    && random.chars().all(|c| c.is_ascii_alphanumeric())
            })
            .unwrap_or(false)
    }
}

impl fmt::Display for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HashKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_carry_prefix() {
        let key = HashKey::generate(HashKeyPrefix::SelectStatus);
        assert!(key.as_str().starts_with("select_status_"));
        assert!(key.has_prefix(HashKeyPrefix::SelectStatus));
        assert!(!key.has_prefix(HashKeyPrefix::Schedule));
    }

    #[test]
    fn rejects_malformed_random_part() {
        assert!(!HashKey::from("team_").has_prefix(HashKeyPrefix::Team));
        assert!(!HashKey::from("team_ab-c").has_prefix(HashKeyPrefix::Team));
        assert!(HashKey::from("team_a").has_prefix(HashKeyPrefix::Team));
    }
}
