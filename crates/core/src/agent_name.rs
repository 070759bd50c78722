//! Validated agent names.

use core::borrow::Borrow;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::value_object::ValueObject;

/// Routing keyword addressing every registered agent.
pub const BROADCAST: &str = "broadcast";

/// Source marker for messages produced outside the agent registry.
pub const EXTERNAL: &str = "external";

/// Tag used for requests answered by the general (no-domain) handler.
pub const GENERAL: &str = "general";

const RESERVED: [&str; 3] = [BROADCAST, EXTERNAL, GENERAL];
const MAX_LEN: usize = 64;

/// Unique name of an agent in the registry (e.g. `accounting`, `crm`).
///
/// Invariants:
/// - non-empty, at most 64 characters
/// - lowercase ASCII letters, digits, `_` and `-` only
/// - never one of the reserved routing words (`broadcast`, `external`, `general`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentName(String);

impl AgentName {
    pub fn new(name: impl Into<String>) -> CoreResult<Self> {
        let name = name.into();

        if name.is_empty() {
            return Err(CoreError::validation("agent name must not be empty"));
        }
        if name.len() > MAX_LEN {
            return Err(CoreError::validation(format!(
                "agent name exceeds {MAX_LEN} characters"
            )));
        }
        if let Some(bad) = name
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-'))
        {
            return Err(CoreError::validation(format!(
                "agent name '{name}' contains invalid character '{bad}'"
            )));
        }
        if RESERVED.contains(&name.as_str()) {
            return Err(CoreError::reserved(name));
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Whether `name` is one of the reserved routing words.
    pub fn is_reserved(name: &str) -> bool {
        RESERVED.contains(&name)
    }
}

impl ValueObject for AgentName {}

impl core::fmt::Display for AgentName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AgentName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for AgentName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl FromStr for AgentName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for AgentName {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for AgentName {
    type Error = CoreError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AgentName> for String {
    fn from(value: AgentName) -> Self {
        value.0
    }
}
