use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Server-side identifier of a project or system.
pub type EntityId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Identifier assigned to an imported diagram.
///
/// The import endpoint returns it either as a JSON number or as a string,
/// so both are accepted and kept in their textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DiagramId(String);

impl DiagramId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DiagramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for DiagramId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(serde_json::Number),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Self(n.to_string())),
            Raw::Text(s) => Ok(Self(s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagram_id_from_number() {
        let id: DiagramId = serde_json::from_str("42").unwrap();
        assert_eq!(id.as_str(), "42");
    }

    #[test]
    fn diagram_id_from_string() {
        let id: DiagramId =
            serde_json::from_str("\"0b6f1c1e-4a53-4c3b-9d0e-8c0a1f2e3d4c\"").unwrap();
        assert_eq!(id.to_string(), "0b6f1c1e-4a53-4c3b-9d0e-8c0a1f2e3d4c");
    }

    #[test]
    fn diagram_id_rejects_objects() {
        assert!(serde_json::from_str::<DiagramId>("{\"id\": 1}").is_err());
    }
}
