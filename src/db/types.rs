use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The single role carried by an identity. Normalized once at the token and
/// row boundaries, so comparisons elsewhere are plain enum equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Role {
    Student,
    Instructor,
}

impl Role {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Student => "Student",
            Self::Instructor => "Instructor",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("student") {
            Some(Self::Student)
        } else if value.eq_ignore_ascii_case("instructor") {
            Some(Self::Instructor)
        } else {
            None
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown role: {raw}")))
    }
}
