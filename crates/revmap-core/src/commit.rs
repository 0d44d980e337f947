//! Commit types: the caller's declared intent for a write.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// The declared intent of a record commit.
///
/// `Create` and `TransferIn` introduce a resource into a channel and require
/// that it has no prior version there. The other four extend an existing
/// version chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitType {
    /// First version of a new resource.
    Create,
    /// New version of an existing resource.
    Update,
    /// Attach the resource to something.
    Attach,
    /// Detach the resource from something.
    Detach,
    /// Resource arrives from another channel.
    TransferIn,
    /// Resource leaves for another channel.
    TransferOut,
}

impl CommitType {
    /// All commit types, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Create,
        Self::Update,
        Self::Attach,
        Self::Detach,
        Self::TransferIn,
        Self::TransferOut,
    ];

    /// Wire name of this commit type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Attach => "ATTACH",
            Self::Detach => "DETACH",
            Self::TransferIn => "TRANSFER-IN",
            Self::TransferOut => "TRANSFER-OUT",
        }
    }

    /// Whether this commit introduces a new resource (and may create its channel).
    #[must_use]
    pub const fn creates_resource(self) -> bool {
        matches!(self, Self::Create | Self::TransferIn)
    }
}

impl fmt::Display for CommitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommitType {
    type Err = CoreError;

    /// Parse a wire name. Matching is case-sensitive; the transfer types are
    /// accepted with or without the hyphen.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "ATTACH" => Ok(Self::Attach),
            "DETACH" => Ok(Self::Detach),
            "TRANSFER-IN" | "TRANSFERIN" => Ok(Self::TransferIn),
            "TRANSFER-OUT" | "TRANSFEROUT" => Ok(Self::TransferOut),
            other => Err(CoreError::InvalidCommitType(other.to_string())),
        }
    }
}

impl Serialize for CommitType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CommitType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
