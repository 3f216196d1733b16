//! Operations exposed by a model delegate of the client.

use std::fmt;
use std::str::FromStr;

use crate::error::ClientError;

/// A method of a model delegate (`client.user.findMany`, `client.user.create`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientOperation {
    FindUnique,
    FindUniqueOrThrow,
    FindFirst,
    FindFirstOrThrow,
    FindMany,
    Create,
    CreateMany,
    CreateManyAndReturn,
    Update,
    UpdateMany,
    UpdateManyAndReturn,
    Upsert,
    Delete,
    DeleteMany,
    Aggregate,
    GroupBy,
    Count,
    FindRaw,
    AggregateRaw,
}

impl ClientOperation {
    pub const ALL: [ClientOperation; 19] = [
        Self::FindUnique,
        Self::FindUniqueOrThrow,
        Self::FindFirst,
        Self::FindFirstOrThrow,
        Self::FindMany,
        Self::Create,
        Self::CreateMany,
        Self::CreateManyAndReturn,
        Self::Update,
        Self::UpdateMany,
        Self::UpdateManyAndReturn,
        Self::Upsert,
        Self::Delete,
        Self::DeleteMany,
        Self::Aggregate,
        Self::GroupBy,
        Self::Count,
        Self::FindRaw,
        Self::AggregateRaw,
    ];

    /// The method name on the client surface.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FindUnique => "findUnique",
            Self::FindUniqueOrThrow => "findUniqueOrThrow",
            Self::FindFirst => "findFirst",
            Self::FindFirstOrThrow => "findFirstOrThrow",
            Self::FindMany => "findMany",
            Self::Create => "create",
            Self::CreateMany => "createMany",
            Self::CreateManyAndReturn => "createManyAndReturn",
            Self::Update => "update",
            Self::UpdateMany => "updateMany",
            Self::UpdateManyAndReturn => "updateManyAndReturn",
            Self::Upsert => "upsert",
            Self::Delete => "delete",
            Self::DeleteMany => "deleteMany",
            Self::Aggregate => "aggregate",
            Self::GroupBy => "groupBy",
            Self::Count => "count",
            Self::FindRaw => "findRaw",
            Self::AggregateRaw => "aggregateRaw",
        }
    }

    /// Maps an operation id from the introspection mappings to a client method.
    ///
    /// Mapping ids name single-record writes with a trailing `One`
    /// (`createOne`, `upsertOne`); the client method drops it (`create`).
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Unsupported` for ids that name no client method.
    pub fn from_operation_id(id: &str) -> Result<Self, ClientError> {
        id.strip_suffix("One").unwrap_or(id).parse()
    }

    /// Returns `true` for operations that take the caller's selection as input.
    #[must_use]
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Self::Aggregate | Self::GroupBy)
    }
}

impl fmt::Display for ClientOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientOperation {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| ClientError::unsupported(format!("unknown operation `{s}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_one_is_stripped() {
        assert_eq!(
            ClientOperation::from_operation_id("createOne").unwrap(),
            ClientOperation::Create
        );
        assert_eq!(
            ClientOperation::from_operation_id("upsertOne").unwrap(),
            ClientOperation::Upsert
        );
        assert_eq!(
            ClientOperation::from_operation_id("deleteOne").unwrap(),
            ClientOperation::Delete
        );
    }

    #[test]
    fn test_other_ids_pass_through() {
        assert_eq!(
            ClientOperation::from_operation_id("createMany").unwrap(),
            ClientOperation::CreateMany
        );
        assert_eq!(
            ClientOperation::from_operation_id("findUniqueOrThrow").unwrap(),
            ClientOperation::FindUniqueOrThrow
        );
        assert_eq!(
            ClientOperation::from_operation_id("groupBy").unwrap(),
            ClientOperation::GroupBy
        );
    }

    #[test]
    fn test_unknown_operation() {
        assert!(ClientOperation::from_operation_id("explode").is_err());
        assert!("".parse::<ClientOperation>().is_err());
    }

    #[test]
    fn test_round_trip_names() {
        for op in ClientOperation::ALL {
            assert_eq!(op.as_str().parse::<ClientOperation>().unwrap(), op);
        }
    }

    #[test]
    fn test_classification() {
        assert!(ClientOperation::Aggregate.is_aggregate());
        assert!(ClientOperation::GroupBy.is_aggregate());
        assert!(!ClientOperation::Count.is_aggregate());
    }
}
