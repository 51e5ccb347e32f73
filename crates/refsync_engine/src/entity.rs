//! Entity kinds and their dependency edges.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A kind of reference entity kept in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Locations (parents of assets).
    Location,
    /// Assets, owned by a location.
    Asset,
    /// Issue categories (parents of issues).
    #[serde(rename = "category")]
    IssueCategory,
    /// Issues, owned by a category.
    Issue,
    /// Operators.
    Operator,
}

impl EntityKind {
    /// Every entity kind, parents before children.
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Location,
        EntityKind::IssueCategory,
        EntityKind::Operator,
        EntityKind::Asset,
        EntityKind::Issue,
    ];

    /// Returns the kinds that must be reconciled before this one.
    pub fn dependencies(self) -> &'static [EntityKind] {
        match self {
            EntityKind::Asset => &[EntityKind::Location],
            EntityKind::Issue => &[EntityKind::IssueCategory],
            EntityKind::Location | EntityKind::IssueCategory | EntityKind::Operator => &[],
        }
    }

    /// Returns the canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Location => "location",
            EntityKind::Asset => "asset",
            EntityKind::IssueCategory => "category",
            EntityKind::Issue => "issue",
            EntityKind::Operator => "operator",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entity name that matches no known kind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown entity: {0}")]
pub struct UnknownEntity(pub String);

impl FromStr for EntityKind {
    type Err = UnknownEntity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "location" | "locations" => Ok(EntityKind::Location),
            "asset" | "assets" => Ok(EntityKind::Asset),
            "category" | "categories" | "issue_category" | "issue_categories" => {
                Ok(EntityKind::IssueCategory)
            }
            "issue" | "issues" => Ok(EntityKind::Issue),
            "operator" | "operators" => Ok(EntityKind::Operator),
            _ => Err(UnknownEntity(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_parse() {
        assert_eq!("Locations".parse(), Ok(EntityKind::Location));
        assert_eq!("asset".parse(), Ok(EntityKind::Asset));
        assert_eq!("issue-categories".parse(), Ok(EntityKind::IssueCategory));
        assert_eq!("categories".parse(), Ok(EntityKind::IssueCategory));
        assert_eq!(" issues ".parse(), Ok(EntityKind::Issue));
        assert_eq!("operators".parse(), Ok(EntityKind::Operator));
        assert_eq!(
            "users".parse::<EntityKind>(),
            Err(UnknownEntity("users".into()))
        );
    }

    #[test]
    fn dependencies_point_at_parents() {
        assert_eq!(EntityKind::Asset.dependencies(), &[EntityKind::Location]);
        assert_eq!(EntityKind::Issue.dependencies(), &[EntityKind::IssueCategory]);
        assert!(EntityKind::Operator.dependencies().is_empty());
    }

    #[test]
    fn display_round_trips_through_parse() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.to_string().parse(), Ok(kind));
        }
    }
}
