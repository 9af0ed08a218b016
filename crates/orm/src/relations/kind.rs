//! Relation kinds - the four relationship shapes and their per-kind defaults
//!
//! Kind-specific behavior is a dispatch table of pure functions over this
//! enum; nothing here touches storage.

use serde::{Deserialize, Serialize};

use crate::query::JoinType;

/// The shape of a relationship between two tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// To-one, foreign key lives on the source table (Article belongs to Author)
    BelongsTo,
    /// To-one, foreign key lives on the target table (Author has one Profile)
    HasOne,
    /// To-many, foreign key lives on the target table (Author has many Articles)
    HasMany,
    /// Many-to-many through a junction table (Article has and belongs to many Tags)
    ManyToMany,
}

impl RelationKind {
    /// Whether this kind resolves inline as a SQL join on the parent query
    pub fn can_be_joined(self) -> bool {
        matches!(self, Self::BelongsTo | Self::HasOne)
    }

    /// Whether loading this kind yields a collection
    pub fn is_collection(self) -> bool {
        matches!(self, Self::HasMany | Self::ManyToMany)
    }

    /// Whether this kind links through a junction table
    pub fn requires_junction(self) -> bool {
        matches!(self, Self::ManyToMany)
    }

    /// Whether the foreign key lives on the source table
    pub fn foreign_key_on_source(self) -> bool {
        matches!(self, Self::BelongsTo)
    }

    /// Join type when attached inline; `None` for kinds that cannot join
    pub fn join_type(self) -> Option<JoinType> {
        match self {
            Self::BelongsTo => Some(JoinType::Left),
            Self::HasOne => Some(JoinType::Inner),
            Self::HasMany | Self::ManyToMany => None,
        }
    }
}
