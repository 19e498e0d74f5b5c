//! Taxonomy permissions using bitflags.
//!
//! The whole pipeline gates on these before any read or write; a missing
//! capability always yields `PermissionDenied` before any side effect.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Capabilities on the taxonomies resource.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Permissions: u32 {
        /// View committed and pending taxonomy state
        const VIEW = 0b001;
        /// Stage, discard, and publish taxonomy edits
        const EDIT = 0b010;
        /// Full administrative access
        const ADMIN = 0b100;
    }
}

impl Serialize for Permissions {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bits = u32::deserialize(deserializer)?;
        Permissions::from_bits(bits)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid permission bits: {}", bits)))
    }
}

impl Permissions {
    /// Viewer role: read-only access to taxonomy state
    pub const VIEWER: Permissions = Permissions::VIEW;

    /// Editor role: can view and edit taxonomies
    pub const EDITOR: Permissions = Permissions::VIEW.union(Permissions::EDIT);

    /// Admin role: everything
    pub const OWNER: Permissions = Permissions::EDITOR.union(Permissions::ADMIN);

    #[inline]
    pub fn can_view(&self) -> bool {
        self.contains(Permissions::VIEW)
    }

    #[inline]
    pub fn can_edit(&self) -> bool {
        self.contains(Permissions::EDIT)
    }

    #[inline]
    pub fn is_admin(&self) -> bool {
        self.contains(Permissions::ADMIN)
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Permissions::VIEWER
    }
}
