//! Core taxonomy types.

use serde::{Deserialize, Serialize};

/// The fixed set of taxonomies the marketplace classifies listings with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxonomyType {
    Categories,
    Tags,
    Skills,
}

impl TaxonomyType {
    pub const ALL: [TaxonomyType; 3] = [
        TaxonomyType::Categories,
        TaxonomyType::Tags,
        TaxonomyType::Skills,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaxonomyType::Categories => "categories",
            TaxonomyType::Tags => "tags",
            TaxonomyType::Skills => "skills",
        }
    }

    /// Only categories form a tree; tags and skills are flat lists.
    pub fn is_hierarchical(&self) -> bool {
        matches!(self, TaxonomyType::Categories)
    }

    /// Path of the generated source file inside the hosted repository.
    pub fn file_path(&self) -> &'static str {
        match self {
            TaxonomyType::Categories => "src/data/taxonomies/categories.ts",
            TaxonomyType::Tags => "src/data/taxonomies/tags.ts",
            TaxonomyType::Skills => "src/data/taxonomies/skills.ts",
        }
    }

    /// Name of the single exported array in the generated file.
    pub fn export_symbol(&self) -> &'static str {
        self.as_str()
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "categories" => Some(TaxonomyType::Categories),
            "tags" => Some(TaxonomyType::Tags),
            "skills" => Some(TaxonomyType::Skills),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaxonomyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hierarchy level of an item inside a taxonomy tree (max depth 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Category,
    Subcategory,
    Subdivision,
}

impl Level {
    /// Zero-based depth in the tree.
    pub fn depth(&self) -> usize {
        match self {
            Level::Category => 0,
            Level::Subcategory => 1,
            Level::Subdivision => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Category => "category",
            Level::Subcategory => "subcategory",
            Level::Subdivision => "subdivision",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Image metadata attached to an item.
///
/// Field declaration order is the emission order in the generated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemImage {
    pub src: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

/// A node in a taxonomy tree.
///
/// Ids are numeric strings unique within the taxonomy type across all
/// levels; slugs are unique within the type. Field declaration order is
/// load-bearing: the generated-file writer emits properties in exactly this
/// order so repeated machine commits produce minimal diffs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyItem {
    pub id: String,
    pub label: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ItemImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plural: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TaxonomyItem>,
}

impl TaxonomyItem {
    pub fn new(id: impl Into<String>, label: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            slug: slug.into(),
            description: None,
            image: None,
            category: None,
            featured: None,
            icon: None,
            plural: None,
            kind: None,
            children: Vec::new(),
        }
    }

    /// Shallow-merge draft fields onto this item.
    ///
    /// Only fields the draft actually carries are overwritten; children are
    /// preserved unless the draft explicitly includes them.
    pub fn apply_fields(&mut self, fields: &ItemFields) {
        if let Some(label) = &fields.label {
            self.label = label.clone();
        }
        if let Some(slug) = &fields.slug {
            self.slug = slug.clone();
        }
        if let Some(description) = &fields.description {
            self.description = Some(description.clone());
        }
        if let Some(image) = &fields.image {
            self.image = Some(image.clone());
        }
        if let Some(category) = &fields.category {
            self.category = Some(category.clone());
        }
        if let Some(featured) = fields.featured {
            self.featured = Some(featured);
        }
        if let Some(icon) = &fields.icon {
            self.icon = Some(icon.clone());
        }
        if let Some(plural) = &fields.plural {
            self.plural = Some(plural.clone());
        }
        if let Some(kind) = &fields.kind {
            self.kind = Some(kind.clone());
        }
        if let Some(children) = &fields.children {
            self.children = children.clone();
        }
    }
}

/// The full post-edit payload carried by a staged change or draft.
///
/// Every field is optional: a create carries the complete item (id assigned
/// at staging time), an update carries only the fields being changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ItemImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plural: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TaxonomyItem>>,
}

impl ItemFields {
    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        *self == ItemFields::default()
    }

    /// Merge `later` onto `self`, later fields winning.
    pub fn merge_from(&mut self, later: &ItemFields) {
        macro_rules! take {
            ($field:ident) => {
                if later.$field.is_some() {
                    self.$field = later.$field.clone();
                }
            };
        }
        take!(id);
        take!(label);
        take!(slug);
        take!(description);
        take!(image);
        take!(category);
        take!(featured);
        take!(icon);
        take!(plural);
        take!(kind);
        take!(children);
    }

    /// Build a complete item, requiring id, label, and slug to be present.
    pub fn into_item(self) -> Option<TaxonomyItem> {
        let mut item = TaxonomyItem::new(self.id?, self.label?, self.slug?);
        item.description = self.description;
        item.image = self.image;
        item.category = self.category;
        item.featured = self.featured;
        item.icon = self.icon;
        item.plural = self.plural;
        item.kind = self.kind;
        item.children = self.children.unwrap_or_default();
        Some(item)
    }
}

impl From<&TaxonomyItem> for ItemFields {
    fn from(item: &TaxonomyItem) -> Self {
        ItemFields {
            id: Some(item.id.clone()),
            label: Some(item.label.clone()),
            slug: Some(item.slug.clone()),
            description: item.description.clone(),
            image: item.image.clone(),
            category: item.category.clone(),
            featured: item.featured,
            icon: item.icon.clone(),
            plural: item.plural.clone(),
            kind: item.kind.clone(),
            children: if item.children.is_empty() {
                None
            } else {
                Some(item.children.clone())
            },
        }
    }
}
