use super::*;
use std::{fmt, str::FromStr};

/// Namespace an identifier belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Collection,
    Link,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Collection => "collection",
            ResourceKind::Link => "link",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = CascadeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "collection" => Ok(ResourceKind::Collection),
            "link" => Ok(ResourceKind::Link),
            other => Err(CascadeError::InvalidResourceKind(other.into())),
        }
    }
}

/// One reactive cell: an attribute on a collection or a link type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeRef {
    pub kind: ResourceKind,
    pub resource_id: String,
    pub attribute_id: String,
}

impl AttributeRef {
    pub fn new<R, A>(kind: ResourceKind, resource_id: R, attribute_id: A) -> Self
    where
        R: Into<String>,
        A: Into<String>,
    {
        Self {
            kind,
            resource_id: resource_id.into(),
            attribute_id: attribute_id.into(),
        }
    }

    pub fn collection<R: Into<String>, A: Into<String>>(resource_id: R, attribute_id: A) -> Self {
        Self::new(ResourceKind::Collection, resource_id, attribute_id)
    }

    pub fn link<R: Into<String>, A: Into<String>>(resource_id: R, attribute_id: A) -> Self {
        Self::new(ResourceKind::Link, resource_id, attribute_id)
    }

    pub fn resource(&self) -> ResourceReference {
        ResourceReference::new(self.kind, self.resource_id.clone())
    }

    pub fn belongs_to(&self, kind: ResourceKind, resource_id: &str) -> bool {
        self.kind == kind && self.resource_id == resource_id
    }
}

impl fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.kind, self.resource_id, self.attribute_id)
    }
}

/// A whole collection or link type, without a specific attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceReference {
    pub kind: ResourceKind,
    pub resource_id: String,
}

impl ResourceReference {
    pub fn new<R: Into<String>>(kind: ResourceKind, resource_id: R) -> Self {
        Self {
            kind,
            resource_id: resource_id.into(),
        }
    }

    pub fn collection<R: Into<String>>(resource_id: R) -> Self {
        Self::new(ResourceKind::Collection, resource_id)
    }

    pub fn link<R: Into<String>>(resource_id: R) -> Self {
        Self::new(ResourceKind::Link, resource_id)
    }
}

impl fmt::Display for ResourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.resource_id)
    }
}

/// Identifiers of the live resources, used to classify literals found in scripts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownResources {
    pub collections: HashSet<String>,
    pub link_types: HashSet<String>,
}

impl KnownResources {
    pub fn new<C, L, S>(collections: C, link_types: L) -> Self
    where
        C: IntoIterator<Item = S>,
        L: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            collections: collections.into_iter().map(Into::into).collect(),
            link_types: link_types.into_iter().map(Into::into).collect(),
        }
    }

    /// Collections win when an id is registered in both sets.
    pub fn classify(&self, id: &str) -> Option<ResourceReference> {
        if self.collections.contains(id) {
            Some(ResourceReference::collection(id))
        } else if self.link_types.contains(id) {
            Some(ResourceReference::link(id))
        } else {
            None
        }
    }
}
