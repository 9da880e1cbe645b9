use serde::{Deserialize, Serialize};

/// Tag carried by every leaf record so the bundled catalogue stays self-describing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Require,
    Property,
    Method,
}

/// Namespace / category label from the index page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequireToken {
    pub text: String,
    pub kind: Kind,
}

impl RequireToken {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: Kind::Require,
        }
    }
}

/// A documented type. Starts life as a stub (name + detail URL) from the
/// index page; `description` and `classifier` are filled in by enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    #[serde(rename = "detailURL")]
    pub detail_url: String,
    pub description: Option<String>,
    pub classifier: Option<String>,
}

impl Entity {
    pub fn stub(text: impl Into<String>, detail_url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            detail_url: detail_url.into(),
            description: None,
            classifier: None,
        }
    }
}

/// A static property or method row. Properties are persisted as-is;
/// methods only feed signature resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// `<Entity>.<name>`
    pub text: String,
    pub description: String,
    #[serde(rename = "detailURL")]
    pub detail_url: String,
    pub kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// `<Entity>.<name>(${1:A}, ${2:B})`
    pub snippet: String,
    pub description: String,
    #[serde(rename = "detailURL")]
    pub detail_url: String,
    pub kind: Kind,
}

impl Signature {
    pub fn for_method(method: &Member, params: &str) -> Self {
        Self {
            snippet: format!("{}{}", method.text, params),
            description: method.description.clone(),
            detail_url: method.detail_url.clone(),
            kind: Kind::Method,
        }
    }
}

/// Everything one entity detail page yields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityDetails {
    pub description: Option<String>,
    pub classifier: Option<String>,
    pub properties: Vec<Member>,
    pub methods: Vec<Member>,
}

/// Output of the index phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexListing {
    pub requires: Vec<RequireToken>,
    pub entities: Vec<Entity>,
}
