use regex::Regex;
use tracing::debug;

use super::patterns::{MEMBER_ROW_RE, STATIC_METHODS_RE, STATIC_PROPERTIES_RE};
use crate::model::{Kind, Member};

/// Member tables on an entity page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberSection {
    StaticProperties,
    StaticMethods,
}

impl MemberSection {
    pub fn title(self) -> &'static str {
        match self {
            MemberSection::StaticProperties => "Static Properties",
            MemberSection::StaticMethods => "Static Methods",
        }
    }

    pub fn kind(self) -> Kind {
        match self {
            MemberSection::StaticProperties => Kind::Property,
            MemberSection::StaticMethods => Kind::Method,
        }
    }

    fn block_re(self) -> &'static Regex {
        match self {
            MemberSection::StaticProperties => &*STATIC_PROPERTIES_RE,
            MemberSection::StaticMethods => &*STATIC_METHODS_RE,
        }
    }
}

/// Find the section's block on the page, then read its rows.
/// A missing section is normal and yields no members.
pub fn extract(html: &str, section: MemberSection, entity: &str, base_url: &str) -> Vec<Member> {
    let Some(block) = section.block_re().captures(html).and_then(|c| c.get(1)) else {
        return Vec::new();
    };

    let members: Vec<Member> = MEMBER_ROW_RE
        .captures_iter(block.as_str())
        .map(|row| Member {
            text: format!("{}.{}", entity, &row[2]),
            description: row[3].to_string(),
            detail_url: format!("{}{}", base_url, &row[1]),
            kind: section.kind(),
        })
        .collect();
    debug!(entity, section = section.title(), rows = members.len(), "Read member table");
    members
}
