use super::members::{self, MemberSection};
use super::patterns::{first_capture, CLASSIFIER_RE, DESCRIPTION_RE};
use crate::model::{Entity, EntityDetails, Member};

/// Read an entity's detail page: description, type label and static members.
pub fn extract(html: &str, entity_name: &str, base_url: &str) -> EntityDetails {
    EntityDetails {
        description: first_capture(&DESCRIPTION_RE, html),
        classifier: first_capture(&CLASSIFIER_RE, html),
        properties: members::extract(html, MemberSection::StaticProperties, entity_name, base_url),
        methods: members::extract(html, MemberSection::StaticMethods, entity_name, base_url),
    }
}

/// Fold page details into the stub, returning the member lists.
pub fn apply(entity: &mut Entity, details: EntityDetails) -> (Vec<Member>, Vec<Member>) {
    entity.description = details.description;
    entity.classifier = details.classifier;
    (details.properties, details.methods)
}
