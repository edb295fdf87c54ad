//! Metadata endpoints
//!
//! Properties and tags attached to an entity under
//! `/namespaces/:namespace/:entityType/:entityId/metadata`.

use crate::endpoint::{params, RequestEndpoint};
use datasource_mux::Method;
use datasource_url::{QueryParams, QueryValue, UrlError};

const BASE_PATH: &str = "/namespaces/:namespace/:entityType/:entityId/metadata";

/// Entity whose metadata is addressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    pub namespace: String,
    pub entity_type: String,
    pub entity_id: String,
}

impl EntityRef {
    /// Create entity reference
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }

    /// Path parameters for this entity
    #[must_use]
    pub fn params(&self) -> QueryParams {
        params([
            ("namespace", self.namespace.as_str()),
            ("entityType", self.entity_type.as_str()),
            ("entityId", self.entity_id.as_str()),
        ])
    }

    /// Path parameters plus the `:key` of a property or tag
    #[must_use]
    pub fn params_with_key(&self, key: impl Into<String>) -> QueryParams {
        let mut params = self.params();
        params.insert("key".to_string(), QueryValue::String(key.into()));
        params
    }
}

/// Metadata endpoint table
#[derive(Debug, Clone)]
pub struct MetadataApi {
    pub get_metadata: RequestEndpoint,
    pub get_properties: RequestEndpoint,
    pub add_properties: RequestEndpoint,
    pub delete_property: RequestEndpoint,
    pub get_tags: RequestEndpoint,
    pub add_tags: RequestEndpoint,
    pub delete_tag: RequestEndpoint,
}

impl MetadataApi {
    /// Build the endpoint table
    ///
    /// # Errors
    /// Returns an error if a template fails to parse
    pub fn new() -> Result<Self, UrlError> {
        let at = |method, suffix: &str| RequestEndpoint::new(method, &format!("{BASE_PATH}{suffix}"));
        Ok(Self {
            get_metadata: at(Method::Get, "")?,
            get_properties: at(Method::Get, "/properties")?,
            add_properties: at(Method::Post, "/properties")?,
            delete_property: at(Method::Delete, "/properties/:key")?,
            get_tags: at(Method::Get, "/tags")?,
            add_tags: at(Method::Post, "/tags")?,
            delete_tag: at(Method::Delete, "/tags/:key")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_builds() {
        let api = MetadataApi::new().unwrap();
        assert_eq!(api.add_tags.method(), Method::Post);
        assert_eq!(
            api.delete_property.template().as_str(),
            "/namespaces/:namespace/:entityType/:entityId/metadata/properties/:key"
        );
    }

    #[test]
    fn entity_params_fill_template() {
        let api = MetadataApi::new().unwrap();
        let entity = EntityRef::new("default", "apps", "PurchaseHistory");
        let spec = api
            .delete_tag
            .spec(&entity.params_with_key("nightly"), None)
            .unwrap();
        assert_eq!(
            spec.symbolic_path.as_deref(),
            Some("/namespaces/default/apps/PurchaseHistory/metadata/tags/nightly")
        );
        assert!(spec.params.is_none());
    }
}
