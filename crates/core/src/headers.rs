//! Request metadata contract for cacheable requests.
//!
//! Every request that may be served from the persistent cache carries up to
//! four header fields. Only the item key is required; the item type defaults
//! to [`ItemType::Article`] when absent or unrecognized.

use serde::{Deserialize, Serialize};

use crate::keys::generator_for;

pub const ITEM_KEY: &str = "Persistent-Cache-Item-Key";
pub const ITEM_VARIANT: &str = "Persistent-Cache-Item-Variant";
pub const ITEM_TYPE: &str = "Persistent-Cache-Item-Type";
pub const ETAG: &str = "Persistent-Cache-ETag";

/// Kind of cached resource, selects the key generation strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
pub enum ItemType {
    Image,
    #[default]
    Article,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Image => "Image",
            ItemType::Article => "Article",
        }
    }

    /// Parse a header value, falling back to `Article`.
    pub fn from_header(value: Option<&str>) -> Self {
        match value {
            Some("Image") => ItemType::Image,
            _ => ItemType::Article,
        }
    }
}

/// Header fields identifying `url` in the persistent cache.
///
/// Returns an empty list when no item key can be derived for the URL, in
/// which case the request is not cacheable.
pub fn header_fields(url: &url::Url, item_type: ItemType) -> Vec<(&'static str, String)> {
    let generator = generator_for(item_type);
    let Some(item_key) = generator.item_key(url) else {
        return Vec::new();
    };

    let mut fields = vec![(ITEM_KEY, item_key)];
    if let Some(variant) = generator.variant(url) {
        fields.push((ITEM_VARIANT, variant));
    }
    fields.push((ITEM_TYPE, item_type.as_str().to_string()));
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_type_default() {
        assert_eq!(ItemType::from_header(None), ItemType::Article);
        assert_eq!(ItemType::from_header(Some("Video")), ItemType::Article);
        assert_eq!(ItemType::from_header(Some("Image")), ItemType::Image);
    }

    #[test]
    fn test_image_header_fields() {
        let url = url::Url::parse("https://upload.wikimedia.org/wikipedia/commons/thumb/a/ab/Dog.jpg/220px-Dog.jpg")
            .unwrap();
        let fields = header_fields(&url, ItemType::Image);
        assert_eq!(
            fields,
            vec![
                (ITEM_KEY, "upload.wikimedia.org/wikipedia/commons/a/ab/Dog.jpg".to_string()),
                (ITEM_VARIANT, "220".to_string()),
                (ITEM_TYPE, "Image".to_string()),
            ]
        );
    }

    #[test]
    fn test_article_header_fields_have_no_variant() {
        let url = url::Url::parse("https://en.wikipedia.org/api/rest_v1/page/mobile-html/Dog").unwrap();
        let fields = header_fields(&url, ItemType::Article);
        assert_eq!(fields.len(), 2);
        assert!(fields.iter().all(|(name, _)| *name != ITEM_VARIANT));
    }

    #[test]
    fn test_uncacheable_url() {
        let url = url::Url::parse("data:text/plain,hello").unwrap();
        assert!(header_fields(&url, ItemType::Article).is_empty());
    }
}
