//! Image variant selection.
//!
//! Only the resolution appropriate to the display is fetched. Given every
//! stored variant of an item, sorted by numeric width, the display density
//! picks one of them; when there isn't enough data to discriminate, the
//! requested variant is accepted.

use crate::cache::{CacheDb, CacheItem};
use crate::Error;

/// Display pixel-scale class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DensityClass {
    One,
    Two,
    Three,
    Other,
}

impl DensityClass {
    pub fn from_scale(scale: f64) -> Self {
        if scale == 1.0 {
            DensityClass::One
        } else if scale == 2.0 {
            DensityClass::Two
        } else if scale == 3.0 {
            DensityClass::Three
        } else {
            DensityClass::Other
        }
    }
}

/// Outcome of the variant policy for one item key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection<'a> {
    /// Only this variant should be downloaded.
    Variant(&'a str),
    /// Not enough data to discriminate; accept whatever is requested.
    Any,
    /// No variant suits this display.
    Nothing,
}

/// Sort ascending by numeric variant; missing or non-numeric variants first.
pub fn sort_variants(items: &mut [CacheItem]) {
    items.sort_by_key(|item| item.variant.as_deref().and_then(|v| v.parse::<i64>().ok()));
}

/// Sort bare variant names the same way.
pub fn sort_variant_names(variants: &mut [Option<String>]) {
    variants.sort_by_key(|variant| variant.as_deref().and_then(|v| v.parse::<i64>().ok()));
}

/// Pick the variant to keep from variants sorted by [`sort_variants`].
pub fn select_variant<'a>(sorted: &[Option<&'a str>], density: DensityClass) -> Selection<'a> {
    let pick = |variant: Option<&Option<&'a str>>| match variant.copied().flatten() {
        Some(v) => Selection::Variant(v),
        None => Selection::Any,
    };

    match (density, sorted.len()) {
        (DensityClass::One, _) | (_, 1) => pick(sorted.first()),
        (DensityClass::Two, _) => pick(sorted.get(1)),
        (DensityClass::Three, _) => pick(sorted.last()),
        (DensityClass::Other, _) => Selection::Nothing,
    }
}

/// Whether `requested` should be downloaded given the known variants.
///
/// A request without a variant is always accepted.
pub fn should_download(requested: Option<&str>, sorted: &[Option<&str>], density: DensityClass) -> bool {
    let Some(requested) = requested else {
        return true;
    };

    match select_variant(sorted, density) {
        Selection::Variant(selected) => selected == requested,
        Selection::Any => true,
        Selection::Nothing => false,
    }
}

impl CacheDb {
    /// Apply the variant policy to the variants stored for `item_key`.
    pub async fn should_download_variant(
        &self, item_key: &str, variant: Option<&str>, density: DensityClass,
    ) -> Result<bool, Error> {
        if variant.is_none() {
            return Ok(true);
        }

        let mut items = self.all_variant_items(item_key).await?;
        sort_variants(&mut items);
        let sorted: Vec<Option<&str>> = items.iter().map(|i| i.variant.as_deref()).collect();
        Ok(should_download(variant, &sorted, density))
    }

    /// Filter `candidates` for `item_key` down to the variants the policy
    /// selects, judging the stored variants and the candidates together.
    ///
    /// Candidates without a variant are always kept.
    pub async fn select_candidate_variants(
        &self, item_key: &str, candidates: &[Option<String>], density: DensityClass,
    ) -> Result<Vec<Option<String>>, Error> {
        let mut known: Vec<Option<String>> =
            self.all_variant_items(item_key).await?.into_iter().map(|item| item.variant).collect();
        for candidate in candidates {
            if !known.contains(candidate) {
                known.push(candidate.clone());
            }
        }
        sort_variant_names(&mut known);
        let sorted: Vec<Option<&str>> = known.iter().map(Option::as_deref).collect();

        let mut selected: Vec<Option<String>> = Vec::new();
        for candidate in candidates {
            if should_download(candidate.as_deref(), &sorted, density) && !selected.contains(candidate) {
                selected.push(candidate.clone());
            }
        }
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZES: [Option<&str>; 3] = [Some("100"), Some("200"), Some("300")];

    #[test]
    fn test_density_from_scale() {
        assert_eq!(DensityClass::from_scale(1.0), DensityClass::One);
        assert_eq!(DensityClass::from_scale(2.0), DensityClass::Two);
        assert_eq!(DensityClass::from_scale(3.0), DensityClass::Three);
        assert_eq!(DensityClass::from_scale(2.5), DensityClass::Other);
    }

    #[test]
    fn test_select_by_density() {
        assert_eq!(select_variant(&SIZES, DensityClass::One), Selection::Variant("100"));
        assert_eq!(select_variant(&SIZES, DensityClass::Two), Selection::Variant("200"));
        assert_eq!(select_variant(&SIZES, DensityClass::Three), Selection::Variant("300"));
        assert_eq!(select_variant(&SIZES, DensityClass::Other), Selection::Nothing);
    }

    #[test]
    fn test_single_variant_selected_for_any_density() {
        let single = [Some("150")];
        for density in [DensityClass::One, DensityClass::Two, DensityClass::Three, DensityClass::Other] {
            assert_eq!(select_variant(&single, density), Selection::Variant("150"));
            assert!(should_download(Some("150"), &single, density));
        }
    }

    #[test]
    fn test_insufficient_data_accepts() {
        assert_eq!(select_variant(&[], DensityClass::One), Selection::Any);
        assert_eq!(select_variant(&[], DensityClass::Two), Selection::Any);
        assert_eq!(select_variant(&[], DensityClass::Three), Selection::Any);
        assert_eq!(select_variant(&[], DensityClass::Other), Selection::Nothing);
        assert!(should_download(Some("640"), &[], DensityClass::Two));
    }

    #[test]
    fn test_unselected_variant_rejected() {
        assert!(!should_download(Some("100"), &SIZES, DensityClass::Two));
        assert!(!should_download(Some("300"), &SIZES, DensityClass::One));
        assert!(should_download(None, &SIZES, DensityClass::Other));
    }

    #[test]
    fn test_sort_puts_non_numeric_first() {
        let item = |variant: Option<&str>| CacheItem {
            id: 0,
            item_key: "k".into(),
            variant: variant.map(str::to_string),
            url: String::new(),
            is_downloaded: false,
            etag: None,
            created_at: String::new(),
            downloaded_at: None,
            item_type: crate::ItemType::Image,
        };
        let mut items = vec![item(Some("300")), item(Some("20")), item(None), item(Some("large")), item(Some("100"))];
        sort_variants(&mut items);
        let order: Vec<_> = items.iter().map(|i| i.variant.as_deref()).collect();
        assert_eq!(order, vec![None, Some("large"), Some("20"), Some("100"), Some("300")]);
    }

    #[tokio::test]
    async fn test_should_download_variant_from_store() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let key = "upload.wikimedia.org/wikipedia/commons/a/ab/Dog.jpg";
        for width in ["300", "100", "200"] {
            let url = format!("https://upload.wikimedia.org/wikipedia/commons/thumb/a/ab/Dog.jpg/{width}px-Dog.jpg");
            db.fetch_or_create_item(&url, key, Some(width)).await.unwrap();
        }

        assert!(db.should_download_variant(key, Some("200"), DensityClass::Two).await.unwrap());
        assert!(!db.should_download_variant(key, Some("300"), DensityClass::Two).await.unwrap());
        assert!(db.should_download_variant(key, Some("300"), DensityClass::Three).await.unwrap());
        assert!(db.should_download_variant("unknown", Some("300"), DensityClass::Three).await.unwrap());
    }

    #[tokio::test]
    async fn test_candidates_judged_together_on_empty_store() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let candidates = vec![Some("640".to_string()), Some("320".to_string())];

        let pick = |density| {
            let db = db.clone();
            let candidates = candidates.clone();
            async move { db.select_candidate_variants("dog", &candidates, density).await.unwrap() }
        };
        assert_eq!(pick(DensityClass::One).await, vec![Some("320".to_string())]);
        assert_eq!(pick(DensityClass::Two).await, vec![Some("640".to_string())]);
        assert_eq!(pick(DensityClass::Three).await, vec![Some("640".to_string())]);
        assert!(pick(DensityClass::Other).await.is_empty());
    }

    #[tokio::test]
    async fn test_candidates_include_stored_variants() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let key = "upload.wikimedia.org/wikipedia/commons/a/ab/Dog.jpg";
        db.fetch_or_create_item("https://example.org/100px-Dog.jpg", key, Some("100")).await.unwrap();

        let candidates = vec![Some("320".to_string())];
        let selected = db.select_candidate_variants(key, &candidates, DensityClass::Three).await.unwrap();
        assert_eq!(selected, candidates);

        let selected = db.select_candidate_variants(key, &candidates, DensityClass::One).await.unwrap();
        assert!(selected.is_empty());

        let bare = db.select_candidate_variants(key, &[None], DensityClass::Other).await.unwrap();
        assert_eq!(bare, vec![None]);
    }
}
