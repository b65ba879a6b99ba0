//! The catalog side of playback: which item is selected and how to show it.

use crate::score::ItemId;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An item picked in the catalog, with its position in the list the user
/// picked it from. The index is only used for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub item: ItemId,
    pub index: usize,
}

impl Selection {
    pub fn new(item: impl Into<ItemId>, index: usize) -> Self {
        Self {
            item: item.into(),
            index,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub display_name: Option<String>,
    pub artwork: Option<String>,
}

/// Supplies display metadata for catalog items.
pub trait CatalogBrowser: Send + Sync {
    fn metadata(&self, item: &ItemId) -> Option<ItemMetadata>;
}

/// What the player bar shows for the current item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowPlaying {
    pub selection: Selection,
    pub title: String,
    pub artwork: Option<String>,
}

impl NowPlaying {
    /// Titles fall back to the item id when the catalog has no display name.
    pub fn resolve(selection: Selection, catalog: &dyn CatalogBrowser) -> Self {
        let metadata = catalog.metadata(&selection.item).unwrap_or_default();
        let title = metadata
            .display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| selection.item.to_string());
        Self {
            selection,
            title,
            artwork: metadata.artwork,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub item: ItemId,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub artwork: Option<String>,
}

impl CatalogEntry {
    pub fn new(item: impl Into<ItemId>) -> Self {
        Self {
            item: item.into(),
            display_name: None,
            artwork: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_artwork(mut self, artwork: impl Into<String>) -> Self {
        self.artwork = Some(artwork.into());
        self
    }
}

/// An in-memory catalog whose listing can be swapped while a session reads it.
pub struct StaticCatalog {
    entries: ArcSwap<Vec<CatalogEntry>>,
}

impl StaticCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self {
            entries: ArcSwap::from_pointee(entries),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn replace(&self, entries: Vec<CatalogEntry>) {
        self.entries.store(Arc::new(entries));
    }

    pub fn entries(&self) -> Arc<Vec<CatalogEntry>> {
        self.entries.load_full()
    }

    pub fn select(&self, index: usize) -> Option<Selection> {
        self.entries
            .load()
            .get(index)
            .map(|entry| Selection::new(entry.item.clone(), index))
    }
}

impl CatalogBrowser for StaticCatalog {
    fn metadata(&self, item: &ItemId) -> Option<ItemMetadata> {
        self.entries
            .load()
            .iter()
            .find(|entry| &entry.item == item)
            .map(|entry| ItemMetadata {
                display_name: entry.display_name.clone(),
                artwork: entry.artwork.clone(),
            })
    }
}

/// Formats seconds as `mm:ss`. Non-finite or negative input shows `00:00`.
pub fn format_clock(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "00:00".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0.0), "00:00");
        assert_eq!(format_clock(59.9), "00:59");
        assert_eq!(format_clock(61.0), "01:01");
        assert_eq!(format_clock(3600.0), "60:00");
        assert_eq!(format_clock(f64::NAN), "00:00");
        assert_eq!(format_clock(-3.0), "00:00");
    }

    #[test]
    fn test_title_falls_back_to_item() {
        let catalog = StaticCatalog::new(vec![
            CatalogEntry::new("a.mid").with_name("Gymnopédie").with_artwork("a.png"),
            CatalogEntry::new("b.mid"),
        ]);

        let a = NowPlaying::resolve(catalog.select(0).unwrap(), &catalog);
        assert_eq!(a.title, "Gymnopédie");
        assert_eq!(a.artwork.as_deref(), Some("a.png"));

        let b = NowPlaying::resolve(catalog.select(1).unwrap(), &catalog);
        assert_eq!(b.title, "b.mid");
        assert_eq!(b.selection.index, 1);

        let unknown = NowPlaying::resolve(Selection::new("zzz", 9), &catalog);
        assert_eq!(unknown.title, "zzz");
        assert!(catalog.select(2).is_none());
    }

    #[test]
    fn test_replace_listing() {
        let catalog = StaticCatalog::empty();
        assert!(catalog.select(0).is_none());
        catalog.replace(vec![CatalogEntry::new("x")]);
        assert_eq!(catalog.select(0), Some(Selection::new("x", 0)));
        assert_eq!(catalog.entries().len(), 1);
    }
}
