use super::types::{ContentKind, FeedItem, SelectedItem};

/// Most-recent-first log of picked items.
///
/// Picks are never de-duplicated: choosing the same item twice records two
/// entries, kept distinct by the selection count baked into each id.
#[derive(Debug, Clone, Default)]
pub struct SelectionLog {
    entries: Vec<SelectedItem>,
}

impl SelectionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a pick of `item` under `kind`.
    ///
    /// Sponsored placeholders and items without a URL are ignored and return
    /// `None`.
    pub fn select(&mut self, item: &FeedItem, kind: ContentKind) -> Option<&SelectedItem> {
        if item.is_ad || item.url.is_empty() {
            return None;
        }

        let selected = SelectedItem {
            id: format!("{}-{}-{}", item.id, kind, self.entries.len()),
            kind,
            url: item.url.clone(),
            aspect_ratio: item.aspect_ratio(),
        };
        self.entries.insert(0, selected);
        self.entries.first()
    }

    /// Entries, newest first.
    pub fn entries(&self) -> &[SelectedItem] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
