//! Greedy two-column masonry packing.
//!
//! Items are visited once in display order and each goes to whichever
//! column is currently shorter, measured in accumulated height/width
//! ratios. Ties go left. The result is deterministic for a given input
//! order but not globally optimal.

use super::types::FeedItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Left,
    Right,
}

/// Column assignment for a display list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MasonryLayout {
    pub left: Vec<FeedItem>,
    pub right: Vec<FeedItem>,
    /// Sum of height/width ratios of `left`.
    pub left_total: f64,
    /// Sum of height/width ratios of `right`.
    pub right_total: f64,
}

impl MasonryLayout {
    /// Packs `items` into two columns.
    pub fn pack(items: &[FeedItem]) -> Self {
        let mut layout = Self::default();
        for item in items {
            let ratio = item.layout_ratio();
            match layout.next_column() {
                Column::Left => {
                    layout.left.push(item.clone());
                    layout.left_total += ratio;
                }
                Column::Right => {
                    layout.right.push(item.clone());
                    layout.right_total += ratio;
                }
            }
        }
        layout
    }

    /// Column the next item would be placed in.
    pub fn next_column(&self) -> Column {
        if self.left_total <= self.right_total {
            Column::Left
        } else {
            Column::Right
        }
    }

    /// Column of each input item, in input order.
    pub fn assignments(items: &[FeedItem]) -> Vec<Column> {
        let (mut left_total, mut right_total) = (0.0, 0.0);
        items
            .iter()
            .map(|item| {
                if left_total <= right_total {
                    left_total += item.layout_ratio();
                    Column::Left
                } else {
                    right_total += item.layout_ratio();
                    Column::Right
                }
            })
            .collect()
    }

    pub fn imbalance(&self) -> f64 {
        (self.left_total - self.right_total).abs()
    }
}
