use super::types::FeedItem;
use crate::provider::ProviderKind;

/// Real items between consecutive sponsored placeholders.
pub const AD_FREQUENCY: usize = 8;

/// Builds the display list for `provider` from the accumulated items.
///
/// Klipy feeds get a sponsored placeholder after every [`AD_FREQUENCY`]-th
/// real item, identified as `klipy-ad-{index}` where `index` is the
/// zero-based position of the preceding real item. Other providers pass
/// through unchanged. The input is never modified.
pub fn decorate(items: &[FeedItem], provider: ProviderKind) -> Vec<FeedItem> {
    match provider {
        ProviderKind::Klipy => inject_ads(items, AD_FREQUENCY),
        ProviderKind::Tenor => items.to_vec(),
    }
}

/// Inserts a placeholder after every `frequency`-th item.
///
/// A `frequency` of zero disables injection.
pub fn inject_ads(items: &[FeedItem], frequency: usize) -> Vec<FeedItem> {
    if frequency == 0 {
        return items.to_vec();
    }

    let mut display = Vec::with_capacity(items.len() + items.len() / frequency);
    for (index, item) in items.iter().enumerate() {
        display.push(item.clone());
        if (index + 1) % frequency == 0 {
            display.push(FeedItem::sponsored(format!("klipy-ad-{index}")));
        }
    }
    display
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn items(count: usize) -> Vec<FeedItem> {
        (0..count)
            .map(|i| FeedItem::media(i.to_string(), format!("https://m/{i}"), 10.0, 10.0))
            .collect()
    }

    #[test]
    fn test_klipy_ad_after_every_eighth_item() {
        let display = decorate(&items(17), ProviderKind::Klipy);
        assert_eq!(display.len(), 19);

        assert!(display[8].is_ad);
        assert_eq!(display[8].id, "klipy-ad-7");
        assert!(display[17].is_ad);
        assert_eq!(display[17].id, "klipy-ad-15");
        assert!(!display[18].is_ad);
    }

    #[test]
    fn test_tenor_never_gets_ads() {
        let source = items(40);
        let display = decorate(&source, ProviderKind::Tenor);
        assert_eq!(display, source);
    }

    #[test]
    fn test_short_list_has_no_ads() {
        let display = decorate(&items(7), ProviderKind::Klipy);
        assert!(display.iter().all(|item| !item.is_ad));
    }

    #[test]
    fn test_zero_frequency_disables_injection() {
        assert_eq!(inject_ads(&items(3), 0).len(), 3);
    }

    proptest! {
        #[test]
        fn prop_ads_follow_every_kth_real_item(count in 0usize..200, k in 1usize..20) {
            let source = items(count);
            let display = inject_ads(&source, k);

            prop_assert_eq!(display.len(), count + count / k);

            let mut real_seen = 0;
            for (pos, entry) in display.iter().enumerate() {
                if entry.is_ad {
                    // An ad only ever directly follows the k-th, 2k-th, ... real item
                    prop_assert!(real_seen > 0 && real_seen % k == 0);
                    prop_assert!(!display[pos - 1].is_ad);
                } else {
                    prop_assert_eq!(entry, &source[real_seen]);
                    real_seen += 1;
                    if real_seen % k == 0 {
                        prop_assert!(display.get(pos + 1).is_some_and(|next| next.is_ad));
                    }
                }
            }
        }
    }
}
