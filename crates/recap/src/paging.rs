use anyhow::Result;
use chrono::{DateTime, Datelike, Utc};

/// Time ordering a provider guarantees for the items it pages through.
///
/// Early exit at the year boundary is only correct for `NewestFirst`. A provider
/// that cannot promise non-increasing timestamps must declare `Unordered`, which
/// scans every page and filters by year instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordering {
    NewestFirst,
    Unordered,
}

impl Ordering {
    pub fn from_assumption(assume_descending: bool) -> Self {
        if assume_descending {
            Self::NewestFirst
        } else {
            Self::Unordered
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T, C> {
    pub items: Vec<T>,
    pub next_cursor: Option<C>,
}

pub trait CursorPager {
    type Item: Send;
    type Cursor: Clone + PartialEq + Send + Sync;

    fn ordering(&self) -> Ordering;

    /// Calendar year (UTC) of an item, or `None` when the provider omitted its timestamp.
    fn item_year(&self, item: &Self::Item) -> Option<i32>;

    fn fetch_page(
        &self,
        cursor: Option<&Self::Cursor>,
    ) -> impl std::future::Future<Output = Result<Page<Self::Item, Self::Cursor>>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearPosition {
    Newer,
    Within,
    Older,
}

pub fn year_position(item_year: i32, target_year: i32) -> YearPosition {
    match item_year.cmp(&target_year) {
        std::cmp::Ordering::Greater => YearPosition::Newer,
        std::cmp::Ordering::Equal => YearPosition::Within,
        std::cmp::Ordering::Less => YearPosition::Older,
    }
}

pub fn year_of(ts: DateTime<Utc>) -> i32 {
    ts.year()
}

pub fn year_of_unix(secs: i64) -> Option<i32> {
    DateTime::from_timestamp(secs, 0).map(year_of)
}

#[derive(Debug)]
pub struct YearScan<T> {
    pub items: Vec<T>,
    pub pages: u32,
    pub hit_boundary: bool,
}

/// Page through `pager` in cursor order and keep the items that fall in `year`.
///
/// Stops when an item older than `year` is seen (newest-first providers only),
/// when the provider returns no next cursor or an empty page, or when it hands
/// back the cursor it was just called with.
pub async fn collect_year<P: CursorPager + Sync>(
    pager: &P,
    year: i32,
) -> Result<YearScan<P::Item>> {
    let ordering = pager.ordering();
    let mut cursor: Option<P::Cursor> = None;
    let mut items = Vec::new();
    let mut pages = 0_u32;
    let mut hit_boundary = false;

    loop {
        let Page {
            items: page_items,
            next_cursor,
        } = pager.fetch_page(cursor.as_ref()).await?;
        pages += 1;

        if page_items.is_empty() {
            break;
        }

        for item in page_items {
            let Some(item_year) = pager.item_year(&item) else {
                continue;
            };
            match year_position(item_year, year) {
                YearPosition::Within => items.push(item),
                YearPosition::Newer => {}
                YearPosition::Older if ordering == Ordering::NewestFirst => {
                    hit_boundary = true;
                    break;
                }
                YearPosition::Older => {}
            }
        }

        if hit_boundary {
            break;
        }

        match next_cursor {
            Some(next) if cursor.as_ref() != Some(&next) => cursor = Some(next),
            _ => break,
        }
    }

    tracing::debug!(pages, kept = items.len(), hit_boundary, year, "year scan finished");
    Ok(YearScan {
        items,
        pages,
        hit_boundary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

    /// Items are bare years; the cursor is the index of the next page.
    struct FakeYearPager {
        pages: Vec<Vec<i32>>,
        ordering: Ordering,
        calls: AtomicU32,
    }

    impl FakeYearPager {
        fn new(pages: Vec<Vec<i32>>, ordering: Ordering) -> Self {
            Self {
                pages,
                ordering,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(AtomicOrdering::SeqCst)
        }
    }

    impl CursorPager for FakeYearPager {
        type Item = i32;
        type Cursor = usize;

        fn ordering(&self) -> Ordering {
            self.ordering
        }

        fn item_year(&self, item: &i32) -> Option<i32> {
            (*item > 0).then_some(*item)
        }

        async fn fetch_page(&self, cursor: Option<&usize>) -> Result<Page<i32, usize>> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            let idx = cursor.copied().unwrap_or(0);
            let items = self.pages.get(idx).cloned().unwrap_or_default();
            let next_cursor = (idx + 1 < self.pages.len()).then_some(idx + 1);
            Ok(Page { items, next_cursor })
        }
    }

    #[tokio::test]
    async fn test_newest_first_stops_at_boundary() {
        let pager = FakeYearPager::new(
            vec![
                vec![2025, 2024, 2024],
                vec![2024, 2023, 2024],
                vec![2022, 2022],
            ],
            Ordering::NewestFirst,
        );

        let scan = collect_year(&pager, 2024).await.unwrap();
        assert_eq!(scan.items, vec![2024, 2024, 2024]);
        assert!(scan.hit_boundary);
        // Third page is never requested.
        assert_eq!(pager.calls(), 2);
    }

    #[tokio::test]
    async fn test_never_returns_other_years() {
        let pager = FakeYearPager::new(
            vec![vec![2026, 2025], vec![2025, 2024], vec![2024]],
            Ordering::NewestFirst,
        );
        let scan = collect_year(&pager, 2025).await.unwrap();
        assert!(scan.items.iter().all(|y| *y == 2025));
        assert_eq!(scan.items.len(), 2);
    }

    #[tokio::test]
    async fn test_unordered_scans_every_page() {
        let pager = FakeYearPager::new(
            vec![vec![2024, 2022], vec![2023, 2024], vec![2024]],
            Ordering::Unordered,
        );

        let scan = collect_year(&pager, 2024).await.unwrap();
        assert_eq!(scan.items, vec![2024, 2024, 2024]);
        assert!(!scan.hit_boundary);
        assert_eq!(pager.calls(), 3);
    }

    #[tokio::test]
    async fn test_empty_page_terminates() {
        let pager = FakeYearPager::new(vec![vec![2024], vec![], vec![2024]], Ordering::NewestFirst);
        let scan = collect_year(&pager, 2024).await.unwrap();
        assert_eq!(scan.items, vec![2024]);
        assert_eq!(scan.pages, 2);
    }

    #[tokio::test]
    async fn test_items_without_timestamp_are_dropped() {
        let pager = FakeYearPager::new(vec![vec![0, 2024, -1]], Ordering::NewestFirst);
        let scan = collect_year(&pager, 2024).await.unwrap();
        assert_eq!(scan.items, vec![2024]);
    }

    struct StuckCursorPager;

    impl CursorPager for StuckCursorPager {
        type Item = i32;
        type Cursor = String;

        fn ordering(&self) -> Ordering {
            Ordering::NewestFirst
        }

        fn item_year(&self, item: &i32) -> Option<i32> {
            Some(*item)
        }

        async fn fetch_page(&self, _cursor: Option<&String>) -> Result<Page<i32, String>> {
            Ok(Page {
                items: vec![2024],
                next_cursor: Some("same".to_string()),
            })
        }
    }

    #[tokio::test]
    async fn test_repeated_cursor_stops_loop() {
        let scan = collect_year(&StuckCursorPager, 2024).await.unwrap();
        assert_eq!(scan.pages, 2);
        assert_eq!(scan.items.len(), 2);
    }

    struct FailingPager;

    impl CursorPager for FailingPager {
        type Item = i32;
        type Cursor = u32;

        fn ordering(&self) -> Ordering {
            Ordering::NewestFirst
        }

        fn item_year(&self, item: &i32) -> Option<i32> {
            Some(*item)
        }

        async fn fetch_page(&self, _cursor: Option<&u32>) -> Result<Page<i32, u32>> {
            anyhow::bail!("HTTP 500")
        }
    }

    #[tokio::test]
    async fn test_page_error_propagates() {
        let err = collect_year(&FailingPager, 2024).await.unwrap_err();
        assert!(err.to_string().contains("HTTP 500"));
    }

    #[test]
    fn test_year_helpers() {
        assert_eq!(year_position(2025, 2024), YearPosition::Newer);
        assert_eq!(year_position(2024, 2024), YearPosition::Within);
        assert_eq!(year_position(2023, 2024), YearPosition::Older);
        // 2024-01-01T00:00:00Z
        assert_eq!(year_of_unix(1_704_067_200), Some(2024));
        assert_eq!(year_of_unix(1_704_067_199), Some(2023));
    }
}
