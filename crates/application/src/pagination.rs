/// Position of one 1-based page within a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PageWindow {
    /// Items skipped before the page starts.
    pub(crate) offset: u64,
    /// Whether another page follows.
    pub(crate) has_more: bool,
}

impl PageWindow {
    pub(crate) fn new(page: u32, page_size: u32, total: u64) -> Self {
        Self {
            offset: u64::from(page.saturating_sub(1)).saturating_mul(u64::from(page_size)),
            has_more: u64::from(page).saturating_mul(u64::from(page_size)) < total,
        }
    }

    pub(crate) fn offset_usize(self) -> usize {
        usize::try_from(self.offset).unwrap_or(usize::MAX)
    }

    /// Cuts the page out of the full ordered result set.
    pub(crate) fn slice<T>(self, items: Vec<T>, page_size: u32) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset_usize())
            .take(page_size as usize)
            .collect()
    }
}
