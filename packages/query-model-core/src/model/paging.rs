//! Page arithmetic over the offset/max-rows window.

use super::QueryModel;

impl QueryModel {
    /// Page size, or `None` when all rows are shown.
    pub fn page_size(&self) -> Option<u64> {
        u64::try_from(self.max_rows).ok().filter(|size| *size > 0)
    }

    /// `ceil(row_count / max_rows)`, or 1 when all rows are shown.
    pub fn page_count(&self) -> u64 {
        match self.page_size() {
            Some(size) => self.row_count.unwrap_or(0).div_ceil(size),
            None => 1,
        }
    }

    /// 1-indexed page containing `offset`.
    pub fn current_page(&self) -> u64 {
        match self.page_size() {
            Some(size) => self.offset / size + 1,
            None => 1,
        }
    }

    /// Offset of the first row on the last page.
    pub fn last_page_offset(&self) -> u64 {
        match self.page_size() {
            Some(size) => self.page_count().saturating_sub(1) * size,
            None => 0,
        }
    }

    pub fn is_first_page(&self) -> bool {
        self.current_page() == 1
    }

    pub fn is_last_page(&self) -> bool {
        self.current_page() == self.page_count()
    }

    /// True when rows have loaded and a page size applies.
    pub fn is_paged(&self) -> bool {
        self.has_data() && self.page_size().is_some()
    }

    /// Offset of the next page, if there is one.
    pub fn next_page_offset(&self) -> Option<u64> {
        let size = self.page_size()?;
        (self.current_page() < self.page_count()).then(|| self.current_page() * size)
    }

    /// Offset of the previous page, if there is one.
    pub fn previous_page_offset(&self) -> Option<u64> {
        let size = self.page_size()?;
        (!self.is_first_page()).then(|| (self.current_page() - 2) * size)
    }
}
