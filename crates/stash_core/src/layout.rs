//! Slot geometry of a container view: where storage ends, where the nav row
//! starts, and which nav-row slots hold the buttons and upgrade sockets.

use crate::{PAGE_SIZE, ROW_WIDTH};

const PREV_COLUMN: usize = 0;
const SORT_COLUMN: usize = 1;
const NEXT_COLUMN: usize = ROW_WIDTH - 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotLayout {
    pub display_size: usize,
    /// Visible slots that map onto logical storage.
    pub storage_area: usize,
    pub nav_row_start: Option<usize>,
    pub prev_button: Option<usize>,
    pub next_button: Option<usize>,
    pub sort_button: Option<usize>,
    /// Display slot of each socket, indexed by socket number.
    pub socket_slots: Vec<usize>,
}

impl SlotLayout {
    pub fn socket_at(&self, slot: usize) -> Option<usize> {
        self.socket_slots.iter().position(|&s| s == slot)
    }

    pub fn in_nav_row(&self, slot: usize) -> bool {
        self.nav_row_start
            .is_some_and(|start| slot >= start && slot < self.display_size)
    }
}

/// Compute the layout for a view of `display_size` slots.
///
/// A nav row needs at least one full row; smaller displays get storage only.
pub fn layout(
    display_size: usize,
    has_nav_row: bool,
    upgrade_sockets: usize,
    paginated: bool,
) -> SlotLayout {
    if !has_nav_row || display_size < ROW_WIDTH {
        return SlotLayout {
            display_size,
            storage_area: display_size,
            nav_row_start: None,
            prev_button: None,
            next_button: None,
            sort_button: None,
            socket_slots: Vec::new(),
        };
    }

    let nav = display_size - ROW_WIDTH;
    let count = upgrade_sockets.min(ROW_WIDTH);
    let first = nav + (ROW_WIDTH - count) / 2;

    SlotLayout {
        display_size,
        storage_area: nav,
        nav_row_start: Some(nav),
        prev_button: paginated.then_some(nav + PREV_COLUMN),
        next_button: paginated.then_some(nav + NEXT_COLUMN),
        sort_button: Some(nav + SORT_COLUMN),
        socket_slots: (first..first + count).collect(),
    }
}

pub fn page_count(logical_len: usize) -> usize {
    logical_len.div_ceil(PAGE_SIZE)
}

pub fn page_offset(page: usize) -> usize {
    page * PAGE_SIZE
}

/// Logical slots that actually exist behind a `window`-sized view of `page`.
pub fn valid_slots(logical_len: usize, page: usize, window: usize) -> usize {
    logical_len.saturating_sub(page_offset(page)).min(window)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nav_row_sits_on_last_row() {
        let l = layout(54, true, 3, true);
        assert_eq!(l.storage_area, 45);
        assert_eq!(l.nav_row_start, Some(45));
        assert_eq!(l.prev_button, Some(45));
        assert_eq!(l.sort_button, Some(46));
        assert_eq!(l.next_button, Some(53));
        assert_eq!(l.socket_slots, vec![48, 49, 50]);
    }

    #[test]
    fn sockets_are_centered() {
        assert_eq!(layout(27, true, 1, false).socket_slots, vec![22]);
        assert_eq!(layout(27, true, 5, false).socket_slots, vec![20, 21, 22, 23, 24]);
        assert_eq!(layout(27, true, 20, false).socket_slots.len(), ROW_WIDTH);
    }

    #[test]
    fn unpaginated_views_have_no_page_buttons() {
        let l = layout(36, true, 0, false);
        assert_eq!(l.prev_button, None);
        assert_eq!(l.next_button, None);
        assert_eq!(l.sort_button, Some(28));
        assert!(l.socket_slots.is_empty());
    }

    #[test]
    fn degenerate_sizes_yield_storage_only() {
        let empty = layout(0, true, 2, true);
        assert_eq!(empty.storage_area, 0);
        assert!(empty.socket_slots.is_empty());
        assert_eq!(empty.nav_row_start, None);

        let bare = layout(18, false, 2, false);
        assert_eq!(bare.storage_area, 18);
        assert!(!bare.in_nav_row(17));
    }

    #[test]
    fn pagination_math() {
        assert_eq!(page_count(54), 2);
        assert_eq!(page_count(45), 1);
        assert_eq!(page_count(0), 0);
        assert_eq!(valid_slots(54, 0, 45), 45);
        assert_eq!(valid_slots(54, 1, 45), 9);
        assert_eq!(valid_slots(54, 2, 45), 0);
        assert_eq!(valid_slots(27, 0, 27), 27);
    }
}
