//! Which slice of the feed is worth rendering.
//!
//! Before cards are measured the window is plain row arithmetic over an
//! estimated row height; once a [`MasonryPlan`] exists the real slot
//! geometry is walked instead.  Both extend the viewport by an overscan so
//! scrolling does not chase blank space.

use std::ops::Range;

use super::masonry::MasonryPlan;

pub const ROW_ESTIMATE: u32 = 300;
pub const OVERSCAN_ROWS: usize = 2;

pub fn row_count(total: usize, columns: u8) -> usize {
    let columns = columns.max(1) as usize;
    total.div_ceil(columns)
}

/// Row indices intersecting the viewport, padded by `overscan` rows on each
/// side and clamped to the feed.
pub fn visible_rows(
    total: usize,
    columns: u8,
    row_estimate: u32,
    scroll_top: u32,
    viewport: u32,
    overscan: usize,
) -> Range<usize> {
    let rows = row_count(total, columns);
    if rows == 0 {
        return 0..0;
    }

    let estimate = row_estimate.max(1) as usize;
    let first = scroll_top as usize / estimate;
    let last = (scroll_top + viewport) as usize / estimate;

    let start = first.saturating_sub(overscan).min(rows - 1);
    let end = last.saturating_add(1 + overscan).min(rows);

    start..end.max(start + 1)
}

/// Item indices backing [`visible_rows`].
pub fn visible_items(
    total: usize,
    columns: u8,
    row_estimate: u32,
    scroll_top: u32,
    viewport: u32,
    overscan: usize,
) -> Range<usize> {
    let rows = visible_rows(total, columns, row_estimate, scroll_top, viewport, overscan);
    let columns = columns.max(1) as usize;

    (rows.start * columns).min(total)..(rows.end * columns).min(total)
}

/// Item indices whose laid-out slots intersect the viewport, padded by
/// `overscan` items on each side.
pub fn visible_in_plan(
    plan: &MasonryPlan,
    scroll_top: u32,
    viewport: u32,
    overscan: usize,
) -> Range<usize> {
    let total = plan.slots.len();
    if total == 0 {
        return 0..0;
    }

    let view_end = scroll_top + viewport;
    let mut first = None;
    let mut last = None;

    for slot in &plan.slots {
        let bottom = slot.top + slot.height;
        if bottom >= scroll_top && slot.top <= view_end {
            if first.is_none() {
                first = Some(slot.item);
            }
            last = Some(slot.item);
        }
    }

    let (start, end) = match (first, last) {
        (Some(first), Some(last)) => (first, last + 1),
        // Scrolled past everything: keep the tail mounted.
        _ => (total - 1, total),
    };

    let start = start.saturating_sub(overscan);
    let end = end.saturating_add(overscan).min(total);
    start..end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::masonry::{plan, MasonryConfig};

    #[test]
    fn empty_feed_has_an_empty_window() {
        assert_eq!(visible_rows(0, 4, 300, 0, 900, 2), 0..0);
        assert_eq!(visible_items(0, 4, 300, 0, 900, 2), 0..0);
    }

    #[test]
    fn top_of_feed_covers_the_first_rows_plus_overscan() {
        // 900px viewport over 300px rows shows rows 0..=3; two more rows of
        // overscan trail behind.
        assert_eq!(visible_rows(100, 4, 300, 0, 900, 2), 0..6);
        assert_eq!(visible_items(100, 4, 300, 0, 900, 2), 0..24);
    }

    #[test]
    fn scrolling_moves_the_window_and_keeps_overscan_ahead_and_behind() {
        let rows = visible_rows(100, 4, 300, 3000, 900, 2);
        assert_eq!(rows, 8..16);
    }

    #[test]
    fn window_clamps_to_the_end_of_the_feed() {
        // 10 items in 4 columns is 3 rows; a deep scroll cannot overshoot.
        let rows = visible_rows(10, 4, 300, 90_000, 900, 2);
        assert_eq!(rows, 2..3);
        assert_eq!(visible_items(10, 4, 300, 90_000, 900, 2), 8..10);
    }

    #[test]
    fn plan_window_tracks_real_slot_geometry() {
        let aspects = [1.0; 12];
        let cfg = MasonryConfig {
            viewport_width: 932,
            columns: 3,
            gutter: 16,
            chrome: 0,
        };
        let laid = plan(&aspects, &cfg);

        // Lanes are 300px wide, cards 300px tall plus a 16px gutter.  A
        // 600px viewport at the top intersects the first two rows.
        let range = visible_in_plan(&laid, 0, 600, 0);
        assert_eq!(range, 0..6);

        let padded = visible_in_plan(&laid, 0, 600, 3);
        assert_eq!(padded, 0..9);
    }

    #[test]
    fn plan_window_past_the_bottom_keeps_the_tail() {
        let aspects = [1.0; 6];
        let cfg = MasonryConfig {
            viewport_width: 932,
            columns: 3,
            gutter: 16,
            chrome: 0,
        };
        let laid = plan(&aspects, &cfg);

        let range = visible_in_plan(&laid, 50_000, 600, 0);
        assert_eq!(range, 5..6);
    }
}
