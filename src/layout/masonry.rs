//! Shortest-lane masonry placement.
//!
//! Cards keep feed order: each one lands in whichever lane is currently
//! shortest, ties going to the leftmost, so equal-height cards degrade to
//! plain row-major order.  All arithmetic is integer pixels.

use smallvec::{smallvec, SmallVec};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasonryConfig {
    pub viewport_width: u32,
    pub columns: u8,
    /// Space between lanes and between cards in a lane.
    pub gutter: u32,
    /// Fixed card height below the image: title line and author strip.
    pub chrome: u32,
}

impl MasonryConfig {
    pub fn new(viewport_width: u32, columns: u8) -> Self {
        Self {
            viewport_width,
            columns,
            gutter: 16,
            chrome: 76,
        }
    }
}

/// Where one card landed.  `item` is the index into the slice given to
/// [`plan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub item: usize,
    pub column: u8,
    pub top: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MasonryPlan {
    pub column_widths: SmallVec<[u32; 8]>,
    pub slots: Vec<Slot>,
    lane_bottoms: SmallVec<[u32; 8]>,
    trailing_gutter: u32,
}

impl MasonryPlan {
    /// Tallest lane, without its trailing gutter.
    pub fn height(&self) -> u32 {
        let gutter = self.gutter_of_tallest();
        self.lane_bottoms
            .iter()
            .copied()
            .max()
            .unwrap_or(0)
            .saturating_sub(gutter)
    }

    fn gutter_of_tallest(&self) -> u32 {
        match self.lane_bottoms.iter().any(|&b| b > 0) {
            true => self.trailing_gutter,
            false => 0,
        }
    }

    pub fn lane_of(&self, item: usize) -> Option<u8> {
        self.slots.iter().find(|s| s.item == item).map(|s| s.column)
    }
}

/// Splits the viewport into per-lane widths.  The division remainder goes
/// one pixel at a time to the leftmost lanes, so the widths always sum to
/// exactly the space left over after gutters.
pub fn column_widths(available: u32, columns: u8, gutter: u32) -> SmallVec<[u32; 8]> {
    let count = columns.max(1) as u32;
    let gutter_total = gutter * count.saturating_sub(1);
    let usable = available.saturating_sub(gutter_total);

    let base = usable / count;
    let remainder = usable % count;

    (0..count)
        .map(|index| match index < remainder {
            true => base + 1,
            false => base,
        })
        .collect()
}

/// Lays out `aspects` (height over width of each card's image) into lanes.
pub fn plan(aspects: &[f32], config: &MasonryConfig) -> MasonryPlan {
    let widths = column_widths(config.viewport_width, config.columns, config.gutter);
    let mut lane_bottoms: SmallVec<[u32; 8]> = smallvec![0; widths.len()];
    let mut slots = Vec::with_capacity(aspects.len());

    for (item, aspect) in aspects.iter().enumerate() {
        let lane = shortest_lane(&lane_bottoms);
        let height = card_height(widths[lane], *aspect, config.chrome);
        let top = lane_bottoms[lane];

        slots.push(Slot {
            item,
            column: lane as u8,
            top,
            height,
        });
        lane_bottoms[lane] = top + height + config.gutter;
    }

    MasonryPlan {
        column_widths: widths,
        slots,
        lane_bottoms,
        trailing_gutter: config.gutter,
    }
}

fn card_height(width: u32, aspect: f32, chrome: u32) -> u32 {
    let aspect = match aspect.is_finite() && aspect > 0.0 {
        true => aspect,
        false => 1.0,
    };
    let image = (width as f32 * aspect).round() as u32;

    image.max(1) + chrome
}

fn shortest_lane(lane_bottoms: &[u32]) -> usize {
    let mut index = 0;
    let mut best = lane_bottoms.first().copied().unwrap_or(0);

    for (i, bottom) in lane_bottoms.iter().enumerate().skip(1) {
        if *bottom < best {
            best = *bottom;
            index = i;
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(width: u32, columns: u8) -> MasonryConfig {
        MasonryConfig {
            viewport_width: width,
            columns,
            gutter: 16,
            chrome: 0,
        }
    }

    #[test]
    fn widths_sum_to_available_minus_gutters() {
        let widths = column_widths(1000, 3, 16);

        assert_eq!(widths.len(), 3);
        assert_eq!(widths.iter().sum::<u32>(), 1000 - 2 * 16);
        // 968 / 3 = 322 r 2: the two leftmost lanes absorb the remainder.
        assert_eq!(widths.as_slice(), &[323, 323, 322]);
    }

    #[test]
    fn equal_heights_degrade_to_row_major_order() {
        // 932 - 2 gutters = 900, splitting into three equal 300px lanes.
        let aspects = [1.0; 6];
        let plan = plan(&aspects, &config(932, 3));

        let lanes: Vec<_> = plan.slots.iter().map(|s| s.column).collect();
        assert_eq!(lanes, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn tall_card_diverts_followers_to_other_lanes() {
        // Card 0 is twice as tall as the rest, so lane 0 is skipped until
        // the other lanes catch up.
        let aspects = [2.0, 1.0, 1.0, 1.0, 1.0];
        let plan = plan(&aspects, &config(900, 3));

        let lanes: Vec<_> = plan.slots.iter().map(|s| s.column).collect();
        assert_eq!(lanes, vec![0, 1, 2, 1, 2]);
    }

    #[test]
    fn every_item_lands_in_exactly_one_slot() {
        let aspects: Vec<f32> = (0..40).map(|i| 0.5 + (i % 7) as f32 * 0.25).collect();

        for columns in 2..=8 {
            let plan = plan(&aspects, &config(1440, columns));
            assert_eq!(plan.slots.len(), aspects.len());

            let mut seen = vec![false; aspects.len()];
            for slot in &plan.slots {
                assert!(!seen[slot.item], "item {} placed twice", slot.item);
                seen[slot.item] = true;
                assert!((slot.column as usize) < columns as usize);
            }
            assert!(seen.into_iter().all(|s| s));
        }
    }

    #[test]
    fn cards_in_a_lane_stack_without_overlap() {
        let aspects = [1.5, 0.8, 1.2, 1.0, 0.6, 2.0, 1.1, 0.9];
        let plan = plan(&aspects, &config(1200, 4));

        for column in 0..4u8 {
            let mut lane: Vec<_> = plan
                .slots
                .iter()
                .filter(|s| s.column == column)
                .collect();
            lane.sort_by_key(|s| s.top);

            for pair in lane.windows(2) {
                assert!(pair[0].top + pair[0].height <= pair[1].top);
            }
        }
    }

    #[test]
    fn feed_order_is_kept_within_each_lane() {
        let aspects = [1.0, 0.5, 1.5, 1.0, 1.0, 0.75];
        let plan = plan(&aspects, &config(900, 3));

        for column in 0..3u8 {
            let mut by_top: Vec<_> = plan
                .slots
                .iter()
                .filter(|s| s.column == column)
                .collect();
            by_top.sort_by_key(|s| s.top);

            for pair in by_top.windows(2) {
                assert!(pair[0].item < pair[1].item);
            }
        }
    }

    #[test]
    fn plan_height_is_the_tallest_lane() {
        let aspects = [2.0, 1.0, 1.0];
        let cfg = config(900, 3);
        let plan = plan(&aspects, &cfg);

        let width = plan.column_widths[0];
        assert_eq!(plan.height(), width * 2);
    }

    #[test]
    fn chrome_is_added_on_top_of_the_image() {
        let aspects = [1.0];
        let mut cfg = config(300, 1);
        cfg.gutter = 0;
        cfg.chrome = 76;

        let plan = plan(&aspects, &cfg);
        assert_eq!(plan.slots[0].height, 300 + 76);
    }

    #[test]
    fn degenerate_aspects_fall_back_to_square() {
        let aspects = [f32::NAN, 0.0, -2.0];
        let cfg = config(900, 3);
        let plan = plan(&aspects, &cfg);

        for slot in &plan.slots {
            let width = plan.column_widths[slot.column as usize];
            assert_eq!(slot.height, width);
        }
    }

    #[test]
    fn empty_feed_plans_to_nothing() {
        let plan = plan(&[], &config(1440, 5));

        assert!(plan.slots.is_empty());
        assert_eq!(plan.height(), 0);
    }
}
