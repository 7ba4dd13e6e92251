pub mod breakpoints;
pub mod masonry;
pub mod window;

use std::time::{Duration, Instant};

use tracing::debug;

use self::breakpoints::BreakpointTable;
use self::masonry::{MasonryConfig, MasonryPlan};

/// Trailing-edge debounce over viewport width reports.  Every observation
/// restarts the timer; the width only settles once reports have been quiet
/// for the whole window.
#[derive(Debug, Clone)]
pub struct ResizeDebouncer {
    window: Duration,
    settled: u32,
    pending: Option<(u32, Instant)>,
}

impl ResizeDebouncer {
    pub fn new(initial: u32, window: Duration) -> Self {
        Self {
            window,
            settled: initial,
            pending: None,
        }
    }

    /// The last settled width; pending reports do not show here.
    pub fn width(&self) -> u32 { self.settled }

    pub fn observe(&mut self, width: u32, at: Instant) {
        match width == self.settled && self.pending.is_none() {
            true => {}
            false => self.pending = Some((width, at)),
        }
    }

    /// Settles the pending width once it has been stable long enough.
    /// Returns the new width only when it differs from the old one.
    pub fn poll(&mut self, now: Instant) -> Option<u32> {
        let (width, at) = self.pending?;
        if now.duration_since(at) < self.window {
            return None;
        }

        self.pending = None;
        match width == self.settled {
            true => None,
            false => {
                self.settled = width;
                Some(width)
            }
        }
    }
}

/// One grid: the breakpoint table, the debounced width feeding it, and the
/// spacing constants every plan shares.
pub struct GridController {
    table: BreakpointTable,
    debouncer: ResizeDebouncer,
    gutter: u32,
    chrome: u32,
}

impl GridController {
    pub fn new(initial_width: u32, debounce: Duration) -> Self {
        Self {
            table: BreakpointTable::canonical(),
            debouncer: ResizeDebouncer::new(initial_width, debounce),
            gutter: 16,
            chrome: 76,
        }
    }

    pub fn width(&self) -> u32 { self.debouncer.width() }

    pub fn columns(&self) -> u8 { self.table.columns_for(self.width()) }

    pub fn resize(&mut self, width: u32, at: Instant) { self.debouncer.observe(width, at); }

    /// Polls the debouncer; reports the new column count when a settled
    /// width lands on a different breakpoint step.
    pub fn poll(&mut self, now: Instant) -> Option<u8> {
        let before = self.columns();
        let width = self.debouncer.poll(now)?;
        let after = self.table.columns_for(width);

        match after == before {
            true => None,
            false => {
                debug!(width, columns = after, "grid breakpoint changed");
                Some(after)
            }
        }
    }

    pub fn plan(&self, aspects: &[f32]) -> MasonryPlan {
        let config = MasonryConfig {
            viewport_width: self.width(),
            columns: self.columns(),
            gutter: self.gutter,
            chrome: self.chrome,
        };

        masonry::plan(aspects, &config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    const WINDOW: Duration = Duration::from_millis(150);

    #[test]
    fn reports_settle_only_after_the_quiet_window() {
        let t0 = Instant::now();
        let mut debouncer = ResizeDebouncer::new(1500, WINDOW);

        debouncer.observe(1000, t0);
        assert_eq!(debouncer.poll(t0 + Duration::from_millis(100)), None);
        assert_eq!(debouncer.width(), 1500);

        assert_eq!(debouncer.poll(t0 + WINDOW), Some(1000));
        assert_eq!(debouncer.width(), 1000);
    }

    #[test]
    fn every_report_restarts_the_timer() {
        let t0 = Instant::now();
        let mut debouncer = ResizeDebouncer::new(1500, WINDOW);

        debouncer.observe(1400, t0);
        debouncer.observe(1300, t0 + Duration::from_millis(100));

        // 150ms after the first report, but only 50ms after the second.
        assert_eq!(debouncer.poll(t0 + Duration::from_millis(150)), None);
        assert_eq!(
            debouncer.poll(t0 + Duration::from_millis(250)),
            Some(1300)
        );
    }

    #[test]
    fn settling_back_to_the_same_width_reports_nothing() {
        let t0 = Instant::now();
        let mut debouncer = ResizeDebouncer::new(1500, WINDOW);

        debouncer.observe(1000, t0);
        debouncer.observe(1500, t0 + Duration::from_millis(10));

        assert_eq!(debouncer.poll(t0 + Duration::from_secs(1)), None);
        assert_eq!(debouncer.width(), 1500);
    }

    #[test]
    fn shrinking_across_a_breakpoint_reflows_without_losing_cards() {
        let t0 = Instant::now();
        let mut grid = GridController::new(1500, WINDOW);
        assert_eq!(grid.columns(), 5);

        let aspects: Vec<f32> = (0..30).map(|i| 0.6 + (i % 5) as f32 * 0.3).collect();
        let before = grid.plan(&aspects);

        grid.resize(1000, t0);
        assert_eq!(grid.poll(t0 + WINDOW), Some(4));
        assert_eq!(grid.columns(), 4);

        let after = grid.plan(&aspects);
        let items = |plan: &MasonryPlan| -> HashSet<usize> {
            plan.slots.iter().map(|s| s.item).collect()
        };

        assert_eq!(before.slots.len(), after.slots.len());
        assert_eq!(items(&before), items(&after));
        assert!(after.slots.iter().all(|s| s.column < 4));
    }

    #[test]
    fn resizing_within_a_step_changes_no_columns() {
        let t0 = Instant::now();
        let mut grid = GridController::new(1500, WINDOW);

        grid.resize(1600, t0);
        assert_eq!(grid.poll(t0 + WINDOW), None);
        assert_eq!(grid.columns(), 5);
        assert_eq!(grid.width(), 1600);
    }
}
