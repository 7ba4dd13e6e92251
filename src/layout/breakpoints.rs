use smallvec::SmallVec;

/// Maps a viewport width to a column count.  One table is the single
/// source of truth for every grid in the app; steps are `(min_width,
/// columns)` pairs held widest-first, and a width at or above a step's
/// threshold gets that step's columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointTable {
    steps: SmallVec<[(u32, u8); 6]>,
    base: u8,
}

impl BreakpointTable {
    /// The app-wide table.
    ///
    /// | width     | columns |
    /// |-----------|---------|
    /// | >= 2400   | 8       |
    /// | >= 1920   | 6       |
    /// | >= 1440   | 5       |
    /// | >= 960    | 4       |
    /// | >= 720    | 3       |
    /// | otherwise | 2       |
    pub fn canonical() -> Self {
        Self::new(
            [(2400, 8), (1920, 6), (1440, 5), (960, 4), (720, 3)],
            2,
        )
    }

    pub fn new(steps: impl IntoIterator<Item = (u32, u8)>, base: u8) -> Self {
        let mut steps: SmallVec<[(u32, u8); 6]> = steps.into_iter().collect();
        steps.sort_by(|a, b| b.0.cmp(&a.0));

        Self { steps, base }
    }

    pub fn columns_for(&self, width: u32) -> u8 {
        self.steps
            .iter()
            .find(|(threshold, _)| width >= *threshold)
            .map(|(_, columns)| *columns)
            .unwrap_or(self.base)
    }

    pub fn max_columns(&self) -> u8 {
        self.steps
            .iter()
            .map(|(_, columns)| *columns)
            .max()
            .unwrap_or(self.base)
            .max(self.base)
    }
}

impl Default for BreakpointTable {
    fn default() -> Self { Self::canonical() }
}

#[test]
fn thresholds_are_inclusive() {
    let table = BreakpointTable::canonical();

    assert_eq!(table.columns_for(2400), 8);
    assert_eq!(table.columns_for(1920), 6);
    assert_eq!(table.columns_for(1440), 5);
    assert_eq!(table.columns_for(960), 4);
    assert_eq!(table.columns_for(720), 3);
}

#[test]
fn one_below_a_threshold_takes_the_next_step_down() {
    let table = BreakpointTable::canonical();

    assert_eq!(table.columns_for(2399), 6);
    assert_eq!(table.columns_for(1919), 5);
    assert_eq!(table.columns_for(1439), 4);
    assert_eq!(table.columns_for(959), 3);
    assert_eq!(table.columns_for(719), 2);
    assert_eq!(table.columns_for(0), 2);
}

#[test]
fn common_desktop_and_tablet_widths() {
    let table = BreakpointTable::canonical();

    assert_eq!(table.columns_for(1500), 5);
    assert_eq!(table.columns_for(1000), 4);
    assert_eq!(table.columns_for(768), 3);
    assert_eq!(table.columns_for(375), 2);
}

#[test]
fn columns_never_shrink_as_width_grows() {
    let table = BreakpointTable::canonical();
    let mut last = 0;

    for width in (0..=2600).step_by(10) {
        let columns = table.columns_for(width);
        assert!(columns >= last, "regressed at width {width}");
        last = columns;
    }
    assert_eq!(last, table.max_columns());
}

#[test]
fn steps_are_ordered_regardless_of_input_order() {
    let table = BreakpointTable::new([(720, 3), (1440, 5), (960, 4)], 2);

    assert_eq!(table.columns_for(1600), 5);
    assert_eq!(table.columns_for(1100), 4);
    assert_eq!(table.columns_for(800), 3);
    assert_eq!(table.columns_for(500), 2);
}
