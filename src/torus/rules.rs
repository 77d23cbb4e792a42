//! Annealing rule (Chopard & Droz, p. 34).
//!
//! The next state is looked up from the number of live cells in the full
//! 3x3 block, the centre cell included, so the index runs from 0 to 9.

use super::row::Row;

pub const ANNEAL: [bool; 10] = [
    false, false, false, false, true, false, true, true, true, true,
];

#[inline]
pub fn anneal(live_in_block: u8) -> bool {
    ANNEAL[live_in_block as usize]
}

/// Next state of column `col` of `row`, given its vertical neighbours.
/// Reads columns `col - 1..=col + 1`, so halos must be wrapped first.
#[inline]
pub fn transition(above: &Row, row: &Row, below: &Row, col: usize) -> bool {
    let mut live = 0u8;
    for x in col - 1..=col + 1 {
        live += above.get(x) as u8 + row.get(x) as u8 + below.get(x) as u8;
    }
    anneal(live)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_four_or_at_least_six() {
        for live in 0u8..=9 {
            assert_eq!(anneal(live), live == 4 || live >= 6, "count {live}");
        }
    }

    #[test]
    fn centre_counts_toward_its_own_block() {
        // Three live cells on the row plus the centre's column above: four in block.
        let above = Row::from_fn(5, |col| col == 3);
        let row = Row::from_fn(5, |col| (2..=4).contains(&col));
        let below = Row::new(5);
        assert!(transition(&above, &row, &below, 3));
        // Without the centre the block only has three.
        let row = Row::from_fn(5, |col| col == 2 || col == 4);
        assert!(!transition(&above, &row, &below, 3));
    }

    #[test]
    fn halos_feed_edge_columns() {
        let mut above = Row::from_fn(4, |col| col == 4);
        let mut row = Row::from_fn(4, |col| col == 4 || col == 1);
        let mut below = Row::from_fn(4, |col| col == 4 || col == 1);
        for r in [&mut above, &mut row, &mut below] {
            r.wrap_horizontal();
        }
        // Column 1 sees column 4 through the left halo: five live cells.
        assert!(!transition(&above, &row, &below, 1));
        above.set(1, true);
        above.wrap_horizontal();
        assert!(transition(&above, &row, &below, 1));
    }
}
