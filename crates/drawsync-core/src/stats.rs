//! Per-number hit frequency and delay over retained draws.
//!
//! Delay is the number of contests since a number was last drawn, counted
//! from the newest draw in the window. A number drawn in the newest draw has
//! delay 0; a number never drawn in the window has no delay.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{ContestNumber, Draw, SeriesMeta};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NumberFrequency {
    pub number: u32,
    pub hits: usize,
    /// Newest contest that drew this number.
    pub last_seen: Option<ContestNumber>,
    pub delay: Option<u64>,
}

/// Row ordering for [`frequency`] tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatsOrder {
    /// Most drawn first.
    #[default]
    Hits,
    /// Longest absent first; never-drawn numbers lead.
    Delay,
}

/// Count how often and how recently each number was drawn.
///
/// `draws` is in ascending contest order, as stored. With `meta`, every
/// number in the series range is listed (zero hits included) and numbers
/// outside it are ignored. Ties always break by number ascending.
#[must_use]
pub fn frequency(
    draws: &[Draw],
    meta: Option<&SeriesMeta>,
    order: StatsOrder,
) -> Vec<NumberFrequency> {
    let mut seen: BTreeMap<u32, (usize, Option<ContestNumber>)> = BTreeMap::new();

    if let Some(meta) = meta {
        for number in meta.min..=meta.max {
            seen.insert(number, (0, None));
        }
    }

    for draw in draws {
        for &number in &draw.numbers {
            let in_range = meta.is_none_or(|meta| (meta.min..=meta.max).contains(&number));
            if in_range {
                let entry = seen.entry(number).or_default();
                entry.0 += 1;
                entry.1 = Some(entry.1.map_or(draw.contest_number, |c| c.max(draw.contest_number)));
            }
        }
    }

    let newest = draws.iter().map(|draw| draw.contest_number).max();
    let mut table: Vec<NumberFrequency> = seen
        .into_iter()
        .map(|(number, (hits, last_seen))| NumberFrequency {
            number,
            hits,
            last_seen,
            delay: newest
                .zip(last_seen)
                .map(|(newest, last)| newest.saturating_sub(last)),
        })
        .collect();

    match order {
        StatsOrder::Hits => {
            table.sort_by(|a, b| b.hits.cmp(&a.hits).then(a.number.cmp(&b.number)));
        }
        StatsOrder::Delay => table.sort_by(|a, b| {
            let a_delay = a.delay.unwrap_or(u64::MAX);
            let b_delay = b.delay.unwrap_or(u64::MAX);
            b_delay.cmp(&a_delay).then(a.number.cmp(&b.number))
        }),
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KNOWN_SERIES;

    fn draw(contest: ContestNumber, numbers: &[u32]) -> Draw {
        Draw {
            contest_number: contest,
            draw_date: String::new(),
            numbers: numbers.to_vec(),
        }
    }

    fn row(table: &[NumberFrequency], number: u32) -> NumberFrequency {
        *table
            .iter()
            .find(|f| f.number == number)
            .expect("number listed")
    }

    #[test]
    fn sorts_by_hits_then_number() {
        let draws = [draw(1, &[5, 3, 9]), draw(2, &[3, 9, 1]), draw(3, &[9])];
        let table = frequency(&draws, None, StatsOrder::Hits);
        let pairs: Vec<_> = table.iter().map(|f| (f.number, f.hits)).collect();
        assert_eq!(pairs, [(9, 3), (3, 2), (1, 1), (5, 1)]);
    }

    #[test]
    fn known_range_fills_zeros_and_drops_strays() {
        let meta = &KNOWN_SERIES[1];
        let table = frequency(&[draw(1, &[25, 26, 0, 1])], Some(meta), StatsOrder::Hits);
        assert_eq!(table.len(), 25);
        assert_eq!(table[0].number, 1);
        assert_eq!(table[1].number, 25);
        assert!(table[..2].iter().all(|f| f.hits == 1));
        assert!(table[2..].iter().all(|f| f.hits == 0));
        assert!(table.iter().all(|f| f.number != 26 && f.number != 0));
    }

    #[test]
    fn delay_counts_contests_since_last_seen() {
        let draws = [
            draw(100, &[1, 2, 3]),
            draw(101, &[1, 4]),
            draw(102, &[1, 5]),
        ];
        let table = frequency(&draws, None, StatsOrder::Hits);

        assert_eq!(row(&table, 1).delay, Some(0));
        assert_eq!(row(&table, 5).delay, Some(0));
        assert_eq!(row(&table, 4).delay, Some(1));
        assert_eq!(row(&table, 2).delay, Some(2));
        assert_eq!(row(&table, 2).last_seen, Some(100));
    }

    #[test]
    fn never_drawn_numbers_have_no_delay() {
        let meta = &KNOWN_SERIES[1];
        let table = frequency(&[draw(7, &[3])], Some(meta), StatsOrder::Hits);
        assert_eq!(row(&table, 3).delay, Some(0));
        assert_eq!(row(&table, 4).delay, None);
        assert_eq!(row(&table, 4).last_seen, None);
    }

    #[test]
    fn delay_order_puts_longest_absent_first() {
        let draws = [draw(10, &[1, 2]), draw(11, &[2, 3]), draw(12, &[3])];
        let table = frequency(&draws, None, StatsOrder::Delay);
        let pairs: Vec<_> = table.iter().map(|f| (f.number, f.delay)).collect();
        assert_eq!(pairs, [(1, Some(2)), (2, Some(1)), (3, Some(0))]);

        let meta = &KNOWN_SERIES[1];
        let table = frequency(&draws, Some(meta), StatsOrder::Delay);
        assert_eq!(table[0].number, 4, "never drawn leads, lowest number first");
        assert_eq!(table[0].delay, None);
    }

    #[test]
    fn empty_history_without_range_is_empty() {
        assert!(frequency(&[], None, StatsOrder::Hits).is_empty());
    }
}
