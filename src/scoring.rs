use serde::Serialize;

/// Per-item aggregate derived from all responses to a tasting. Never stored;
/// recomputed on every read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemStat {
    /// 1-based item position.
    pub number: usize,
    /// Revealed name, or the "Item N" placeholder when not revealed.
    pub name: String,
    /// Mean of all present ratings, full precision. 0 when nobody has rated
    /// the item.
    pub average: f64,
    /// Count of present ratings.
    pub votes: usize,
}

/// Tabulates per-item averages and vote counts across all responses and
/// returns them ranked, highest average first.
///
/// A rating is counted only when present; a null entry is not a zero and a
/// ratings row shorter than `item_count` simply has no rating at the missing
/// trailing positions. Ties keep ascending item number (the sort is stable),
/// so the crowned top item on an exact tie is always the lower-numbered one.
pub fn tabulate(
    item_count: usize,
    item_names: &[String],
    responses: &[Vec<Option<u8>>],
) -> Vec<ItemStat> {
    let mut stats: Vec<ItemStat> = (0..item_count)
        .map(|idx| {
            let present: Vec<u8> = responses
                .iter()
                .filter_map(|ratings| ratings.get(idx).copied().flatten())
                .collect();
            let votes = present.len();
            let average = if votes == 0 {
                0.0
            } else {
                present.iter().map(|&v| v as f64).sum::<f64>() / votes as f64
            };
            let name = match item_names.get(idx) {
                Some(n) if !n.is_empty() => n.clone(),
                _ => format!("Item {}", idx + 1),
            };
            ItemStat {
                number: idx + 1,
                name,
                average,
                votes,
            }
        })
        .collect();

    stats.sort_by(|a, b| b.average.total_cmp(&a.average));
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        vec![String::new(); n]
    }

    #[test]
    fn no_responses_yields_zeroes_in_item_order() {
        let stats = tabulate(3, &names(3), &[]);
        assert_eq!(stats.len(), 3);
        for (idx, stat) in stats.iter().enumerate() {
            assert_eq!(stat.number, idx + 1);
            assert_eq!(stat.average, 0.0);
            assert_eq!(stat.votes, 0);
        }
    }

    #[test]
    fn single_fully_rated_response_echoes_its_ratings() {
        let stats = tabulate(3, &names(3), &[vec![Some(2), Some(5), Some(3)]]);
        let by_number = |n: usize| stats.iter().find(|s| s.number == n).unwrap();
        assert_eq!(by_number(1).average, 2.0);
        assert_eq!(by_number(2).average, 5.0);
        assert_eq!(by_number(3).average, 3.0);
        assert!(stats.iter().all(|s| s.votes == 1));
        assert_eq!(stats[0].number, 2);
    }

    #[test]
    fn null_ratings_are_excluded_from_sum_and_count() {
        let responses = vec![vec![Some(5), None], vec![Some(3), Some(4)]];
        let stats = tabulate(2, &names(2), &responses);
        let by_number = |n: usize| stats.iter().find(|s| s.number == n).unwrap();
        assert_eq!(by_number(1).average, 4.0);
        assert_eq!(by_number(1).votes, 2);
        assert_eq!(by_number(2).average, 4.0);
        assert_eq!(by_number(2).votes, 1);
    }

    #[test]
    fn tabulation_is_idempotent() {
        let item_names = vec!["Rioja".to_string(), String::new()];
        let responses = vec![vec![Some(4), Some(2)], vec![None, Some(5)]];
        let first = tabulate(2, &item_names, &responses);
        let second = tabulate(2, &item_names, &responses);
        assert_eq!(first, second);
    }

    #[test]
    fn exact_tie_keeps_lower_item_number_first() {
        // Both items average 4.0; item 1 must be ranked first.
        let responses = vec![vec![Some(3), Some(5)], vec![Some(5), Some(3)]];
        let stats = tabulate(2, &names(2), &responses);
        assert_eq!(stats[0].number, 1);
        assert_eq!(stats[1].number, 2);
        assert_eq!(stats[0].average, stats[1].average);
    }

    #[test]
    fn all_equal_averages_degenerate_to_item_order() {
        let responses = vec![vec![Some(3), Some(3), Some(3)]];
        let stats = tabulate(3, &names(3), &responses);
        let numbers: Vec<usize> = stats.iter().map(|s| s.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn blank_names_fall_back_to_placeholder() {
        let item_names = vec!["Syrah".to_string(), String::new()];
        let stats = tabulate(3, &item_names, &[]);
        let by_number = |n: usize| stats.iter().find(|s| s.number == n).unwrap();
        assert_eq!(by_number(1).name, "Syrah");
        assert_eq!(by_number(2).name, "Item 2");
        // item_names may be shorter than item_count; missing entries also
        // fall back.
        assert_eq!(by_number(3).name, "Item 3");
    }

    #[test]
    fn short_ratings_rows_count_as_absent_not_zero() {
        let responses = vec![vec![Some(4)], vec![Some(2), Some(5)]];
        let stats = tabulate(2, &names(2), &responses);
        let by_number = |n: usize| stats.iter().find(|s| s.number == n).unwrap();
        assert_eq!(by_number(1).average, 3.0);
        assert_eq!(by_number(1).votes, 2);
        // The short row contributes nothing at position 2.
        assert_eq!(by_number(2).average, 5.0);
        assert_eq!(by_number(2).votes, 1);
    }

    #[test]
    fn average_keeps_full_precision() {
        let responses = vec![vec![Some(1)], vec![Some(1)], vec![Some(2)]];
        let stats = tabulate(1, &names(1), &responses);
        assert_eq!(stats[0].average, 4.0 / 3.0);
    }
}
