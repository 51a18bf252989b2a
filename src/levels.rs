//! Rank ladder keyed on cumulative simulated profit.

use crate::types::Level;

pub const LEVELS: &[Level] = &[
    Level { id: 1, title: "Spectator", description: "Stock market 101.", required_pnl: 0.0 },
    Level { id: 2, title: "Buyer", description: "First $500 profit.", required_pnl: 500.0 },
    Level { id: 3, title: "Survivor", description: "Beat time decay.", required_pnl: 1000.0 },
    Level { id: 4, title: "Casino", description: "Sell risk.", required_pnl: 2500.0 },
    Level { id: 5, title: "Greek", description: "Mastery.", required_pnl: 5000.0 },
];

#[derive(Debug, Clone, PartialEq)]
pub struct Progress<'a> {
    pub current_level: &'a Level,
    pub next_level: Option<&'a Level>,
    pub percent: f64,
}

/// Current rank, the one after it, and how far along the bar we are.
///
/// `levels` must be non-empty and ordered by ascending `required_pnl`.
pub fn calculate_progress(levels: &[Level], total_profit: f64) -> Progress<'_> {
    let idx = levels
        .iter()
        .rposition(|l| total_profit >= l.required_pnl)
        .unwrap_or(0);
    let current_level = &levels[idx];
    let next_level = levels.get(idx + 1);

    let percent = match next_level {
        None => 100.0,
        Some(next) => {
            let range = next.required_pnl - current_level.required_pnl;
            if range <= 0.0 {
                100.0
            } else {
                ((total_profit - current_level.required_pnl) / range * 100.0).clamp(0.0, 100.0)
            }
        }
    };

    Progress {
        current_level,
        next_level,
        percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_profit_is_first_rank() {
        let p = calculate_progress(LEVELS, 0.0);
        assert_eq!(p.current_level.id, 1);
        assert_eq!(p.next_level.map(|l| l.id), Some(2));
        assert_eq!(p.percent, 0.0);
    }

    #[test]
    fn percent_interpolates_between_thresholds() {
        let p = calculate_progress(LEVELS, 750.0);
        assert_eq!(p.current_level.title, "Buyer");
        assert!((p.percent - 50.0).abs() < 1e-9);

        let at_next = calculate_progress(LEVELS, 1000.0);
        assert_eq!(at_next.current_level.id, 3);
        assert_eq!(at_next.percent, 0.0);
    }

    #[test]
    fn negative_profit_clamps_to_first_rank() {
        let p = calculate_progress(LEVELS, -1200.0);
        assert_eq!(p.current_level.id, 1);
        assert_eq!(p.percent, 0.0);
    }

    #[test]
    fn top_rank_is_always_full() {
        for profit in [5000.0, 9999.0] {
            let p = calculate_progress(LEVELS, profit);
            assert_eq!(p.current_level.id, 5);
            assert!(p.next_level.is_none());
            assert_eq!(p.percent, 100.0);
        }
    }

    #[test]
    fn percent_stays_in_bounds() {
        for profit in [-10_000.0, -1.0, 0.0, 499.99, 500.0, 2499.0, 4999.0, 1e9] {
            let p = calculate_progress(LEVELS, profit);
            assert!((0.0..=100.0).contains(&p.percent), "{profit}");
        }
    }

    #[test]
    fn table_is_well_formed() {
        assert_eq!(LEVELS[0].required_pnl, 0.0);
        for w in LEVELS.windows(2) {
            assert!(w[0].id < w[1].id);
            assert!(w[0].required_pnl <= w[1].required_pnl);
        }
    }
}
