//! Simplified option P/L model used by the simulator.
//!
//! Value = intrinsic + "hope value", where hope value shrinks with the square
//! root of time left and with distance from the strike. Display only; this is
//! not a pricing model.

use serde::Serialize;

use crate::types::{OptionType, Side};

/// One contract covers 100 shares.
pub const CONTRACT_MULTIPLIER: f64 = 100.0;

/// Days at which the time factor reaches 1.
pub const REFERENCE_DAYS: f64 = 30.0;

/// Upper bound on samples in one payoff curve.
pub const MAX_PAYOFF_POINTS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PnlBreakdown {
    pub pnl: f64,
    pub current_option_value: f64,
    pub intrinsic: f64,
    pub hope_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PayoffPoint {
    pub price: f64,
    pub pnl: f64,
}

pub fn intrinsic_value(option_type: OptionType, strike: f64, current_price: f64) -> f64 {
    match option_type {
        OptionType::Call => (current_price - strike).max(0.0),
        OptionType::Put => (strike - current_price).max(0.0),
    }
}

/// Extrinsic stand-in. Zero at expiration.
pub fn hope_value(strike: f64, current_price: f64, premium: f64, days_left: u32, volatility: f64) -> f64 {
    if days_left == 0 {
        return 0.0;
    }
    let time_decay_factor = (days_left as f64 / REFERENCE_DAYS).sqrt();
    let distance = (current_price - strike).abs();
    let proximity_factor = 10.0 / (distance + 1.0);
    premium * time_decay_factor * (volatility / 2.0) * proximity_factor
}

pub fn calculate_pnl(
    option_type: OptionType,
    side: Side,
    strike: f64,
    current_price: f64,
    premium: f64,
    days_left: u32,
    volatility: f64,
) -> PnlBreakdown {
    let intrinsic = intrinsic_value(option_type, strike, current_price);
    let hope_value = hope_value(strike, current_price, premium, days_left, volatility);
    let current_option_value = intrinsic + hope_value;

    let pnl = match side {
        Side::Buy => (current_option_value - premium) * CONTRACT_MULTIPLIER,
        Side::Sell => (premium - current_option_value) * CONTRACT_MULTIPLIER,
    };

    PnlBreakdown {
        pnl,
        current_option_value,
        intrinsic,
        hope_value,
    }
}

/// Samples P/L from `range_start` to `range_end` inclusive every `step`.
/// Returns nothing for a non-positive step, an inverted or non-finite range,
/// or a range that would need more than `MAX_PAYOFF_POINTS` samples.
#[allow(clippy::too_many_arguments)]
pub fn generate_payoff_data(
    option_type: OptionType,
    side: Side,
    strike: f64,
    premium: f64,
    volatility: f64,
    days_left: u32,
    range_start: f64,
    range_end: f64,
    step: f64,
) -> Vec<PayoffPoint> {
    if !(step.is_finite() && range_start.is_finite() && range_end.is_finite()) {
        return Vec::new();
    }
    if step <= 0.0 || range_end < range_start {
        return Vec::new();
    }
    let intervals = ((range_end - range_start) / step + 1e-9).floor();
    if !intervals.is_finite() || intervals >= MAX_PAYOFF_POINTS as f64 {
        return Vec::new();
    }
    // Index-based sampling keeps prices exact for integral ranges.
    let count = intervals as usize + 1;
    (0..count)
        .map(|i| {
            let price = range_start + step * i as f64;
            let pnl = calculate_pnl(option_type, side, strike, price, premium, days_left, volatility).pnl;
            PayoffPoint { price, pnl }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecayStage {
    Solid,
    MeltingFast,
    Extinguished,
}

/// How far the "ice cube" has melted: 0 at 30+ days, 1 at expiry.
pub fn melt_progress(days_left: u32) -> f64 {
    (1.0 - days_left as f64 / REFERENCE_DAYS).clamp(0.0, 1.0)
}

pub fn decay_stage(days_left: u32) -> DecayStage {
    let melt = melt_progress(days_left);
    if melt > 0.9 {
        DecayStage::Extinguished
    } else if melt > 0.5 {
        DecayStage::MeltingFast
    } else {
        DecayStage::Solid
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceChange {
    pub diff: f64,
    pub percent: f64,
}

pub fn price_change(initial: f64, current: f64) -> PriceChange {
    let diff = current - initial;
    let percent = if initial == 0.0 { 0.0 } else { diff / initial * 100.0 };
    PriceChange { diff, percent }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn expired_call_is_pure_intrinsic() {
        let r = calculate_pnl(OptionType::Call, Side::Buy, 210.0, 240.0, 10.0, 0, 2.5);
        assert_eq!(r.intrinsic, 30.0);
        assert_eq!(r.hope_value, 0.0);
        assert!((r.pnl - 2000.0).abs() < EPS);
    }

    #[test]
    fn put_intrinsic_below_strike() {
        let r = calculate_pnl(OptionType::Put, Side::Buy, 100.0, 80.0, 5.0, 0, 1.0);
        assert_eq!(r.intrinsic, 20.0);
        assert!((r.pnl - 1500.0).abs() < EPS);
        let otm = calculate_pnl(OptionType::Put, Side::Buy, 100.0, 120.0, 5.0, 0, 1.0);
        assert_eq!(otm.intrinsic, 0.0);
        assert!((otm.pnl + 500.0).abs() < EPS);
    }

    #[test]
    fn hope_value_at_strike_with_thirty_days() {
        // factor 1, proximity 10, vol/2 = 1 -> premium * 10
        let r = calculate_pnl(OptionType::Call, Side::Buy, 100.0, 100.0, 2.0, 30, 2.0);
        assert!((r.hope_value - 20.0).abs() < EPS);
        assert!((r.current_option_value - 20.0).abs() < EPS);
        assert!((r.pnl - 1800.0).abs() < EPS);
    }

    #[test]
    fn buy_and_sell_are_zero_sum() {
        for &t in &[OptionType::Call, OptionType::Put] {
            for &price in &[150.0, 199.5, 210.0, 233.0] {
                for &days in &[0u32, 1, 7, 30, 45] {
                    let b = calculate_pnl(t, Side::Buy, 210.0, price, 10.0, days, 2.5);
                    let s = calculate_pnl(t, Side::Sell, 210.0, price, 10.0, days, 2.5);
                    assert!((b.pnl + s.pnl).abs() < EPS, "{t} {price} {days}");
                }
            }
        }
    }

    #[test]
    fn long_call_at_expiry_non_decreasing_above_strike() {
        let mut last = f64::MIN;
        for p in 210..=300 {
            let r = calculate_pnl(OptionType::Call, Side::Buy, 210.0, p as f64, 10.0, 0, 2.5);
            assert!(r.pnl >= last);
            last = r.pnl;
        }
    }

    #[test]
    fn hope_value_grows_with_days_up_to_reference() {
        assert_eq!(hope_value(200.0, 205.0, 8.0, 0, 1.0), 0.0);
        let mut last = 0.0;
        for d in 0..=30 {
            let h = hope_value(200.0, 205.0, 8.0, d, 1.0);
            assert!(h >= last);
            last = h;
        }
    }

    #[test]
    fn payoff_curve_shape() {
        let data = generate_payoff_data(OptionType::Call, Side::Buy, 210.0, 10.0, 2.5, 0, 150.0, 250.0, 10.0);
        assert_eq!(data.len(), 11);
        assert_eq!(data[0].price, 150.0);
        assert!((data[0].pnl + 1000.0).abs() < EPS);
        let at_240 = data.iter().find(|p| p.price == 240.0).unwrap();
        assert!((at_240.pnl - 2000.0).abs() < EPS);
        assert_eq!(data.last().unwrap().price, 250.0);
    }

    #[test]
    fn payoff_curve_is_repeatable() {
        let a = generate_payoff_data(OptionType::Put, Side::Sell, 60.0, 1.5, 0.8, 12, 40.0, 80.0, 0.5);
        let b = generate_payoff_data(OptionType::Put, Side::Sell, 60.0, 1.5, 0.8, 12, 40.0, 80.0, 0.5);
        assert_eq!(a, b);
        assert_eq!(a.len(), 81);
    }

    #[test]
    fn payoff_curve_rejects_bad_step() {
        assert!(generate_payoff_data(OptionType::Call, Side::Buy, 1.0, 1.0, 1.0, 0, 0.0, 10.0, 0.0).is_empty());
        assert!(generate_payoff_data(OptionType::Call, Side::Buy, 1.0, 1.0, 1.0, 0, 10.0, 0.0, 1.0).is_empty());
        assert!(generate_payoff_data(OptionType::Call, Side::Buy, 1.0, 1.0, 1.0, 0, 0.0, 10.0, f64::NAN).is_empty());
    }

    #[test]
    fn payoff_curve_rejects_unbounded_ranges() {
        let infinite = generate_payoff_data(OptionType::Call, Side::Buy, 210.0, 10.0, 2.5, 0, 0.0, f64::INFINITY, 1.0);
        assert!(infinite.is_empty());
        let from_neg_inf =
            generate_payoff_data(OptionType::Call, Side::Buy, 210.0, 10.0, 2.5, 0, f64::NEG_INFINITY, 0.0, 1.0);
        assert!(from_neg_inf.is_empty());
        let huge = generate_payoff_data(OptionType::Call, Side::Buy, 210.0, 10.0, 2.5, 0, 0.0, 1_000_000_000.0, 0.001);
        assert!(huge.is_empty());
        let tiny_step = generate_payoff_data(OptionType::Call, Side::Buy, 210.0, 10.0, 2.5, 0, 0.0, 1.0, f64::MIN_POSITIVE);
        assert!(tiny_step.is_empty());
    }

    #[test]
    fn payoff_curve_at_the_sample_cap() {
        let last_fit = (MAX_PAYOFF_POINTS - 1) as f64;
        let data = generate_payoff_data(OptionType::Put, Side::Buy, 100.0, 5.0, 1.0, 0, 0.0, last_fit, 1.0);
        assert_eq!(data.len(), MAX_PAYOFF_POINTS);
        assert_eq!(data.last().map(|p| p.price), Some(last_fit));
        let one_more = generate_payoff_data(OptionType::Put, Side::Buy, 100.0, 5.0, 1.0, 0, 0.0, last_fit + 1.0, 1.0);
        assert!(one_more.is_empty());
    }

    #[test]
    fn decay_gauge_stages() {
        assert_eq!(melt_progress(45), 0.0);
        assert_eq!(decay_stage(30), DecayStage::Solid);
        assert_eq!(decay_stage(15), DecayStage::Solid);
        assert_eq!(decay_stage(10), DecayStage::MeltingFast);
        assert_eq!(decay_stage(2), DecayStage::Extinguished);
        assert_eq!(melt_progress(0), 1.0);
    }

    #[test]
    fn price_change_percent() {
        let c = price_change(200.0, 230.0);
        assert_eq!(c.diff, 30.0);
        assert!((c.percent - 15.0).abs() < EPS);
        assert_eq!(price_change(0.0, 10.0).percent, 0.0);
    }
}
