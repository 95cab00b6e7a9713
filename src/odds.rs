use log::warn;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::api::{QuestionOption, Tokens};

pub const BASE_MULTIPLIER: f64 = 1.5;
pub const MIN_MULTIPLIER: Decimal = dec!(1.2);
pub const MAX_MULTIPLIER: Decimal = dec!(5.0);
pub const FALLBACK_MULTIPLIER: Decimal = dec!(1.0);

#[derive(Debug, Clone, PartialEq)]
pub struct PricedOption<'a> {
    pub option: &'a QuestionOption,
    pub multiplier: Decimal,
    pub chance: u32,
}

pub fn multipliers(wagers: &[Tokens]) -> Vec<Decimal> {
    let total = pool_total(wagers);
    wagers
        .iter()
        .map(|wager| multiplier_for(total, *wager))
        .collect()
}
pub fn chances(wagers: &[Tokens]) -> Vec<u32> {
    let total = pool_total(wagers) as f64;
    wagers
        .iter()
        .map(|wager| (*wager as f64 / total * 100.0).round() as u32)
        .collect()
}
pub fn price_options(options: &[QuestionOption]) -> Vec<PricedOption<'_>> {
    let wagers: Vec<Tokens> = options.iter().map(|option| option.votes).collect();
    multipliers(&wagers)
        .into_iter()
        .zip(chances(&wagers))
        .zip(options)
        .map(|((multiplier, chance), option)| PricedOption {
            option,
            multiplier,
            chance,
        })
        .collect()
}
pub fn multiplier_of(options: &[QuestionOption], label: &str) -> Option<Decimal> {
    price_options(options)
        .into_iter()
        .find(|priced| priced.option.label == label)
        .map(|priced| priced.multiplier)
}
// `amount * multiplier`, trailing zeros dropped (`5 x 2.00` is `10`).
pub fn potential_win(amount: Tokens, multiplier: Decimal) -> Decimal {
    (Decimal::from(amount) * multiplier).normalize()
}

fn pool_total(wagers: &[Tokens]) -> Tokens {
    match wagers
        .iter()
        .fold(0 as Tokens, |total, wager| total.saturating_add(*wager))
    {
        0 => 1,
        total => total,
    }
}
fn multiplier_for(total: Tokens, wager: Tokens) -> Decimal {
    let raw = (total as f64 / (wager as f64 + 1.0)) * BASE_MULTIPLIER;
    if !raw.is_finite() {
        warn!("Non-finite multiplier for wager {} of {}", wager, total);
        return FALLBACK_MULTIPLIER;
    }
    match Decimal::from_f64(raw) {
        Some(raw) => raw
            .clamp(MIN_MULTIPLIER, MAX_MULTIPLIER)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        None => FALLBACK_MULTIPLIER,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn option(label: &str, votes: Tokens) -> QuestionOption {
        QuestionOption {
            label: label.to_string(),
            votes,
            odds: dec!(1.5),
        }
    }

    #[test]
    fn yes_no_pool() {
        let options = vec![option("Yes", 8), option("No", 12)];
        let priced = price_options(&options);
        assert_eq!(priced[0].multiplier, dec!(3.33));
        assert_eq!(priced[1].multiplier, dec!(2.31));
        assert_eq!(priced[0].chance, 40);
        assert_eq!(priced[1].chance, 60);
        assert_eq!(priced[1].option.label, "No");
    }

    #[test]
    fn single_empty_option() {
        assert_eq!(multipliers(&[0]), vec![dec!(1.5)]);
        assert_eq!(chances(&[0]), vec![0]);
    }

    #[test]
    fn all_zero_pool_is_even() {
        for n in 1..8 {
            let computed = multipliers(&vec![0; n]);
            assert!(computed.iter().all(|m| *m == computed[0]));
        }
    }

    #[test]
    fn clamped_at_both_ends() {
        assert_eq!(multipliers(&[0, 1000]), vec![dec!(5.0), dec!(1.5)]);
        assert_eq!(multipliers(&[0, 1]), vec![dec!(1.5), dec!(1.2)]);
        assert_eq!(multipliers(&[Tokens::MAX, 0])[1], MAX_MULTIPLIER);
    }

    #[test]
    fn always_within_bounds() {
        let pools: Vec<Vec<Tokens>> = vec![
            vec![],
            vec![1],
            vec![7, 0, 3],
            vec![1, 1, 1, 1],
            vec![u32::MAX as Tokens, 5],
            vec![Tokens::MAX, Tokens::MAX],
            (0..50).collect(),
        ];
        for pool in pools {
            for m in multipliers(&pool) {
                assert!(m >= MIN_MULTIPLIER && m <= MAX_MULTIPLIER, "{:?} -> {}", pool, m);
            }
        }
    }

    #[test]
    fn more_backing_never_raises_own_multiplier() {
        // Only holds while the other options carry tokens. Alone in the pool
        // an option drifts from 1.2 back up towards 1.5.
        for others in [vec![1], vec![3, 9], vec![20], vec![0, 4]] {
            let mut previous: Option<(Decimal, Vec<Decimal>)> = None;
            for wager in 0..60 {
                let mut pool = vec![wager];
                pool.extend(&others);
                let computed = multipliers(&pool);
                if let Some((own, rest)) = &previous {
                    assert!(computed[0] <= *own, "{:?}", pool);
                    for (before, after) in rest.iter().zip(&computed[1..]) {
                        assert!(after >= before, "{:?}", pool);
                    }
                }
                previous = Some((computed[0], computed[1..].to_vec()));
            }
        }
    }

    #[test]
    fn chances_roughly_sum_to_100() {
        let sum: u32 = chances(&[1, 1, 1]).iter().sum();
        assert_eq!(sum, 99);
        let sum: u32 = chances(&[12, 8]).iter().sum();
        assert_eq!(sum, 100);
    }

    #[test]
    fn potential_win_display() {
        assert_eq!(potential_win(5, dec!(2.00)).to_string(), "10");
        assert_eq!(potential_win(5, dec!(3.33)).to_string(), "16.65");
        assert_eq!(potential_win(0, dec!(4.2)).to_string(), "0");
    }

    #[test]
    fn lookup_by_label() {
        let options = vec![option("Team Alpha", 20), option("Team Beta", 15)];
        assert_eq!(multiplier_of(&options, "Team Beta"), Some(dec!(3.28)));
        assert_eq!(multiplier_of(&options, "Team Gamma"), None);
    }
}
