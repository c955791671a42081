//! Coin-return decomposition.
//!
//! The kiosk returns change greedily: largest coin first, as many times as
//! it fits. Greedy is only exact and minimal for *canonical* coin systems,
//! so [`find_greedy_counterexample`] lets the catalog reject any
//! denomination set where it is not.

use thiserror::Error;

use crate::Cents;

/// Coins to push out of the return chute, largest first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Change {
    pub coins: Vec<Cents>,
    /// Amount greedy could not represent. Always zero for a validated catalog.
    pub remainder: Cents,
}

impl Change {
    pub fn total(&self) -> Cents {
        self.coins.iter().copied().sum()
    }

    pub fn is_exact(&self) -> bool {
        self.remainder.is_zero()
    }
}

/// Greedy change maker over a fixed denomination set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeCalculator {
    /// Sorted descending, no duplicates, no zero.
    denominations: Vec<Cents>,
}

impl ChangeCalculator {
    pub fn new(denominations: impl IntoIterator<Item = Cents>) -> Self {
        let mut denominations: Vec<Cents> = denominations
            .into_iter()
            .filter(|d| !d.is_zero())
            .collect();
        denominations.sort_unstable_by(|a, b| b.cmp(a));
        denominations.dedup();
        Self { denominations }
    }

    pub fn denominations(&self) -> &[Cents] {
        &self.denominations
    }

    /// Split `amount` into coins, largest denomination first.
    pub fn decompose(&self, amount: Cents) -> Change {
        let mut remaining = amount.value();
        let mut coins = Vec::new();

        for coin in &self.denominations {
            while remaining >= coin.value() {
                coins.push(*coin);
                remaining -= coin.value();
            }
        }

        Change {
            coins,
            remainder: Cents::new(remaining),
        }
    }
}

/// Largest search range accepted by [`find_greedy_counterexample`].
pub const MAX_CANONICAL_SEARCH: u64 = 1_000_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChangeError {
    #[error(
        "largest coins are too big to verify: {bound} amounts to check, limit is {MAX_CANONICAL_SEARCH}"
    )]
    SearchTooLarge { bound: u64 },
}

/// Fewest coins for every amount in `0..=limit`; `None` where unreachable.
fn min_coin_table(limit: usize, denominations: &[Cents]) -> Vec<Option<u32>> {
    let mut best: Vec<Option<u32>> = vec![None; limit + 1];
    best[0] = Some(0);

    for value in 1..=limit {
        best[value] = denominations
            .iter()
            .map(|d| d.value() as usize)
            .filter(|&d| d != 0 && d <= value)
            .filter_map(|d| best[value - d].map(|n| n + 1))
            .min();
    }

    best
}

/// Coins greedy would hand out for `amount`, or `None` if it leaves a remainder.
/// `sorted` must be descending.
fn greedy_count(amount: u32, sorted: &[Cents]) -> Option<u32> {
    let mut remaining = amount;
    let mut count = 0;
    for coin in sorted {
        count += remaining / coin.value();
        remaining %= coin.value();
    }
    (remaining == 0).then_some(count)
}

/// Fewest coins that sum to exactly `amount`, or `None` if unreachable.
pub fn min_coins(amount: Cents, denominations: &[Cents]) -> Option<u32> {
    let target = amount.value() as usize;
    min_coin_table(target, denominations)[target]
}

/// Smallest amount for which greedy is inexact or uses more coins than
/// necessary, if any.
///
/// Any counterexample is smaller than the sum of the two largest coins, so
/// the search is bounded. Sets whose bound exceeds [`MAX_CANONICAL_SEARCH`]
/// are refused rather than searched.
pub fn find_greedy_counterexample(
    denominations: &[Cents],
) -> Result<Option<Cents>, ChangeError> {
    let calculator = ChangeCalculator::new(denominations.iter().copied());
    let sorted = calculator.denominations();

    if sorted.len() < 2 {
        return Ok(None);
    }
    let bound: u64 = sorted.iter().take(2).map(|d| u64::from(d.value())).sum();
    if bound > MAX_CANONICAL_SEARCH {
        return Err(ChangeError::SearchTooLarge { bound });
    }

    // bound fits in u32 after the check above
    let bound = bound as u32;
    let optimal = min_coin_table(bound as usize, sorted);

    Ok((1..bound)
        .find(|&amount| {
            let Some(best) = optimal[amount as usize] else {
                return false;
            };
            greedy_count(amount, sorted).is_none_or(|count| count > best)
        })
        .map(Cents::new))
}

pub fn is_canonical(denominations: &[Cents]) -> bool {
    matches!(find_greedy_counterexample(denominations), Ok(None))
}
