//! Coin selection: picks a set of UTXOs whose effective amount covers a
//! target, used by the reservation gate (C9). The selection strategy
//! itself — the part spec §4.5 leaves unspecified beyond "run coin
//! selection" — is a simple largest-effective-amount-first greedy pass,
//! the same shape the original's `CoinSelector` is described as performing
//! (gather estimators, select until target covered).

use crate::adapters::Utxo;

/// An annotated UTXO selected to fund a spend.
#[derive(Debug, Clone)]
pub struct Spendable {
    pub utxo: Utxo,
    pub effective_amount: i64,
}

/// Greedy coin selector: sorts candidates by descending effective amount
/// and takes from the top until `target` (the requested amount plus the
/// dust-threshold fee) is covered. Returns an empty vector if the total
/// available effective amount can't cover `target`.
pub struct CoinSelector {
    candidates: Vec<Spendable>,
    target: i64,
}

impl CoinSelector {
    pub fn new(utxos: Vec<Utxo>, target: i64, fee_per_byte: u64) -> Self {
        let mut candidates: Vec<Spendable> = utxos
            .into_iter()
            .map(|utxo| {
                let effective_amount = utxo.effective_amount(fee_per_byte);
                Spendable { utxo, effective_amount }
            })
            .collect();
        candidates.sort_by(|a, b| b.effective_amount.cmp(&a.effective_amount));
        Self { candidates, target }
    }

    /// Runs selection, returning the chosen spendables or an empty vector
    /// if funds are insufficient.
    pub fn select(self) -> Vec<Spendable> {
        let mut chosen = Vec::new();
        let mut accumulated: i64 = 0;
        for candidate in self.candidates {
            if accumulated >= self.target {
                break;
            }
            accumulated += candidate.effective_amount;
            chosen.push(candidate);
        }
        if accumulated < self.target {
            Vec::new()
        } else {
            chosen
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::OutPoint;
    use crate::tx::InputOutput;

    fn utxo(amount: u64, size: u32) -> Utxo {
        Utxo {
            outpoint: OutPoint { txid: "t".into(), index: 0 },
            output: InputOutput { size, amount: Some(amount) },
            owner_address: "addr".into(),
        }
    }

    #[test]
    fn selects_largest_first_until_target_covered() {
        let utxos = vec![utxo(100, 34), utxo(500, 34), utxo(50, 34)];
        let selector = CoinSelector::new(utxos, 400, 0);
        let chosen = selector.select();
        assert_eq!(chosen.len(), 1);
        assert_eq!(chosen[0].utxo.output.amount, Some(500));
    }

    #[test]
    fn insufficient_funds_returns_empty() {
        let utxos = vec![utxo(10, 34), utxo(20, 34)];
        let selector = CoinSelector::new(utxos, 1000, 0);
        assert!(selector.select().is_empty());
    }

    #[test]
    fn empty_candidates_with_zero_target_select_nothing() {
        let selector = CoinSelector::new(vec![], 0, 0);
        assert!(selector.select().is_empty());
    }
}
