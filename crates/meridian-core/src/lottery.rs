//! Lottery superblock winner selection.
//!
//! At a lottery height ([`crate::subsidy::is_lottery_height`]) the coinbase
//! pays out to the highest-scoring coinstakes seen since the previous
//! lottery block, rather than to a single charity pool address. Each
//! candidate's score is `SHA256d(coinstake_txid || last_lottery_block_hash)`
//! — deterministic once the cycle's coinstakes and the prior lottery
//! block's hash are fixed, and ungrindable in advance for the same reason
//! [`crate::pos_kernel::select_modifier_block`] hashes in the selection
//! seed rather than comparing raw hashes.

use crate::constants::LOTTERY_WINNER_COUNT;
use crate::types::{Block, Hash256, ScriptPubKey};

/// One coinstake observed during a lottery cycle, carried in the block
/// index so the running window survives reorgs without a full rescan.
#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct LotteryCoinstakeData {
    pub coinstake_txid: Hash256,
    pub payee: ScriptPubKey,
}

/// A selected winner with its rank (0 = highest score) and score, for
/// callers that need to report or log the outcome alongside the payee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotteryWinner {
    pub rank: usize,
    pub score: Hash256,
    pub payee: ScriptPubKey,
}

fn score(coinstake_txid: &Hash256, last_lottery_block_hash: &Hash256) -> Hash256 {
    let mut data = Vec::with_capacity(64);
    data.extend_from_slice(coinstake_txid.as_bytes());
    data.extend_from_slice(last_lottery_block_hash.as_bytes());
    crate::crypto::sha256d(&data)
}

/// Select up to [`LOTTERY_WINNER_COUNT`] winners from `candidates`, highest
/// score first. A payee script appearing more than once in the window only
/// keeps its best-ranked entry — duplicate-script collapsing, so one payee
/// can't claim multiple slots by staking repeatedly in the same cycle. Ties
/// in score (practically unreachable with a cryptographic hash, but a
/// well-defined total order matters for consensus) break by comparing the
/// coinstake txid, lowest first.
pub fn select_winners(
    candidates: &[LotteryCoinstakeData],
    last_lottery_block_hash: Hash256,
) -> Vec<LotteryWinner> {
    let mut scored: Vec<(Hash256, &LotteryCoinstakeData)> = candidates
        .iter()
        .map(|c| (score(&c.coinstake_txid, &last_lottery_block_hash), c))
        .collect();
    scored.sort_by(|a, b| b.0.as_bytes().cmp(a.0.as_bytes()).then_with(|| a.1.coinstake_txid.as_bytes().cmp(b.1.coinstake_txid.as_bytes())));

    let mut seen_payees = std::collections::HashSet::new();
    let mut winners = Vec::with_capacity(LOTTERY_WINNER_COUNT);
    for (hash, candidate) in scored {
        if winners.len() == LOTTERY_WINNER_COUNT {
            break;
        }
        if !seen_payees.insert(candidate.payee.clone()) {
            continue;
        }
        winners.push(LotteryWinner { rank: winners.len(), score: hash, payee: candidate.payee.clone() });
    }
    winners
}

/// Extract this block's lottery entry from its coinstake transaction, if it
/// has one. The payee is the coinstake's last output — the one carrying the
/// staker's reward back to their own script, after the zero-value marker and
/// any stake-return outputs ahead of it.
pub fn candidate_from_block(block: &Block) -> Option<LotteryCoinstakeData> {
    let coinstake = block.coinstake()?;
    let payee = coinstake.outputs.last()?.script_pubkey.clone();
    let coinstake_txid = coinstake.txid().ok()?;
    Some(LotteryCoinstakeData { coinstake_txid, payee })
}

/// Split a lottery cycle's accumulated charity pool evenly across its
/// winners, folding any remainder (from integer division) into the first
/// (highest-ranked) winner's share so the total always equals `pool`.
pub fn split_pool(pool: u64, winner_count: usize) -> Vec<u64> {
    if winner_count == 0 {
        return Vec::new();
    }
    let share = pool / winner_count as u64;
    let remainder = pool % winner_count as u64;
    let mut shares = vec![share; winner_count];
    shares[0] += remainder;
    shares
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlockHeader, OutPoint, Transaction, TxInput, TxOutput};

    fn candidate(txid_byte: u8, payee_byte: u8) -> LotteryCoinstakeData {
        LotteryCoinstakeData {
            coinstake_txid: Hash256([txid_byte; 32]),
            payee: ScriptPubKey::PayToPubkeyHash(Hash256([payee_byte; 32])),
        }
    }

    #[test]
    fn selects_at_most_winner_count() {
        let candidates: Vec<_> = (0..20u8).map(|i| candidate(i, i)).collect();
        let winners = select_winners(&candidates, Hash256([200; 32]));
        assert_eq!(winners.len(), LOTTERY_WINNER_COUNT);
    }

    #[test]
    fn fewer_candidates_than_slots_yields_fewer_winners() {
        let candidates = vec![candidate(1, 1), candidate(2, 2)];
        let winners = select_winners(&candidates, Hash256([200; 32]));
        assert_eq!(winners.len(), 2);
    }

    #[test]
    fn winners_are_ranked_by_descending_score() {
        let candidates: Vec<_> = (0..5u8).map(|i| candidate(i, i)).collect();
        let winners = select_winners(&candidates, Hash256([7; 32]));
        for pair in winners.windows(2) {
            assert!(pair[0].score.as_bytes() >= pair[1].score.as_bytes());
        }
    }

    #[test]
    fn selection_is_deterministic() {
        let candidates: Vec<_> = (0..5u8).map(|i| candidate(i, i)).collect();
        let seed = Hash256([42; 32]);
        let a = select_winners(&candidates, seed);
        let b = select_winners(&candidates, seed);
        assert_eq!(a, b);
    }

    #[test]
    fn duplicate_payee_keeps_only_its_best_rank() {
        let same_payee = Hash256([9; 32]);
        let candidates = vec![
            LotteryCoinstakeData { coinstake_txid: Hash256([1; 32]), payee: ScriptPubKey::PayToPubkeyHash(same_payee) },
            LotteryCoinstakeData { coinstake_txid: Hash256([2; 32]), payee: ScriptPubKey::PayToPubkeyHash(same_payee) },
        ];
        let winners = select_winners(&candidates, Hash256([7; 32]));
        assert_eq!(winners.len(), 1);
    }

    #[test]
    fn split_pool_remainder_goes_to_top_winner() {
        let shares = split_pool(100, 11);
        assert_eq!(shares.len(), 11);
        assert_eq!(shares.iter().sum::<u64>(), 100);
        assert!(shares[0] >= shares[1]);
    }

    #[test]
    fn split_pool_zero_winners_is_empty() {
        assert!(split_pool(100, 0).is_empty());
    }

    fn coinbase() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput { previous_output: OutPoint::null(), signature: vec![], public_key: vec![] }],
            outputs: vec![TxOutput { value: 50, script_pubkey: ScriptPubKey::PayToPubkeyHash(Hash256([1; 32])) }],
            lock_time: 0,
        }
    }

    fn coinstake(payee: Hash256) -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                previous_output: OutPoint { txid: Hash256([0x22; 32]), index: 0 },
                signature: vec![0u8; 64],
                public_key: vec![0u8; 32],
            }],
            outputs: vec![
                TxOutput { value: 0, script_pubkey: ScriptPubKey::NullData },
                TxOutput { value: 10, script_pubkey: ScriptPubKey::PayToPubkeyHash(payee) },
            ],
            lock_time: 0,
        }
    }

    fn block_with(transactions: Vec<Transaction>) -> Block {
        Block {
            header: BlockHeader {
                version: 1,
                prev_hash: Hash256::ZERO,
                merkle_root: Hash256::ZERO,
                timestamp: 1,
                difficulty_target: u64::MAX,
                nonce: 0,
            },
            transactions,
            block_signature: vec![],
        }
    }

    #[test]
    fn candidate_from_block_extracts_coinstake_payee() {
        let payee = Hash256([9; 32]);
        let block = block_with(vec![coinbase(), coinstake(payee)]);
        let candidate = candidate_from_block(&block).unwrap();
        assert_eq!(candidate.payee, ScriptPubKey::PayToPubkeyHash(payee));
        assert_eq!(candidate.coinstake_txid, block.coinstake().unwrap().txid().unwrap());
    }

    #[test]
    fn candidate_from_block_is_none_without_a_coinstake() {
        let block = block_with(vec![coinbase()]);
        assert!(candidate_from_block(&block).is_none());
    }
}
