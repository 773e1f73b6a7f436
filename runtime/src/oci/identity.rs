//! Chain-ID identity over ordered diff-ID sequences.
//!
//! A chain ID names the cumulative filesystem state after applying a
//! sequence of layers: `chain(L1) = diff(L1)` and
//! `chain(L1..Ln) = sha256("{chain(L1..Ln-1)} {diff(Ln)}")`. It is a pure
//! function of the ordered sequence, which is what lets two images with
//! identical diff-ID prefixes share committed snapshots.

use sha2::{Digest, Sha256};

/// Compute the chain ID of an ordered diff-ID sequence.
///
/// Returns an empty string for an empty sequence (no parent state).
pub fn chain_id(diff_ids: &[String]) -> String {
    let mut iter = diff_ids.iter();
    let Some(first) = iter.next() else {
        return String::new();
    };

    let mut chain = first.clone();
    for diff_id in iter {
        let mut hasher = Sha256::new();
        hasher.update(chain.as_bytes());
        hasher.update(b" ");
        hasher.update(diff_id.as_bytes());
        chain = format!("sha256:{}", hex::encode(hasher.finalize()));
    }
    chain
}
