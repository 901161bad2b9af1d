//! Threshold aggregation of result signatures.
//!
//! Signatures are grouped by the root they sign, in the order the roots were
//! first seen. Within a group every signature is attributed to the signing
//! address it recovers to; unknown signers and repeated signers are skipped.
//! The first root whose distinct signers carry strictly more than
//! `policy.threshold` weight is finalizable.

use std::collections::HashSet;

use alloy_primitives::{Address, B256};
use ftso_types::voting::{EcdsaSignature, FinalizeData, SignatureData, SigningPolicy};
use ftso_types::VotingRoundId;

use crate::message::recover_result_signer;

/// Signatures collected for one root.
#[derive(Debug)]
struct RootGroup {
    merkle_root: B256,
    weight: u64,
    signers: HashSet<Address>,
    /// `(policy index, signature)` of every counted signer.
    signatures: Vec<(usize, EcdsaSignature)>,
}

/// Build the finalization payload for a round if any root reached the
/// signing threshold.
///
/// Signatures for other rounds are ignored. The returned signatures are
/// ordered by their signer's position in the signing policy.
pub fn try_finalize(
    policy: &SigningPolicy,
    voting_round_id: VotingRoundId,
    signatures: &[SignatureData],
) -> Option<FinalizeData> {
    let mut groups: Vec<RootGroup> = Vec::new();

    for data in signatures.iter().filter(|s| s.epoch_id == voting_round_id) {
        let signer = match recover_result_signer(voting_round_id, &data.merkle_root, &data.signature) {
            Ok(signer) => signer,
            Err(e) => {
                tracing::debug!(round = voting_round_id, error = %e, "unrecoverable signature");
                continue;
            }
        };
        let Some(policy_index) = policy.voters.iter().position(|v| *v == signer) else {
            tracing::debug!(round = voting_round_id, %signer, "signature from unknown signer");
            continue;
        };
        let weight = policy.weights.get(policy_index).copied().unwrap_or(0);
        if weight == 0 {
            continue;
        }

        let group = match groups.iter().position(|g| g.merkle_root == data.merkle_root) {
            Some(i) => &mut groups[i],
            None => {
                groups.push(RootGroup {
                    merkle_root: data.merkle_root,
                    weight: 0,
                    signers: HashSet::new(),
                    signatures: Vec::new(),
                });
                let last = groups.len() - 1;
                &mut groups[last]
            }
        };
        if !group.signers.insert(signer) {
            continue;
        }
        group.weight += u64::from(weight);
        group.signatures.push((policy_index, data.signature));
    }

    if groups.len() > 1 {
        tracing::warn!(
            round = voting_round_id,
            roots = groups.len(),
            "signatures split across merkle roots"
        );
    }

    let threshold = u64::from(policy.threshold);
    let mut winner = groups.into_iter().find(|g| g.weight > threshold)?;
    winner.signatures.sort_by_key(|(index, _)| *index);

    tracing::info!(
        round = voting_round_id,
        root = %winner.merkle_root,
        weight = winner.weight,
        threshold,
        signers = winner.signatures.len(),
        "signing threshold reached"
    );

    Some(FinalizeData {
        epoch_id: voting_round_id,
        merkle_root: winner.merkle_root,
        signatures: winner.signatures.into_iter().map(|(_, s)| s).collect(),
    })
}
