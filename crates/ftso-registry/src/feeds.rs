//! Canonical feed order of a reward epoch.
//!
//! Every feed that received an inflation offer comes first, sorted by id.
//! Feeds that only received community offers follow, sorted by total offered
//! amount (largest first), ties broken by id. The order depends only on the
//! set of offers, never on the order they were read in.
//!
//! A feed's decimals come from its inflation offers when it has any,
//! otherwise from its community offers; among the candidate offers the one
//! with the largest amount wins, ties going to the smaller decimals.

use std::collections::BTreeMap;

use ftso_types::voting::{CommunityOffer, InflationOffer};
use ftso_types::{Feed, FeedId};

/// Largest-amount offer seen for a feed, with its decimals.
#[derive(Clone, Copy, Debug)]
struct DecimalsVote {
    amount: u128,
    decimals: i8,
}

impl DecimalsVote {
    fn consider(slot: &mut Option<DecimalsVote>, amount: u128, decimals: i8) {
        let better = match slot {
            None => true,
            Some(current) => {
                amount > current.amount
                    || (amount == current.amount && decimals < current.decimals)
            }
        };
        if better {
            *slot = Some(DecimalsVote { amount, decimals });
        }
    }
}

/// Canonical feed order from the offers of one reward epoch.
pub fn canonical_feed_order(inflation: &[InflationOffer], community: &[CommunityOffer]) -> Vec<Feed> {
    let mut inflation_decimals: BTreeMap<FeedId, Option<DecimalsVote>> = BTreeMap::new();
    for offer in inflation {
        for feed in &offer.feeds {
            DecimalsVote::consider(
                inflation_decimals.entry(feed.id).or_default(),
                offer.amount,
                feed.decimals,
            );
        }
    }

    let mut community_totals: BTreeMap<FeedId, (u128, Option<DecimalsVote>)> = BTreeMap::new();
    for offer in community {
        if inflation_decimals.contains_key(&offer.feed.id) {
            continue;
        }
        let entry = community_totals.entry(offer.feed.id).or_default();
        entry.0 = entry.0.saturating_add(offer.amount);
        DecimalsVote::consider(&mut entry.1, offer.amount, offer.feed.decimals);
    }

    let mut order: Vec<Feed> = inflation_decimals
        .into_iter()
        .filter_map(|(id, vote)| vote.map(|v| Feed::new(id, v.decimals)))
        .collect();

    let mut community_only: Vec<(FeedId, u128, i8)> = community_totals
        .into_iter()
        .filter_map(|(id, (total, vote))| vote.map(|v| (id, total, v.decimals)))
        .collect();
    community_only.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    order.extend(
        community_only
            .into_iter()
            .map(|(id, _, decimals)| Feed::new(id, decimals)),
    );
    order
}
