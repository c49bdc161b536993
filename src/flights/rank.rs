//! Deterministic ranking: `cheapest`, `fastest`, and `best` tags.
//!
//! - `cheapest`: lowest price; ties go to the earliest offer.
//! - `fastest`: lowest total duration; ties go to the earliest offer. Not
//!   awarded when that offer is already `cheapest`.
//! - `best`: lowest weighted score of min-max normalised price and duration,
//!   awarded only when that offer carries no other tag.
//!
//! Offers with an unusable price or duration are left out of the comparison
//! they cannot take part in.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::offer::{FlightOffer, OfferTag};

/// Weights of the `best` score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingWeights {
    /// Weight of the normalised price.
    pub price: f64,
    /// Weight of the normalised duration.
    pub duration: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            price: 0.6,
            duration: 0.4,
        }
    }
}

/// Tag `offers` in place. Existing tags are cleared first; empty input is a
/// no-op.
pub fn rank_offers(offers: &mut [FlightOffer], weights: &RankingWeights) {
    for offer in offers.iter_mut() {
        offer.tags.clear();
    }
    if offers.is_empty() {
        return;
    }

    let prices: Vec<Option<f64>> = offers.iter().map(FlightOffer::price_value).collect();
    let durations: Vec<Option<f64>> = offers
        .iter()
        .map(|o| o.total_duration_minutes().map(f64::from))
        .collect();

    let cheapest = argmin(prices.iter().copied());
    let fastest = argmin(durations.iter().copied()).filter(|idx| Some(*idx) != cheapest);

    let pairs: Vec<Option<(f64, f64)>> = prices
        .iter()
        .zip(&durations)
        .map(|(p, d)| p.zip(*d))
        .collect();
    let best = best_index(&pairs, weights);

    if let Some(idx) = cheapest {
        tag(offers, idx, OfferTag::Cheapest);
    }
    if let Some(idx) = fastest {
        tag(offers, idx, OfferTag::Fastest);
    }
    if let Some(idx) = best.filter(|idx| Some(*idx) != cheapest && Some(*idx) != fastest) {
        tag(offers, idx, OfferTag::Best);
    }

    debug!(?cheapest, ?fastest, ?best, count = offers.len(), "offers ranked");
}

fn tag(offers: &mut [FlightOffer], idx: usize, tag: OfferTag) {
    if let Some(offer) = offers.get_mut(idx) {
        offer.tags.push(tag);
    }
}

/// Index of the strictly smallest value; the first occurrence wins ties.
fn argmin(values: impl Iterator<Item = Option<f64>>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, value) in values.enumerate() {
        let Some(value) = value else { continue };
        if best.is_none_or(|(_, current)| value < current) {
            best = Some((idx, value));
        }
    }
    best.map(|(idx, _)| idx)
}

/// Index with the lowest weighted normalised score among offers that have
/// both a price and a duration.
fn best_index(pairs: &[Option<(f64, f64)>], weights: &RankingWeights) -> Option<usize> {
    let present = || pairs.iter().flatten();
    let (p_min, p_max) = bounds(present().map(|(p, _)| *p))?;
    let (d_min, d_max) = bounds(present().map(|(_, d)| *d))?;

    let scores = pairs.iter().map(|pair| {
        pair.map(|(p, d)| {
            weights.price * normalise(p, p_min, p_max) + weights.duration * normalise(d, d_min, d_max)
        })
    });
    argmin(scores)
}

fn bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// `(value - min) / (max - min)`, with a zero range mapping to 0.
fn normalise(value: f64, min: f64, max: f64) -> f64 {
    let range = max - min;
    if range > 0.0 {
        (value - min) / range
    } else {
        0.0
    }
}
