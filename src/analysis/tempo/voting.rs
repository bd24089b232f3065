//! Weighted voting over folded BPM candidates
//!
//! Candidates are quantized to the nearest 0.5 BPM. Each bin accumulates
//! summed weight, the set of contributing methods, a hit count and the raw
//! values. Bins rank by (score, distinct methods, hits), all descending;
//! full ties keep the order in which the bins first received a vote.
//! The winner's BPM is the median of its raw values, not the bin centre.

use crate::dsp::median;
use crate::types::TempoMethod;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// One piece of tempo evidence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Folded BPM
    pub bpm: f64,
    /// Un-normalized prior weight
    pub weight: f64,
    pub method: TempoMethod,
}

impl Candidate {
    pub fn new(bpm: f64, weight: f64, method: TempoMethod) -> Self {
        Self { bpm, weight, method }
    }
}

/// Accumulated evidence for one quantized BPM
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bin {
    pub score: f64,
    pub hits: usize,
    pub methods: BTreeSet<TempoMethod>,
    pub values: Vec<f64>,
    /// Index of the first vote among all bins
    order: usize,
}

impl Bin {
    fn rank_cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then(self.methods.len().cmp(&other.methods.len()))
            .then(self.hits.cmp(&other.hits))
    }
}

/// Outcome of a vote
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    /// Median raw BPM of the winning bin
    pub bpm: f64,
    /// Margin between the two best bins, in [0.05, 0.99]; 0.7 for a lone bin
    pub confidence: f64,
    pub methods: BTreeSet<TempoMethod>,
    /// All bin centres, ascending
    pub centres: Vec<f64>,
}

/// Keyed by bin centre in half-BPM units
#[derive(Debug, Clone, Default)]
pub struct VotingBins {
    bins: BTreeMap<i64, Bin>,
}

impl VotingBins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a candidate; non-finite or non-positive BPMs are ignored
    pub fn add(&mut self, candidate: Candidate) {
        if !candidate.bpm.is_finite() || candidate.bpm <= 0.0 {
            return;
        }
        let key = (candidate.bpm * 2.0).round() as i64;
        let next = self.bins.len();
        let bin = self.bins.entry(key).or_insert_with(|| Bin {
            order: next,
            ..Bin::default()
        });
        bin.score += candidate.weight;
        bin.hits += 1;
        bin.methods.insert(candidate.method);
        bin.values.push(candidate.bpm);
    }

    pub fn extend(&mut self, candidates: impl IntoIterator<Item = Candidate>) {
        for c in candidates {
            self.add(c);
        }
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Bin for a BPM centre, if any votes landed there
    pub fn bin(&self, centre: f64) -> Option<&Bin> {
        self.bins.get(&((centre * 2.0).round() as i64))
    }

    /// Bins with their centres, best first
    ///
    /// Ties on every criterion keep first-vote order.
    pub fn ranked(&self) -> Vec<(f64, &Bin)> {
        let mut ranked: Vec<(f64, &Bin)> = self
            .bins
            .iter()
            .map(|(&key, bin)| (key as f64 / 2.0, bin))
            .collect();
        ranked.sort_by_key(|(_, bin)| bin.order);
        ranked.sort_by(|a, b| b.1.rank_cmp(a.1));
        ranked
    }

    /// Decide the winner; `None` when no votes were cast
    pub fn verdict(&self) -> Option<Verdict> {
        let ranked = self.ranked();
        let (_, best) = ranked.first()?;
        let bpm = median(&best.values)?;

        let confidence = match ranked.get(1) {
            Some((_, second)) => {
                let s1 = best.score;
                let s2 = second.score;
                ((s1 - s2) / (s1 + 1e-9)).clamp(0.05, 0.99)
            }
            None => 0.7,
        };

        Some(Verdict {
            bpm,
            confidence,
            methods: best.methods.clone(),
            centres: self.bins.keys().map(|&k| k as f64 / 2.0).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantization_groups_nearby_values() {
        let mut bins = VotingBins::new();
        bins.add(Candidate::new(120.1, 1.0, TempoMethod::Autocorrelation));
        bins.add(Candidate::new(119.9, 1.0, TempoMethod::Periodogram));
        bins.add(Candidate::new(120.6, 1.0, TempoMethod::BeatTrack));
        assert_eq!(bins.len(), 2);
        assert_eq!(bins.bin(120.0).map(|b| b.hits), Some(2));
        assert_eq!(bins.bin(120.5).map(|b| b.hits), Some(1));
    }

    #[test]
    fn test_winner_is_median_of_raw_values() {
        let mut bins = VotingBins::new();
        bins.add(Candidate::new(120.1, 1.0, TempoMethod::Autocorrelation));
        bins.add(Candidate::new(119.8, 1.0, TempoMethod::Periodogram));
        bins.add(Candidate::new(120.2, 1.0, TempoMethod::BeatTrack));
        let verdict = bins.verdict().expect("votes cast");
        assert!((verdict.bpm - 120.1).abs() < 1e-9);
        assert_eq!(verdict.confidence, 0.7);
        assert_eq!(verdict.methods.len(), 3);
    }

    #[test]
    fn test_rank_by_score_then_methods_then_hits() {
        let mut bins = VotingBins::new();
        // 100: two hits from one method, score 2.0
        bins.add(Candidate::new(100.0, 1.0, TempoMethod::Autocorrelation));
        bins.add(Candidate::new(100.0, 1.0, TempoMethod::Autocorrelation));
        // 90: two methods, score 2.0
        bins.add(Candidate::new(90.0, 1.0, TempoMethod::Autocorrelation));
        bins.add(Candidate::new(90.0, 1.0, TempoMethod::Periodogram));
        let ranked = bins.ranked();
        assert_eq!(ranked[0].0, 90.0);
        assert_eq!(ranked[1].0, 100.0);
    }

    #[test]
    fn test_full_tie_keeps_first_vote_order() {
        let mut bins = VotingBins::new();
        bins.add(Candidate::new(140.0, 1.0, TempoMethod::Autocorrelation));
        bins.add(Candidate::new(70.0, 1.0, TempoMethod::Autocorrelation));
        let ranked = bins.ranked();
        assert_eq!(ranked[0].0, 140.0);
        assert_eq!(ranked[1].0, 70.0);
        assert!((bins.verdict().map(|v| v.bpm).unwrap_or(0.0) - 140.0).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_margin() {
        let mut bins = VotingBins::new();
        bins.add(Candidate::new(128.0, 3.0, TempoMethod::ExternalTracker));
        bins.add(Candidate::new(96.0, 1.0, TempoMethod::Periodogram));
        let verdict = bins.verdict().expect("votes cast");
        assert!((verdict.confidence - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(verdict.centres, vec![96.0, 128.0]);

        let mut tied = VotingBins::new();
        tied.add(Candidate::new(128.0, 1.0, TempoMethod::Autocorrelation));
        tied.add(Candidate::new(96.0, 1.0, TempoMethod::Periodogram));
        assert_eq!(tied.verdict().map(|v| v.confidence), Some(0.05));
    }

    #[test]
    fn test_invalid_candidates_ignored() {
        let mut bins = VotingBins::new();
        bins.add(Candidate::new(f64::NAN, 1.0, TempoMethod::BeatTrack));
        bins.add(Candidate::new(0.0, 1.0, TempoMethod::BeatTrack));
        assert!(bins.is_empty());
        assert!(bins.verdict().is_none());
    }
}
