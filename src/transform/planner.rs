//! Tempo ratio and pitch shift planning
//!
//! Pure functions from the two tracks' estimates to a [`TransformPlan`].

use crate::types::{KeyEstimate, TempoEstimate, TransformPlan};
use tracing::{debug, warn};

/// Bounds on the playback-rate ratio
pub const MIN_RATE: f64 = 0.5;
pub const MAX_RATE: f64 = 2.0;
/// Largest shift in either direction, semitones
pub const MAX_SHIFT: f64 = 6.0;

/// Ratio that brings the vocal tempo to the instrumental's, clamped
///
/// Non-positive or non-finite tempi give 1.0 (no stretch).
pub fn rate_ratio(vocal_bpm: f64, inst_bpm: f64) -> f64 {
    let usable = |bpm: f64| bpm.is_finite() && bpm > 0.0;
    if !usable(vocal_bpm) || !usable(inst_bpm) {
        debug!(
            "Tempo unusable (vocal {:.2}, instrumental {:.2}); no stretch",
            vocal_bpm, inst_bpm
        );
        return 1.0;
    }
    let raw = inst_bpm / vocal_bpm;
    if !raw.is_finite() {
        warn!("Non-finite rate ratio; no stretch");
        return 1.0;
    }
    let clamped = raw.clamp(MIN_RATE, MAX_RATE);
    if clamped != raw {
        debug!("Rate ratio {:.3} clamped to {:.3}", raw, clamped);
    }
    clamped
}

/// Signed semitone move from the vocal key to the instrumental key
///
/// The naive distance is the modular difference wrapped into (-6, 6]. When
/// the modes differ and that distance exceeds 3, a target sitting at the
/// source's relative key (major +9, minor +3) resolves to -3 / +3.
pub fn semitone_shift(vocal: &KeyEstimate, inst: &KeyEstimate) -> f64 {
    let src = vocal.tonic_index() as i32;
    let tgt = inst.tonic_index() as i32;
    let mut d = (tgt - src).rem_euclid(12);
    if d > 6 {
        d -= 12;
    }
    if vocal.is_major() != inst.is_major() && d.abs() > 3 {
        if vocal.is_major() && tgt == (src + 9) % 12 {
            d = -3;
        }
        if !vocal.is_major() && tgt == (src + 3) % 12 {
            d = 3;
        }
    }
    (d as f64).clamp(-MAX_SHIFT, MAX_SHIFT)
}

/// Plan the transform of the vocal onto the instrumental
pub fn plan(
    vocal_tempo: &TempoEstimate,
    vocal_key: &KeyEstimate,
    inst_tempo: &TempoEstimate,
    inst_key: &KeyEstimate,
) -> TransformPlan {
    let ratio = rate_ratio(vocal_tempo.bpm, inst_tempo.bpm);
    let shift = semitone_shift(vocal_key, inst_key);
    debug!(
        "Plan: {} -> {} ({:+} st), rate {:.3}",
        vocal_key, inst_key, shift, ratio
    );
    TransformPlan::new(ratio, shift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Mode, PitchClass};

    fn key(index: usize, mode: Mode) -> KeyEstimate {
        KeyEstimate::new(PitchClass::from_index(index), mode)
    }

    #[test]
    fn test_rate_ratio_basic() {
        assert!((rate_ratio(120.0, 90.0) - 0.75).abs() < 1e-12);
        assert_eq!(rate_ratio(60.0, 180.0), 2.0);
        assert_eq!(rate_ratio(180.0, 60.0), 0.5);
    }

    #[test]
    fn test_rate_ratio_unusable_tempo() {
        assert_eq!(rate_ratio(0.0, 120.0), 1.0);
        assert_eq!(rate_ratio(120.0, -3.0), 1.0);
        assert_eq!(rate_ratio(f64::NAN, 120.0), 1.0);
        assert_eq!(rate_ratio(120.0, f64::INFINITY), 1.0);
    }

    #[test]
    fn test_rate_ratio_always_bounded() {
        for v in 1..60 {
            for i in 1..60 {
                let r = rate_ratio(v as f64 * 4.7, i as f64 * 3.1);
                assert!((MIN_RATE..=MAX_RATE).contains(&r));
            }
        }
    }

    #[test]
    fn test_semitone_shift_same_key() {
        let k = key(5, Mode::Minor);
        assert_eq!(semitone_shift(&k, &k), 0.0);
    }

    #[test]
    fn test_semitone_shift_wraps_to_shortest() {
        // C -> A is -3, not +9
        assert_eq!(semitone_shift(&key(0, Mode::Major), &key(9, Mode::Major)), -3.0);
        // C -> F# is +6
        assert_eq!(semitone_shift(&key(0, Mode::Major), &key(6, Mode::Major)), 6.0);
        // C -> G is -5
        assert_eq!(semitone_shift(&key(0, Mode::Major), &key(7, Mode::Major)), -5.0);
    }

    #[test]
    fn test_relative_keys() {
        // C major -> A minor (relative minor)
        assert_eq!(semitone_shift(&key(0, Mode::Major), &key(9, Mode::Minor)), -3.0);
        // A minor -> C major (relative major)
        assert_eq!(semitone_shift(&key(9, Mode::Minor), &key(0, Mode::Major)), 3.0);
    }

    #[test]
    fn test_semitone_shift_always_bounded() {
        for a in 0..12 {
            for b in 0..12 {
                for ma in [Mode::Major, Mode::Minor] {
                    for mb in [Mode::Major, Mode::Minor] {
                        let s = semitone_shift(&key(a, ma), &key(b, mb));
                        assert!((-MAX_SHIFT..=MAX_SHIFT).contains(&s), "{a} {ma:?} -> {b} {mb:?}: {s}");
                        assert_eq!(s.fract(), 0.0);
                    }
                }
            }
        }
    }

    #[test]
    fn test_plan_from_insufficient_tempo() {
        let p = plan(
            &TempoEstimate::insufficient(),
            &KeyEstimate::default(),
            &TempoEstimate::insufficient(),
            &key(2, Mode::Major),
        );
        assert_eq!(p.rate_ratio(), 1.0);
        assert_eq!(p.semitone_shift(), 2.0);
    }
}
