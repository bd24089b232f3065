//! Weighted two-track mixdown with a clipping guard

use crate::config::MixConfig;
use crate::types::AudioBuffer;
use tracing::debug;

/// `inst_weight * inst + vocal_weight * vocal` over the shorter length
///
/// When the peak exceeds 1.0 the whole mix is divided by it.
pub fn mix(inst: &AudioBuffer, vocal: &AudioBuffer, config: &MixConfig) -> AudioBuffer {
    let mut out: Vec<f32> = inst
        .samples
        .iter()
        .zip(vocal.samples.iter())
        .map(|(&i, &v)| config.instrumental_weight * i + config.vocal_weight * v)
        .collect();

    let peak = out.iter().fold(0.0f32, |m, &s| m.max(s.abs()));
    if peak > 1.0 {
        debug!("Mix peak {:.3}; normalizing", peak);
        for s in out.iter_mut() {
            *s /= peak;
        }
    }
    AudioBuffer::new(out, inst.sample_rate)
}
