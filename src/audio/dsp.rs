//! Audio signal chain
//!
//! Every window passes through the same three stages in order: DC-blocking
//! high-pass, voice-activity decision on the filtered signal, then a soft
//! limiter applied only when voice is present. All stages work in place on
//! 16-bit little-endian PCM and keep O(1) state per direction, so capture
//! and playback each own an independent chain.

use crate::constants::{DC_BLOCK_POLE, LIMITER_TARGET_RMS, VAD_DECAY, VAD_THRESHOLD};

/// One-pole DC-blocking high-pass filter.
///
/// `y[n] = x[n] - x[n-1] + pole * y[n-1]`, clamped to the i16 range.
#[derive(Debug, Default, Clone)]
pub struct DcBlocker {
    prev_in: f64,
    prev_out: f64,
}

impl DcBlocker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter the window in place.
    pub fn process(&mut self, window: &mut [u8]) {
        for sample in window.chunks_exact_mut(2) {
            let x = f64::from(i16::from_le_bytes([sample[0], sample[1]]));
            let y = x - self.prev_in + DC_BLOCK_POLE * self.prev_out;
            self.prev_in = x;
            self.prev_out = y;
            let clamped = y.clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16;
            sample.copy_from_slice(&clamped.to_le_bytes());
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Root-mean-square amplitude of a PCM window; 0.0 for an empty window.
pub fn rms(window: &[u8]) -> f64 {
    let mut sum_squares: i64 = 0;
    let mut count: i64 = 0;
    for sample in window.chunks_exact(2) {
        let s = i64::from(i16::from_le_bytes([sample[0], sample[1]]));
        sum_squares += s * s;
        count += 1;
    }
    if count == 0 {
        return 0.0;
    }
    (sum_squares as f64 / count as f64).sqrt()
}

/// Voice-activity decision on a decayed RMS average.
///
/// The average must build up across windows before crossing the threshold,
/// which suppresses single-window clicks, and keeps the gate open for a few
/// windows after speech stops.
#[derive(Debug, Default, Clone)]
pub struct VoiceGate {
    average: f64,
}

impl VoiceGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one window's RMS into the average and decide.
    pub fn update(&mut self, rms: f64) -> bool {
        self.average = VAD_DECAY * self.average + (1.0 - VAD_DECAY) * rms;
        self.average > VAD_THRESHOLD
    }

    pub fn average(&self) -> f64 {
        self.average
    }
}

/// Scale the window toward the target loudness. The scale factor is bounded
/// to [0.5, 2.0] per window; windows at or near silence pass unchanged.
pub fn soft_limit(window: &mut [u8], rms: f64) {
    if rms <= 1e-6 {
        return;
    }
    let scale = (LIMITER_TARGET_RMS / rms).clamp(0.5, 2.0);
    for sample in window.chunks_exact_mut(2) {
        let s = f64::from(i16::from_le_bytes([sample[0], sample[1]]));
        let scaled = (s * scale)
            .round()
            .clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16;
        sample.copy_from_slice(&scaled.to_le_bytes());
    }
}

/// Complete per-direction chain: filter, gate, limit.
#[derive(Debug, Default)]
pub struct AudioDsp {
    filter: DcBlocker,
    gate: VoiceGate,
}

impl AudioDsp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter the window in place and report whether voice is present.
    /// The limiter runs only on voice windows; non-voice windows come back
    /// filtered but not rescaled.
    pub fn process(&mut self, window: &mut [u8]) -> bool {
        self.filter.process(window);
        let energy = rms(window);
        let voice = self.gate.update(energy);
        if voice {
            soft_limit(window, energy);
        }
        voice
    }

    pub fn gate_average(&self) -> f64 {
        self.gate.average()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn window_from(samples: &[i16]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        bytes
    }

    fn samples_of(window: &[u8]) -> Vec<i16> {
        window
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }

    #[test]
    fn test_rms_of_silence_is_zero() {
        assert_eq!(rms(&window_from(&[0; 160])), 0.0);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn test_rms_of_constant_window() {
        let window = window_from(&[4000; 160]);
        assert!((rms(&window) - 4000.0).abs() < 1e-9);
        let window = window_from(&[-4000; 160]);
        assert!((rms(&window) - 4000.0).abs() < 1e-9);
    }

    #[test]
    fn test_dc_blocker_removes_constant_offset() {
        let mut filter = DcBlocker::new();
        let mut window = window_from(&[4000; 3200]);
        filter.process(&mut window);
        let out = samples_of(&window);
        // first output sample carries the full step
        assert_eq!(out[0], 4000);
        // the tail decays toward zero
        assert!(out.last().unwrap().abs() < 100);
    }

    #[test]
    fn test_dc_blocker_passes_alternating_signal() {
        let mut filter = DcBlocker::new();
        let mut warmup = window_from(&alternating(320));
        filter.process(&mut warmup);
        let mut window = window_from(&alternating(320));
        filter.process(&mut window);
        let energy = rms(&window);
        assert!(energy > 3000.0 && energy < 5000.0, "rms was {}", energy);
    }

    #[test]
    fn test_voice_gate_needs_average_to_build() {
        let mut gate = VoiceGate::new();
        // single loud window moves the average to 400
        assert!(gate.update(4000.0));
        assert!((gate.average() - 400.0).abs() < 1e-9);
        // decays by 0.9 per silent window: 360, 324, 291.6
        assert!(gate.update(0.0));
        assert!(gate.update(0.0));
        assert!(!gate.update(0.0));
        assert!(gate.average() < VAD_THRESHOLD);
    }

    #[test]
    fn test_limiter_attenuates_loud_window() {
        let mut window = window_from(&[4000; 160]);
        let energy = rms(&window);
        soft_limit(&mut window, energy);
        // 2000 / 4000 = 0.5, inside the clamp
        assert!(samples_of(&window).iter().all(|&s| s == 2000));
        assert!((rms(&window) - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn test_limiter_boost_is_clamped() {
        let mut window = window_from(&[500; 160]);
        let energy = rms(&window);
        soft_limit(&mut window, energy);
        // 2000 / 500 = 4.0, clamped to 2.0
        assert!(samples_of(&window).iter().all(|&s| s == 1000));
    }

    #[test]
    fn test_limiter_skips_silence() {
        let mut window = window_from(&[0; 160]);
        soft_limit(&mut window, 0.0);
        assert!(samples_of(&window).iter().all(|&s| s == 0));
    }

    #[test]
    fn test_full_chain_normalizes_voice() {
        let mut dsp = AudioDsp::new();
        let mut window = window_from(&alternating(800));
        let voice = dsp.process(&mut window);
        assert!(voice);
        assert!(dsp.gate_average() > VAD_THRESHOLD);
        // post-filter rms sits near 4010, attenuated by the clamped 0.5
        let energy = rms(&window);
        assert!(
            energy > 1900.0 && energy < 2100.0,
            "chain output rms was {}",
            energy
        );
    }

    #[test]
    fn test_full_chain_gates_silence() {
        let mut dsp = AudioDsp::new();
        let mut window = window_from(&[0; 160]);
        assert!(!dsp.process(&mut window));
        assert!(samples_of(&window).iter().all(|&s| s == 0));
    }

    #[test]
    fn test_directions_keep_independent_state() {
        let mut capture = AudioDsp::new();
        let mut playback = AudioDsp::new();
        let mut window = window_from(&alternating(800));
        capture.process(&mut window);
        assert!(capture.gate_average() > 0.0);
        assert_eq!(playback.gate_average(), 0.0);
    }

    fn alternating(len: usize) -> Vec<i16> {
        (0..len)
            .map(|i| if i % 2 == 0 { 4000 } else { -4000 })
            .collect()
    }

    proptest! {
        #[test]
        fn limiter_scale_stays_in_bounds(samples in proptest::collection::vec(any::<i16>(), 1..400)) {
            let mut window = window_from(&samples);
            let before = rms(&window);
            soft_limit(&mut window, before);
            let after = rms(&window);
            // scale is clamped to [0.5, 2.0]; rounding adds at most half
            // a step per sample, clamping only ever attenuates
            prop_assert!(after <= 2.0 * before + 2.0);
            if before > LIMITER_TARGET_RMS {
                prop_assert!(after <= before + 2.0);
            }
        }
    }
}
