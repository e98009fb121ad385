//! Audio cues using the Web Audio API
//!
//! Procedurally generated, no external files: a noise-like click on drop, a
//! short tick on peg contact and a pitched note per bucket on landing.

/// Sound effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundEffect {
    /// Ball released
    Drop,
    /// Ball touched a peg
    PegHit,
    /// Ball landed in a bucket (index)
    Bucket(usize),
    /// A recording run finished
    RecordingDone,
}

/// Landing notes from the left edge inwards; the right half mirrors them
const BUCKET_NOTES_HZ: [f32; 9] = [
    554.37, // C#5
    523.25, // C5
    987.77, // B5
    932.33, // A#5
    880.00, // A5
    415.30, // G#4
    392.00, // G4
    369.99, // F#4
    349.23, // F4
];

/// Pitch of the landing note for a bucket
pub fn bucket_note_hz(bucket: usize) -> f32 {
    let n = BUCKET_NOTES_HZ.len();
    let index = if bucket < n {
        bucket
    } else {
        (2 * n - 1).saturating_sub(bucket)
    };
    BUCKET_NOTES_HZ[index.min(n - 1)]
}

#[cfg(target_arch = "wasm32")]
pub use manager::AudioManager;

#[cfg(target_arch = "wasm32")]
mod manager {
    use web_sys::{AudioContext, GainNode, OscillatorNode, OscillatorType};

    use super::{SoundEffect, bucket_note_hz};

    /// Peg ticks are rate limited to one per this many seconds
    const PEG_TICK_SPACING: f64 = 0.03;

    /// Audio manager for the board
    pub struct AudioManager {
        ctx: Option<AudioContext>,
        volume: f32,
        muted: bool,
        last_peg_tick: std::cell::Cell<f64>,
    }

    impl Default for AudioManager {
        fn default() -> Self {
            Self::new()
        }
    }

    impl AudioManager {
        pub fn new() -> Self {
            // Try to create audio context (may fail if not in secure context)
            let ctx = AudioContext::new().ok();
            if ctx.is_none() {
                log::warn!("Failed to create AudioContext - audio disabled");
            }
            Self {
                ctx,
                volume: 0.6,
                muted: false,
                last_peg_tick: std::cell::Cell::new(0.0),
            }
        }

        /// Resume audio context (required after user gesture)
        pub fn resume(&self) {
            if let Some(ctx) = &self.ctx {
                let _ = ctx.resume();
            }
        }

        pub fn set_muted(&mut self, muted: bool) {
            self.muted = muted;
        }

        pub fn is_muted(&self) -> bool {
            self.muted
        }

        /// Play a sound effect
        pub fn play(&self, effect: SoundEffect) {
            if self.muted || self.volume <= 0.0 {
                return;
            }
            let Some(ctx) = &self.ctx else { return };

            // Resume context if suspended (browsers require user gesture)
            if ctx.state() == web_sys::AudioContextState::Suspended {
                let _ = ctx.resume();
            }

            let vol = self.volume;
            match effect {
                SoundEffect::Drop => self.play_drop(ctx, vol),
                SoundEffect::PegHit => self.play_peg_tick(ctx, vol),
                SoundEffect::Bucket(bucket) => self.play_bucket(ctx, vol, bucket_note_hz(bucket)),
                SoundEffect::RecordingDone => self.play_recording_done(ctx, vol),
            }
        }

        /// Create an oscillator with gain envelope
        fn create_osc(
            &self,
            ctx: &AudioContext,
            freq: f32,
            osc_type: OscillatorType,
        ) -> Option<(OscillatorNode, GainNode)> {
            let osc = ctx.create_oscillator().ok()?;
            let gain = ctx.create_gain().ok()?;

            osc.set_type(osc_type);
            osc.frequency().set_value(freq);
            osc.connect_with_audio_node(&gain).ok()?;
            gain.connect_with_audio_node(&ctx.destination()).ok()?;

            Some((osc, gain))
        }

        /// Drop - quiet high click
        fn play_drop(&self, ctx: &AudioContext, vol: f32) {
            let Some((osc, gain)) = self.create_osc(ctx, 2400.0, OscillatorType::Square) else {
                return;
            };
            let t = ctx.current_time();

            gain.gain().set_value_at_time(vol * 0.05, t).ok();
            gain.gain()
                .exponential_ramp_to_value_at_time(0.001, t + 0.03)
                .ok();
            osc.frequency().set_value_at_time(2400.0, t).ok();
            osc.frequency().set_value_at_time(900.0, t + 0.01).ok();

            osc.start().ok();
            osc.stop_with_when(t + 0.04).ok();
        }

        /// Peg contact - soft tick
        fn play_peg_tick(&self, ctx: &AudioContext, vol: f32) {
            let t = ctx.current_time();
            if t - self.last_peg_tick.get() < PEG_TICK_SPACING {
                return;
            }
            self.last_peg_tick.set(t);

            let Some((osc, gain)) = self.create_osc(ctx, 1200.0, OscillatorType::Triangle) else {
                return;
            };
            gain.gain().set_value_at_time(vol * 0.08, t).ok();
            gain.gain()
                .exponential_ramp_to_value_at_time(0.001, t + 0.04)
                .ok();

            osc.start().ok();
            osc.stop_with_when(t + 0.05).ok();
        }

        /// Bucket landing - pitched bell
        fn play_bucket(&self, ctx: &AudioContext, vol: f32, freq: f32) {
            let t = ctx.current_time();

            if let Some((osc, gain)) = self.create_osc(ctx, freq, OscillatorType::Sine) {
                gain.gain().set_value_at_time(vol * 0.3, t).ok();
                gain.gain()
                    .exponential_ramp_to_value_at_time(0.01, t + 0.4)
                    .ok();
                osc.start().ok();
                osc.stop_with_when(t + 0.45).ok();
            }

            // Octave shimmer
            if let Some((osc, gain)) = self.create_osc(ctx, freq * 2.0, OscillatorType::Triangle) {
                gain.gain().set_value_at_time(vol * 0.08, t).ok();
                gain.gain()
                    .exponential_ramp_to_value_at_time(0.01, t + 0.2)
                    .ok();
                osc.start().ok();
                osc.stop_with_when(t + 0.25).ok();
            }
        }

        /// Recording finished - rising arpeggio
        fn play_recording_done(&self, ctx: &AudioContext, vol: f32) {
            let t = ctx.current_time();
            for (i, freq) in [523.25f32, 659.25, 783.99, 1046.5].into_iter().enumerate() {
                let start = t + i as f64 * 0.08;
                if let Some((osc, gain)) = self.create_osc(ctx, freq, OscillatorType::Sine) {
                    gain.gain().set_value_at_time(0.0, t).ok();
                    gain.gain().set_value_at_time(vol * 0.25, start).ok();
                    gain.gain()
                        .exponential_ramp_to_value_at_time(0.01, start + 0.25)
                        .ok();
                    osc.start_with_when(start).ok();
                    osc.stop_with_when(start + 0.3).ok();
                }
            }
        }
    }
}
