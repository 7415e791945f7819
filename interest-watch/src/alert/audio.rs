//! Audio channel: the alarm tone and the shared sound engine.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::ChannelError;

/// Oscillator waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Waveform {
    Sine,
    Square,
    Triangle,
    #[default]
    Sawtooth,
}

impl Waveform {
    /// Amplitude in `[-1, 1]` at `phase` in `[0, 1)`.
    pub fn sample(&self, phase: f32) -> f32 {
        match self {
            Self::Sine => (phase * std::f32::consts::TAU).sin(),
            Self::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Self::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Self::Sawtooth => 2.0 * phase - 1.0,
        }
    }
}

/// A siren-like tone: rises from `start_hz` to `peak_hz`, falls back, then
/// holds `start_hz` until `duration_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneSpec {
    pub waveform: Waveform,
    pub start_hz: f32,
    pub peak_hz: f32,
    pub rise_secs: f32,
    pub fall_secs: f32,
    pub duration_secs: f32,
    /// Output gain in `[0, 1]`.
    pub gain: f32,
}

impl Default for ToneSpec {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sawtooth,
            start_hz: 440.0,
            peak_hz: 880.0,
            rise_secs: 0.5,
            fall_secs: 0.5,
            duration_secs: 2.0,
            gain: 0.5,
        }
    }
}

impl ToneSpec {
    /// Check that the parameters describe a playable tone.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.start_hz > 0.0 && self.peak_hz > 0.0) {
            return Err("tone frequencies must be positive".to_string());
        }
        if !(self.duration_secs > 0.0) {
            return Err("tone duration must be positive".to_string());
        }
        if self.rise_secs < 0.0 || self.fall_secs < 0.0 {
            return Err("tone ramps must not be negative".to_string());
        }
        if self.rise_secs + self.fall_secs > self.duration_secs {
            return Err("tone ramps exceed the tone duration".to_string());
        }
        if !(0.0..=1.0).contains(&self.gain) {
            return Err("tone gain must be within [0, 1]".to_string());
        }
        Ok(())
    }

    /// Instantaneous frequency at `t` seconds.
    pub fn frequency_at(&self, t: f32) -> f32 {
        if t <= 0.0 {
            return self.start_hz;
        }
        if t < self.rise_secs {
            return self.start_hz + (self.peak_hz - self.start_hz) * (t / self.rise_secs);
        }
        let falling = t - self.rise_secs;
        if falling < self.fall_secs {
            return self.peak_hz + (self.start_hz - self.peak_hz) * (falling / self.fall_secs);
        }
        self.start_hz
    }

    /// Render mono samples in `[-gain, gain]`.
    pub fn render(&self, sample_rate: u32) -> Vec<f32> {
        let rate = sample_rate as f32;
        let total = (self.duration_secs * rate).round() as usize;
        let mut samples = Vec::with_capacity(total);
        let mut phase = 0.0f32;

        for i in 0..total {
            let t = i as f32 / rate;
            samples.push(self.waveform.sample(phase) * self.gain);
            phase = (phase + self.frequency_at(t) / rate).fract();
        }

        samples
    }
}

/// Playback state of a sound engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Running,
    /// Output is blocked until resumed, e.g. before any user interaction.
    Suspended,
}

/// A platform sound output.
#[async_trait]
pub trait SoundEngine: Send + Sync {
    fn state(&self) -> EngineState;

    /// Leave the suspended state.
    async fn resume(&self) -> Result<(), ChannelError>;

    /// Start playing `tone`. Returns once playback has started.
    async fn play(&self, tone: &ToneSpec) -> Result<(), ChannelError>;
}

/// Constructs the sound engine on first use.
pub trait SoundEngineFactory: Send + Sync {
    fn create(&self) -> Result<Arc<dyn SoundEngine>, ChannelError>;
}

/// The process-wide sound engine, created lazily and reused for every alert.
pub struct SharedSoundEngine {
    factory: Arc<dyn SoundEngineFactory>,
    engine: OnceCell<Arc<dyn SoundEngine>>,
}

impl SharedSoundEngine {
    pub fn new(factory: Arc<dyn SoundEngineFactory>) -> Self {
        Self {
            factory,
            engine: OnceCell::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.initialized()
    }

    /// Get the engine, creating it on first call and resuming it when
    /// suspended.
    pub async fn ready(&self) -> Result<Arc<dyn SoundEngine>, ChannelError> {
        let engine = self
            .engine
            .get_or_try_init(|| async {
                let engine = self.factory.create()?;
                info!("Sound engine created");
                Ok::<_, ChannelError>(engine)
            })
            .await?
            .clone();

        if engine.state() == EngineState::Suspended {
            debug!("Sound engine suspended, resuming");
            engine
                .resume()
                .await
                .map_err(|e| ChannelError::Failed(format!("sound engine resume failed: {}", e)))?;
        }

        Ok(engine)
    }

    /// Play `tone` on the shared engine.
    pub async fn play(&self, tone: &ToneSpec) -> Result<(), ChannelError> {
        self.ready().await?.play(tone).await
    }
}
