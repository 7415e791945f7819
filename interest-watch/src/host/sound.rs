//! Sound output through an external player command.
//!
//! The tone is rendered once per distinct [`ToneSpec`] into a 16-bit PCM WAV
//! file in a temporary directory and handed to the player as its last argument.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use tempfile::TempDir;
use tokio::sync::Mutex;
use tracing::debug;

use process_utils::{command_from_argv, spawn_detached};
use crate::alert::{ChannelError, EngineState, SoundEngine, SoundEngineFactory, ToneSpec};

/// Encode mono `samples` in `[-1, 1]` as a 16-bit PCM WAV file.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Bytes {
    const CHANNELS: u16 = 1;
    const BITS: u16 = 16;
    let block_align = CHANNELS * BITS / 8;
    let data_len = (samples.len() * block_align as usize) as u32;

    let mut buf = BytesMut::with_capacity(44 + data_len as usize);
    buf.put_slice(b"RIFF");
    buf.put_u32_le(36 + data_len);
    buf.put_slice(b"WAVE");

    buf.put_slice(b"fmt ");
    buf.put_u32_le(16);
    buf.put_u16_le(1); // PCM
    buf.put_u16_le(CHANNELS);
    buf.put_u32_le(sample_rate);
    buf.put_u32_le(sample_rate * block_align as u32);
    buf.put_u16_le(block_align);
    buf.put_u16_le(BITS);

    buf.put_slice(b"data");
    buf.put_u32_le(data_len);
    for sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        buf.put_i16_le((clamped * i16::MAX as f32) as i16);
    }

    buf.freeze()
}

/// Plays rendered tones with a command such as `aplay -q`.
pub struct CommandSoundEngine {
    player: Vec<String>,
    sample_rate: u32,
    dir: TempDir,
    rendered: Mutex<Option<(ToneSpec, PathBuf)>>,
}

impl CommandSoundEngine {
    pub fn new(player: Vec<String>, sample_rate: u32) -> Result<Self, ChannelError> {
        if player.is_empty() {
            return Err(ChannelError::Unavailable("no sound player configured".to_string()));
        }
        let dir = tempfile::Builder::new()
            .prefix("interest-watch-")
            .tempdir()
            .map_err(|e| ChannelError::Failed(format!("failed to create tone directory: {}", e)))?;
        Ok(Self {
            player,
            sample_rate,
            dir,
            rendered: Mutex::new(None),
        })
    }

    /// Path of the WAV file for `tone`, rendering it if the tone changed.
    async fn tone_file(&self, tone: &ToneSpec) -> Result<PathBuf, ChannelError> {
        let mut rendered = self.rendered.lock().await;
        if let Some((cached, path)) = rendered.as_ref()
            && cached == tone
        {
            return Ok(path.clone());
        }

        let wav = encode_wav(&tone.render(self.sample_rate), self.sample_rate);
        let path = self.dir.path().join("alert.wav");
        tokio::fs::write(&path, &wav)
            .await
            .map_err(|e| ChannelError::Failed(format!("failed to write tone file: {}", e)))?;
        debug!(path = %path.display(), bytes = wav.len(), "Rendered alert tone");

        *rendered = Some((*tone, path.clone()));
        Ok(path)
    }
}

#[async_trait]
impl SoundEngine for CommandSoundEngine {
    fn state(&self) -> EngineState {
        EngineState::Running
    }

    async fn resume(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn play(&self, tone: &ToneSpec) -> Result<(), ChannelError> {
        let path = self.tone_file(tone).await?;
        let cmd = command_from_argv(&self.player, &[path.as_os_str()])?;
        spawn_detached(cmd, "sound player")?;
        Ok(())
    }
}

/// Creates a [`CommandSoundEngine`] on first use.
pub struct CommandSoundFactory {
    player: Vec<String>,
    sample_rate: u32,
}

impl CommandSoundFactory {
    pub fn new(player: Vec<String>, sample_rate: u32) -> Self {
        Self {
            player,
            sample_rate,
        }
    }
}

impl SoundEngineFactory for CommandSoundFactory {
    fn create(&self) -> Result<Arc<dyn SoundEngine>, ChannelError> {
        let engine = CommandSoundEngine::new(self.player.clone(), self.sample_rate)?;
        Ok(Arc::new(engine))
    }
}
