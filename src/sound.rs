use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use crate::config::SoundConfig;
use crate::error::AppResult;

pub trait AudioClip {
    fn rewind(&mut self);
    fn play(&mut self) -> AppResult<()>;
    fn set_volume(&mut self, volume: f32);
    fn set_playback_rate(&mut self, rate: f32);
}

/// Clip for hosts without audio output. Playback only traces.
#[derive(Debug, Clone)]
pub struct NullClip {
    asset: PathBuf,
    volume: f32,
    rate: f32,
}

impl NullClip {
    pub fn new(asset: impl AsRef<Path>) -> Self {
        Self {
            asset: asset.as_ref().to_path_buf(),
            volume: 1.0,
            rate: 1.0,
        }
    }
}

impl AudioClip for NullClip {
    fn rewind(&mut self) {}

    fn play(&mut self) -> AppResult<()> {
        trace!(
            asset = %self.asset.display(),
            volume = self.volume,
            rate = self.rate,
            "flip sound"
        );
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    fn set_playback_rate(&mut self, rate: f32) {
        self.rate = rate;
    }
}

/// Audio feedback for a completed page turn.
pub trait FlipSound {
    fn play_flip_sound(&mut self);
}

/// Plays a random page-turn clip, never the same one twice in a row.
pub struct SoundPlayer<C, R = StdRng> {
    clips: Vec<C>,
    last: Option<usize>,
    volume: f32,
    rng: R,
}

impl SoundPlayer<NullClip> {
    pub fn silent(config: &SoundConfig) -> Self {
        let clips = config.assets.iter().map(NullClip::new).collect();
        Self::with_rng(clips, config, StdRng::from_entropy())
    }
}

impl<C: AudioClip, R: Rng> SoundPlayer<C, R> {
    pub fn with_rng(clips: Vec<C>, config: &SoundConfig, rng: R) -> Self {
        let mut player = Self {
            clips,
            last: None,
            volume: 0.0,
            rng,
        };
        for clip in &mut player.clips {
            clip.set_playback_rate(config.playback_rate);
        }
        player.set_volume(config.volume);
        player
    }

    pub fn play_flip_sound(&mut self) {
        let Some(index) = self.pick() else {
            return;
        };
        self.last = Some(index);
        let clip = &mut self.clips[index];
        clip.rewind();
        if let Err(err) = clip.play() {
            debug!(clip = index, error = %err, "flip sound playback rejected");
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            0.0
        };
        for clip in &mut self.clips {
            clip.set_volume(self.volume);
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn last_index(&self) -> Option<usize> {
        self.last
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    fn pick(&mut self) -> Option<usize> {
        match (self.clips.len(), self.last) {
            (0, _) => None,
            (1, _) => Some(0),
            (len, None) => Some(self.rng.gen_range(0..len)),
            (len, Some(last)) => {
                // Draw from the other len - 1 clips, skipping over `last`.
                let index = self.rng.gen_range(0..len - 1);
                Some(if index >= last { index + 1 } else { index })
            }
        }
    }
}

impl<C: AudioClip, R: Rng> FlipSound for SoundPlayer<C, R> {
    fn play_flip_sound(&mut self) {
        SoundPlayer::play_flip_sound(self);
    }
}
