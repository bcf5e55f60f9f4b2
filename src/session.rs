//! Per-participant live state: role, current song, the local pitch pipeline
//! and the last pitch heard from a remote participant.
//!
//! The session never talks to a network itself. Outbound traffic goes through
//! a [`Transport`]; inbound traffic is fed in with [`Session::handle_event`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::compare::{ComparisonResult, LiveComparator};
use crate::config::{Config, SongDelays};
use crate::error::Result;
use crate::pitch::{DetectorConfig, FrameBuffer, PitchDetector, PitchSmoother};
use crate::reference::ReferenceTrack;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Leader,
    Follower,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackAction {
    Play,
    Pause,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemotePitch {
    pub user: String,
    pub hz: f64,
}

/// Messages exchanged with other participants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum WireEvent {
    PitchData(RemotePitch),
    SelectSong(String),
    MusicControl { action: PlaybackAction, from: String },
}

/// Outbound side of the real-time link between participants.
pub trait Transport {
    fn send(&mut self, event: WireEvent);
}

/// What an inbound event means for the caller's playback/UI layer.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionUpdate {
    /// Display-only; local state is untouched.
    RemotePitch(RemotePitch),
    /// Another participant picked a song; load its audio and reference.
    SongSelected(String),
    Playback(PlaybackAction),
    /// Our own control message echoed back.
    Ignored,
}

/// Admits at most `rate` ticks per second on a caller-supplied clock.
#[derive(Clone, Debug)]
pub struct TickLimiter {
    interval: Duration,
    last: Option<Duration>,
}

impl TickLimiter {
    pub fn new(rate_hz: f64) -> Self {
        let interval = if rate_hz.is_finite() && rate_hz > 0.0 {
            Duration::from_secs_f64(1.0 / rate_hz)
        } else {
            Duration::ZERO
        };
        Self {
            interval,
            last: None,
        }
    }

    pub fn ready(&mut self, now: Duration) -> bool {
        match self.last {
            Some(last) if now.saturating_sub(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

struct Input {
    buffer: FrameBuffer,
    detector: PitchDetector,
    /// Samples received since the last detection.
    pending: usize,
}

pub struct Session<T: Transport> {
    user: String,
    role: Role,
    transport: T,
    frame_size: usize,
    detector_config: DetectorConfig,
    smoother: PitchSmoother,
    input: Option<Input>,
    live_hz: Option<f64>,
    comparator: LiveComparator,
    delays: SongDelays,
    current_song: Option<String>,
    remote: Option<RemotePitch>,
    leader_start_delay: Duration,
    display: TickLimiter,
}

impl<T: Transport> Session<T> {
    pub fn new(user: impl Into<String>, role: Role, config: &Config, transport: T) -> Result<Self> {
        config.validate()?;
        let smoother = PitchSmoother::new(config.live.smoother())?;
        let comparator =
            LiveComparator::new(config.comparator.interpolation(), config.comparator.scoring())?;
        Ok(Self {
            user: user.into(),
            role,
            transport,
            frame_size: config.live.frame_size,
            detector_config: config.live.detector(),
            smoother,
            input: None,
            live_hz: None,
            comparator,
            delays: config.delays.clone(),
            current_song: None,
            remote: None,
            leader_start_delay: config.session.leader_start_delay(),
            display: TickLimiter::new(config.session.display_rate_hz),
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn current_song(&self) -> Option<&str> {
        self.current_song.as_deref()
    }

    pub fn remote_pitch(&self) -> Option<&RemotePitch> {
        self.remote.as_ref()
    }

    pub fn live_hz(&self) -> Option<f64> {
        self.live_hz
    }

    pub fn has_reference(&self) -> bool {
        self.comparator.track().is_some()
    }

    /// How long to wait between "play" and actually starting the audio.
    pub fn playback_delay(&self) -> Duration {
        match self.role {
            Role::Leader => self.leader_start_delay,
            Role::Follower => Duration::ZERO,
        }
    }

    pub fn is_input_active(&self) -> bool {
        self.input.is_some()
    }

    /// Opens the live pipeline for a capture source at `sample_rate`.
    pub fn start_input(&mut self, sample_rate: u32) -> Result<()> {
        let buffer = FrameBuffer::new(self.frame_size, sample_rate)?;
        let detector = PitchDetector::new(self.detector_config.clone())?;
        self.input = Some(Input {
            buffer,
            detector,
            pending: 0,
        });
        self.smoother.reset();
        self.live_hz = None;
        log::debug!("{}: input started at {}Hz", self.user, sample_rate);
        Ok(())
    }

    pub fn stop_input(&mut self) {
        self.input = None;
        self.smoother.reset();
        self.live_hz = None;
        log::debug!("{}: input stopped", self.user);
    }

    /// Feeds one capture block. A detection runs once per `frame_size` new
    /// samples over the latest window, and a voiced result is broadcast.
    /// Returns the current smoothed pitch.
    pub fn push_samples(&mut self, block: &[f32]) -> Option<f64> {
        let input = self.input.as_mut()?;
        input.buffer.push(block);
        input.pending += block.len();
        if input.pending < self.frame_size {
            return self.live_hz;
        }
        let frame = input.buffer.frame()?;
        input.pending %= self.frame_size;
        let estimate = input.detector.detect_frame(&frame);

        self.live_hz = self.smoother.update(estimate.hz);
        if let Some(hz) = self.live_hz {
            self.transport.send(WireEvent::PitchData(RemotePitch {
                user: self.user.clone(),
                hz,
            }));
        }
        self.live_hz
    }

    /// Switches to `song`. A missing reference is fine: comparison then
    /// reports no expected pitch.
    pub fn load_song(&mut self, song: &str, reference: Option<Arc<ReferenceTrack>>) {
        let offset = self.delays.offset_for(song);
        match reference {
            Some(track) => self.comparator.load(track, offset),
            None => {
                log::warn!("{}: no reference for {}, comparison disabled", self.user, song);
                self.comparator.unload();
            }
        }
        self.current_song = Some(song.to_string());
        self.smoother.reset();
        self.live_hz = None;
        self.display.reset();
    }

    /// Leader-side song pick: load locally and tell the others.
    pub fn select_song(&mut self, song: &str, reference: Option<Arc<ReferenceTrack>>) {
        self.load_song(song, reference);
        self.transport.send(WireEvent::SelectSong(song.to_string()));
    }

    pub fn send_control(&mut self, action: PlaybackAction) {
        self.transport.send(WireEvent::MusicControl {
            action,
            from: self.user.clone(),
        });
    }

    pub fn handle_event(&mut self, event: WireEvent) -> SessionUpdate {
        match event {
            WireEvent::PitchData(pitch) => {
                self.remote = Some(pitch.clone());
                SessionUpdate::RemotePitch(pitch)
            }
            WireEvent::SelectSong(song) => {
                log::debug!("{}: song selected remotely: {}", self.user, song);
                SessionUpdate::SongSelected(song)
            }
            WireEvent::MusicControl { from, .. } if from == self.user => SessionUpdate::Ignored,
            WireEvent::MusicControl { action, from } => {
                log::debug!("{}: {:?} from {}", self.user, action, from);
                SessionUpdate::Playback(action)
            }
        }
    }

    /// Scores the current live pitch at transport time `t`.
    pub fn compare(&mut self, t: f64) -> ComparisonResult {
        self.comparator.compare(t, self.live_hz)
    }

    /// Like [`Session::compare`] but rate-limited on the display clock `now`.
    pub fn display_tick(&mut self, now: Duration, t: f64) -> Option<ComparisonResult> {
        if !self.display.ready(now) {
            return None;
        }
        Some(self.compare(t))
    }
}
