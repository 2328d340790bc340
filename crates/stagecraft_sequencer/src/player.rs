// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline playback.
//!
//! The [`TimelinePlayer`] owns the live timeline slot, the playback clock and
//! the transport state. The host calls [`TimelinePlayer::update`] once per
//! frame; every tick that advances time evaluates the active clips and hands
//! each frame to the registered listeners.

use crate::clip_data::AnimationFrame;
use crate::listeners::{ListenerId, Listeners};
use crate::sequence::Timeline;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Smallest allowed playback speed
pub const MIN_PLAYBACK_SPEED: f32 = 0.01;

/// Timeline shared between the player and the code that edits it
pub type SharedTimeline = Arc<RwLock<Timeline>>;

/// Player shared between the host tick and editing front-ends
pub type SharedPlayer = Arc<Mutex<TimelinePlayer>>;

/// Wrap a timeline for use as a player sequence
pub fn shared_timeline(timeline: Timeline) -> SharedTimeline {
    Arc::new(RwLock::new(timeline))
}

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    /// Not playing
    #[default]
    Stopped,
    /// Advancing with each update
    Playing,
    /// Halted, time kept
    Paused,
}

/// Event emitted by the player
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerEvent<'a> {
    /// Playback started
    TimelineStart,
    /// Playback paused
    TimelinePause,
    /// Playback stopped and rewound
    TimelineStop,
    /// Playback reached the end without looping
    TimelineComplete,
    /// Current time changed
    TimeUpdate(f32),
    /// A clip was evaluated for a target.
    ///
    /// The frame is only borrowed for the duration of the callback.
    AnimationEvaluate {
        /// Target driven by the clip
        target_id: i32,
        /// Evaluated values
        frame: &'a AnimationFrame,
    },
}

/// Callback receiving player events
pub type PlayerListener = dyn FnMut(&PlayerEvent<'_>) + Send;

/// Playback engine for one timeline at a time
pub struct TimelinePlayer {
    /// Live timeline
    sequence: Option<SharedTimeline>,
    /// Current playback time in seconds
    current_time: f32,
    /// Playback speed multiplier
    speed: f32,
    /// Playback state
    state: PlayState,
    /// Whether playback wraps at the end
    looping: bool,
    /// Registered listeners
    listeners: Listeners<PlayerListener>,
}

impl TimelinePlayer {
    /// Create a stopped player with no sequence
    pub fn new() -> Self {
        Self {
            sequence: None,
            current_time: 0.0,
            speed: 1.0,
            state: PlayState::Stopped,
            looping: false,
            listeners: Listeners::new(),
        }
    }

    /// Wrap the player for sharing
    pub fn into_shared(self) -> SharedPlayer {
        Arc::new(Mutex::new(self))
    }

    /// Register a listener
    pub fn subscribe(&mut self, listener: impl FnMut(&PlayerEvent<'_>) + Send + 'static) -> ListenerId {
        self.listeners.add(Box::new(listener))
    }

    /// Unregister a listener
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// The live timeline
    pub fn sequence(&self) -> Option<&SharedTimeline> {
        self.sequence.as_ref()
    }

    /// Replace the live timeline. Playback stops and rewinds to 0.
    ///
    /// Returns the previous timeline.
    pub fn set_sequence(&mut self, sequence: Option<SharedTimeline>) -> Option<SharedTimeline> {
        self.current_time = 0.0;
        self.state = PlayState::Stopped;
        std::mem::replace(&mut self.sequence, sequence)
    }

    /// Current playback time
    pub fn current_time(&self) -> f32 {
        self.current_time
    }

    /// Playback state
    pub fn state(&self) -> PlayState {
        self.state
    }

    /// Is currently playing
    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    /// Whether playback wraps at the end
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Enable or disable looping
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Playback speed multiplier
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Set the playback speed, clamped to [`MIN_PLAYBACK_SPEED`]
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed.max(MIN_PLAYBACK_SPEED);
    }

    /// Start playing from the current time
    pub fn play(&mut self) {
        if self.sequence.is_none() {
            return;
        }
        self.state = PlayState::Playing;
        tracing::info!("Timeline playback started at {:.3}s", self.current_time);
        self.emit(&PlayerEvent::TimelineStart);
    }

    /// Pause playback
    pub fn pause(&mut self) {
        self.state = PlayState::Paused;
        tracing::info!("Timeline playback paused at {:.3}s", self.current_time);
        self.emit(&PlayerEvent::TimelinePause);
    }

    /// Stop and rewind to 0
    pub fn stop(&mut self) {
        self.state = PlayState::Stopped;
        self.current_time = 0.0;
        tracing::info!("Timeline playback stopped");
        self.emit(&PlayerEvent::TimelineStop);
    }

    /// Jump to `time` and evaluate, in any state
    pub fn set_time(&mut self, time: f32) {
        let Some(sequence) = &self.sequence else {
            return;
        };
        let duration = sequence.read().duration();
        self.current_time = time.clamp(0.0, duration);
        self.emit(&PlayerEvent::TimeUpdate(self.current_time));
        self.evaluate();
    }

    /// Advance playback by `delta_time` seconds
    pub fn update(&mut self, delta_time: f32) {
        if self.state != PlayState::Playing {
            return;
        }
        let Some(sequence) = &self.sequence else {
            return;
        };
        let duration = sequence.read().duration();

        self.current_time += delta_time * self.speed;
        if self.current_time > duration {
            if self.looping {
                self.current_time = if duration > 0.0 {
                    self.current_time % duration
                } else {
                    0.0
                };
            } else {
                self.current_time = duration;
                self.state = PlayState::Stopped;
                tracing::info!("Timeline playback complete");
                self.emit(&PlayerEvent::TimelineComplete);
            }
        }

        self.emit(&PlayerEvent::TimeUpdate(self.current_time));
        self.evaluate();
    }

    /// Evaluate the active clips at the current time
    fn evaluate(&mut self) {
        let Some(sequence) = &self.sequence else {
            return;
        };
        let listeners = &mut self.listeners;
        sequence
            .write()
            .evaluate_active(self.current_time, |target_id, frame| {
                let event = PlayerEvent::AnimationEvaluate { target_id, frame };
                for listener in listeners.iter_mut() {
                    listener(&event);
                }
            });
    }

    fn emit(&mut self, event: &PlayerEvent<'_>) {
        for listener in self.listeners.iter_mut() {
            listener(event);
        }
    }
}

impl Default for TimelinePlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TimelinePlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelinePlayer")
            .field("has_sequence", &self.sequence.is_some())
            .field("current_time", &self.current_time)
            .field("speed", &self.speed)
            .field("state", &self.state)
            .field("looping", &self.looping)
            .field("listeners", &self.listeners)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip_data::{AnimationClipData, DataType};
    use crate::keyframe::Keyframe;

    /// Owned copy of a player event
    #[derive(Debug, Clone, PartialEq)]
    enum Recorded {
        Start,
        Pause,
        Stop,
        Complete,
        Time(f32),
        Frame(i32, f32),
    }

    fn record(player: &mut TimelinePlayer) -> Arc<Mutex<Vec<Recorded>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        player.subscribe(move |event| {
            let entry = match event {
                PlayerEvent::TimelineStart => Recorded::Start,
                PlayerEvent::TimelinePause => Recorded::Pause,
                PlayerEvent::TimelineStop => Recorded::Stop,
                PlayerEvent::TimelineComplete => Recorded::Complete,
                PlayerEvent::TimeUpdate(time) => Recorded::Time(*time),
                PlayerEvent::AnimationEvaluate { target_id, frame } => {
                    Recorded::Frame(*target_id, frame.properties[0].value)
                }
            };
            sink.lock().push(entry);
        });
        log
    }

    /// "T1": one camera track with a 5s pose clip keyed PositionX=5 at 2s
    fn scene() -> SharedTimeline {
        let mut timeline = Timeline::new("T1");
        let track = timeline.create_track("Camera 1", DataType::CameraPose).id;
        let mut data = AnimationClipData::new(DataType::CameraPose).unwrap();
        data.try_add_keyframe("PositionX", Keyframe::new(2.0, 5.0)).unwrap();
        timeline.add_clip(track, 0.0, data).unwrap();
        shared_timeline(timeline)
    }

    #[test]
    fn test_set_time_emits_single_frame() {
        let mut player = TimelinePlayer::new();
        player.set_sequence(Some(scene()));
        let log = record(&mut player);

        player.set_time(2.0);

        let log = log.lock();
        assert_eq!(*log, [Recorded::Time(2.0), Recorded::Frame(1, 5.0)]);
    }

    #[test]
    fn test_set_time_clamps() {
        let mut player = TimelinePlayer::new();
        player.set_sequence(Some(scene()));
        player.set_time(99.0);
        assert_eq!(player.current_time(), 5.0);
        player.set_time(-3.0);
        assert_eq!(player.current_time(), 0.0);
    }

    #[test]
    fn test_no_sequence_is_noop() {
        let mut player = TimelinePlayer::new();
        let log = record(&mut player);
        player.play();
        player.set_time(1.0);
        player.update(1.0);
        assert!(!player.is_playing());
        assert_eq!(player.current_time(), 0.0);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_transport_state_machine() {
        let mut player = TimelinePlayer::new();
        player.set_sequence(Some(scene()));
        let log = record(&mut player);

        player.play();
        assert_eq!(player.state(), PlayState::Playing);
        player.update(1.0);
        assert_eq!(player.current_time(), 1.0);

        player.pause();
        assert_eq!(player.state(), PlayState::Paused);
        player.update(1.0);
        assert_eq!(player.current_time(), 1.0);

        player.stop();
        assert_eq!(player.state(), PlayState::Stopped);
        assert_eq!(player.current_time(), 0.0);

        // Pause from stopped is allowed
        player.pause();
        assert_eq!(player.state(), PlayState::Paused);

        let log = log.lock();
        assert_eq!(log[0], Recorded::Start);
        assert_eq!(log[1], Recorded::Time(1.0));
        assert!(matches!(log[2], Recorded::Frame(1, _)));
        assert_eq!(log[3..], [Recorded::Pause, Recorded::Stop, Recorded::Pause]);
    }

    #[test]
    fn test_update_applies_speed() {
        let mut player = TimelinePlayer::new();
        player.set_sequence(Some(scene()));
        player.set_speed(2.0);
        player.play();
        player.update(1.0);
        assert_eq!(player.current_time(), 2.0);

        player.set_speed(0.0);
        assert_eq!(player.speed(), MIN_PLAYBACK_SPEED);
    }

    #[test]
    fn test_update_completes_at_end() {
        let mut player = TimelinePlayer::new();
        player.set_sequence(Some(scene()));
        let log = record(&mut player);
        player.play();
        player.update(6.0);

        assert_eq!(player.current_time(), 5.0);
        assert!(!player.is_playing());
        let log = log.lock();
        assert_eq!(log[1], Recorded::Complete);
        assert_eq!(log[2], Recorded::Time(5.0));
    }

    #[test]
    fn test_update_loops() {
        let mut player = TimelinePlayer::new();
        player.set_sequence(Some(scene()));
        player.set_looping(true);
        let log = record(&mut player);
        player.play();
        player.update(6.5);

        assert!(player.is_playing());
        assert!((player.current_time() - 1.5).abs() < 1e-5);
        assert!(!log.lock().contains(&Recorded::Complete));
    }

    #[test]
    fn test_set_sequence_rewinds_and_stops() {
        let mut player = TimelinePlayer::new();
        let first = scene();
        player.set_sequence(Some(first.clone()));
        player.play();
        player.update(1.0);

        let second = scene();
        let previous = player.set_sequence(Some(second.clone())).unwrap();
        assert!(Arc::ptr_eq(&previous, &first));
        assert!(Arc::ptr_eq(player.sequence().unwrap(), &second));
        assert_eq!(player.current_time(), 0.0);
        assert!(!player.is_playing());
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut player = TimelinePlayer::new();
        player.set_sequence(Some(scene()));
        let log = Arc::new(Mutex::new(0));
        let sink = log.clone();
        let id = player.subscribe(move |_| *sink.lock() += 1);
        player.set_time(1.0);
        assert!(player.unsubscribe(id));
        player.set_time(2.0);
        assert_eq!(*log.lock(), 2);
    }
}
