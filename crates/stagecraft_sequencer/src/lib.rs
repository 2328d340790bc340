// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline sequencer for Stagecraft.
//!
//! This crate animates stage objects over time:
//! - Camera pose tracks
//! - Light pose tracks
//! - Light property tracks (color, intensity, range)
//!
//! ## Architecture
//!
//! The sequencer is built on:
//! - Keyframe curves with clamped linear interpolation
//! - Typed clip data evaluated into reusable frames
//! - Timelines of tracks holding time-placed, time-scaled clips
//! - A playback state machine that emits evaluated frames to listeners
//! - An editor that previews one clip in isolation on the live player
//! - Repository traits for persistence, implemented by the host

pub mod clip_data;
pub mod editor;
pub mod ids;
pub mod keyframe;
pub mod listeners;
pub mod player;
pub mod repository;
pub mod sequence;
pub mod track;

pub use clip_data::{
    AnimationClipData, AnimationFrame, ClipDataError, DataType, FrameProperty,
    LightPropertiesAnimation, PoseAnimation, PropertyInfo, DEFAULT_CLIP_DURATION,
};
pub use editor::{EditorError, EditorEvent, EditorListener, KeyframeAnimationEditor};
pub use ids::{ClipId, IdAllocator, TrackId};
pub use keyframe::{CurveError, Keyframe, KeyframeCurve, KeyframeRef};
pub use listeners::{ListenerId, Listeners};
pub use player::{
    shared_timeline, PlayState, PlayerEvent, PlayerListener, SharedPlayer, SharedTimeline,
    TimelinePlayer,
};
pub use repository::{
    ClipDataInfo, ClipDataRepository, InMemoryClipDataRepository, InMemoryTimelineRepository,
    RepositoryError, TimelineRepository,
};
pub use sequence::{Timeline, TimelineError, TimelineId};
pub use track::{TimelineClip, TimelineTrack};
