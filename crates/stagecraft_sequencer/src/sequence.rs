// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline containing tracks of clips.

use crate::clip_data::{AnimationClipData, AnimationFrame, DataType};
use crate::ids::{ClipId, IdAllocator, TrackId};
use crate::track::{TimelineClip, TimelineTrack};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimelineId(pub Uuid);

impl TimelineId {
    /// Create a new random timeline ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TimelineId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TimelineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Error from a timeline edit
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimelineError {
    /// Track not found
    #[error("Track not found: {0}")]
    TrackNotFound(TrackId),

    /// Clip not found
    #[error("Clip not found: {0}")]
    ClipNotFound(ClipId),

    /// Clip type does not match the track type
    #[error("Clip type {clip:?} does not match track type {track:?}")]
    TypeMismatch {
        /// Track data type
        track: DataType,
        /// Clip data type
        clip: DataType,
    },
}

/// Position of an active clip, reused between evaluations
#[derive(Debug, Clone, Copy)]
struct ClipSlot {
    track_index: usize,
    clip_index: usize,
}

/// A named sequence of tracks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeline {
    /// Unique timeline ID
    pub id: TimelineId,
    /// Timeline name
    pub name: String,
    /// Tracks in creation order
    tracks: IndexMap<TrackId, TimelineTrack>,
    /// Latest track end time
    duration: f32,
    /// Source of track and clip ids
    #[serde(skip)]
    ids: IdAllocator,
    /// Scratch map for active clip lookup, keyed by (type, target)
    #[serde(skip)]
    active: IndexMap<(DataType, i32), ClipSlot>,
}

impl Timeline {
    /// Create an empty timeline with its own id allocator
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_ids(name, IdAllocator::new())
    }

    /// Create an empty timeline drawing ids from `ids`
    pub fn with_ids(name: impl Into<String>, ids: IdAllocator) -> Self {
        Self {
            id: TimelineId::new(),
            name: name.into(),
            tracks: IndexMap::new(),
            duration: 0.0,
            ids,
            active: IndexMap::new(),
        }
    }

    /// Switch to another id allocator, advancing it past the ids in use.
    ///
    /// Used after deserializing, where the timeline starts with a fresh
    /// allocator.
    pub fn set_ids(&mut self, ids: IdAllocator) {
        self.ids = ids;
        self.sync_allocator();
    }

    /// Advance the allocator past every track and clip id in the timeline
    pub fn sync_allocator(&self) {
        let max_track = self.tracks.keys().copied().max().unwrap_or(0);
        let max_clip = self
            .tracks
            .values()
            .flat_map(|t| t.clips().iter().map(|c| c.id))
            .max()
            .unwrap_or(0);
        self.ids.reserve_past(max_track, max_clip);
    }

    /// Smallest positive target id not used by a track of `data_type`
    pub fn next_target_id(&self, data_type: DataType) -> i32 {
        let mut taken: Vec<i32> = self
            .tracks
            .values()
            .filter(|t| t.data_type() == data_type)
            .map(TimelineTrack::target_id)
            .collect();
        taken.sort_unstable();

        let mut candidate = 1;
        for target in taken {
            if target == candidate {
                candidate += 1;
            } else if target > candidate {
                break;
            }
        }
        candidate
    }

    /// Create a track of `data_type`, reusing the lowest free target id
    pub fn create_track(&mut self, name: impl Into<String>, data_type: DataType) -> &TimelineTrack {
        let target_id = self.next_target_id(data_type);
        let id = self.ids.next_track_id();
        let track = TimelineTrack::new(id, name, data_type, target_id);
        tracing::debug!(
            "Created {:?} track {} ('{}') targeting {}",
            data_type,
            id,
            track.name,
            target_id
        );
        self.tracks.insert(id, track);
        self.recalculate_duration();
        &self.tracks[&id]
    }

    /// Remove a track and its clips
    pub fn remove_track(&mut self, track_id: TrackId) -> bool {
        let removed = self.tracks.shift_remove(&track_id).is_some();
        if removed {
            tracing::debug!("Removed track {}", track_id);
        }
        self.recalculate_duration();
        removed
    }

    /// Get a track
    pub fn track(&self, track_id: TrackId) -> Option<&TimelineTrack> {
        self.tracks.get(&track_id)
    }

    /// Get all tracks in creation order
    pub fn tracks(&self) -> impl Iterator<Item = &TimelineTrack> {
        self.tracks.values()
    }

    /// Get track count
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Place clip data on a track
    pub fn add_clip(
        &mut self,
        track_id: TrackId,
        start_time: f32,
        clip_data: AnimationClipData,
    ) -> Result<&TimelineClip, TimelineError> {
        let track = self
            .tracks
            .get_mut(&track_id)
            .ok_or(TimelineError::TrackNotFound(track_id))?;

        let clip = TimelineClip::new(self.ids.next_clip_id(), clip_data, track.target_id(), start_time);
        if let Err(rejected) = track.try_add_clip(clip) {
            tracing::warn!(
                "Rejected {:?} clip on {:?} track {}",
                rejected.data_type(),
                track.data_type(),
                track_id
            );
            return Err(TimelineError::TypeMismatch {
                track: track.data_type(),
                clip: rejected.data_type(),
            });
        }
        self.recalculate_duration();

        let track = &self.tracks[&track_id];
        let clip = &track.clips()[track.clip_count() - 1];
        tracing::debug!("Added clip {} to track {} at {}s", clip.id, track_id, start_time);
        Ok(clip)
    }

    /// Remove a clip from a track
    pub fn remove_clip(
        &mut self,
        track_id: TrackId,
        clip_id: ClipId,
    ) -> Result<TimelineClip, TimelineError> {
        let track = self
            .tracks
            .get_mut(&track_id)
            .ok_or(TimelineError::TrackNotFound(track_id))?;
        let clip = track
            .remove_clip(clip_id)
            .ok_or(TimelineError::ClipNotFound(clip_id))?;
        self.recalculate_duration();
        tracing::debug!("Removed clip {} from track {}", clip_id, track_id);
        Ok(clip)
    }

    /// Move a clip to `new_start_time`, and to another track when
    /// `new_track_id` differs from `old_track_id`.
    ///
    /// A clip moved to another track takes that track's target id. Nothing is
    /// changed when a track or the clip is missing or the types differ.
    pub fn update_clip(
        &mut self,
        clip_id: ClipId,
        new_start_time: f32,
        new_track_id: TrackId,
        old_track_id: TrackId,
    ) -> Result<(), TimelineError> {
        let old_track = self
            .tracks
            .get(&old_track_id)
            .ok_or(TimelineError::TrackNotFound(old_track_id))?;
        let clip = old_track
            .clip(clip_id)
            .ok_or(TimelineError::ClipNotFound(clip_id))?;

        if new_track_id == old_track_id {
            if let Some(clip) = self
                .tracks
                .get_mut(&old_track_id)
                .and_then(|t| t.clip_mut(clip_id))
            {
                clip.set_start_time(new_start_time);
            }
            self.refresh_track(old_track_id);
            return Ok(());
        }

        let new_track = self
            .tracks
            .get(&new_track_id)
            .ok_or(TimelineError::TrackNotFound(new_track_id))?;
        if new_track.data_type() != clip.data_type() {
            return Err(TimelineError::TypeMismatch {
                track: new_track.data_type(),
                clip: clip.data_type(),
            });
        }

        let mut clip = self
            .tracks
            .get_mut(&old_track_id)
            .and_then(|t| t.remove_clip(clip_id))
            .ok_or(TimelineError::ClipNotFound(clip_id))?;
        clip.set_start_time(new_start_time);
        let new_track = self
            .tracks
            .get_mut(&new_track_id)
            .ok_or(TimelineError::TrackNotFound(new_track_id))?;
        let track_type = new_track.data_type();
        // Types were checked above
        new_track
            .try_add_clip(clip)
            .map_err(|rejected| TimelineError::TypeMismatch {
                track: track_type,
                clip: rejected.data_type(),
            })?;
        self.recalculate_duration();
        tracing::debug!(
            "Moved clip {} from track {} to track {} at {}s",
            clip_id,
            old_track_id,
            new_track_id,
            new_start_time
        );
        Ok(())
    }

    /// Find a clip on any track
    pub fn clip(&self, clip_id: ClipId) -> Option<&TimelineClip> {
        self.tracks.values().find_map(|t| t.clip(clip_id))
    }

    /// Find the track holding a clip
    pub fn track_of_clip(&self, clip_id: ClipId) -> Option<TrackId> {
        self.tracks
            .values()
            .find(|t| t.clip(clip_id).is_some())
            .map(|t| t.id)
    }

    /// Edit a clip in place, then refresh its duration and the timeline
    /// duration.
    pub fn with_clip_mut<R>(
        &mut self,
        clip_id: ClipId,
        edit: impl FnOnce(&mut TimelineClip) -> R,
    ) -> Option<R> {
        let track_id = self.track_of_clip(clip_id)?;
        let clip = self.tracks.get_mut(&track_id)?.clip_mut(clip_id)?;
        let result = edit(clip);
        clip.refresh_duration();
        self.refresh_track(track_id);
        Some(result)
    }

    fn refresh_track(&mut self, track_id: TrackId) {
        if let Some(track) = self.tracks.get_mut(&track_id) {
            track.recalculate_end_time();
        }
        self.recalculate_duration();
    }

    /// Latest track end time, 0 when empty
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Recompute the duration from the tracks
    pub fn recalculate_duration(&mut self) {
        self.duration = self
            .tracks
            .values()
            .map(TimelineTrack::end_time)
            .fold(0.0, f32::max);
    }

    fn collect_active(&mut self, time: f32) {
        self.active.clear();
        for (track_index, track) in self.tracks.values().enumerate() {
            for (clip_index, clip) in track.clips().iter().enumerate() {
                if clip.contains_time(time) {
                    // Later tracks/clips overwrite earlier ones for the same key
                    self.active.insert(
                        (clip.data_type(), clip.target_id()),
                        ClipSlot {
                            track_index,
                            clip_index,
                        },
                    );
                }
            }
        }
    }

    /// Clips containing `time`, one per (type, target).
    ///
    /// When several clips share a type and target, the one met last in track
    /// order wins.
    pub fn active_clips_at_time(&mut self, time: f32) -> impl Iterator<Item = &TimelineClip> + '_ {
        self.collect_active(time);
        let tracks = &self.tracks;
        self.active.values().filter_map(move |slot| {
            tracks
                .get_index(slot.track_index)
                .and_then(|(_, t)| t.clips().get(slot.clip_index))
        })
    }

    /// Evaluate every active clip at `time`, handing each frame to `emit`
    /// with the clip's target id. Returns the number of frames emitted.
    pub fn evaluate_active(
        &mut self,
        time: f32,
        mut emit: impl FnMut(i32, &AnimationFrame),
    ) -> usize {
        self.collect_active(time);
        let active = std::mem::take(&mut self.active);

        let mut emitted = 0;
        for slot in active.values() {
            let Some(clip) = self
                .tracks
                .get_index_mut(slot.track_index)
                .and_then(|(_, t)| t.clip_at_mut(slot.clip_index))
            else {
                continue;
            };
            let local_time = clip.local_time(time);
            if local_time < 0.0 {
                continue;
            }
            let target_id = clip.target_id();
            if let Some(data) = clip.clip_data_mut() {
                emit(target_id, data.evaluate(local_time));
                emitted += 1;
            }
        }

        self.active = active;
        emitted
    }

    /// IDs of all placed clip data, deduplicated, in placement order
    pub fn clip_data_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = Vec::new();
        for clip in self.tracks.values().flat_map(TimelineTrack::clips) {
            if !ids.contains(&clip.clip_data_id()) {
                ids.push(clip.clip_data_id());
            }
        }
        ids
    }

    /// Give loaded clip data to every unresolved clip that references it.
    ///
    /// Returns the number of clips resolved.
    pub fn attach_clip_data(&mut self, data: &AnimationClipData) -> usize {
        let mut resolved = 0;
        for track in self.tracks.values_mut() {
            for index in 0..track.clip_count() {
                if let Some(clip) = track.clip_at_mut(index) {
                    if clip.clip_data().is_none() && clip.clip_data_id() == data.id() {
                        clip.set_clip_data(data.clone());
                        resolved += 1;
                    }
                }
            }
            track.recalculate_end_time();
        }
        self.recalculate_duration();
        resolved
    }

    /// Take the clip data out of every clip, leaving only data ids.
    pub fn detach_clip_data(&mut self) -> Vec<AnimationClipData> {
        let mut detached = Vec::new();
        for track in self.tracks.values_mut() {
            for index in 0..track.clip_count() {
                if let Some(data) = track.clip_at_mut(index).and_then(TimelineClip::take_clip_data) {
                    detached.push(data);
                }
            }
        }
        detached
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new("Untitled Timeline")
    }
}
