// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline clips and the tracks that hold them.

use crate::clip_data::{AnimationClipData, DataType};
use crate::ids::{ClipId, TrackId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Smallest allowed clip time scale
pub const MIN_TIME_SCALE: f32 = 0.01;

/// Placement of one clip data instance on a track
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineClip {
    /// Clip ID
    pub id: ClipId,
    /// ID of the placed clip data
    clip_data_id: Uuid,
    /// Type of the placed clip data
    data_type: DataType,
    /// Placed clip data; `None` until resolved after loading a timeline
    #[serde(skip)]
    clip_data: Option<AnimationClipData>,
    /// Entity driven by this clip's output
    target_id: i32,
    /// Start time in the timeline
    start_time: f32,
    /// Clip data duration, cached when the data is assigned
    duration: f32,
    /// Playback rate of the clip data
    #[serde(deserialize_with = "deserialize_time_scale")]
    time_scale: f32,
}

fn deserialize_time_scale<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
    let time_scale = f32::deserialize(deserializer)?;
    Ok(time_scale.max(MIN_TIME_SCALE))
}

impl TimelineClip {
    /// Create a clip for `clip_data`
    pub fn new(id: ClipId, clip_data: AnimationClipData, target_id: i32, start_time: f32) -> Self {
        Self {
            id,
            clip_data_id: clip_data.id(),
            data_type: clip_data.data_type(),
            duration: clip_data.duration(),
            clip_data: Some(clip_data),
            target_id,
            start_time: start_time.max(0.0),
            time_scale: 1.0,
        }
    }

    /// Type of the placed data
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// ID of the placed data
    pub fn clip_data_id(&self) -> Uuid {
        self.clip_data_id
    }

    /// The placed data, if resolved
    pub fn clip_data(&self) -> Option<&AnimationClipData> {
        self.clip_data.as_ref()
    }

    /// Mutable access to the placed data.
    ///
    /// Call [`TimelineClip::refresh_duration`] after edits that move keys.
    pub fn clip_data_mut(&mut self) -> Option<&mut AnimationClipData> {
        self.clip_data.as_mut()
    }

    /// Assign clip data, refreshing type, data id and duration
    pub fn set_clip_data(&mut self, clip_data: AnimationClipData) {
        self.clip_data_id = clip_data.id();
        self.data_type = clip_data.data_type();
        self.duration = clip_data.duration();
        self.clip_data = Some(clip_data);
    }

    /// Detach and return the placed data
    pub fn take_clip_data(&mut self) -> Option<AnimationClipData> {
        self.clip_data.take()
    }

    /// Recompute the cached duration from the placed data
    pub fn refresh_duration(&mut self) {
        if let Some(data) = &self.clip_data {
            self.duration = data.duration();
        }
    }

    /// Target entity
    pub fn target_id(&self) -> i32 {
        self.target_id
    }

    /// Retarget the clip without changing its timing
    pub fn set_target_id(&mut self, target_id: i32) {
        self.target_id = target_id;
    }

    /// Start time in the timeline
    pub fn start_time(&self) -> f32 {
        self.start_time
    }

    /// Move the clip. Negative times clamp to zero.
    pub fn set_start_time(&mut self, start_time: f32) {
        self.start_time = start_time.max(0.0);
    }

    /// Cached clip data duration
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Playback rate
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Set the playback rate, clamped to [`MIN_TIME_SCALE`]
    pub fn set_time_scale(&mut self, time_scale: f32) {
        self.time_scale = time_scale.max(MIN_TIME_SCALE);
    }

    /// End time in the timeline
    pub fn end_time(&self) -> f32 {
        self.start_time + self.duration / self.time_scale
    }

    /// Whether `time` falls within the clip, bounds included
    pub fn contains_time(&self, time: f32) -> bool {
        self.start_time <= time && time <= self.end_time()
    }

    /// Map a timeline time to clip data time.
    ///
    /// Returns -1 when `time` is outside the clip.
    pub fn local_time(&self, time: f32) -> f32 {
        if !self.contains_time(time) {
            return -1.0;
        }
        ((time - self.start_time) * self.time_scale).clamp(0.0, self.duration)
    }
}

/// A track of clips of one data type bound to one target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineTrack {
    /// Unique track ID
    pub id: TrackId,
    /// Track name
    pub name: String,
    /// Type of clips on this track
    data_type: DataType,
    /// Target every clip on this track drives
    target_id: i32,
    /// Clips in insertion order
    clips: Vec<TimelineClip>,
    /// Latest clip end time
    end_time: f32,
}

impl TimelineTrack {
    /// Create an empty track
    pub fn new(id: TrackId, name: impl Into<String>, data_type: DataType, target_id: i32) -> Self {
        Self {
            id,
            name: name.into(),
            data_type,
            target_id,
            clips: Vec::new(),
            end_time: 0.0,
        }
    }

    /// Type of clips on this track
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Target driven by this track
    pub fn target_id(&self) -> i32 {
        self.target_id
    }

    /// Latest clip end time, 0 when empty
    pub fn end_time(&self) -> f32 {
        self.end_time
    }

    /// Append a clip, retargeting it to this track.
    ///
    /// A clip whose type differs from the track type is handed back as `Err`.
    pub fn try_add_clip(&mut self, mut clip: TimelineClip) -> Result<(), TimelineClip> {
        if clip.data_type != self.data_type {
            return Err(clip);
        }
        clip.target_id = self.target_id;
        self.clips.push(clip);
        self.recalculate_end_time();
        Ok(())
    }

    /// Remove a clip by ID
    pub fn remove_clip(&mut self, clip_id: ClipId) -> Option<TimelineClip> {
        let index = self.clips.iter().position(|c| c.id == clip_id)?;
        let clip = self.clips.remove(index);
        self.recalculate_end_time();
        Some(clip)
    }

    /// Get a clip by ID
    pub fn clip(&self, clip_id: ClipId) -> Option<&TimelineClip> {
        self.clips.iter().find(|c| c.id == clip_id)
    }

    pub(crate) fn clip_mut(&mut self, clip_id: ClipId) -> Option<&mut TimelineClip> {
        self.clips.iter_mut().find(|c| c.id == clip_id)
    }

    pub(crate) fn clip_at_mut(&mut self, index: usize) -> Option<&mut TimelineClip> {
        self.clips.get_mut(index)
    }

    /// All clips in insertion order
    pub fn clips(&self) -> &[TimelineClip] {
        &self.clips
    }

    /// Get clip count
    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }

    /// Recompute the end time from the clips
    pub fn recalculate_end_time(&mut self) {
        self.end_time = self
            .clips
            .iter()
            .map(TimelineClip::end_time)
            .fold(0.0, f32::max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyframe::Keyframe;

    fn pose_data(duration: f32) -> AnimationClipData {
        let mut data = AnimationClipData::new(DataType::CameraPose).unwrap();
        data.try_add_keyframe("PositionX", Keyframe::new(duration, 1.0)).unwrap();
        data
    }

    #[test]
    fn test_local_time_mapping() {
        let mut clip = TimelineClip::new(1, pose_data(10.0), 1, 5.0);
        clip.set_time_scale(2.0);
        assert_eq!(clip.duration(), 10.0);
        assert_eq!(clip.end_time(), 10.0);
        assert_eq!(clip.local_time(5.0), 0.0);
        assert_eq!(clip.local_time(10.0), 10.0);
        assert_eq!(clip.local_time(7.5), 5.0);
        assert_eq!(clip.local_time(4.0), -1.0);
        assert_eq!(clip.local_time(11.0), -1.0);
    }

    #[test]
    fn test_contains_time_is_inclusive() {
        let clip = TimelineClip::new(1, pose_data(5.0), 1, 1.0);
        assert!(clip.contains_time(1.0));
        assert!(clip.contains_time(6.0));
        assert!(!clip.contains_time(6.01));
    }

    #[test]
    fn test_set_clip_data_refreshes_derived_fields() {
        let mut clip = TimelineClip::new(1, pose_data(5.0), 1, 0.0);
        let light = AnimationClipData::new(DataType::LightProperties).unwrap();
        let light_id = light.id();
        clip.set_clip_data(light);
        assert_eq!(clip.data_type(), DataType::LightProperties);
        assert_eq!(clip.clip_data_id(), light_id);
        assert_eq!(clip.duration(), 5.0);

        clip.set_clip_data(pose_data(9.0));
        assert_eq!(clip.duration(), 9.0);
    }

    #[test]
    fn test_time_scale_floor() {
        let mut clip = TimelineClip::new(1, pose_data(5.0), 1, 0.0);
        clip.set_time_scale(0.0);
        assert_eq!(clip.time_scale(), MIN_TIME_SCALE);
    }

    #[test]
    fn test_stored_time_scale_is_floored_on_load() {
        let stored = format!(
            "(id: 4, clip_data_id: \"{}\", data_type: CameraPose, target_id: 1, \
             start_time: 2.0, duration: 5.0, time_scale: 0.0)",
            Uuid::new_v4()
        );
        let clip: TimelineClip = ron::from_str(&stored).unwrap();
        assert_eq!(clip.time_scale(), MIN_TIME_SCALE);
        assert!(clip.end_time().is_finite());
        assert_eq!(clip.local_time(2.0), 0.0);
    }

    #[test]
    fn test_track_rejects_type_mismatch() {
        let mut track = TimelineTrack::new(1, "Light 1", DataType::LightProperties, 1);
        let clip = TimelineClip::new(7, pose_data(5.0), 3, 0.0);
        let rejected = track.try_add_clip(clip).unwrap_err();
        assert_eq!(rejected.id, 7);
        assert_eq!(track.clip_count(), 0);
    }

    #[test]
    fn test_track_retargets_and_tracks_end_time() {
        let mut track = TimelineTrack::new(1, "Camera 2", DataType::CameraPose, 2);
        assert_eq!(track.end_time(), 0.0);

        track.try_add_clip(TimelineClip::new(1, pose_data(5.0), 9, 0.0)).unwrap();
        track.try_add_clip(TimelineClip::new(2, pose_data(5.0), 9, 10.0)).unwrap();
        assert!(track.clips().iter().all(|c| c.target_id() == 2));
        assert_eq!(track.end_time(), 15.0);

        assert!(track.remove_clip(2).is_some());
        assert_eq!(track.end_time(), 5.0);
        assert!(track.remove_clip(2).is_none());
    }
}
