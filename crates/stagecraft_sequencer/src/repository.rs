// SPDX-License-Identifier: MIT OR Apache-2.0
//! Persistence boundaries for clip data and timelines.
//!
//! The sequencer never stores anything itself. Hosts provide implementations
//! of these traits; in-memory ones are included for tests and tooling.

use crate::clip_data::{AnimationClipData, DataType};
use crate::sequence::{Timeline, TimelineId};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::future::Future;
use uuid::Uuid;

/// Error from a repository operation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RepositoryError {
    /// Nothing stored under the id
    #[error("Not found: {0}")]
    NotFound(Uuid),

    /// Stored data has another type than requested
    #[error("Wrong data type: expected {expected:?}, found {found:?}")]
    WrongType {
        /// Requested type
        expected: DataType,
        /// Stored type
        found: DataType,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Summary of stored clip data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipDataInfo {
    /// Clip data ID
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Data type
    pub data_type: DataType,
}

impl From<&AnimationClipData> for ClipDataInfo {
    fn from(data: &AnimationClipData) -> Self {
        Self {
            id: data.id(),
            name: data.name().to_string(),
            data_type: data.data_type(),
        }
    }
}

/// Storage for animation clip data, keyed by clip data id
pub trait ClipDataRepository: Send + Sync {
    /// Load clip data
    fn load(&self, id: Uuid) -> impl Future<Output = Result<AnimationClipData, RepositoryError>> + Send;

    /// Store clip data under its own id
    fn save(&self, data: &AnimationClipData) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Summaries of every stored clip
    fn list(&self) -> impl Future<Output = Result<Vec<ClipDataInfo>, RepositoryError>> + Send;
}

/// Storage for whole timelines, keyed by timeline id
pub trait TimelineRepository: Send + Sync {
    /// Load a timeline. Clips come back without clip data attached.
    fn load(&self, id: TimelineId) -> impl Future<Output = Result<Timeline, RepositoryError>> + Send;

    /// Store a timeline under its own id
    fn save(&self, timeline: &Timeline) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Ids and names of every stored timeline
    fn list(&self) -> impl Future<Output = Result<Vec<(TimelineId, String)>, RepositoryError>> + Send;
}

/// Clip data repository kept in memory
#[derive(Debug, Default)]
pub struct InMemoryClipDataRepository {
    clips: RwLock<IndexMap<Uuid, AnimationClipData>>,
}

impl InMemoryClipDataRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Store clip data without going through the async interface
    pub fn insert(&self, data: AnimationClipData) {
        self.clips.write().insert(data.id(), data);
    }

    /// Get stored clip count
    pub fn len(&self) -> usize {
        self.clips.read().len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.clips.read().is_empty()
    }
}

impl ClipDataRepository for InMemoryClipDataRepository {
    async fn load(&self, id: Uuid) -> Result<AnimationClipData, RepositoryError> {
        self.clips
            .read()
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound(id))
    }

    async fn save(&self, data: &AnimationClipData) -> Result<(), RepositoryError> {
        self.clips.write().insert(data.id(), data.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ClipDataInfo>, RepositoryError> {
        Ok(self.clips.read().values().map(ClipDataInfo::from).collect())
    }
}

/// Timeline repository kept in memory
#[derive(Debug, Default)]
pub struct InMemoryTimelineRepository {
    timelines: RwLock<IndexMap<TimelineId, Timeline>>,
}

impl InMemoryTimelineRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimelineRepository for InMemoryTimelineRepository {
    async fn load(&self, id: TimelineId) -> Result<Timeline, RepositoryError> {
        let mut timeline = self
            .timelines
            .read()
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound(id.0))?;
        // Match what a serialized store hands back
        timeline.detach_clip_data();
        Ok(timeline)
    }

    async fn save(&self, timeline: &Timeline) -> Result<(), RepositoryError> {
        self.timelines.write().insert(timeline.id, timeline.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<(TimelineId, String)>, RepositoryError> {
        Ok(self
            .timelines
            .read()
            .values()
            .map(|t| (t.id, t.name.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clip_repository_round_trip() {
        let repo = InMemoryClipDataRepository::new();
        let data = AnimationClipData::new(DataType::CameraPose).unwrap();
        repo.save(&data).await.unwrap();

        let loaded = repo.load(data.id()).await.unwrap();
        assert_eq!(loaded.id(), data.id());
        assert_eq!(loaded.name(), data.name());

        let list = repo.list().await.unwrap();
        assert_eq!(list, [ClipDataInfo::from(&data)]);
    }

    #[tokio::test]
    async fn test_clip_repository_not_found() {
        let repo = InMemoryClipDataRepository::new();
        let id = Uuid::new_v4();
        assert_eq!(repo.load(id).await.unwrap_err(), RepositoryError::NotFound(id));
    }

    #[tokio::test]
    async fn test_timeline_repository_detaches_clip_data() {
        let repo = InMemoryTimelineRepository::new();
        let mut timeline = Timeline::new("Show");
        let track = timeline.create_track("Camera", DataType::CameraPose).id;
        let clip = timeline
            .add_clip(track, 0.0, AnimationClipData::new(DataType::CameraPose).unwrap())
            .unwrap()
            .id;
        repo.save(&timeline).await.unwrap();

        let loaded = repo.load(timeline.id).await.unwrap();
        assert!(loaded.clip(clip).unwrap().clip_data().is_none());
        assert_eq!(loaded.duration(), timeline.duration());
        assert_eq!(repo.list().await.unwrap(), [(timeline.id, "Show".to_string())]);
    }
}
