// SPDX-License-Identifier: MIT OR Apache-2.0
//! File-backed repositories.
//!
//! Each record is one RON file named `<uuid>.ron` inside the repository
//! directory.

use stagecraft_sequencer::{
    AnimationClipData, ClipDataInfo, ClipDataRepository, RepositoryError, Timeline, TimelineId,
    TimelineRepository,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const RECORD_EXTENSION: &str = "ron";

fn record_path(dir: &Path, id: Uuid) -> PathBuf {
    dir.join(format!("{id}.{RECORD_EXTENSION}"))
}

async fn read_record<T: DeserializeOwned>(dir: &Path, id: Uuid) -> Result<T, RepositoryError> {
    let content = match tokio::fs::read_to_string(record_path(dir, id)).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(RepositoryError::NotFound(id)),
        Err(e) => return Err(RepositoryError::Io(e.to_string())),
    };
    ron::from_str(&content).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

async fn write_record<T: Serialize>(dir: &Path, id: Uuid, record: &T) -> Result<(), RepositoryError> {
    let config = ron::ser::PrettyConfig::default()
        .struct_names(true)
        .enumerate_arrays(false);
    let content = ron::ser::to_string_pretty(record, config)
        .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| RepositoryError::Io(e.to_string()))?;
    tokio::fs::write(record_path(dir, id), content)
        .await
        .map_err(|e| RepositoryError::Io(e.to_string()))
}

/// Ids of every record in `dir`, sorted. A missing directory is empty.
async fn record_ids(dir: &Path) -> Result<Vec<Uuid>, RepositoryError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(RepositoryError::Io(e.to_string())),
    };

    let mut ids = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| RepositoryError::Io(e.to_string()))?
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
            continue;
        }
        match path.file_stem().and_then(|s| s.to_str()).map(Uuid::parse_str) {
            Some(Ok(id)) => ids.push(id),
            _ => tracing::warn!("Skipping unrecognized file {}", path.display()),
        }
    }
    ids.sort();
    Ok(ids)
}

/// Clip data stored as RON files
#[derive(Debug, Clone)]
pub struct FileClipDataRepository {
    dir: PathBuf,
}

impl FileClipDataRepository {
    /// Use `dir` for storage; it is created on first save
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ClipDataRepository for FileClipDataRepository {
    async fn load(&self, id: Uuid) -> Result<AnimationClipData, RepositoryError> {
        read_record(&self.dir, id).await
    }

    async fn save(&self, data: &AnimationClipData) -> Result<(), RepositoryError> {
        write_record(&self.dir, data.id(), data).await
    }

    async fn list(&self) -> Result<Vec<ClipDataInfo>, RepositoryError> {
        let mut infos = Vec::new();
        for id in record_ids(&self.dir).await? {
            let data: AnimationClipData = read_record(&self.dir, id).await?;
            infos.push(ClipDataInfo::from(&data));
        }
        Ok(infos)
    }
}

/// Timelines stored as RON files, without their clip data
#[derive(Debug, Clone)]
pub struct FileTimelineRepository {
    dir: PathBuf,
}

impl FileTimelineRepository {
    /// Use `dir` for storage; it is created on first save
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl TimelineRepository for FileTimelineRepository {
    async fn load(&self, id: TimelineId) -> Result<Timeline, RepositoryError> {
        let timeline: Timeline = read_record(&self.dir, id.0).await?;
        timeline.sync_allocator();
        Ok(timeline)
    }

    async fn save(&self, timeline: &Timeline) -> Result<(), RepositoryError> {
        write_record(&self.dir, timeline.id.0, timeline).await
    }

    async fn list(&self) -> Result<Vec<(TimelineId, String)>, RepositoryError> {
        let mut timelines = Vec::new();
        for id in record_ids(&self.dir).await? {
            let timeline: Timeline = read_record(&self.dir, id).await?;
            timelines.push((timeline.id, timeline.name));
        }
        Ok(timelines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagecraft_sequencer::{DataType, Keyframe};

    fn temp_dir(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("stagecraft-{label}-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_clip_data_round_trip_keeps_id() {
        let dir = temp_dir("clips");
        let repo = FileClipDataRepository::new(&dir);

        let mut data = AnimationClipData::new(DataType::LightProperties).unwrap();
        data.try_add_keyframe("Intensity", Keyframe::new(2.0, 4.0)).unwrap();
        repo.save(&data).await.unwrap();

        let loaded = repo.load(data.id()).await.unwrap();
        assert_eq!(loaded.id(), data.id());
        assert_eq!(loaded.data_type(), DataType::LightProperties);
        assert_eq!(loaded.keyframe("Intensity", 2.0).unwrap(), Some(Keyframe::new(2.0, 4.0)));
        assert_eq!(repo.list().await.unwrap(), [ClipDataInfo::from(&data)]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_missing_clip_is_not_found() {
        let repo = FileClipDataRepository::new(temp_dir("empty"));
        let id = Uuid::new_v4();
        assert_eq!(repo.load(id).await.unwrap_err(), RepositoryError::NotFound(id));
        assert!(repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_record_is_serialization_error() {
        let dir = temp_dir("corrupt");
        std::fs::create_dir_all(&dir).unwrap();
        let id = Uuid::new_v4();
        std::fs::write(record_path(&dir, id), "not ron at all (").unwrap();

        let repo = FileClipDataRepository::new(&dir);
        assert!(matches!(
            repo.load(id).await.unwrap_err(),
            RepositoryError::Serialization(_)
        ));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_timeline_round_trip_then_attach() {
        let clip_dir = temp_dir("clips");
        let timeline_dir = temp_dir("timelines");
        let clips = FileClipDataRepository::new(&clip_dir);
        let timelines = FileTimelineRepository::new(&timeline_dir);

        let data = AnimationClipData::new(DataType::CameraPose).unwrap();
        clips.save(&data).await.unwrap();

        let mut timeline = Timeline::new("Opening");
        let track = timeline.create_track("Camera", DataType::CameraPose).id;
        let clip = timeline.add_clip(track, 3.0, data.clone()).unwrap().id;
        timelines.save(&timeline).await.unwrap();

        let mut loaded = timelines.load(timeline.id).await.unwrap();
        assert_eq!(loaded.id, timeline.id);
        assert_eq!(loaded.clip_data_ids(), [data.id()]);
        assert!(loaded.clip(clip).unwrap().clip_data().is_none());

        let stored = clips.load(data.id()).await.unwrap();
        assert_eq!(loaded.attach_clip_data(&stored), 1);
        assert_eq!(loaded.duration(), 8.0);

        // Fresh ids must not collide with the stored ones
        let new_track = loaded.create_track("Key light", DataType::LightPose).id;
        assert!(new_track > track);

        assert_eq!(timelines.list().await.unwrap(), [(timeline.id, "Opening".to_string())]);

        std::fs::remove_dir_all(&clip_dir).unwrap();
        std::fs::remove_dir_all(&timeline_dir).unwrap();
    }
}
