// SPDX-License-Identifier: MIT OR Apache-2.0
//! Isolated keyframe editing of a single clip.
//!
//! The [`KeyframeAnimationEditor`] borrows the production player for the
//! length of an edit session:
//! - Loading a clip caches the player's live timeline and swaps in a
//!   one-track, one-clip preview timeline
//! - Keyframe edits go to the preview clip and mark the session dirty only
//!   when something actually changed
//! - Unloading puts the cached timeline back, the same instance as before
//!
//! Only one session can be open at a time; a second load is refused until the
//! current clip is unloaded.
//!
//! Editor listeners run while the player is locked, so they must not call
//! back into the editor or the player.

use crate::clip_data::{AnimationClipData, AnimationFrame, ClipDataError, DataType};
use crate::ids::{ClipId, IdAllocator};
use crate::keyframe::{quantize_seconds, Keyframe, KeyframeRef};
use crate::listeners::{ListenerId, Listeners};
use crate::player::{shared_timeline, PlayerEvent, SharedPlayer, SharedTimeline};
use crate::repository::{ClipDataRepository, RepositoryError};
use crate::sequence::{Timeline, TimelineError};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// Target id of the preview clip until retargeted, the first id of a fresh
/// timeline's track
pub const DEFAULT_PREVIEW_TARGET_ID: i32 = 1;

/// Event emitted by the editor
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditorEvent<'a> {
    /// A clip was loaded or created for editing
    Loaded,
    /// The session ended and the previous timeline is live again
    Unloaded,
    /// The clip was persisted
    Saved,
    /// The preview clip was evaluated
    AnimationEvaluated {
        /// Preview target
        target_id: i32,
        /// Evaluated values, borrowed for the callback only
        frame: &'a AnimationFrame,
    },
}

/// Callback receiving editor events
pub type EditorListener = dyn FnMut(&EditorEvent<'_>) + Send;

/// Error from an editor operation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditorError {
    /// No edit session is open
    #[error("No edit session is active")]
    NotActive,

    /// A session is already open; unload it first
    #[error("An edit session is already active")]
    AlreadyActive,

    /// Save requested with nothing loaded
    #[error("No clip loaded")]
    NoClipLoaded,

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// Repository failure
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Invalid clip data request
    #[error(transparent)]
    ClipData(#[from] ClipDataError),

    /// The preview timeline could not be built
    #[error(transparent)]
    Timeline(#[from] TimelineError),
}

/// Open edit session
struct EditSession {
    /// Player timeline from before the session
    cached_sequence: Option<SharedTimeline>,
    /// Preview timeline wrapping the edited clip
    temporary_timeline: SharedTimeline,
    /// The edited clip within the preview timeline
    clip_id: ClipId,
    /// Player listener forwarding evaluations to editor listeners
    forwarder: ListenerId,
}

/// Single-clip editing front-end over a shared player
pub struct KeyframeAnimationEditor<R: ClipDataRepository> {
    player: SharedPlayer,
    repository: Arc<R>,
    ids: IdAllocator,
    session: Option<EditSession>,
    has_unsaved_changes: bool,
    listeners: Arc<Mutex<Listeners<EditorListener>>>,
}

impl<R: ClipDataRepository> KeyframeAnimationEditor<R> {
    /// Create an editor for `player`, loading and saving through `repository`
    pub fn new(player: SharedPlayer, repository: Arc<R>) -> Self {
        Self {
            player,
            repository,
            ids: IdAllocator::new(),
            session: None,
            has_unsaved_changes: false,
            listeners: Arc::new(Mutex::new(Listeners::new())),
        }
    }

    /// Register a listener
    pub fn subscribe(&self, listener: impl FnMut(&EditorEvent<'_>) + Send + 'static) -> ListenerId {
        self.listeners.lock().add(Box::new(listener))
    }

    /// Unregister a listener
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.lock().remove(id)
    }

    /// Whether a clip is loaded
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Whether the loaded clip has edits not yet saved
    pub fn has_unsaved_changes(&self) -> bool {
        self.has_unsaved_changes
    }

    /// The player this editor drives
    pub fn player(&self) -> &SharedPlayer {
        &self.player
    }

    /// The preview timeline of the open session
    pub fn preview_timeline(&self) -> Option<SharedTimeline> {
        self.session.as_ref().map(|s| s.temporary_timeline.clone())
    }

    /// Load clip data from the repository and start editing it.
    ///
    /// The load races `cancel`; if `cancel` finishes first, or the load fails,
    /// nothing changes.
    pub async fn load(
        &mut self,
        clip_data_id: Uuid,
        cancel: impl Future<Output = ()>,
    ) -> Result<(), EditorError> {
        self.load_checked(clip_data_id, None, cancel).await
    }

    /// Like [`KeyframeAnimationEditor::load`], failing with
    /// [`RepositoryError::WrongType`] unless the stored clip is `expected`.
    pub async fn load_expecting(
        &mut self,
        clip_data_id: Uuid,
        expected: DataType,
        cancel: impl Future<Output = ()>,
    ) -> Result<(), EditorError> {
        self.load_checked(clip_data_id, Some(expected), cancel).await
    }

    async fn load_checked(
        &mut self,
        clip_data_id: Uuid,
        expected: Option<DataType>,
        cancel: impl Future<Output = ()>,
    ) -> Result<(), EditorError> {
        if self.session.is_some() {
            tracing::warn!("Refusing to load clip {} while another clip is being edited", clip_data_id);
            return Err(EditorError::AlreadyActive);
        }

        let data = tokio::select! {
            result = self.repository.load(clip_data_id) => result?,
            () = cancel => {
                tracing::info!("Load of clip {} cancelled", clip_data_id);
                return Err(EditorError::Cancelled);
            }
        };

        if let Some(expected) = expected {
            if data.data_type() != expected {
                return Err(RepositoryError::WrongType {
                    expected,
                    found: data.data_type(),
                }
                .into());
            }
        }

        self.begin_session(data, false)
    }

    /// Start editing brand-new clip data of `data_type`.
    ///
    /// New clips start with unsaved changes. Returns the new clip data id.
    pub fn create_new_clip_data(&mut self, data_type: DataType) -> Result<Uuid, EditorError> {
        if self.session.is_some() {
            tracing::warn!("Refusing to create a clip while another clip is being edited");
            return Err(EditorError::AlreadyActive);
        }
        let data = AnimationClipData::new(data_type)?;
        let id = data.id();
        self.begin_session(data, true)?;
        Ok(id)
    }

    fn begin_session(&mut self, data: AnimationClipData, dirty: bool) -> Result<(), EditorError> {
        let data_type = data.data_type();
        let name = data.name().to_string();

        let mut timeline = Timeline::with_ids(format!("Preview: {}", name), self.ids.clone());
        let track_id = timeline.create_track(data_type.name(), data_type).id;
        let clip_id = timeline.add_clip(track_id, 0.0, data)?.id;
        let temporary_timeline = shared_timeline(timeline);

        let listeners = self.listeners.clone();
        let (cached_sequence, forwarder) = {
            let mut player = self.player.lock();
            let cached = player.set_sequence(Some(temporary_timeline.clone()));
            let forwarder = player.subscribe(move |event| {
                if let PlayerEvent::AnimationEvaluate { target_id, frame } = event {
                    let forwarded = EditorEvent::AnimationEvaluated {
                        target_id: *target_id,
                        frame: *frame,
                    };
                    for listener in listeners.lock().iter_mut() {
                        listener(&forwarded);
                    }
                }
            });
            (cached, forwarder)
        };

        self.session = Some(EditSession {
            cached_sequence,
            temporary_timeline,
            clip_id,
            forwarder,
        });
        self.has_unsaved_changes = dirty;
        tracing::info!("Editing {:?} clip '{}'", data_type, name);
        self.emit(&EditorEvent::Loaded);
        Ok(())
    }

    /// End the session and put the previous timeline back on the player
    pub fn unload_clip_data(&mut self) -> Result<(), EditorError> {
        let session = self.session.take().ok_or(EditorError::NotActive)?;
        self.restore(session);
        self.has_unsaved_changes = false;
        tracing::info!("Closed clip edit session");
        self.emit(&EditorEvent::Unloaded);
        Ok(())
    }

    fn restore(&self, session: EditSession) {
        let mut player = self.player.lock();
        player.unsubscribe(session.forwarder);
        player.set_sequence(session.cached_sequence);
    }

    /// Persist the loaded clip.
    ///
    /// On failure or cancellation the unsaved flag stays as it was.
    pub async fn save(&mut self, cancel: impl Future<Output = ()>) -> Result<(), EditorError> {
        let data = self.clip_data_snapshot().ok_or(EditorError::NoClipLoaded)?;

        tokio::select! {
            result = self.repository.save(&data) => result?,
            () = cancel => {
                tracing::info!("Save of clip {} cancelled", data.id());
                return Err(EditorError::Cancelled);
            }
        }

        self.has_unsaved_changes = false;
        tracing::info!("Saved clip '{}' ({})", data.name(), data.id());
        self.emit(&EditorEvent::Saved);
        Ok(())
    }

    /// Copy of the loaded clip data
    pub fn clip_data_snapshot(&self) -> Option<AnimationClipData> {
        let session = self.session.as_ref()?;
        let timeline = session.temporary_timeline.read();
        timeline.clip(session.clip_id)?.clip_data().cloned()
    }

    /// The key at exactly `time` for every property of the loaded clip
    pub fn keyframes(&self, time: f32) -> Option<Vec<(&'static str, Option<Keyframe>)>> {
        self.read_clip(|data| data.keyframes(time))
    }

    /// References to every key of the loaded clip, for view-side selection
    pub fn keyframe_refs(&self) -> Vec<KeyframeRef> {
        self.read_clip(|data| {
            data.properties()
                .iter()
                .filter_map(|p| data.curve(p.name).ok().map(|c| (p.name, c)))
                .flat_map(|(name, curve)| curve.keys().iter().map(move |k| KeyframeRef::new(name, k.time)))
                .collect()
        })
        .unwrap_or_default()
    }

    fn read_clip<T>(&self, read: impl FnOnce(&AnimationClipData) -> T) -> Option<T> {
        let session = self.session.as_ref()?;
        let timeline = session.temporary_timeline.read();
        timeline.clip(session.clip_id)?.clip_data().map(read)
    }

    /// Apply `edit` to the loaded clip; `edit` reports whether it changed
    /// anything alongside its result.
    fn edit_clip<T>(
        &mut self,
        edit: impl FnOnce(&mut AnimationClipData) -> Result<(T, bool), ClipDataError>,
    ) -> Result<T, EditorError> {
        let session = self.session.as_ref().ok_or(EditorError::NotActive)?;
        let (result, changed) = session
            .temporary_timeline
            .write()
            .with_clip_mut(session.clip_id, |clip| clip.clip_data_mut().map(edit))
            .flatten()
            .ok_or(EditorError::NoClipLoaded)??;
        if changed {
            self.has_unsaved_changes = true;
        }
        Ok(result)
    }

    /// Add or replace a key. Returns the key index.
    ///
    /// Key times edited here are rounded to whole milliseconds, the
    /// resolution of [`KeyframeRef`].
    pub fn try_add_keyframe(&mut self, property: &str, keyframe: Keyframe) -> Result<usize, EditorError> {
        let keyframe = Keyframe::new(quantize_seconds(keyframe.time), keyframe.value);
        self.edit_clip(|data| {
            let before = data.keyframe(property, keyframe.time)?;
            let index = data.try_add_keyframe(property, keyframe)?;
            Ok((index, before.map(|k| k.value) != Some(keyframe.value)))
        })
    }

    /// Remove the key at exactly `time`
    pub fn remove_keyframe(&mut self, property: &str, time: f32) -> Result<bool, EditorError> {
        let time = quantize_seconds(time);
        self.edit_clip(|data| {
            let removed = data.remove_keyframe(property, time)?;
            Ok((removed, removed))
        })
    }

    /// Set the value of the key at exactly `time`.
    ///
    /// Returns whether a key exists there. Setting the current value does not
    /// count as a change.
    pub fn update_keyframe_value(
        &mut self,
        property: &str,
        time: f32,
        value: f32,
    ) -> Result<bool, EditorError> {
        let time = quantize_seconds(time);
        self.edit_clip(|data| match data.keyframe(property, time)? {
            None => Ok((false, false)),
            Some(key) if key.value == value => Ok((true, false)),
            Some(_) => Ok((data.update_keyframe_value(property, time, value)?, true)),
        })
    }

    /// Rename the loaded clip
    pub fn rename_clip(&mut self, name: impl Into<String>) -> Result<(), EditorError> {
        let name = name.into();
        self.edit_clip(|data| {
            let changed = data.name() != name;
            data.set_name(name);
            Ok(((), changed))
        })
    }

    /// Send the preview clip's frames to another target, keeping its timing
    pub fn update_preview_target_id(&mut self, target_id: i32) -> Result<(), EditorError> {
        let session = self.session.as_ref().ok_or(EditorError::NotActive)?;
        session
            .temporary_timeline
            .write()
            .with_clip_mut(session.clip_id, |clip| clip.set_target_id(target_id))
            .ok_or(EditorError::NoClipLoaded)
    }

    /// Move the preview playhead and evaluate
    pub fn set_time(&self, time: f32) -> Result<(), EditorError> {
        if self.session.is_none() {
            return Err(EditorError::NotActive);
        }
        self.player.lock().set_time(time);
        Ok(())
    }

    fn emit(&self, event: &EditorEvent<'_>) {
        for listener in self.listeners.lock().iter_mut() {
            listener(event);
        }
    }
}

impl<R: ClipDataRepository> Drop for KeyframeAnimationEditor<R> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::warn!("Editor dropped with an open session; restoring previous timeline");
            self.restore(session);
        }
    }
}
