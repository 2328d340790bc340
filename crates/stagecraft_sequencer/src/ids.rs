// SPDX-License-Identifier: MIT OR Apache-2.0
//! Track and clip id allocation.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Track identifier, unique within an [`IdAllocator`]
pub type TrackId = u32;

/// Timeline clip identifier, unique within an [`IdAllocator`]
pub type ClipId = u32;

#[derive(Debug)]
struct Counters {
    next_track: AtomicU32,
    next_clip: AtomicU32,
}

/// Monotonic id source for tracks and clips.
///
/// Cloning yields a handle to the same counters. Each context that builds
/// timelines owns one, so separate contexts (and tests) never share ids.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    counters: Arc<Counters>,
}

impl IdAllocator {
    /// Create an allocator starting at 1 for both tracks and clips
    pub fn new() -> Self {
        Self {
            counters: Arc::new(Counters {
                next_track: AtomicU32::new(1),
                next_clip: AtomicU32::new(1),
            }),
        }
    }

    /// Allocate a track id
    pub fn next_track_id(&self) -> TrackId {
        self.counters.next_track.fetch_add(1, Ordering::Relaxed)
    }

    /// Allocate a clip id
    pub fn next_clip_id(&self) -> ClipId {
        self.counters.next_clip.fetch_add(1, Ordering::Relaxed)
    }

    /// Make sure future ids are greater than ids already in use
    pub fn reserve_past(&self, max_track: TrackId, max_clip: ClipId) {
        self.counters
            .next_track
            .fetch_max(max_track.saturating_add(1), Ordering::Relaxed);
        self.counters
            .next_clip
            .fetch_max(max_clip.saturating_add(1), Ordering::Relaxed);
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic_per_kind() {
        let ids = IdAllocator::new();
        assert_eq!(ids.next_track_id(), 1);
        assert_eq!(ids.next_track_id(), 2);
        assert_eq!(ids.next_clip_id(), 1);
    }

    #[test]
    fn test_clones_share_counters() {
        let a = IdAllocator::new();
        let b = a.clone();
        a.next_clip_id();
        assert_eq!(b.next_clip_id(), 2);
        assert_eq!(IdAllocator::new().next_clip_id(), 1);
    }

    #[test]
    fn test_reserve_past() {
        let ids = IdAllocator::new();
        ids.reserve_past(10, 3);
        assert_eq!(ids.next_track_id(), 11);
        assert_eq!(ids.next_clip_id(), 4);
        ids.reserve_past(2, 2);
        assert_eq!(ids.next_track_id(), 12);
    }
}
