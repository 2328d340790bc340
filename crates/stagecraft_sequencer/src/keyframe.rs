// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframes and single-property keyframe curves.
//!
//! A [`KeyframeCurve`] keeps its keys strictly increasing by time after every
//! mutation and is never empty. Exact-time operations compare times with plain
//! float equality: callers are expected to quantize times before building them
//! (see [`KeyframeRef`]).

use serde::{Deserialize, Serialize};

/// A single (time, value) sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Time in seconds
    pub time: f32,
    /// Value at this keyframe
    pub value: f32,
}

impl Keyframe {
    /// Create a new keyframe. Negative times are clamped to zero.
    pub fn new(time: f32, value: f32) -> Self {
        Self {
            time: time.max(0.0),
            value,
        }
    }
}

/// Error when building a curve
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CurveError {
    /// Curves must hold at least one key
    #[error("Keyframe curve must contain at least one key")]
    Empty,
}

/// Linear interpolation between two floats
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Time-sorted keyframes of one property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Keyframe>", into = "Vec<Keyframe>")]
pub struct KeyframeCurve {
    keys: Vec<Keyframe>,
}

impl KeyframeCurve {
    /// Build a curve from arbitrary keys.
    ///
    /// Keys are sorted by time; for duplicate times the last one given wins.
    pub fn from_keys(keys: impl IntoIterator<Item = Keyframe>) -> Result<Self, CurveError> {
        let mut curve = Self { keys: Vec::new() };
        for key in keys {
            curve.add_key(key);
        }
        if curve.keys.is_empty() {
            return Err(CurveError::Empty);
        }
        Ok(curve)
    }

    /// Create the default curve: `value` held from 0 to `duration`
    pub fn with_default(value: f32, duration: f32) -> Self {
        let mut keys = vec![Keyframe::new(0.0, value)];
        if duration > 0.0 {
            keys.push(Keyframe::new(duration, value));
        }
        Self { keys }
    }

    /// Insert a key, or replace the value of the key already at `key.time`.
    ///
    /// Returns the index of the inserted or updated key.
    pub fn add_key(&mut self, key: Keyframe) -> usize {
        let key = Keyframe::new(key.time, key.value);
        match self.search(key.time) {
            Ok(index) => {
                self.keys[index].value = key.value;
                index
            }
            Err(index) => {
                self.keys.insert(index, key);
                index
            }
        }
    }

    /// Remove the key at exactly `time`.
    ///
    /// The last remaining key is never removed.
    pub fn remove_key_at_time(&mut self, time: f32) -> bool {
        match self.find_key_index(time) {
            Some(_) if self.keys.len() == 1 => false,
            Some(index) => {
                self.keys.remove(index);
                true
            }
            None => false,
        }
    }

    /// Set the value of the key at exactly `time`
    pub fn update_key_value(&mut self, time: f32, value: f32) -> bool {
        match self.find_key_index(time) {
            Some(index) => {
                self.keys[index].value = value;
                true
            }
            None => false,
        }
    }

    /// Index of the key at exactly `time`
    pub fn find_key_index(&self, time: f32) -> Option<usize> {
        self.search(time).ok()
    }

    /// The key at exactly `time`
    pub fn key_at(&self, time: f32) -> Option<Keyframe> {
        self.find_key_index(time).map(|index| self.keys[index])
    }

    /// Evaluate the curve, clamping to the first and last key.
    ///
    /// A NaN time evaluates to the first key.
    pub fn evaluate(&self, time: f32) -> f32 {
        let first = self.keys[0];
        let last = self.keys[self.keys.len() - 1];
        if time.is_nan() || time <= first.time {
            return first.value;
        }
        if time >= last.time {
            return last.value;
        }

        match self.search(time) {
            Ok(index) => self.keys[index].value,
            Err(index) => {
                // first.time < time < last.time, so 0 < index < len
                let a = self.keys[index - 1];
                let b = self.keys[index];
                let t = (time - a.time) / (b.time - a.time);
                lerp(a.value, b.value, t)
            }
        }
    }

    /// Time of the last key
    pub fn last_time(&self) -> f32 {
        self.keys[self.keys.len() - 1].time
    }

    /// All keys in time order
    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    /// Key count
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always false; curves are never empty
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn search(&self, time: f32) -> Result<usize, usize> {
        self.keys.binary_search_by(|k| k.time.total_cmp(&time))
    }
}

impl TryFrom<Vec<Keyframe>> for KeyframeCurve {
    type Error = CurveError;

    fn try_from(keys: Vec<Keyframe>) -> Result<Self, Self::Error> {
        Self::from_keys(keys)
    }
}

impl From<KeyframeCurve> for Vec<Keyframe> {
    fn from(curve: KeyframeCurve) -> Self {
        curve.keys
    }
}

/// Quantize seconds to whole milliseconds.
///
/// Snaps to microseconds first so f32 representation error (around 1e-7 s)
/// cannot push a half-millisecond value to the other side of the rounding.
pub fn seconds_to_millis(seconds: f32) -> i64 {
    let micros = (f64::from(seconds) * 1_000_000.0).round() as i64;
    (micros + 500).div_euclid(1000)
}

/// Round seconds to the nearest whole millisecond, in seconds.
///
/// Key times entered through the editing surface go through this so they
/// match the times of the [`KeyframeRef`]s handed back for them.
pub fn quantize_seconds(seconds: f32) -> f32 {
    seconds_to_millis(seconds) as f32 / 1000.0
}

/// Identity of a keyframe as seen by editing views: property name plus
/// millisecond-quantized time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyframeRef {
    /// Property the key belongs to
    pub property: String,
    /// Key time in whole milliseconds
    pub time_ms: i64,
}

impl KeyframeRef {
    /// Create a reference from a time in seconds
    pub fn new(property: impl Into<String>, seconds: f32) -> Self {
        Self {
            property: property.into(),
            time_ms: seconds_to_millis(seconds),
        }
    }

    /// Time in seconds, as stored in curves edited through this reference
    pub fn seconds(&self) -> f32 {
        self.time_ms as f32 / 1000.0
    }
}
