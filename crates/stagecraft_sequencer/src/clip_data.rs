// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animation clip data: typed bundles of per-property keyframe curves.
//!
//! Two variants exist:
//! - [`PoseAnimation`] for camera and light poses (position and euler angles)
//! - [`LightPropertiesAnimation`] for light color, intensity and range
//!
//! Both are reached through [`AnimationClipData`] so the timeline and player
//! never match on concrete variants.
//!
//! ## Frame reuse
//!
//! [`AnimationClipData::evaluate`] writes into a frame owned by the clip data
//! and returns a borrow of it. The borrow ends before the next `evaluate`
//! call on the same instance; use [`AnimationClipData::sample`] to get an
//! owned copy off the playback path.

use crate::keyframe::{Keyframe, KeyframeCurve};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default length of freshly created clip data, in seconds
pub const DEFAULT_CLIP_DURATION: f32 = 5.0;

/// Kind of animation data carried by clips and tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    /// Camera position and rotation
    CameraPose,
    /// Light position and rotation
    LightPose,
    /// Light color, intensity and range
    LightProperties,
    /// Camera lens/post settings (driven outside the sequencer)
    CameraProperties,
}

impl DataType {
    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::CameraPose => "Camera Pose",
            Self::LightPose => "Light Pose",
            Self::LightProperties => "Light Properties",
            Self::CameraProperties => "Camera Properties",
        }
    }

    /// Get all data types
    pub fn all() -> &'static [DataType] {
        &[
            DataType::CameraPose,
            DataType::LightPose,
            DataType::LightProperties,
            DataType::CameraProperties,
        ]
    }

    /// Whether clip data can be built for this type
    pub fn has_clip_data(&self) -> bool {
        !matches!(self, Self::CameraProperties)
    }
}

/// Descriptor of one animatable property
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertyInfo {
    /// Property name, used for keyframe addressing
    pub name: &'static str,
    /// Value held by a fresh curve
    pub default_value: f32,
}

impl PropertyInfo {
    const fn new(name: &'static str, default_value: f32) -> Self {
        Self { name, default_value }
    }
}

/// Properties of pose clips, in frame order
pub const POSE_PROPERTIES: [PropertyInfo; 6] = [
    PropertyInfo::new("PositionX", 0.0),
    PropertyInfo::new("PositionY", 0.0),
    PropertyInfo::new("PositionZ", 0.0),
    PropertyInfo::new("RotationX", 0.0),
    PropertyInfo::new("RotationY", 0.0),
    PropertyInfo::new("RotationZ", 0.0),
];

/// Properties of light property clips, in frame order
pub const LIGHT_PROPERTIES: [PropertyInfo; 5] = [
    PropertyInfo::new("ColorR", 1.0),
    PropertyInfo::new("ColorG", 1.0),
    PropertyInfo::new("ColorB", 1.0),
    PropertyInfo::new("Intensity", 1.0),
    PropertyInfo::new("Range", 10.0),
];

/// Error when building or editing clip data
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClipDataError {
    /// Property name not declared by the clip variant
    #[error("Unknown property: {0}")]
    UnknownProperty(String),

    /// No clip data variant for this type
    #[error("Unsupported data type: {0:?}")]
    UnsupportedDataType(DataType),
}

/// One evaluated property value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameProperty {
    /// Property name
    pub name: &'static str,
    /// Evaluated value
    pub value: f32,
}

/// Evaluated values of every property of a clip at one time
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationFrame {
    /// Type of the clip the frame came from
    pub data_type: DataType,
    /// Clip-local time the frame was evaluated at
    pub time: f32,
    /// Values in declared property order
    pub properties: Vec<FrameProperty>,
}

impl AnimationFrame {
    fn for_properties(data_type: DataType, properties: &'static [PropertyInfo]) -> Self {
        Self {
            data_type,
            time: 0.0,
            properties: properties
                .iter()
                .map(|p| FrameProperty {
                    name: p.name,
                    value: p.default_value,
                })
                .collect(),
        }
    }

    /// Value of a property by name
    pub fn value(&self, name: &str) -> Option<f32> {
        self.properties.iter().find(|p| p.name == name).map(|p| p.value)
    }
}

/// Curves of one clip, one per declared property, plus the reused frame
#[derive(Debug, Clone)]
struct ClipCurves {
    properties: &'static [PropertyInfo],
    curves: Vec<KeyframeCurve>,
    frame: AnimationFrame,
}

impl ClipCurves {
    fn new(data_type: DataType, properties: &'static [PropertyInfo]) -> Self {
        Self {
            properties,
            curves: properties
                .iter()
                .map(|p| KeyframeCurve::with_default(p.default_value, DEFAULT_CLIP_DURATION))
                .collect(),
            frame: AnimationFrame::for_properties(data_type, properties),
        }
    }

    /// Build from named curves. Missing properties get default curves and
    /// names that are not declared are dropped.
    fn from_named(
        data_type: DataType,
        properties: &'static [PropertyInfo],
        mut named: IndexMap<String, KeyframeCurve>,
    ) -> Self {
        let curves = properties
            .iter()
            .map(|p| {
                named.swap_remove(p.name).unwrap_or_else(|| {
                    KeyframeCurve::with_default(p.default_value, DEFAULT_CLIP_DURATION)
                })
            })
            .collect();
        for name in named.keys() {
            tracing::warn!("Dropping undeclared property curve '{}' on {:?} clip", name, data_type);
        }
        Self {
            properties,
            curves,
            frame: AnimationFrame::for_properties(data_type, properties),
        }
    }

    fn to_named(&self) -> IndexMap<String, KeyframeCurve> {
        self.properties
            .iter()
            .zip(&self.curves)
            .map(|(p, c)| (p.name.to_string(), c.clone()))
            .collect()
    }

    fn index_of(&self, name: &str) -> Result<usize, ClipDataError> {
        self.properties
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| ClipDataError::UnknownProperty(name.to_string()))
    }

    fn curve(&self, name: &str) -> Result<&KeyframeCurve, ClipDataError> {
        let index = self.index_of(name)?;
        Ok(&self.curves[index])
    }

    fn curve_mut(&mut self, name: &str) -> Result<&mut KeyframeCurve, ClipDataError> {
        let index = self.index_of(name)?;
        Ok(&mut self.curves[index])
    }

    fn duration(&self) -> f32 {
        self.curves
            .iter()
            .map(KeyframeCurve::last_time)
            .fold(0.0, f32::max)
    }

    fn clamp_time(&self, time: f32) -> f32 {
        time.clamp(0.0, self.duration())
    }

    fn evaluate(&mut self, time: f32) -> &AnimationFrame {
        let time = self.clamp_time(time);
        self.frame.time = time;
        for (slot, curve) in self.frame.properties.iter_mut().zip(&self.curves) {
            slot.value = curve.evaluate(time);
        }
        &self.frame
    }

    fn sample(&self, time: f32) -> AnimationFrame {
        let time = self.clamp_time(time);
        AnimationFrame {
            data_type: self.frame.data_type,
            time,
            properties: self
                .properties
                .iter()
                .zip(&self.curves)
                .map(|(p, c)| FrameProperty {
                    name: p.name,
                    value: c.evaluate(time),
                })
                .collect(),
        }
    }

    fn keyframes(&self, time: f32) -> Vec<(&'static str, Option<Keyframe>)> {
        self.properties
            .iter()
            .zip(&self.curves)
            .map(|(p, c)| (p.name, c.key_at(time)))
            .collect()
    }
}

fn default_clip_name(data_type: DataType) -> String {
    format!(
        "{} {}",
        data_type.name(),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    )
}

/// Position and euler rotation animation for cameras and lights
#[derive(Debug, Clone)]
pub struct PoseAnimation {
    /// Unique clip data ID
    pub id: Uuid,
    /// Display name
    pub name: String,
    data_type: DataType,
    curves: ClipCurves,
}

impl PoseAnimation {
    /// Create a pose clip with default curves.
    ///
    /// `data_type` must be [`DataType::CameraPose`] or [`DataType::LightPose`].
    pub fn new(data_type: DataType) -> Result<Self, ClipDataError> {
        Self::check_type(data_type)?;
        Ok(Self {
            id: Uuid::new_v4(),
            name: default_clip_name(data_type),
            data_type,
            curves: ClipCurves::new(data_type, &POSE_PROPERTIES),
        })
    }

    fn check_type(data_type: DataType) -> Result<(), ClipDataError> {
        match data_type {
            DataType::CameraPose | DataType::LightPose => Ok(()),
            other => Err(ClipDataError::UnsupportedDataType(other)),
        }
    }
}

/// Color, intensity and range animation for lights
#[derive(Debug, Clone)]
pub struct LightPropertiesAnimation {
    /// Unique clip data ID
    pub id: Uuid,
    /// Display name
    pub name: String,
    curves: ClipCurves,
}

impl LightPropertiesAnimation {
    /// Create a light properties clip with default curves
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: default_clip_name(DataType::LightProperties),
            curves: ClipCurves::new(DataType::LightProperties, &LIGHT_PROPERTIES),
        }
    }
}

impl Default for LightPropertiesAnimation {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialized form of clip data
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClipDataRecord {
    id: Uuid,
    name: String,
    data_type: DataType,
    curves: IndexMap<String, KeyframeCurve>,
}

/// Any animation clip data
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ClipDataRecord", into = "ClipDataRecord")]
pub enum AnimationClipData {
    /// Camera or light pose
    Pose(PoseAnimation),
    /// Light color/intensity/range
    LightProperties(LightPropertiesAnimation),
}

impl AnimationClipData {
    /// Create fresh clip data for a type
    pub fn new(data_type: DataType) -> Result<Self, ClipDataError> {
        match data_type {
            DataType::CameraPose | DataType::LightPose => {
                Ok(Self::Pose(PoseAnimation::new(data_type)?))
            }
            DataType::LightProperties => {
                Ok(Self::LightProperties(LightPropertiesAnimation::new()))
            }
            DataType::CameraProperties => Err(ClipDataError::UnsupportedDataType(data_type)),
        }
    }

    /// Rebuild clip data from stored parts
    pub fn from_parts(
        id: Uuid,
        name: impl Into<String>,
        data_type: DataType,
        curves: IndexMap<String, KeyframeCurve>,
    ) -> Result<Self, ClipDataError> {
        let name = name.into();
        match data_type {
            DataType::CameraPose | DataType::LightPose => Ok(Self::Pose(PoseAnimation {
                id,
                name,
                data_type,
                curves: ClipCurves::from_named(data_type, &POSE_PROPERTIES, curves),
            })),
            DataType::LightProperties => {
                Ok(Self::LightProperties(LightPropertiesAnimation {
                    id,
                    name,
                    curves: ClipCurves::from_named(data_type, &LIGHT_PROPERTIES, curves),
                }))
            }
            DataType::CameraProperties => Err(ClipDataError::UnsupportedDataType(data_type)),
        }
    }

    fn curves(&self) -> &ClipCurves {
        match self {
            Self::Pose(pose) => &pose.curves,
            Self::LightProperties(light) => &light.curves,
        }
    }

    fn curves_mut(&mut self) -> &mut ClipCurves {
        match self {
            Self::Pose(pose) => &mut pose.curves,
            Self::LightProperties(light) => &mut light.curves,
        }
    }

    /// Unique clip data ID
    pub fn id(&self) -> Uuid {
        match self {
            Self::Pose(pose) => pose.id,
            Self::LightProperties(light) => light.id,
        }
    }

    /// Display name
    pub fn name(&self) -> &str {
        match self {
            Self::Pose(pose) => &pose.name,
            Self::LightProperties(light) => &light.name,
        }
    }

    /// Rename the clip data
    pub fn set_name(&mut self, name: impl Into<String>) {
        match self {
            Self::Pose(pose) => pose.name = name.into(),
            Self::LightProperties(light) => light.name = name.into(),
        }
    }

    /// Data type of this clip
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Pose(pose) => pose.data_type,
            Self::LightProperties(_) => DataType::LightProperties,
        }
    }

    /// Declared properties in frame order
    pub fn properties(&self) -> &'static [PropertyInfo] {
        self.curves().properties
    }

    /// Latest key time across all curves
    pub fn duration(&self) -> f32 {
        self.curves().duration()
    }

    /// Evaluate every property into the reused frame
    pub fn evaluate(&mut self, time: f32) -> &AnimationFrame {
        self.curves_mut().evaluate(time)
    }

    /// Evaluate every property into a new frame
    pub fn sample(&self, time: f32) -> AnimationFrame {
        self.curves().sample(time)
    }

    /// The key at exactly `time` for every property, in declared order
    pub fn keyframes(&self, time: f32) -> Vec<(&'static str, Option<Keyframe>)> {
        self.curves().keyframes(time)
    }

    /// Curve of a property
    pub fn curve(&self, property: &str) -> Result<&KeyframeCurve, ClipDataError> {
        self.curves().curve(property)
    }

    /// The key of a property at exactly `time`
    pub fn keyframe(&self, property: &str, time: f32) -> Result<Option<Keyframe>, ClipDataError> {
        Ok(self.curve(property)?.key_at(time))
    }

    /// Add or replace a key on a property's curve. Returns the key index.
    pub fn try_add_keyframe(
        &mut self,
        property: &str,
        keyframe: Keyframe,
    ) -> Result<usize, ClipDataError> {
        Ok(self.curves_mut().curve_mut(property)?.add_key(keyframe))
    }

    /// Remove a property's key at exactly `time`
    pub fn remove_keyframe(&mut self, property: &str, time: f32) -> Result<bool, ClipDataError> {
        Ok(self.curves_mut().curve_mut(property)?.remove_key_at_time(time))
    }

    /// Set the value of a property's key at exactly `time`
    pub fn update_keyframe_value(
        &mut self,
        property: &str,
        time: f32,
        value: f32,
    ) -> Result<bool, ClipDataError> {
        Ok(self
            .curves_mut()
            .curve_mut(property)?
            .update_key_value(time, value))
    }
}

impl TryFrom<ClipDataRecord> for AnimationClipData {
    type Error = ClipDataError;

    fn try_from(record: ClipDataRecord) -> Result<Self, Self::Error> {
        Self::from_parts(record.id, record.name, record.data_type, record.curves)
    }
}

impl From<AnimationClipData> for ClipDataRecord {
    fn from(data: AnimationClipData) -> Self {
        Self {
            id: data.id(),
            name: data.name().to_string(),
            data_type: data.data_type(),
            curves: data.curves().to_named(),
        }
    }
}
