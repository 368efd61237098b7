//! Conversion from the engine's right-handed, Z-up frame to a left-handed,
//! Y-up frame.
//!
//! The X axis is shared. Source Y (depth) becomes target Z and source Z (up)
//! becomes target Y. The swap is a reflection, which is what flips the
//! handedness; the same reflection is why every Euler angle changes sign.

use super::level::Thing;
use super::model::Node;
use math::{vec2, vec3, EulerAngles, Quatf, Vec2f, Vec3f};
use serde::Deserialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TextureSize {
    pub width: u32,
    pub height: u32,
}

impl TextureSize {
    pub fn square(size: u32) -> Self {
        TextureSize {
            width: size,
            height: size,
        }
    }
}

/// How pixel-space texture coordinates of one asset kind map to normalized
/// target coordinates.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UvConvention {
    /// Invert V after normalizing (`v' = 1 - v`).
    pub flip_v: bool,
}

impl Default for UvConvention {
    fn default() -> Self {
        UvConvention { flip_v: true }
    }
}

#[inline]
pub fn position_to_target(source: Vec3f) -> Vec3f {
    vec3(source.x, source.z, source.y)
}

#[inline]
pub fn position_to_source(target: Vec3f) -> Vec3f {
    vec3(target.x, target.z, target.y)
}

/// Target-frame rotation for engine pitch/yaw/roll angles (degrees).
///
/// The engine turns pitch about X, yaw about Z and roll about Y, applying yaw
/// outermost. In the target frame yaw turns about Y, which stays outermost.
#[inline]
pub fn rotation_to_target(angles: EulerAngles) -> Quatf {
    (-angles).to_quat_y_up()
}

#[inline]
pub fn uv_to_target(pixel_uv: Vec2f, size: TextureSize, convention: UvConvention) -> Vec2f {
    let u = pixel_uv.x / size.width as f32;
    let v = pixel_uv.y / size.height as f32;
    if convention.flip_v {
        vec2(u, 1.0 - v)
    } else {
        vec2(u, v)
    }
}

#[derive(Copy, Clone, Debug)]
pub struct Placement {
    pub position: Vec3f,
    pub rotation: Quatf,
}

#[derive(Copy, Clone, Debug)]
pub struct NodePlacement {
    pub position: Vec3f,
    pub rotation: Quatf,
    pub pivot: Vec3f,
}

pub fn thing_placement(thing: &Thing) -> Placement {
    Placement {
        position: position_to_target(thing.position),
        rotation: rotation_to_target(thing.rotation),
    }
}

pub fn node_placement(node: &Node) -> NodePlacement {
    NodePlacement {
        position: position_to_target(node.position),
        rotation: rotation_to_target(node.rotation),
        pivot: position_to_target(node.pivot),
    }
}
