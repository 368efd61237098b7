mod euler;

pub use self::euler::EulerAngles;
pub use cgmath::{vec2, vec3, Deg, Quaternion, Vector2, Vector3};

pub mod prelude {
    pub use cgmath::prelude::*;
}

pub type Vec2f = Vector2<f32>;
pub type Vec3f = Vector3<f32>;
pub type Quatf = Quaternion<f32>;
