use super::{Deg, Quatf};
use cgmath::Rotation3;
use std::ops::Neg;

/// Euler angles in degrees, as stored in the asset files.
///
/// `pitch` turns about the X axis. Which axes `yaw` and `roll` turn about
/// depends on the coordinate frame the angles are interpreted in.
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct EulerAngles {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl EulerAngles {
    #[inline]
    pub fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        EulerAngles { pitch, yaw, roll }
    }

    /// Composes the rotation for a Y-up frame: yaw about Y is applied
    /// outermost, then pitch about X, then roll about Z.
    #[inline]
    pub fn to_quat_y_up(&self) -> Quatf {
        Quatf::from_angle_y(Deg(self.yaw))
            * Quatf::from_angle_x(Deg(self.pitch))
            * Quatf::from_angle_z(Deg(self.roll))
    }

    /// Composes the rotation for a Z-up frame: yaw about Z is applied
    /// outermost, then pitch about X, then roll about Y.
    #[inline]
    pub fn to_quat_z_up(&self) -> Quatf {
        Quatf::from_angle_z(Deg(self.yaw))
            * Quatf::from_angle_x(Deg(self.pitch))
            * Quatf::from_angle_y(Deg(self.roll))
    }
}

impl Neg for EulerAngles {
    type Output = EulerAngles;

    #[inline]
    fn neg(self) -> Self {
        EulerAngles {
            pitch: -self.pitch,
            yaw: -self.yaw,
            roll: -self.roll,
        }
    }
}
