// This file is part of Flightdeck.
//
// Flightdeck is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// Flightdeck is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with Flightdeck.  If not, see <http://www.gnu.org/licenses/>.
use crate::projection::Axis;
use nalgebra::{Point3, UnitQuaternion};
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Bone {
    IndexDistal,
    IndexIntermediate,
    IndexProximal,
}

impl Bone {
    /// Bones to try, in order, when looking for the index fingertip.
    pub const FINGERTIP_FALLBACK: [Bone; 3] = [
        Bone::IndexDistal,
        Bone::IndexIntermediate,
        Bone::IndexProximal,
    ];

    fn slot(self) -> usize {
        match self {
            Self::IndexDistal => 0,
            Self::IndexIntermediate => 1,
            Self::IndexProximal => 2,
        }
    }
}

/// One tracked hand, in world space. Bones at the origin are untracked.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandPose {
    pub position: Point3<f64>,
    pub rotation: UnitQuaternion<f64>,
    bones: [Point3<f64>; 3],
}

impl Default for HandPose {
    fn default() -> Self {
        Self {
            position: Point3::origin(),
            rotation: UnitQuaternion::identity(),
            bones: [Point3::origin(); 3],
        }
    }
}

impl HandPose {
    pub fn at(position: Point3<f64>) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn with_rotation(mut self, rotation: UnitQuaternion<f64>) -> Self {
        self.rotation = rotation;
        self
    }

    /// Hand rolled by `degrees` about a world axis.
    pub fn twisted(self, axis: Axis, degrees: f64) -> Self {
        self.with_rotation(UnitQuaternion::from_axis_angle(
            &axis.unit(),
            degrees.to_radians(),
        ))
    }

    pub fn with_bone(mut self, bone: Bone, position: Point3<f64>) -> Self {
        self.bones[bone.slot()] = position;
        self
    }

    pub fn bone(&self, bone: Bone) -> Point3<f64> {
        self.bones[bone.slot()]
    }

    fn interpolate(&self, other: &HandPose, t: f64) -> HandPose {
        let t = t.clamp(0., 1.);
        let rotation = self
            .rotation
            .try_slerp(&other.rotation, t, 1e-9)
            .unwrap_or(if t < 0.5 { self.rotation } else { other.rotation });
        HandPose {
            position: self.position + (other.position - self.position) * t,
            rotation,
            bones: if t < 1. { self.bones } else { other.bones },
        }
    }
}

/// What the controls read from the hand on a tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandSample {
    pub position: Point3<f64>,
    pub rotation: UnitQuaternion<f64>,
    pub fingertip: Point3<f64>,
}

impl HandSample {
    /// The point tested against activation volumes.
    pub fn probe_point(&self, finger_collision: bool) -> Point3<f64> {
        if finger_collision {
            self.fingertip
        } else {
            self.position
        }
    }
}

pub trait PoseProvider: Send + Sync {
    fn hand_position(&self) -> Point3<f64>;
    fn hand_rotation(&self) -> UnitQuaternion<f64>;
    fn bone_position(&self, bone: Bone) -> Point3<f64>;

    /// Distal, then intermediate, then proximal bone, then the hand itself:
    /// the first one that is tracked.
    fn fingertip_position(&self) -> Point3<f64> {
        for bone in Bone::FINGERTIP_FALLBACK {
            let position = self.bone_position(bone);
            if position != Point3::origin() {
                return position;
            }
        }
        self.hand_position()
    }

    /// Called once per tick, before any control reads the pose.
    fn advance(&mut self, _tick: u64) {}

    fn sample(&self) -> HandSample {
        HandSample {
            position: self.hand_position(),
            rotation: self.hand_rotation(),
            fingertip: self.fingertip_position(),
        }
    }
}

/// Keyframed hand for simulations and tests. Between keyframes the hand
/// moves linearly and rotates along the shortest arc.
#[derive(Clone, Debug)]
pub struct ScriptedPose {
    keyframes: Vec<(u64, HandPose)>,
    current: HandPose,
}

impl ScriptedPose {
    pub fn new(initial: HandPose) -> Self {
        Self {
            keyframes: vec![(0, initial)],
            current: initial,
        }
    }

    /// Reach `pose` at `tick`. A later call for the same tick replaces it.
    pub fn then_at(mut self, tick: u64, pose: HandPose) -> Self {
        match self.keyframes.binary_search_by_key(&tick, |(t, _)| *t) {
            Ok(i) => self.keyframes[i].1 = pose,
            Err(i) => self.keyframes.insert(i, (tick, pose)),
        }
        self
    }

    pub fn current(&self) -> &HandPose {
        &self.current
    }

    fn pose_at(&self, tick: u64) -> HandPose {
        let next = self.keyframes.partition_point(|(t, _)| *t <= tick);
        if next == 0 {
            return self.keyframes[0].1;
        }
        let (t0, p0) = self.keyframes[next - 1];
        match self.keyframes.get(next) {
            None => p0,
            Some((t1, p1)) => p0.interpolate(p1, (tick - t0) as f64 / (t1 - t0) as f64),
        }
    }
}

impl PoseProvider for ScriptedPose {
    fn hand_position(&self) -> Point3<f64> {
        self.current.position
    }

    fn hand_rotation(&self) -> UnitQuaternion<f64> {
        self.current.rotation
    }

    fn bone_position(&self, bone: Bone) -> Point3<f64> {
        self.current.bone(bone)
    }

    fn advance(&mut self, tick: u64) {
        self.current = self.pose_at(tick);
    }
}

/// Hand pose written by a tracking feed. Clones share the same pose, so the
/// feed keeps one handle and the cockpit reads through another.
#[derive(Clone, Debug, Default)]
pub struct TrackedPose {
    shared: Arc<RwLock<HandPose>>,
}

impl TrackedPose {
    pub fn new(initial: HandPose) -> Self {
        Self {
            shared: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn publish(&self, pose: HandPose) {
        *self.shared.write() = pose;
    }

    pub fn current(&self) -> HandPose {
        *self.shared.read()
    }
}

impl PoseProvider for TrackedPose {
    fn hand_position(&self) -> Point3<f64> {
        self.shared.read().position
    }

    fn hand_rotation(&self) -> UnitQuaternion<f64> {
        self.shared.read().rotation
    }

    fn bone_position(&self, bone: Bone) -> Point3<f64> {
        self.shared.read().bone(bone)
    }
}
