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

//! Projections turn a hand into a pickup pose and the pickup pose into a
//! canonical angle. They are the only per-kind piece of a control; clamping,
//! snapping and percentages are shared.
use crate::pose::HandSample;
use angle_math::normalize_360;
use anyhow::{ensure, Result};
use nalgebra::{Point3, Unit, UnitQuaternion, Vector3};
use std::fmt::Debug;

const DEGENERATE: f64 = 1e-9;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }

    pub fn unit(self) -> Unit<Vector3<f64>> {
        match self {
            Self::X => Vector3::x_axis(),
            Self::Y => Vector3::y_axis(),
            Self::Z => Vector3::z_axis(),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "x" | "X" => Self::X,
            "y" | "Y" => Self::Y,
            "z" | "Z" => Self::Z,
            _ => return None,
        })
    }
}

pub trait GeometryProjection: Send + Sync + Debug {
    /// Move the pickup to follow the hand, within this projection's constraint.
    fn follow(&mut self, hand: &HandSample);

    /// Angle of the pickup, canonical degrees.
    fn raw_angle(&self) -> f64;

    /// Axis the visible rotator turns about.
    fn rotator_axis(&self) -> Axis;

    /// Put the pickup where it would read `raw_angle`.
    fn place_at(&mut self, raw_angle: f64);

    /// The single pickup coordinate that gets replicated.
    fn pickup_on_axis(&self) -> f64;

    fn set_pickup_on_axis(&mut self, value: f64);
}

/// Knobs: the hand's roll about the pickup axis turns the pickup.
#[derive(Clone, Debug)]
pub struct TwistProjection {
    axis: Axis,
    rotator_axis: Axis,
    invert: bool,
    // Pickup rotation on `axis`, measured from a quarter turn reference.
    pickup: f64,
}

impl TwistProjection {
    const REFERENCE: f64 = 90.;

    pub fn new(axis: Axis) -> Self {
        Self {
            axis,
            rotator_axis: axis,
            invert: false,
            pickup: Self::REFERENCE,
        }
    }

    /// Ceiling mounted knobs see the hand from the other side.
    pub fn inverted(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    pub fn with_rotator_axis(mut self, rotator_axis: Axis) -> Self {
        self.rotator_axis = rotator_axis;
        self
    }

    // Swing-twist split: the twist about `axis` is carried entirely by the
    // component of the quaternion's vector part along that axis.
    fn twist_of(&self, rotation: &UnitQuaternion<f64>) -> f64 {
        let q = rotation.quaternion();
        let along = self.axis.unit().dot(&q.imag());
        let twist = (2. * along.atan2(q.w)).to_degrees();
        if self.invert {
            -twist
        } else {
            twist
        }
    }
}

impl GeometryProjection for TwistProjection {
    fn follow(&mut self, hand: &HandSample) {
        self.pickup = normalize_360(self.twist_of(&hand.rotation) + Self::REFERENCE);
    }

    fn raw_angle(&self) -> f64 {
        normalize_360(self.pickup - Self::REFERENCE)
    }

    fn rotator_axis(&self) -> Axis {
        self.rotator_axis
    }

    fn place_at(&mut self, raw_angle: f64) {
        self.pickup = normalize_360(raw_angle + Self::REFERENCE);
    }

    fn pickup_on_axis(&self) -> f64 {
        self.pickup
    }

    fn set_pickup_on_axis(&mut self, value: f64) {
        self.pickup = normalize_360(value);
    }
}

/// Levers whose handle slides along one world axis while the lever swings
/// about a pivot. The angle is read between a reference direction and the
/// pivot to handle direction, signed towards `side`.
#[derive(Clone, Debug)]
pub struct SlideProjection {
    pivot: Point3<f64>,
    pickup: Point3<f64>,
    slide_axis: Axis,
    rotator_axis: Axis,
    travel: Option<(f64, f64)>,
    reference: Unit<Vector3<f64>>,
    side: Unit<Vector3<f64>>,
    reference_offset: f64,
}

impl SlideProjection {
    pub fn new(pivot: Point3<f64>, handle: Point3<f64>, slide_axis: Axis, rotator_axis: Axis) -> Self {
        Self {
            pivot,
            pickup: handle,
            slide_axis,
            rotator_axis,
            travel: None,
            reference: -Vector3::z_axis(),
            side: Vector3::y_axis(),
            reference_offset: 0.,
        }
    }

    pub fn with_reference(mut self, reference: Vector3<f64>, side: Vector3<f64>) -> Result<Self> {
        ensure!(reference.norm() > DEGENERATE, "slide reference direction is zero");
        let reference = Unit::new_normalize(reference);
        let side = side - reference.into_inner() * reference.dot(&side);
        ensure!(side.norm() > DEGENERATE, "slide side direction is parallel to the reference");
        self.reference = reference;
        self.side = Unit::new_normalize(side);
        Ok(self)
    }

    pub fn with_travel(mut self, lo: f64, hi: f64) -> Self {
        self.travel = Some((lo.min(hi), lo.max(hi)));
        self
    }

    /// Angle, in the reference frame, that reads as 0.
    pub fn with_reference_offset(mut self, degrees: f64) -> Self {
        self.reference_offset = degrees;
        self
    }

    pub fn pickup(&self) -> &Point3<f64> {
        &self.pickup
    }

    fn constrain(&self, coordinate: f64) -> f64 {
        match self.travel {
            Some((lo, hi)) => coordinate.clamp(lo, hi),
            None => coordinate,
        }
    }

    // Coordinates of `v` in the reference/side plane.
    fn in_plane(&self, v: &Vector3<f64>) -> (f64, f64) {
        (self.reference.dot(v), self.side.dot(v))
    }
}

impl GeometryProjection for SlideProjection {
    fn follow(&mut self, hand: &HandSample) {
        let i = self.slide_axis.index();
        self.pickup[i] = self.constrain(hand.position[i]);
    }

    fn raw_angle(&self) -> f64 {
        let (along, across) = self.in_plane(&(self.pickup - self.pivot));
        normalize_360(across.atan2(along).to_degrees() - self.reference_offset)
    }

    fn rotator_axis(&self) -> Axis {
        self.rotator_axis
    }

    fn place_at(&mut self, raw_angle: f64) {
        // Slide along the axis until the pivot to handle direction lies on
        // the requested angle: solve (r + t e) x d = 0 in the plane.
        let (sin, cos) = (raw_angle + self.reference_offset).to_radians().sin_cos();
        let (rx, ry) = self.in_plane(&(self.pickup - self.pivot));
        let (ex, ey) = self.in_plane(&self.slide_axis.unit().into_inner());
        let denominator = ex * sin - ey * cos;
        if denominator.abs() < DEGENERATE {
            return;
        }
        let t = (ry * cos - rx * sin) / denominator;
        let i = self.slide_axis.index();
        self.pickup[i] = self.constrain(self.pickup[i] + t);
    }

    fn pickup_on_axis(&self) -> f64 {
        self.pickup[self.slide_axis.index()]
    }

    fn set_pickup_on_axis(&mut self, value: f64) {
        self.pickup[self.slide_axis.index()] = value;
    }
}

/// Switches and vertical levers: the handle swings freely about the rotator
/// axis, tracking the hand projected onto the plane of rotation.
#[derive(Clone, Debug)]
pub struct SwingProjection {
    pivot: Point3<f64>,
    pickup: Point3<f64>,
    axis: Axis,
    forward: Unit<Vector3<f64>>,
    radius: f64,
}

impl SwingProjection {
    pub fn new(
        pivot: Point3<f64>,
        handle: Point3<f64>,
        axis: Axis,
        forward: Vector3<f64>,
    ) -> Result<Self> {
        let a = axis.unit();
        let forward = forward - a.into_inner() * a.dot(&forward);
        ensure!(forward.norm() > DEGENERATE, "swing forward direction is along the rotator axis");
        let arm = handle - pivot;
        let radius = (arm - a.into_inner() * a.dot(&arm)).norm();
        ensure!(radius > DEGENERATE, "swing handle sits on the rotator axis");
        let mut out = Self {
            pivot,
            pickup: handle,
            axis,
            forward: Unit::new_normalize(forward),
            radius,
        };
        let start = out.angle_of(&arm);
        out.place_at(start);
        Ok(out)
    }

    pub fn pickup(&self) -> &Point3<f64> {
        &self.pickup
    }

    fn angle_of(&self, v: &Vector3<f64>) -> f64 {
        let sin = self.axis.unit().dot(&self.forward.cross(v));
        let cos = self.forward.dot(v);
        normalize_360(sin.atan2(cos).to_degrees())
    }
}

impl GeometryProjection for SwingProjection {
    fn follow(&mut self, hand: &HandSample) {
        let a = self.axis.unit();
        let v = hand.position - self.pivot;
        let in_plane = v - a.into_inner() * a.dot(&v);
        if in_plane.norm() > DEGENERATE {
            self.pickup = self.pivot + in_plane.normalize() * self.radius;
        }
    }

    fn raw_angle(&self) -> f64 {
        self.angle_of(&(self.pickup - self.pivot))
    }

    fn rotator_axis(&self) -> Axis {
        self.axis
    }

    fn place_at(&mut self, raw_angle: f64) {
        let rotation = UnitQuaternion::from_axis_angle(&self.axis.unit(), raw_angle.to_radians());
        self.pickup = self.pivot + rotation * (self.forward.into_inner() * self.radius);
    }

    fn pickup_on_axis(&self) -> f64 {
        self.raw_angle()
    }

    fn set_pickup_on_axis(&mut self, value: f64) {
        self.place_at(value);
    }
}

/// How to build a control's projection.
#[derive(Clone, Debug, PartialEq)]
pub enum ProjectionConfig {
    Twist {
        axis: Axis,
        rotator_axis: Axis,
        invert: bool,
    },
    Slide {
        pivot: Point3<f64>,
        handle: Point3<f64>,
        slide_axis: Axis,
        rotator_axis: Axis,
        travel: Option<(f64, f64)>,
        reference: Vector3<f64>,
        side: Vector3<f64>,
        reference_offset: f64,
    },
    Swing {
        pivot: Point3<f64>,
        handle: Point3<f64>,
        axis: Axis,
        forward: Vector3<f64>,
    },
}

impl ProjectionConfig {
    pub fn twist(axis: Axis) -> Self {
        Self::Twist {
            axis,
            rotator_axis: axis,
            invert: false,
        }
    }

    pub fn build(&self) -> Result<Box<dyn GeometryProjection>> {
        Ok(match self {
            Self::Twist {
                axis,
                rotator_axis,
                invert,
            } => Box::new(
                TwistProjection::new(*axis)
                    .inverted(*invert)
                    .with_rotator_axis(*rotator_axis),
            ),
            Self::Slide {
                pivot,
                handle,
                slide_axis,
                rotator_axis,
                travel,
                reference,
                side,
                reference_offset,
            } => {
                let mut slide = SlideProjection::new(*pivot, *handle, *slide_axis, *rotator_axis)
                    .with_reference(*reference, *side)?
                    .with_reference_offset(*reference_offset);
                if let Some((lo, hi)) = travel {
                    slide = slide.with_travel(*lo, *hi);
                }
                Box::new(slide)
            }
            Self::Swing {
                pivot,
                handle,
                axis,
                forward,
            } => Box::new(SwingProjection::new(*pivot, *handle, *axis, *forward)?),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pose::{HandPose, PoseProvider, TrackedPose};
    use approx::assert_abs_diff_eq;

    fn sample(pose: HandPose) -> HandSample {
        TrackedPose::new(pose).sample()
    }

    #[test]
    fn test_twist_follows_hand_roll() {
        let mut knob = TwistProjection::new(Axis::Z);
        knob.follow(&sample(HandPose::default().twisted(Axis::Z, 30.)));
        assert_abs_diff_eq!(knob.raw_angle(), 30., epsilon = 1e-9);

        knob.follow(&sample(HandPose::default().twisted(Axis::Z, -30.)));
        assert_abs_diff_eq!(knob.raw_angle(), 330., epsilon = 1e-9);

        // Roll about another axis does not turn the knob.
        knob.follow(&sample(HandPose::default().twisted(Axis::X, 45.)));
        assert_abs_diff_eq!(knob.raw_angle(), 0., epsilon = 1e-9);
    }

    #[test]
    fn test_twist_inverted() {
        let mut knob = TwistProjection::new(Axis::Y).inverted(true);
        knob.follow(&sample(HandPose::default().twisted(Axis::Y, 30.)));
        assert_abs_diff_eq!(knob.raw_angle(), 330., epsilon = 1e-9);
    }

    #[test]
    fn test_twist_place_and_replicate() {
        let mut knob = TwistProjection::new(Axis::Z);
        knob.place_at(200.);
        assert_abs_diff_eq!(knob.raw_angle(), 200., epsilon = 1e-9);

        let mut mirror = TwistProjection::new(Axis::Z);
        mirror.set_pickup_on_axis(knob.pickup_on_axis());
        assert_eq!(mirror.raw_angle(), knob.raw_angle());
    }

    fn throttle() -> SlideProjection {
        SlideProjection::new(
            Point3::origin(),
            Point3::new(0., 0.1, -0.1),
            Axis::Z,
            Axis::X,
        )
        .with_travel(-0.1, 0.1)
    }

    #[test]
    fn test_slide_angle() {
        let mut lever = throttle();
        assert_abs_diff_eq!(lever.raw_angle(), 45., epsilon = 1e-9);

        lever.follow(&sample(HandPose::at(Point3::new(0.3, 0.5, 0.))));
        assert_abs_diff_eq!(lever.raw_angle(), 90., epsilon = 1e-9);
        assert_eq!(lever.pickup().x, 0.);

        // Travel stops the handle at the end of its slot.
        lever.follow(&sample(HandPose::at(Point3::new(0., 0., 5.))));
        assert_abs_diff_eq!(lever.raw_angle(), 135., epsilon = 1e-9);
    }

    #[test]
    fn test_slide_place_at() {
        let mut lever = throttle();
        lever.place_at(90.);
        assert_abs_diff_eq!(lever.pickup_on_axis(), 0., epsilon = 1e-9);
        lever.place_at(135.);
        assert_abs_diff_eq!(lever.pickup_on_axis(), 0.1, epsilon = 1e-9);
    }

    #[test]
    fn test_slide_reference_offset() -> Result<()> {
        let mut lever = throttle()
            .with_reference(-Vector3::z(), Vector3::y())?
            .with_reference_offset(90.);
        lever.follow(&sample(HandPose::at(Point3::new(0., 0., 0.1))));
        assert_abs_diff_eq!(lever.raw_angle(), 45., epsilon = 1e-9);
        assert!(throttle().with_reference(Vector3::z(), Vector3::z()).is_err());
        Ok(())
    }

    #[test]
    fn test_swing() -> Result<()> {
        let mut switch = SwingProjection::new(
            Point3::origin(),
            Point3::new(0., 0.02, 0.05),
            Axis::Y,
            Vector3::z(),
        )?;
        assert_abs_diff_eq!(switch.raw_angle(), 0., epsilon = 1e-9);

        switch.follow(&sample(HandPose::at(Point3::new(0.05, 0.3, 0.))));
        assert_abs_diff_eq!(switch.raw_angle(), 90., epsilon = 1e-9);
        assert_abs_diff_eq!(switch.pickup().coords.norm(), 0.05, epsilon = 1e-12);

        switch.set_pickup_on_axis(270.);
        assert_abs_diff_eq!(switch.pickup().x, -0.05, epsilon = 1e-12);
        assert!(SwingProjection::new(Point3::origin(), Point3::new(0., 1., 0.), Axis::Y, Vector3::z()).is_err());
        Ok(())
    }
}
