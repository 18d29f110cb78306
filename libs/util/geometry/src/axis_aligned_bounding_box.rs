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
use nalgebra::{Point3, Vector3};
use std::ops::{Add, Sub};

/// A closed box: points on the faces are inside.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb<T, const N: usize> {
    lo: [T; N],
    hi: [T; N],
}

impl<T, const N: usize> Aabb<T, N>
where
    T: Copy + PartialOrd + Add<Output = T> + Sub<Output = T>,
{
    /// Corners may be given in any order.
    pub fn from_corners(a: [T; N], b: [T; N]) -> Self {
        let mut lo = a;
        let mut hi = b;
        for i in 0..N {
            if lo[i] > hi[i] {
                std::mem::swap(&mut lo[i], &mut hi[i]);
            }
        }
        Self { lo, hi }
    }

    pub fn from_center_and_half_extent(center: [T; N], half_extent: [T; N]) -> Self {
        let mut lo = center;
        let mut hi = center;
        for i in 0..N {
            lo[i] = center[i] - half_extent[i];
            hi[i] = center[i] + half_extent[i];
        }
        Self::from_corners(lo, hi)
    }

    pub fn contains(&self, p: [T; N]) -> bool {
        (0..N).all(|i| p[i] >= self.lo[i] && p[i] <= self.hi[i])
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        (0..N).all(|i| self.lo[i] <= other.hi[i] && self.hi[i] >= other.lo[i])
    }

    pub fn span(&self, i: usize) -> T {
        self.hi[i] - self.lo[i]
    }

    pub fn low(&self, i: usize) -> T {
        self.lo[i]
    }

    pub fn high(&self, i: usize) -> T {
        self.hi[i]
    }
}

impl Aabb<f64, 3> {
    pub fn contains_point(&self, p: &Point3<f64>) -> bool {
        self.contains([p.x, p.y, p.z])
    }

    pub fn center(&self) -> Point3<f64> {
        Point3::new(
            (self.lo[0] + self.hi[0]) / 2.,
            (self.lo[1] + self.hi[1]) / 2.,
            (self.lo[2] + self.hi[2]) / 2.,
        )
    }

    pub fn half_extent(&self) -> Vector3<f64> {
        Vector3::new(self.span(0), self.span(1), self.span(2)) / 2.
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_aabb2_contains() {
        let b = Aabb::from_corners([0f32; 2], [1f32; 2]);
        assert!(b.contains([0.5f32, 0.5f32]));
        assert!(b.contains([1f32, 0f32]));
        assert!(!b.contains([0f32, -1f32]));
        assert!(!b.contains([2f32, 0f32]));
    }

    #[test]
    fn test_corners_in_any_order() {
        let a = Aabb::from_corners([1., -1., 2.], [-1., 1., 0.]);
        assert_eq!(a.low(0), -1.);
        assert_eq!(a.high(2), 2.);
        assert!(a.contains_point(&Point3::new(0., 0., 1.)));
    }

    #[test]
    fn test_aabb3_overlaps() {
        let a = Aabb::from_corners([0f32; 3], [1f32; 3]);
        let b = Aabb::from_corners([0.5f32; 3], [3f32; 3]);
        assert!(a.overlaps(&b));
        let c = Aabb::from_corners([2f32; 3], [3f32; 3]);
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_center_and_extent() {
        let a = Aabb::from_center_and_half_extent([0.2, 1.0, -0.5], [0.01, 0.02, 0.03]);
        assert_abs_diff_eq!(a.center(), Point3::new(0.2, 1.0, -0.5), epsilon = 1e-12);
        assert_abs_diff_eq!(
            a.half_extent(),
            Vector3::new(0.01, 0.02, 0.03),
            epsilon = 1e-12
        );
        assert!(a.contains_point(&Point3::new(0.205, 1.015, -0.52)));
        assert!(!a.contains_point(&Point3::new(0.22, 1.0, -0.5)));
    }
}
