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
use crate::Aabb;
use nalgebra::Point3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sphere {
    center: Point3<f64>,
    radius: f64,
}

impl Default for Sphere {
    fn default() -> Self {
        Self {
            center: Point3::origin(),
            radius: 1_f64,
        }
    }
}

impl Sphere {
    pub fn from_center_and_radius(center: &Point3<f64>, radius: f64) -> Self {
        Self {
            center: *center,
            radius: radius.abs(),
        }
    }

    pub fn center(&self) -> &Point3<f64> {
        &self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Points on the surface count as inside.
    pub fn contains(&self, p: &Point3<f64>) -> bool {
        (p - self.center).norm_squared() <= self.radius * self.radius
    }

    pub fn bounds(&self) -> Aabb<f64, 3> {
        let c = self.center;
        Aabb::from_center_and_half_extent([c.x, c.y, c.z], [self.radius; 3])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sphere_contains() {
        let s = Sphere::from_center_and_radius(&Point3::new(1., 2., 3.), 0.5);
        assert!(s.contains(&Point3::new(1., 2., 3.)));
        assert!(s.contains(&Point3::new(1.5, 2., 3.)));
        assert!(!s.contains(&Point3::new(1.4, 2.4, 3.)));
    }

    #[test]
    fn test_bounds_enclose_the_sphere() {
        let s = Sphere::from_center_and_radius(&Point3::new(0., 0., 0.), -2.);
        assert_eq!(s.radius(), 2.);
        let b = s.bounds();
        assert!(b.contains_point(&Point3::new(2., 2., 2.)));
        assert!(!s.contains(&Point3::new(2., 2., 2.)));
    }
}
