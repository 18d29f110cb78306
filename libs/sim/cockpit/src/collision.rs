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
use bevy_ecs::prelude::*;
use geometry::{Aabb3, Sphere};
use nalgebra::Point3;
use std::time::Duration;

/// After entering a volume, ignore the probe for this long so a press does
/// not bounce.
pub const HOVER_SUSPEND: Duration = Duration::from_millis(500);

pub trait CollisionProbe: Send + Sync {
    fn is_point_inside_activation_volume(&self, point: &Point3<f64>) -> bool;
}

/// World space region a hand has to be in to grab or press a control.
#[derive(Component, Clone, Debug, PartialEq)]
pub enum ActivationVolume {
    Box(Aabb3),
    Sphere(Sphere),
}

impl CollisionProbe for ActivationVolume {
    fn is_point_inside_activation_volume(&self, point: &Point3<f64>) -> bool {
        match self {
            Self::Box(aabb) => aabb.contains_point(point),
            Self::Sphere(sphere) => sphere.contains(point),
        }
    }
}

impl ActivationVolume {
    pub fn bounds(&self) -> Aabb3 {
        match self {
            Self::Box(aabb) => *aabb,
            Self::Sphere(sphere) => sphere.bounds(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HoverTransition {
    Enter,
    Leave,
}

#[derive(Component, Clone, Debug, Default)]
pub struct HoverDetector {
    inside: bool,
    suspended_until: Option<Duration>,
    last: Option<HoverTransition>,
}

impl HoverDetector {
    pub fn is_hovering(&self) -> bool {
        self.inside
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended_until.is_some()
    }

    /// What the most recent update saw.
    pub fn last_transition(&self) -> Option<HoverTransition> {
        self.last
    }

    /// Test `point` at sim time `now`. A suspended detector does nothing on
    /// the tick its suspension lapses.
    pub fn update(
        &mut self,
        probe: &dyn CollisionProbe,
        point: &Point3<f64>,
        now: Duration,
    ) -> Option<HoverTransition> {
        self.last = self.probe(probe, point, now);
        self.last
    }

    fn probe(
        &mut self,
        probe: &dyn CollisionProbe,
        point: &Point3<f64>,
        now: Duration,
    ) -> Option<HoverTransition> {
        if let Some(until) = self.suspended_until {
            if now > until {
                self.suspended_until = None;
            }
            return None;
        }
        let inside = probe.is_point_inside_activation_volume(point);
        match (self.inside, inside) {
            (false, true) => {
                self.inside = true;
                self.suspended_until = Some(now + HOVER_SUSPEND);
                Some(HoverTransition::Enter)
            }
            (true, false) => {
                self.inside = false;
                Some(HoverTransition::Leave)
            }
            _ => None,
        }
    }
}
