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
use crate::error::ControlError;
use angle_math::{clamp_to_arc, difference_of_degrees, find_nearest_target, Distance};

/// Value the cockpit description uses for an unset range bound.
pub const UNSET_ANGLE: f64 = -1.;

/// Target angles a control snaps to on release, in canonical degrees.
///
/// Two or more detents describe a snapping arc from the first to the last;
/// fewer leave the control free.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetentSet {
    targets: Vec<f64>,
}

impl DetentSet {
    pub fn new(targets: Vec<f64>) -> Self {
        Self { targets }
    }

    pub fn validate(&self, control: &str) -> Result<(), ControlError> {
        for (index, &value) in self.targets.iter().enumerate() {
            if !value.is_finite() {
                return Err(ControlError::InvalidDetent {
                    control: control.to_owned(),
                    index,
                    value,
                });
            }
        }
        Ok(())
    }

    pub fn needs_snapping(&self) -> bool {
        self.targets.len() >= 2
    }

    pub fn arc(&self) -> Option<(f64, f64)> {
        if self.needs_snapping() {
            Some((self.targets[0], self.targets[self.targets.len() - 1]))
        } else {
            None
        }
    }

    /// Degrees swept from the first detent to the last.
    pub fn sweep(&self) -> Option<f64> {
        self.arc().map(|(first, last)| difference_of_degrees(first, last))
    }

    /// Nearest detent to `desired` and its index; None for a free control.
    pub fn nearest(&self, desired: f64, metric: Distance) -> Option<(f64, usize)> {
        if self.needs_snapping() {
            find_nearest_target(desired, &self.targets, metric)
        } else {
            None
        }
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.targets.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.targets
    }
}

/// The arc percentages are measured along.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlRange {
    pub from: f64,
    pub to: f64,
}

impl ControlRange {
    pub fn new(from: f64, to: f64) -> Self {
        Self { from, to }
    }

    /// Either bound set to -1 leaves the range unset.
    pub fn from_sentinel(from: f64, to: f64) -> Option<Self> {
        if from == UNSET_ANGLE || to == UNSET_ANGLE {
            None
        } else {
            Some(Self { from, to })
        }
    }

    pub fn clamp(&self, angle: f64) -> f64 {
        clamp_to_arc(angle, self.from, self.to)
    }
}
