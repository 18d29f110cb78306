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

//! Degree arithmetic shared by every rotary control.
//!
//! Two representations are in play. Canonical angles live in [0, 360) and are
//! what all clamping, snapping and percentage math is done in. Signed rotations
//! live in (-180, 180] and are what actually gets applied to a rotator.
use thiserror::Error;

pub const FULL_TURN: f64 = 360.;
const HALF_TURN: f64 = 180.;

#[derive(Clone, Copy, Debug, Error, PartialEq)]
pub enum AngleError {
    #[error("range {from}d -> {to}d has no angular span")]
    InvalidRange { from: f64, to: f64 },
}

/// Wrap any finite angle into [0, 360).
///
/// Equivalent to `((degrees % 360) + 360) % 360`, but exact for inputs that
/// are already canonical, so that the operation is idempotent. Non-finite
/// input yields NaN.
pub fn normalize_360(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(FULL_TURN);
    // rem_euclid may round up to exactly 360 for tiny negative inputs; this
    // also folds -0 into 0.
    if wrapped >= FULL_TURN || wrapped == 0. {
        0.
    } else {
        wrapped
    }
}

/// Convert a canonical angle into the (-180, 180] form used by rotators.
pub fn to_signed_rotation(canonical: f64) -> f64 {
    if canonical > HALF_TURN {
        canonical - FULL_TURN
    } else {
        canonical
    }
}

/// Inverse of `to_signed_rotation`.
#[inline]
pub fn from_signed_rotation(rotation: f64) -> f64 {
    normalize_360(rotation)
}

/// Sweep from `a` to `b` moving in the increasing direction, in [0, 360).
#[inline]
pub fn difference_of_degrees(a: f64, b: f64) -> f64 {
    normalize_360(b - a)
}

/// Shortest unsigned distance around the circle, in [0, 180].
pub fn circular_distance(a: f64, b: f64) -> f64 {
    let difference = (a - b).abs() % FULL_TURN;
    if difference > HALF_TURN {
        FULL_TURN - difference
    } else {
        difference
    }
}

/// Keep `angle` inside the arc running from `min` up to `max`.
///
/// Angles already on the arc are returned untouched. Angles in the excluded
/// region go to whichever bound is nearer, split at the midpoint of the
/// excluded region; an angle sitting exactly on that midpoint goes to `max`.
/// An arc with `min == 0` therefore treats `min` as 360 for anything above
/// `max`.
///
/// Arcs that cross the 0/360 seam (`min > max`) are never clamped. Levers whose
/// travel crosses 0 depend on that passthrough, so it is part of the contract.
pub fn clamp_to_arc(angle: f64, min: f64, max: f64) -> f64 {
    if min > max {
        return angle;
    }
    if angle >= min && angle <= max {
        return angle;
    }

    // Lift into (max, min + 360) so the excluded region is contiguous.
    let lifted = if angle < min { angle + FULL_TURN } else { angle };
    let midpoint = (max + min + FULL_TURN) / 2.;
    if lifted > midpoint {
        min
    } else {
        max
    }
}

/// How nearness to a detent is measured.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Distance {
    /// Plain numeric difference. Does not see across the 0/360 seam.
    #[default]
    Absolute,

    /// True angular distance around the circle.
    Circular,
}

impl Distance {
    pub fn between(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Absolute => (a - b).abs(),
            Self::Circular => circular_distance(a, b),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "absolute" => Self::Absolute,
            "circular" => Self::Circular,
            _ => return None,
        })
    }
}

/// Find the target nearest to `desired`, returning the target and its index.
///
/// Ties go to the earliest target. Returns None for an empty target list.
pub fn find_nearest_target(desired: f64, targets: &[f64], metric: Distance) -> Option<(f64, usize)> {
    let mut nearest: Option<(f64, usize, f64)> = None;
    for (index, &target) in targets.iter().enumerate() {
        let distance = metric.between(desired, target);
        match nearest {
            Some((_, _, best)) if distance >= best => {}
            _ => nearest = Some((target, index, distance)),
        }
    }
    nearest.map(|(target, index, _)| (target, index))
}

/// Which arc between two bounds a percentage is measured along.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum PercentMapping {
    /// 0% at `from`, 100% at `to`, travelling in the increasing direction and
    /// wrapping through 0 when `to < from`.
    #[default]
    Directional,

    /// The reflex arc that avoids the numeric interval between the bounds:
    /// 0% at the larger bound, increasing through 0 to 100% at the smaller.
    /// A knob with a dead zone between 140d and 220d sweeps 280 degrees.
    Reflex,
}

impl PercentMapping {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "directional" => Self::Directional,
            "reflex" => Self::Reflex,
            _ => return None,
        })
    }

    // Returns the 0% angle and the span of the arc.
    fn arc(self, from: f64, to: f64) -> (f64, f64) {
        match self {
            Self::Directional => (from, difference_of_degrees(from, to)),
            Self::Reflex => {
                let (lo, hi) = if from < to { (from, to) } else { (to, from) };
                (hi, FULL_TURN - (hi - lo))
            }
        }
    }
}

/// Map a canonical angle onto [0, 100] along the arc described by `mapping`.
///
/// Angles off the arc resolve to whichever end is angularly nearer.
pub fn degrees_to_percentage(
    degrees: f64,
    from: f64,
    to: f64,
    mapping: PercentMapping,
) -> Result<f64, AngleError> {
    let invalid = AngleError::InvalidRange { from, to };
    if !(degrees.is_finite() && from.is_finite() && to.is_finite()) || from == to {
        return Err(invalid);
    }
    let (start, span) = mapping.arc(from, to);
    if span <= 0. || !span.is_finite() {
        return Err(invalid);
    }

    let position = difference_of_degrees(start, degrees);
    if position <= span {
        return Ok((position / span * 100.).min(100.));
    }
    let past_end = position - span;
    let before_start = FULL_TURN - position;
    Ok(if past_end <= before_start { 100. } else { 0. })
}
