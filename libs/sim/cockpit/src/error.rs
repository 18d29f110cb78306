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
use crate::authority::{ControlId, Epoch};
use angle_math::AngleError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ControlError {
    #[error(transparent)]
    InvalidRange(#[from] AngleError),

    #[error("{control}: detent {index} is not an angle: {value}")]
    InvalidDetent {
        control: String,
        index: usize,
        value: f64,
    },

    #[error("{control}: no {collaborator} configured")]
    MissingCollaborator {
        control: String,
        collaborator: &'static str,
    },

    #[error("{control}: bad geometry: {reason}")]
    InvalidGeometry { control: String, reason: String },

    #[error("{control}: discarded snapshot at {epoch:?} while locally authoritative")]
    StaleAuthority { control: ControlId, epoch: Epoch },
}

impl ControlError {
    pub fn missing(control: &str, collaborator: &'static str) -> Self {
        Self::MissingCollaborator {
            control: control.to_owned(),
            collaborator,
        }
    }

    /// Expected during ownership hand-off; not worth reporting.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StaleAuthority { .. })
    }
}
