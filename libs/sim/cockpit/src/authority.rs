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
use std::fmt;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ParticipantId(u32);

impl ParticipantId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "participant#{}", self.0)
    }
}

/// Names a control on every participant. Assigned by the cockpit description,
/// so it is the same everywhere.
#[derive(Component, Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ControlId(u32);

impl ControlId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "control#{}", self.0)
    }
}

/// Ownership generation. Every accepted ownership claim moves the epoch
/// forward by one; a claim naming an older epoch has lost a race.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Epoch(u64);

impl Epoch {
    pub const fn new(epoch: u64) -> Self {
        Self(epoch)
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Who may write a control's state, as seen from one participant.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Authority {
    Local,
    Remote(ParticipantId),
}

impl Authority {
    pub fn for_owner(owner: ParticipantId, local: ParticipantId) -> Self {
        if owner == local {
            Self::Local
        } else {
            Self::Remote(owner)
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local)
    }

    pub fn owner(&self, local: ParticipantId) -> ParticipantId {
        match self {
            Self::Local => local,
            Self::Remote(owner) => *owner,
        }
    }
}
