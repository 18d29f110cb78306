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

/// How often a control runs its pipeline, in sim ticks. Slower controls keep
/// replication traffic down; the cockpits this was tuned on used 5 and 15.
#[derive(Component, Clone, Copy, Debug, Eq, PartialEq)]
pub struct TickSchedule {
    period: u32,
}

impl Default for TickSchedule {
    fn default() -> Self {
        Self { period: 1 }
    }
}

impl TickSchedule {
    /// A period of 0 is treated as 1.
    pub fn every(period: u32) -> Self {
        Self {
            period: period.max(1),
        }
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    /// Ticks count from 1, so a period of 5 runs on ticks 5, 10, 15...
    pub fn is_due(&self, tick: u64) -> bool {
        tick % u64::from(self.period) == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_every_tick() {
        let s = TickSchedule::default();
        assert!((1..20).all(|t| s.is_due(t)));
        assert_eq!(TickSchedule::every(0), s);
    }

    #[test]
    fn test_period() {
        let s = TickSchedule::every(5);
        let due = (1..=20).filter(|&t| s.is_due(t)).collect::<Vec<_>>();
        assert_eq!(due, vec![5, 10, 15, 20]);
    }
}
