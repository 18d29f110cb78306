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
use crate::{Extension, Runtime, SimStage};
use anyhow::{ensure, Result};
use bevy_ecs::prelude::*;
use std::time::Duration;

#[derive(Clone, Debug, Eq, PartialEq, Hash, SystemLabel)]
pub enum TimeStepStep {
    Tick,
}

/// Simulated time. Advances by a fixed step once per sim tick, so every
/// participant that runs the same number of ticks agrees on the time.
#[derive(Clone, Debug)]
pub struct TimeStep {
    tick: u64,
    now: Duration,
    delta: Duration,
}

impl Extension for TimeStep {
    fn init(runtime: &mut Runtime) -> Result<()> {
        if runtime.maybe_resource::<TimeStep>().is_none() {
            runtime.insert_resource(TimeStep::new_60fps());
        }
        runtime.add_sim_system_to(
            SimStage::TimeStep,
            Self::sys_tick_time.label(TimeStepStep::Tick),
        );
        Ok(())
    }
}

impl TimeStep {
    pub fn new_60fps() -> Self {
        Self {
            tick: 0,
            now: Duration::ZERO,
            delta: Duration::from_micros(1_000_000 / 60),
        }
    }

    pub fn with_step(delta: Duration) -> Result<Self> {
        ensure!(!delta.is_zero(), "time step must be positive");
        Ok(Self {
            tick: 0,
            now: Duration::ZERO,
            delta,
        })
    }

    pub fn sys_tick_time(mut timestep: ResMut<TimeStep>) {
        timestep.advance();
    }

    pub fn advance(&mut self) {
        self.tick += 1;
        self.now += self.delta;
    }

    /// Number of completed ticks; 0 before the first tick runs.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Simulated time since start.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn step(&self) -> &Duration {
        &self.delta
    }

    pub fn next_now(&self) -> Duration {
        self.now + self.delta
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_zero_step_rejected() {
        assert!(TimeStep::with_step(Duration::ZERO).is_err());
    }

    #[test]
    fn test_advance_is_fixed() -> Result<()> {
        let mut ts = TimeStep::with_step(Duration::from_millis(10))?;
        assert_eq!(ts.tick(), 0);
        for _ in 0..50 {
            ts.advance();
        }
        assert_eq!(ts.tick(), 50);
        assert_eq!(ts.now(), Duration::from_millis(500));
        assert_eq!(ts.next_now(), Duration::from_millis(510));
        Ok(())
    }
}
