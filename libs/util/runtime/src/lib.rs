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
mod timestep;

pub use crate::timestep::{TimeStep, TimeStepStep};

use anyhow::{anyhow, Result};
use bevy_ecs::{
    prelude::*,
    schedule::IntoSystemDescriptor,
    system::Resource,
    world::EntityMut,
};

/// Interface for extending the Runtime.
pub trait Extension {
    fn init(runtime: &mut Runtime) -> Result<()>;
}

/// The simulation runs these stages in order, once per tick. Every stage is
/// single threaded so that a tick is a deterministic sequence of steps.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, StageLabel)]
pub enum SimStage {
    TimeStep,
    ReceiveReplication,
    ReadInput,
    UpdateControls,
    Replicate,
}

impl SimStage {
    pub fn all() -> [SimStage; 5] {
        [
            Self::TimeStep,
            Self::ReceiveReplication,
            Self::ReadInput,
            Self::UpdateControls,
            Self::Replicate,
        ]
    }
}

pub struct Runtime {
    pub world: World,
    sim_schedule: Schedule,
}

impl Default for Runtime {
    fn default() -> Self {
        let mut sim_schedule = Schedule::default();
        for stage in SimStage::all() {
            sim_schedule.add_stage(stage, SystemStage::single_threaded());
        }

        Self {
            world: World::default(),
            sim_schedule,
        }
    }
}

impl Runtime {
    #[inline]
    pub fn sim_stage_mut(&mut self, sim_stage: SimStage) -> &mut SystemStage {
        self.sim_schedule
            .get_stage_mut(&sim_stage)
            .expect("all sim stages are created with the runtime")
    }

    /// Systems without a more specific home run with the controls.
    #[inline]
    pub fn add_sim_system<Params>(
        &mut self,
        system: impl IntoSystemDescriptor<Params>,
    ) -> &mut Self {
        self.sim_stage_mut(SimStage::UpdateControls)
            .add_system(system);
        self
    }

    #[inline]
    pub fn add_sim_system_to<Params>(
        &mut self,
        sim_stage: SimStage,
        system: impl IntoSystemDescriptor<Params>,
    ) -> &mut Self {
        self.sim_stage_mut(sim_stage).add_system(system);
        self
    }

    #[inline]
    pub fn load_extension<T: Extension>(&mut self) -> Result<&mut Self> {
        T::init(self)?;
        Ok(self)
    }

    #[inline]
    pub fn insert_resource<T: Resource>(&mut self, value: T) -> &mut Self {
        self.world.insert_resource(value);
        self
    }

    #[inline]
    pub fn insert_non_send<T: 'static>(&mut self, value: T) -> &mut Self {
        self.world.insert_non_send_resource(value);
        self
    }

    #[inline]
    pub fn maybe_resource<T: Resource>(&self) -> Option<&T> {
        self.world.get_resource()
    }

    #[inline]
    pub fn resource<T: Resource>(&self) -> Result<&T> {
        self.world
            .get_resource()
            .ok_or_else(|| anyhow!("unset resource: {}", std::any::type_name::<T>()))
    }

    #[inline]
    pub fn resource_mut<T: Resource>(&mut self) -> Result<Mut<T>> {
        self.world
            .get_resource_mut()
            .ok_or_else(|| anyhow!("unset resource: {}", std::any::type_name::<T>()))
    }

    #[inline]
    pub fn remove_resource<T: Resource>(&mut self) -> Option<T> {
        self.world.remove_resource()
    }

    #[inline]
    pub fn spawn(&mut self) -> EntityMut<'_> {
        self.world.spawn()
    }

    /// Advance the simulation by exactly one tick.
    pub fn run_sim_once(&mut self) {
        let tick = self
            .world
            .get_resource::<TimeStep>()
            .map(|ts| ts.tick() + 1)
            .unwrap_or_default();
        let span = tracing::debug_span!("sim_tick", tick);
        let _enter = span.enter();
        self.sim_schedule.run_once(&mut self.world);
    }

    pub fn run_sim_ticks(&mut self, count: usize) {
        for _ in 0..count {
            self.run_sim_once();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works() {
        let _ = Runtime::default();
    }

    #[test]
    fn test_missing_resource_is_an_error() {
        let runtime = Runtime::default();
        assert!(runtime.resource::<TimeStep>().is_err());
        assert!(runtime.maybe_resource::<TimeStep>().is_none());
    }
}
