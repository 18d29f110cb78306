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
use anyhow::Result;
use bevy_ecs::prelude::*;
use runtime::{Extension, Runtime, SimStage, TimeStep};
use std::time::Duration;

#[derive(Debug, Default)]
struct StageLog {
    entries: Vec<(u64, SimStage)>,
}

#[derive(Component, Debug, Default)]
struct Counter {
    ticks: usize,
}

struct Recording;

impl Extension for Recording {
    fn init(runtime: &mut Runtime) -> Result<()> {
        runtime.insert_resource(StageLog::default());
        // Register out of order; stage order must still win.
        runtime.add_sim_system_to(SimStage::Replicate, sys_replicate);
        runtime.add_sim_system_to(SimStage::ReadInput, sys_read_input);
        runtime.add_sim_system(sys_update_controls);
        runtime.add_sim_system_to(SimStage::ReceiveReplication, sys_receive);
        Ok(())
    }
}

fn sys_receive(timestep: Res<TimeStep>, mut log: ResMut<StageLog>) {
    log.entries
        .push((timestep.tick(), SimStage::ReceiveReplication));
}

fn sys_read_input(timestep: Res<TimeStep>, mut log: ResMut<StageLog>) {
    log.entries.push((timestep.tick(), SimStage::ReadInput));
}

fn sys_update_controls(
    timestep: Res<TimeStep>,
    mut log: ResMut<StageLog>,
    mut query: Query<&mut Counter>,
) {
    for mut counter in query.iter_mut() {
        counter.ticks += 1;
    }
    log.entries.push((timestep.tick(), SimStage::UpdateControls));
}

fn sys_replicate(timestep: Res<TimeStep>, mut log: ResMut<StageLog>) {
    log.entries.push((timestep.tick(), SimStage::Replicate));
}

#[test]
fn integration_test() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut runtime = Runtime::default();
    runtime.insert_resource(TimeStep::with_step(Duration::from_millis(20))?);
    runtime
        .load_extension::<TimeStep>()?
        .load_extension::<Recording>()?;
    let entity = runtime.spawn().insert(Counter::default()).id();

    runtime.run_sim_ticks(3);

    assert_eq!(runtime.resource::<TimeStep>()?.tick(), 3);
    assert_eq!(
        runtime.resource::<TimeStep>()?.now(),
        Duration::from_millis(60)
    );
    assert_eq!(
        runtime.world.get::<Counter>(entity).map(|c| c.ticks),
        Some(3)
    );

    let log = runtime.resource::<StageLog>()?;
    assert_eq!(log.entries.len(), 12);
    for (i, chunk) in log.entries.chunks(4).enumerate() {
        let tick = i as u64 + 1;
        assert_eq!(
            chunk,
            &[
                (tick, SimStage::ReceiveReplication),
                (tick, SimStage::ReadInput),
                (tick, SimStage::UpdateControls),
                (tick, SimStage::Replicate),
            ]
        );
    }
    Ok(())
}

#[test]
fn test_extension_keeps_configured_timestep() -> Result<()> {
    let mut runtime = Runtime::default();
    runtime.insert_resource(TimeStep::with_step(Duration::from_millis(100))?);
    runtime.load_extension::<TimeStep>()?;
    runtime.run_sim_once();
    assert_eq!(
        runtime.resource::<TimeStep>()?.now(),
        Duration::from_millis(100)
    );
    Ok(())
}
