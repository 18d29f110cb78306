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
use anyhow::{bail, Context, Result};
use cockpit::{
    Axis, Cockpit, CockpitConfig, ControlId, GrabScript, HandPose, HandTracking, LoopbackHub,
    ParticipantId, ReceiverSink, Recorder, Replication, ScriptedPose, Session,
};
use log::{info, warn};
use nalgebra::Point3;
use runtime::{Runtime, TimeStep};
use std::{collections::BTreeMap, fs, path::PathBuf};
use structopt::StructOpt;
use tracelog::{TraceLog, TraceLogOpts};

const CAPTAIN: ParticipantId = ParticipantId::new(1);
const FIRST_OFFICER: ParticipantId = ParticipantId::new(2);

/// Fly a scripted two seat session against a cockpit description
#[derive(Debug, StructOpt)]
struct Opt {
    /// Cockpit description to load
    #[structopt(parse(from_os_str), default_value = "demos/a320.json")]
    cockpit: PathBuf,

    /// Number of sim ticks to run
    #[structopt(short, long, default_value = "240")]
    ticks: usize,

    #[structopt(flatten)]
    tracelog_opts: TraceLogOpts,
}

struct Seat {
    name: &'static str,
    runtime: Runtime,
    recorders: BTreeMap<String, Recorder>,
}

impl Seat {
    fn new(
        name: &'static str,
        mut runtime: Runtime,
        participant: ParticipantId,
        hub: &LoopbackHub,
        cockpit: &CockpitConfig,
        hand: ScriptedPose,
        grabs: GrabScript,
    ) -> Result<Self> {
        runtime
            .insert_resource(Session::new(participant, CAPTAIN))
            .insert_resource(HandTracking::new(Box::new(hand)))
            .insert_resource(Replication::new(Box::new(hub.join(participant))))
            .insert_resource(grabs);
        runtime
            .load_extension::<TimeStep>()?
            .load_extension::<Cockpit>()?;

        let mut recorders = BTreeMap::new();
        let spawned = Cockpit::spawn(&mut runtime, cockpit, |control| {
            let recorder = Recorder::default();
            recorders.insert(control.to_owned(), recorder.clone());
            vec![Box::new(recorder) as Box<dyn ReceiverSink>]
        })?;
        info!("{}: {} controls in the {}", name, spawned, cockpit.name);
        Ok(Self {
            name,
            runtime,
            recorders,
        })
    }

    fn report(&self, cockpit: &CockpitConfig) {
        println!("{}:", self.name);
        for control in &cockpit.controls {
            if let Ok(state) = Cockpit::control_state(&self.runtime, control.id) {
                println!(
                    "  {:<8} {:?} at {:>7.2} index {:?} percent {:?}",
                    state.name(),
                    state.authority(),
                    state.visible_angle(),
                    state.selected_index(),
                    state.last_percent(),
                );
            }
        }
        for button in &cockpit.buttons {
            if let Ok(button) = Cockpit::push_button(&self.runtime, button.id) {
                println!("  {:<8} {:?} lamps {:?}", button.name(), button.authority(), button.lamps());
            }
        }
        for (control, recorder) in &self.recorders {
            println!("  {:<8} {} notifications", control, recorder.notifications().len());
        }
    }
}

fn rest() -> HandPose {
    HandPose::at(Point3::new(0., 0., 1.))
}

// The captain runs the thrust lever up, dials in a speed, turns the strobes
// on and engages the autopilot.
fn captain_script() -> (ScriptedPose, GrabScript) {
    let thr = |z: f64| HandPose::at(Point3::new(0., 0., z));
    let spd = |deg: f64| HandPose::at(Point3::new(0.3, 0.2, 0.)).twisted(Axis::Z, deg);
    let strobe = |deg: f64| HandPose::at(Point3::new(0.3, -0.2, 0.)).twisted(Axis::X, deg);
    let ap = HandPose::at(Point3::new(0.6, 0., 0.));
    let hand = ScriptedPose::new(rest())
        .then_at(10, thr(-0.2))
        .then_at(14, thr(-0.2))
        .then_at(54, thr(0.2))
        .then_at(62, thr(0.2))
        .then_at(70, spd(30.))
        .then_at(74, spd(30.))
        .then_at(84, spd(90.))
        .then_at(94, spd(180.))
        .then_at(104, spd(180.))
        .then_at(110, strobe(90.))
        .then_at(114, strobe(90.))
        .then_at(122, strobe(10.))
        .then_at(130, strobe(10.))
        .then_at(138, ap)
        .then_at(150, rest());
    let grabs = GrabScript::default()
        .press_at(12)
        .release_at(58)
        .press_at(72)
        .release_at(100)
        .press_at(112)
        .release_at(126);
    (hand, grabs)
}

// The first officer reaches over and turns the strobes back off.
fn first_officer_script() -> (ScriptedPose, GrabScript) {
    let strobe = |deg: f64| HandPose::at(Point3::new(0.3, -0.2, 0.)).twisted(Axis::X, deg);
    let hand = ScriptedPose::new(rest())
        .then_at(160, rest())
        .then_at(170, strobe(10.))
        .then_at(174, strobe(10.))
        .then_at(184, strobe(170.))
        .then_at(196, strobe(170.))
        .then_at(210, rest());
    let grabs = GrabScript::default().press_at(172).release_at(190);
    (hand, grabs)
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    // There is one global subscriber per process; the captain's runtime
    // carries it.
    let mut runtime = Runtime::default();
    runtime
        .insert_resource(opt.tracelog_opts.clone())
        .load_extension::<TraceLog>()?;

    let content = fs::read_to_string(&opt.cockpit)
        .with_context(|| format!("reading {}", opt.cockpit.display()))?;
    let cockpit = CockpitConfig::from_json(&content)?;

    let hub = LoopbackHub::new(CAPTAIN);
    let (hand, grabs) = captain_script();
    let mut captain = Seat::new("captain", runtime, CAPTAIN, &hub, &cockpit, hand, grabs)?;
    let (hand, grabs) = first_officer_script();
    let mut first_officer = Seat::new(
        "first officer",
        Runtime::default(),
        FIRST_OFFICER,
        &hub,
        &cockpit,
        hand,
        grabs,
    )?;

    for _ in 0..opt.ticks {
        captain.runtime.run_sim_once();
        first_officer.runtime.run_sim_once();
    }
    // Let the last syncs land.
    captain.runtime.run_sim_once();
    first_officer.runtime.run_sim_once();

    captain.report(&cockpit);
    first_officer.report(&cockpit);
    for (seat, participant) in [("captain", CAPTAIN), ("first officer", FIRST_OFFICER)] {
        println!("{} hub traffic: {:?}", seat, hub.stats(participant));
    }

    let mut diverged = 0;
    let ids = cockpit
        .controls
        .iter()
        .map(|c| c.id)
        .chain(cockpit.buttons.iter().map(|b| b.id))
        .collect::<Vec<ControlId>>();
    for id in ids {
        let (ours, theirs) = match (
            Cockpit::control_state(&captain.runtime, id),
            Cockpit::control_state(&first_officer.runtime, id),
        ) {
            (Ok(ours), Ok(theirs)) => (ours.snapshot(), theirs.snapshot()),
            _ => match (
                Cockpit::push_button(&captain.runtime, id),
                Cockpit::push_button(&first_officer.runtime, id),
            ) {
                (Ok(ours), Ok(theirs)) => (ours.snapshot(), theirs.snapshot()),
                _ => continue,
            },
        };
        if ours != theirs {
            warn!("{} diverged: {:?} vs {:?}", id, ours, theirs);
            diverged += 1;
        }
    }
    if diverged > 0 {
        bail!("{} controls did not converge", diverged);
    }
    println!("all controls converged");
    Ok(())
}
