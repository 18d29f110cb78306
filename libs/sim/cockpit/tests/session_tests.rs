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

// Two participants sharing one cockpit over a loopback hub.
use anyhow::Result;
use cockpit::{
    ActivationVolume, Authority, Axis, ButtonConfig, Cockpit, CockpitConfig, ControlConfig,
    ControlId, ControlKind, ControlState, ControlValue, Epoch, GrabEvent, GrabEvents,
    HandPose, HandTracking, LoopbackChannel, LoopbackHub, ParticipantId,
    ProjectionConfig, PushButton, ReceiverSink, ReceiverSpec, Recorder, Replicated,
    Replication, ReplicationChannel, Session, Snapshot, TrackedPose,
};
use geometry::{Aabb3, Sphere};
use nalgebra::Point3;
use runtime::{Runtime, TimeStep};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

const A: ParticipantId = ParticipantId::new(1);
const B: ParticipantId = ParticipantId::new(2);
const THROTTLE: ControlId = ControlId::new(1);
const STROBE: ControlId = ControlId::new(2);
const AP: ControlId = ControlId::new(3);

fn around_origin() -> ActivationVolume {
    ActivationVolume::Sphere(Sphere::from_center_and_radius(&Point3::origin(), 0.1))
}

fn button_position() -> Point3<f64> {
    Point3::new(1., 0., 0.)
}

fn throttle() -> ControlConfig {
    ControlConfig::new(THROTTLE, "THROTTLE", ControlKind::AxisInput)
        .with_projection(ProjectionConfig::twist(Axis::Z))
        .with_volume(around_origin())
        .with_range(135., 315.)
        .with_default_rotation(135., 0.)
}

fn strobe() -> ControlConfig {
    ControlConfig::new(STROBE, "STROBE", ControlKind::Switch)
        .with_projection(ProjectionConfig::twist(Axis::Z))
        .with_volume(around_origin())
        .with_detents(&[0., 90., 180.])
        .with_default_rotation(90., 0.)
        .with_receiver(ReceiverSpec::StrobeLights)
}

fn autopilot() -> ButtonConfig {
    ButtonConfig::new(AP, "AP").with_volume(ActivationVolume::Box(Aabb3::from_corners(
        [0.95, -0.05, -0.05],
        [1.05, 0.05, 0.05],
    )))
}

fn cockpit(controls: Vec<ControlConfig>, buttons: Vec<ButtonConfig>) -> CockpitConfig {
    CockpitConfig {
        name: "session".to_owned(),
        controls,
        buttons,
    }
}

struct Participant {
    runtime: Runtime,
    hand: TrackedPose,
    recorders: HashMap<String, Recorder>,
}

impl Participant {
    fn join(hub: &LoopbackHub, id: ParticipantId, cockpit: &CockpitConfig) -> Result<Self> {
        Self::with_channel(Box::new(hub.join(id)), id, cockpit)
    }

    fn with_channel(
        channel: Box<dyn ReplicationChannel>,
        id: ParticipantId,
        cockpit: &CockpitConfig,
    ) -> Result<Self> {
        let hand = TrackedPose::default();
        let mut runtime = Runtime::default();
        runtime
            .insert_resource(Session::new(id, A))
            .insert_resource(HandTracking::new(Box::new(hand.clone())))
            .insert_resource(Replication::new(channel));
        runtime
            .load_extension::<TimeStep>()?
            .load_extension::<Cockpit>()?;

        let mut recorders = HashMap::new();
        Cockpit::spawn(&mut runtime, cockpit, |name| {
            let recorder = Recorder::default();
            recorders.insert(name.to_owned(), recorder.clone());
            vec![Box::new(recorder) as Box<dyn ReceiverSink>]
        })?;
        Ok(Self {
            runtime,
            hand,
            recorders,
        })
    }

    fn recorder(&self, name: &str) -> &Recorder {
        &self.recorders[name]
    }

    fn twist(&self, degrees: f64) {
        self.hand
            .publish(HandPose::default().twisted(Axis::Z, degrees));
    }

    fn reach(&self, position: Point3<f64>) {
        self.hand.publish(HandPose::at(position));
    }

    fn grab(&mut self) -> Result<()> {
        self.runtime
            .resource_mut::<GrabEvents>()?
            .push(GrabEvent::Press);
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.runtime
            .resource_mut::<GrabEvents>()?
            .push(GrabEvent::Release);
        Ok(())
    }

    fn tick(&mut self) {
        self.runtime.run_sim_once();
    }

    fn state(&self, control: ControlId) -> Result<&ControlState> {
        Cockpit::control_state(&self.runtime, control)
    }

    fn button(&self, control: ControlId) -> Result<&PushButton> {
        Cockpit::push_button(&self.runtime, control)
    }
}

fn step(a: &mut Participant, b: &mut Participant) {
    a.tick();
    b.tick();
}

fn steps(a: &mut Participant, b: &mut Participant, count: usize) {
    for _ in 0..count {
        step(a, b);
    }
}

#[test]
fn test_unsnapped_lever_sweep() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let hub = LoopbackHub::new(A);
    let cockpit = cockpit(vec![throttle()], vec![]);
    let mut a = Participant::join(&hub, A, &cockpit)?;
    let mut b = Participant::join(&hub, B, &cockpit)?;

    a.twist(135.);
    a.grab()?;
    let mut angle = 135.;
    while angle < 315. {
        a.twist(angle);
        step(&mut a, &mut b);
        angle += 0.9;
    }
    a.twist(315.);
    step(&mut a, &mut b);
    a.release()?;
    steps(&mut a, &mut b, 2);

    let expected = (0..=100).map(f64::from).collect::<Vec<_>>();
    assert_eq!(a.recorder("THROTTLE").percents(), expected);
    assert_eq!(b.recorder("THROTTLE").percents(), expected);
    assert_eq!(b.state(THROTTLE)?.snapshot(), a.state(THROTTLE)?.snapshot());
    assert_eq!(b.state(THROTTLE)?.holder(), None);
    Ok(())
}

#[test]
fn test_snapped_switch() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let hub = LoopbackHub::new(A);
    let cockpit = cockpit(vec![strobe()], vec![]);
    let mut a = Participant::join(&hub, A, &cockpit)?;
    let mut b = Participant::join(&hub, B, &cockpit)?;

    // Spawning snapped the owner to its default detent.
    assert_eq!(a.recorder("STROBE").indices(), vec![1]);
    assert!(b.recorder("STROBE").indices().is_empty());

    a.grab()?;
    a.twist(40.);
    step(&mut a, &mut b);
    a.release()?;
    steps(&mut a, &mut b, 2);
    assert_eq!(a.recorder("STROBE").indices(), vec![1, 0]);
    assert_eq!(b.recorder("STROBE").indices(), vec![1, 0]);
    assert_eq!(b.state(STROBE)?.visible_angle(), 0.);

    a.grab()?;
    a.twist(140.);
    step(&mut a, &mut b);
    a.release()?;
    steps(&mut a, &mut b, 2);
    assert_eq!(a.recorder("STROBE").indices(), vec![1, 0, 2]);
    assert_eq!(b.recorder("STROBE").indices(), vec![1, 0, 2]);
    assert_eq!(b.state(STROBE)?.selected_index(), Some(2));
    assert_eq!(b.state(STROBE)?.visible_angle(), 180.);
    Ok(())
}

struct CountingChannel {
    inner: LoopbackChannel,
    syncs: Arc<AtomicUsize>,
}

impl ReplicationChannel for CountingChannel {
    fn participant(&self) -> ParticipantId {
        self.inner.participant()
    }

    fn claim(&mut self, control: ControlId, expected: Epoch) {
        self.inner.claim(control, expected);
    }

    fn request_sync(&mut self, snapshot: Snapshot) -> bool {
        self.syncs.fetch_add(1, Ordering::SeqCst);
        self.inner.request_sync(snapshot)
    }

    fn poll(&mut self) -> Vec<Replicated> {
        self.inner.poll()
    }
}

#[test]
fn test_still_hand_does_not_resync() -> Result<()> {
    let hub = LoopbackHub::new(A);
    let cockpit = cockpit(vec![strobe()], vec![]);
    let syncs = Arc::new(AtomicUsize::new(0));
    let channel = CountingChannel {
        inner: hub.join(A),
        syncs: syncs.clone(),
    };
    let mut a = Participant::with_channel(Box::new(channel), A, &cockpit)?;

    a.grab()?;
    a.twist(60.);
    a.tick();
    assert_eq!(syncs.load(Ordering::SeqCst), 1);
    for _ in 0..10 {
        a.tick();
    }
    assert_eq!(syncs.load(Ordering::SeqCst), 1);

    a.twist(61.);
    a.tick();
    assert_eq!(syncs.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn test_simultaneous_grab_has_one_winner() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let hub = LoopbackHub::new(A);
    let cockpit = cockpit(vec![strobe()], vec![]);
    let mut a = Participant::join(&hub, A, &cockpit)?;
    let mut b = Participant::join(&hub, B, &cockpit)?;
    step(&mut a, &mut b);

    // Neither hears about the other's grab until both have acted on it.
    hub.hold_deliveries(true);
    a.twist(30.);
    b.twist(60.);
    a.grab()?;
    b.grab()?;
    step(&mut a, &mut b);
    assert!(a.state(STROBE)?.is_authority());
    assert!(b.state(STROBE)?.is_authority());
    hub.hold_deliveries(false);
    steps(&mut a, &mut b, 3);

    let stats = hub.stats(B);
    assert_eq!(stats.claims_rejected, 1);
    assert_eq!(stats.syncs_accepted, 0);
    assert!(stats.syncs_rejected >= 1);
    assert_eq!(hub.owner_of(STROBE), (A, Epoch::new(1)));

    assert_eq!(b.state(STROBE)?.authority(), Authority::Remote(A));
    assert_eq!(hub.latest(STROBE), Some(a.state(STROBE)?.snapshot()));
    assert_eq!(b.state(STROBE)?.snapshot(), a.state(STROBE)?.snapshot());
    match hub.latest(STROBE).map(|s| s.value) {
        Some(ControlValue::Angular { raw_angle, .. }) => assert!((raw_angle - 30.).abs() < 1e-9),
        other => panic!("unexpected latest: {:?}", other),
    }

    // The loser's hand keeps moving and its release does nothing.
    b.twist(170.);
    b.release()?;
    a.release()?;
    steps(&mut a, &mut b, 3);
    assert_eq!(a.state(STROBE)?.selected_index(), Some(0));
    assert_eq!(b.state(STROBE)?.snapshot(), a.state(STROBE)?.snapshot());
    assert_eq!(hub.latest(STROBE), Some(a.state(STROBE)?.snapshot()));
    Ok(())
}

#[test]
fn test_holder_leaving_mid_drag_frees_the_control() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let hub = LoopbackHub::new(A);
    let cockpit = cockpit(vec![strobe()], vec![]);
    let mut a = Participant::join(&hub, A, &cockpit)?;
    let mut b = Participant::join(&hub, B, &cockpit)?;
    step(&mut a, &mut b);

    b.grab()?;
    b.twist(40.);
    step(&mut a, &mut b);
    a.tick();
    assert_eq!(a.state(STROBE)?.holder(), Some(B));

    hub.leave(B);
    for _ in 0..3 {
        a.tick();
    }
    assert_eq!(hub.owner_of(STROBE), (A, Epoch::new(2)));
    assert!(a.state(STROBE)?.is_authority());
    assert_eq!(a.state(STROBE)?.holder(), None);
    // The abandoned drag settles on the nearest detent.
    assert_eq!(a.state(STROBE)?.selected_index(), Some(0));
    assert_eq!(hub.latest(STROBE).map(|s| s.holder), Some(None));

    a.grab()?;
    a.twist(170.);
    a.tick();
    a.release()?;
    a.tick();
    assert_eq!(a.state(STROBE)?.selected_index(), Some(2));
    assert_eq!(hub.latest(STROBE), Some(a.state(STROBE)?.snapshot()));
    Ok(())
}

#[test]
fn test_push_button_race_and_repress() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let hub = LoopbackHub::new(A);
    let cockpit = cockpit(vec![], vec![autopilot()]);
    let mut a = Participant::join(&hub, A, &cockpit)?;
    let mut b = Participant::join(&hub, B, &cockpit)?;
    step(&mut a, &mut b);

    hub.hold_deliveries(true);
    a.reach(button_position());
    b.reach(button_position());
    step(&mut a, &mut b);
    hub.hold_deliveries(false);
    steps(&mut a, &mut b, 2);

    assert_eq!(hub.stats(B).claims_rejected, 1);
    assert_eq!(hub.latest(AP), Some(a.button(AP)?.snapshot()));
    assert_eq!(b.button(AP)?.authority(), Authority::Remote(A));
    assert!(a.button(AP)?.seq_two());
    assert_eq!(b.button(AP)?.snapshot(), a.button(AP)?.snapshot());

    // Pull back, wait out the re-arm delay, press again.
    a.reach(Point3::origin());
    steps(&mut a, &mut b, 40);
    a.reach(button_position());
    steps(&mut a, &mut b, 2);
    assert!(!a.button(AP)?.seq_two());
    assert!(!b.button(AP)?.seq_two());
    assert_eq!(a.recorder("AP").notifications().len(), 2);
    Ok(())
}

#[test]
fn test_late_joiner_catches_up() -> Result<()> {
    let hub = LoopbackHub::new(A);
    let cockpit = cockpit(vec![strobe()], vec![]);
    let mut a = Participant::join(&hub, A, &cockpit)?;
    a.grab()?;
    a.twist(170.);
    a.tick();
    a.release()?;
    a.tick();
    assert_eq!(a.state(STROBE)?.selected_index(), Some(2));

    let mut b = Participant::join(&hub, B, &cockpit)?;
    b.tick();
    assert_eq!(b.recorder("STROBE").indices(), vec![2]);
    assert_eq!(b.state(STROBE)?.snapshot(), a.state(STROBE)?.snapshot());
    assert_eq!(b.state(STROBE)?.authority(), Authority::Remote(A));
    Ok(())
}

#[test]
fn test_tick_period() -> Result<()> {
    let hub = LoopbackHub::new(A);
    let cockpit = cockpit(vec![throttle().with_tick_period(5)], vec![]);
    let mut a = Participant::join(&hub, A, &cockpit)?;
    a.grab()?;
    a.twist(180.);
    for _ in 0..4 {
        a.tick();
    }
    assert_eq!(a.state(THROTTLE)?.raw_angle(), 135.);
    a.tick();
    assert!((a.state(THROTTLE)?.raw_angle() - 180.).abs() < 1e-9);
    assert_eq!(a.recorder("THROTTLE").percents(), vec![0., 25.]);
    Ok(())
}

#[test]
fn test_broken_controls_are_skipped() -> Result<()> {
    let hub = LoopbackHub::new(A);
    let loose = ControlConfig::new(ControlId::new(9), "LOOSE", ControlKind::Knob);
    let duplicate = strobe();
    let cockpit = cockpit(vec![strobe(), loose, duplicate], vec![]);
    let a = Participant::join(&hub, A, &cockpit)?;
    assert!(a.state(STROBE).is_ok());
    assert!(a.state(ControlId::new(9)).is_err());
    Ok(())
}

#[test]
fn test_demo_cockpit_spawns() -> Result<()> {
    let cockpit = CockpitConfig::from_json(include_str!("../../../../demos/a320.json"))?;
    assert_eq!(cockpit.controls.len(), 4);
    assert_eq!(cockpit.buttons.len(), 2);

    let hub = LoopbackHub::new(A);
    let a = Participant::join(&hub, A, &cockpit)?;
    let thr = cockpit.control("THR").map(|c| c.id).unwrap_or(THROTTLE);
    assert!((a.state(thr)?.raw_angle() - 45.).abs() < 1e-9);
    assert_eq!(a.recorder("THR").percents(), vec![0.]);
    assert_eq!(a.recorder("ND_MODE").indices(), vec![2]);
    Ok(())
}
