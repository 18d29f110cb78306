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
use crate::{
    authority::{Authority, ControlId, ParticipantId},
    collision::{ActivationVolume, HoverDetector, HoverTransition},
    config::{ButtonConfig, CockpitConfig, ControlConfig},
    error::ControlError,
    pose::{HandSample, PoseProvider},
    push_button::PushButton,
    receiver::{ReceiverSet, ReceiverSink},
    replication::{Replicated, ReplicationChannel},
    schedule::TickSchedule,
    state::ControlState,
};
use anyhow::{anyhow, ensure, Context, Result};
use bevy_ecs::prelude::*;
use log::{info, trace, warn};
use runtime::{Extension, Runtime, SimStage, TimeStep, TimeStepStep};
use std::collections::{BTreeMap, HashMap};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, SystemLabel)]
pub enum CockpitStep {
    AdvancePose,
    DetectHover,
}

/// Who we are, and who owns controls nobody has claimed yet.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Session {
    pub local: ParticipantId,
    pub default_owner: ParticipantId,
}

impl Session {
    pub fn new(local: ParticipantId, default_owner: ParticipantId) -> Self {
        Self {
            local,
            default_owner,
        }
    }

    pub fn initial_authority(&self) -> Authority {
        Authority::for_owner(self.default_owner, self.local)
    }
}

/// The hand that drives this participant's controls, sampled once per tick.
pub struct HandTracking {
    provider: Box<dyn PoseProvider>,
    sample: HandSample,
}

impl HandTracking {
    pub fn new(provider: Box<dyn PoseProvider>) -> Self {
        let sample = provider.sample();
        Self { provider, sample }
    }

    pub fn sample(&self) -> &HandSample {
        &self.sample
    }

    fn advance(&mut self, tick: u64) {
        self.provider.advance(tick);
        self.sample = self.provider.sample();
    }
}

pub struct Replication {
    channel: Box<dyn ReplicationChannel>,
}

impl Replication {
    pub fn new(channel: Box<dyn ReplicationChannel>) -> Self {
        Self { channel }
    }

    pub fn participant(&self) -> ParticipantId {
        self.channel.participant()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum GrabEvent {
    Press,
    Release,
}

/// Grip input waiting to be handled this tick.
#[derive(Debug, Default)]
pub struct GrabEvents {
    pending: Vec<GrabEvent>,
}

impl GrabEvents {
    pub fn push(&mut self, event: GrabEvent) {
        self.pending.push(event);
    }

    fn drain(&mut self) -> Vec<GrabEvent> {
        std::mem::take(&mut self.pending)
    }
}

/// Grip presses and releases at fixed ticks, to go with a `ScriptedPose`.
#[derive(Clone, Debug, Default)]
pub struct GrabScript {
    events: BTreeMap<u64, GrabEvent>,
}

impl GrabScript {
    pub fn press_at(mut self, tick: u64) -> Self {
        self.events.insert(tick, GrabEvent::Press);
        self
    }

    pub fn release_at(mut self, tick: u64) -> Self {
        self.events.insert(tick, GrabEvent::Release);
        self
    }

    pub fn event_at(&self, tick: u64) -> Option<GrabEvent> {
        self.events.get(&tick).copied()
    }
}

/// Which point of the hand a volume is tested against.
#[derive(Component, Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProbePoint {
    Hand,
    Fingertip,
}

/// Finds the entity behind a replicated control id.
#[derive(Debug, Default)]
pub struct ControlIndex {
    by_id: HashMap<ControlId, Entity>,
}

impl ControlIndex {
    pub fn get(&self, control: ControlId) -> Option<Entity> {
        self.by_id.get(&control).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    fn insert(&mut self, control: ControlId, entity: Entity) -> Result<()> {
        ensure!(
            !self.by_id.contains_key(&control),
            "{} is already in the cockpit",
            control
        );
        self.by_id.insert(control, entity);
        Ok(())
    }
}

/// Runs the cockpit. Needs `Session`, `HandTracking` and `Replication`
/// resources before it is loaded.
pub struct Cockpit;

impl Extension for Cockpit {
    fn init(runtime: &mut Runtime) -> Result<()> {
        runtime
            .resource::<Session>()
            .context("the cockpit needs a session")?;
        runtime
            .resource::<HandTracking>()
            .context("the cockpit needs hand tracking")?;
        let session = *runtime.resource::<Session>()?;
        let participant = runtime
            .resource::<Replication>()
            .context("the cockpit needs a replication channel")?
            .participant();
        ensure!(
            participant == session.local,
            "replication channel is for {} but we are {}",
            participant,
            session.local
        );
        if runtime.maybe_resource::<TimeStep>().is_none() {
            runtime.load_extension::<TimeStep>()?;
        }
        runtime
            .insert_resource(GrabEvents::default())
            .insert_resource(ControlIndex::default());

        runtime
            .add_sim_system_to(
                SimStage::TimeStep,
                sys_advance_pose
                    .label(CockpitStep::AdvancePose)
                    .after(TimeStepStep::Tick),
            )
            .add_sim_system_to(SimStage::TimeStep, sys_play_grab_script.after(TimeStepStep::Tick))
            .add_sim_system_to(SimStage::ReceiveReplication, sys_receive_replication)
            .add_sim_system_to(
                SimStage::ReadInput,
                sys_detect_hover.label(CockpitStep::DetectHover),
            )
            .add_sim_system_to(
                SimStage::ReadInput,
                sys_handle_grabs.after(CockpitStep::DetectHover),
            )
            .add_sim_system_to(
                SimStage::ReadInput,
                sys_press_buttons.after(CockpitStep::DetectHover),
            )
            .add_sim_system_to(SimStage::UpdateControls, sys_tick_controls)
            .add_sim_system_to(SimStage::Replicate, sys_publish);
        Ok(())
    }
}

impl Cockpit {
    /// Spawn every control and button in `cockpit`. Anything that fails to
    /// build is logged and left out. `extra_sinks` can add receivers to a
    /// control by name, ahead of its first notification.
    pub fn spawn<F>(runtime: &mut Runtime, cockpit: &CockpitConfig, mut extra_sinks: F) -> Result<usize>
    where
        F: FnMut(&str) -> Vec<Box<dyn ReceiverSink>>,
    {
        let mut spawned = 0;
        for control in &cockpit.controls {
            let mut sinks = ReceiverSet::from_specs(&control.name, &control.receivers);
            for sink in extra_sinks(&control.name) {
                sinks.push(sink);
            }
            match Self::spawn_control(runtime, control.clone(), sinks) {
                Ok(_) => spawned += 1,
                Err(e) => warn!("{}: skipping {}: {:#}", cockpit.name, control.name, e),
            }
        }
        for button in &cockpit.buttons {
            let mut sinks = ReceiverSet::from_specs(&button.name, &button.receivers);
            for sink in extra_sinks(&button.name) {
                sinks.push(sink);
            }
            match Self::spawn_button(runtime, button.clone(), sinks) {
                Ok(_) => spawned += 1,
                Err(e) => warn!("{}: skipping {}: {:#}", cockpit.name, button.name, e),
            }
        }
        info!(
            "{}: {} of {} controls ready",
            cockpit.name,
            spawned,
            cockpit.controls.len() + cockpit.buttons.len()
        );
        Ok(spawned)
    }

    pub fn spawn_control(
        runtime: &mut Runtime,
        config: ControlConfig,
        mut sinks: ReceiverSet,
    ) -> Result<Entity> {
        let session = *runtime.resource::<Session>()?;
        let mut state = ControlState::new(config, session.local, session.initial_authority())?;
        let volume = state
            .config()
            .volume
            .clone()
            .ok_or_else(|| ControlError::missing(state.name(), "activation volume"))?;
        let probe = if state.config().finger_collision {
            ProbePoint::Fingertip
        } else {
            ProbePoint::Hand
        };
        let schedule = TickSchedule::every(state.config().tick_period);
        let id = state.id();
        ensure!(
            runtime.resource::<ControlIndex>()?.get(id).is_none(),
            "{} is already in the cockpit",
            id
        );
        state.initialize(&mut sinks);

        let entity = runtime
            .spawn()
            .insert_bundle((id, volume, probe, schedule, HoverDetector::default()))
            .insert_bundle((state, sinks))
            .id();
        runtime.resource_mut::<ControlIndex>()?.insert(id, entity)?;
        Ok(entity)
    }

    /// Buttons are always pressed with the fingertip.
    pub fn spawn_button(
        runtime: &mut Runtime,
        config: ButtonConfig,
        sinks: ReceiverSet,
    ) -> Result<Entity> {
        let session = *runtime.resource::<Session>()?;
        let volume = config
            .volume
            .clone()
            .ok_or_else(|| ControlError::missing(&config.name, "activation volume"))?;
        let button = PushButton::new(config, session.local, session.initial_authority())?;
        let id = button.id();
        ensure!(
            runtime.resource::<ControlIndex>()?.get(id).is_none(),
            "{} is already in the cockpit",
            id
        );
        let entity = runtime
            .spawn()
            .insert_bundle((id, volume, ProbePoint::Fingertip, HoverDetector::default()))
            .insert_bundle((button, sinks))
            .id();
        runtime.resource_mut::<ControlIndex>()?.insert(id, entity)?;
        Ok(entity)
    }

    pub fn entity(runtime: &Runtime, control: ControlId) -> Result<Entity> {
        runtime
            .resource::<ControlIndex>()?
            .get(control)
            .ok_or_else(|| anyhow!("no such control: {}", control))
    }

    pub fn control_state(runtime: &Runtime, control: ControlId) -> Result<&ControlState> {
        runtime
            .world
            .get::<ControlState>(Self::entity(runtime, control)?)
            .ok_or_else(|| anyhow!("{} is not a rotating control", control))
    }

    pub fn push_button(runtime: &Runtime, control: ControlId) -> Result<&PushButton> {
        runtime
            .world
            .get::<PushButton>(Self::entity(runtime, control)?)
            .ok_or_else(|| anyhow!("{} is not a push button", control))
    }
}

fn report(error: ControlError) {
    if error.is_transient() {
        trace!("{}", error);
    } else {
        warn!("{}", error);
    }
}

fn sys_advance_pose(timestep: Res<TimeStep>, mut hand: ResMut<HandTracking>) {
    hand.advance(timestep.tick());
}

fn sys_play_grab_script(
    timestep: Res<TimeStep>,
    script: Option<Res<GrabScript>>,
    mut events: ResMut<GrabEvents>,
) {
    if let Some(event) = script.and_then(|script| script.event_at(timestep.tick())) {
        events.push(event);
    }
}

fn sys_receive_replication(
    mut replication: ResMut<Replication>,
    index: Res<ControlIndex>,
    mut controls: Query<(&mut ControlState, &mut ReceiverSet), Without<PushButton>>,
    mut buttons: Query<(&mut PushButton, &mut ReceiverSet), Without<ControlState>>,
) {
    for message in replication.channel.poll() {
        let control = match message {
            Replicated::Snapshot(snapshot) => snapshot.control,
            Replicated::OwnerChanged { control, .. } => control,
        };
        let entity = match index.get(control) {
            Some(entity) => entity,
            None => {
                trace!("replication for unknown {}", control);
                continue;
            }
        };
        if let Ok((mut state, mut sinks)) = controls.get_mut(entity) {
            match message {
                Replicated::Snapshot(snapshot) => {
                    if let Err(e) = state.apply_snapshot(&snapshot, &mut sinks) {
                        report(e);
                    }
                }
                Replicated::OwnerChanged { owner, epoch, .. } => {
                    state.on_owner_changed(owner, epoch, &mut sinks)
                }
            }
        } else if let Ok((mut button, mut sinks)) = buttons.get_mut(entity) {
            match message {
                Replicated::Snapshot(snapshot) => {
                    if let Err(e) = button.apply_snapshot(&snapshot, &mut sinks) {
                        report(e);
                    }
                }
                Replicated::OwnerChanged { owner, epoch, .. } => {
                    button.on_owner_changed(owner, epoch)
                }
            }
        }
    }
}

fn sys_detect_hover(
    timestep: Res<TimeStep>,
    hand: Res<HandTracking>,
    mut query: Query<(&ControlId, &ActivationVolume, &ProbePoint, &mut HoverDetector)>,
) {
    let sample = hand.sample();
    for (id, volume, probe, mut hover) in query.iter_mut() {
        let point = sample.probe_point(*probe == ProbePoint::Fingertip);
        if let Some(transition) = hover.update(volume, &point, timestep.now()) {
            trace!("{}: hand {:?}", id, transition);
        }
    }
}

fn sys_handle_grabs(
    mut events: ResMut<GrabEvents>,
    mut replication: ResMut<Replication>,
    mut query: Query<(&mut ControlState, &HoverDetector, &mut ReceiverSet)>,
) {
    for event in events.drain() {
        for (mut state, hover, mut sinks) in query.iter_mut() {
            match event {
                GrabEvent::Press => {
                    if let Some(expected) = state.grab_start(hover.is_hovering()) {
                        replication.channel.claim(state.id(), expected);
                    }
                }
                GrabEvent::Release => state.grab_end(&mut sinks),
            }
        }
    }
}

fn sys_press_buttons(
    mut replication: ResMut<Replication>,
    mut query: Query<(&mut PushButton, &HoverDetector, &mut ReceiverSet)>,
) {
    for (mut button, hover, mut sinks) in query.iter_mut() {
        if hover.last_transition() == Some(HoverTransition::Enter) {
            let expected = button.press(&mut sinks);
            replication.channel.claim(button.id(), expected);
        }
    }
}

fn sys_tick_controls(
    timestep: Res<TimeStep>,
    hand: Res<HandTracking>,
    mut query: Query<(&mut ControlState, &TickSchedule, &mut ReceiverSet)>,
) {
    let tick = timestep.tick();
    for (mut state, schedule, mut sinks) in query.iter_mut() {
        if schedule.is_due(tick) {
            state.tick(hand.sample(), &mut sinks);
        }
    }
}

fn sys_publish(
    mut replication: ResMut<Replication>,
    mut controls: Query<&mut ControlState>,
    mut buttons: Query<&mut PushButton>,
) {
    for mut state in controls.iter_mut() {
        if let Some(snapshot) = state.take_pending_sync() {
            if !replication.channel.request_sync(snapshot) {
                trace!("{}: sync at {:?} was refused", snapshot.control, snapshot.epoch);
                state.sync_refused();
            }
        }
    }
    for mut button in buttons.iter_mut() {
        if let Some(snapshot) = button.take_pending_sync() {
            if !replication.channel.request_sync(snapshot) {
                trace!("{}: sync at {:?} was refused", snapshot.control, snapshot.epoch);
                button.sync_refused();
            }
        }
    }
}
