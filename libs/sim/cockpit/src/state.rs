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

//! One rotating control: knob, lever, switch or axis input.
//!
//! Every kind runs the same pipeline. The projection turns the hand into a
//! raw angle, which is kept unclamped. The rotator shows it clamped to the
//! detent arc or range and offset into a visible rotation. Release snaps from
//! the raw angle; percentages are mapped from the clamped one. Only the
//! participant with authority runs it. Everyone else applies snapshots.
use crate::{
    authority::{Authority, ControlId, Epoch, ParticipantId},
    config::ControlConfig,
    error::ControlError,
    pose::HandSample,
    projection::GeometryProjection,
    receiver::ReceiverSet,
    replication::{ControlValue, Snapshot, SyncDebouncer},
};
use angle_math::{
    clamp_to_arc, degrees_to_percentage, normalize_360, to_signed_rotation,
};
use bevy_ecs::prelude::*;
use log::{debug, trace, warn};
use nalgebra::UnitQuaternion;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Phase {
    Idle,
    Manipulating,
    Snapping,
}

#[derive(Component, Debug)]
pub struct ControlState {
    config: ControlConfig,
    projection: Box<dyn GeometryProjection>,
    local: ParticipantId,
    authority: Authority,
    epoch: Epoch,
    holder: Option<ParticipantId>,
    phase: Phase,
    raw_angle: f64,
    visible_angle: f64,
    selected_index: Option<usize>,
    last_percent: Option<f64>,
    debouncer: SyncDebouncer,
}

impl ControlState {
    pub fn new(
        config: ControlConfig,
        local: ParticipantId,
        authority: Authority,
    ) -> Result<Self, ControlError> {
        let projection = config
            .projection
            .as_ref()
            .ok_or_else(|| ControlError::missing(&config.name, "projection"))?
            .build()
            .map_err(|e| ControlError::InvalidGeometry {
                control: config.name.clone(),
                reason: format!("{:#}", e),
            })?;
        Self::with_projection(config, projection, local, authority)
    }

    /// Build around an already constructed projection.
    pub fn with_projection(
        config: ControlConfig,
        projection: Box<dyn GeometryProjection>,
        local: ParticipantId,
        authority: Authority,
    ) -> Result<Self, ControlError> {
        if config.volume.is_none() {
            return Err(ControlError::missing(&config.name, "activation volume"));
        }
        config.detents.validate(&config.name)?;
        if let Some(range) = config.range {
            if range.from == range.to {
                warn!(
                    "{}: range {} -> {} is empty; it will never report a percentage",
                    config.name, range.from, range.to
                );
            }
        }
        Ok(Self {
            config,
            projection,
            local,
            authority,
            epoch: Epoch::default(),
            holder: None,
            phase: Phase::Idle,
            raw_angle: 0.,
            visible_angle: 0.,
            selected_index: None,
            last_percent: None,
            debouncer: SyncDebouncer::default(),
        })
    }

    /// Move to the configured default rotation. The owner also snaps or
    /// reports it; everyone else waits for the owner's snapshot.
    pub fn initialize(&mut self, sinks: &mut ReceiverSet) {
        let raw = normalize_360(self.config.default_rotation + self.config.default_rotation_offset);
        self.projection.place_at(raw);
        self.raw_angle = raw;
        self.visible_angle = self.visible(raw);
        if !self.authority.is_local() {
            return;
        }
        self.settle(sinks);
    }

    /// Start manipulating. Returns the epoch to claim ownership at when the
    /// grab is accepted: the hand has to be hovering and nobody else may be
    /// holding the control.
    pub fn grab_start(&mut self, hovering: bool) -> Option<Epoch> {
        if !hovering {
            return None;
        }
        match self.holder {
            Some(holder) if holder != self.local => {
                trace!("{}: held by {}", self.config.name, holder);
                return None;
            }
            Some(_) if self.phase == Phase::Manipulating => return None,
            _ => {}
        }
        let expected = self.epoch;
        self.epoch = expected.next();
        self.authority = Authority::Local;
        self.holder = Some(self.local);
        self.phase = Phase::Manipulating;
        debug!("{}: grabbed by {}", self.config.name, self.local);
        Some(expected)
    }

    /// Run the pipeline for one due tick.
    pub fn tick(&mut self, hand: &HandSample, sinks: &mut ReceiverSet) {
        if !self.authority.is_local() {
            return;
        }
        if self.phase == Phase::Manipulating {
            self.projection.follow(hand);
            self.raw_angle = self.projection.raw_angle();
            self.visible_angle = self.visible(self.clamp(self.raw_angle));
        }
        if self.is_continuous() {
            self.emit_percent(sinks);
        }
    }

    /// Let go. Snaps to the nearest detent or reports the final percentage.
    /// Releasing twice, or releasing a control this participant is not
    /// holding, does nothing.
    pub fn grab_end(&mut self, sinks: &mut ReceiverSet) {
        if self.phase != Phase::Manipulating || !self.authority.is_local() {
            return;
        }
        self.phase = Phase::Snapping;
        self.settle(sinks);
        self.holder = None;
        self.phase = Phase::Idle;
        debug!("{}: released at {}", self.config.name, self.visible_angle);
    }

    /// Overwrite local state with the owner's.
    pub fn apply_snapshot(
        &mut self,
        snapshot: &Snapshot,
        sinks: &mut ReceiverSet,
    ) -> Result<(), ControlError> {
        if self.authority.is_local() {
            return Err(ControlError::StaleAuthority {
                control: self.config.id,
                epoch: snapshot.epoch,
            });
        }
        if snapshot.epoch < self.epoch {
            trace!(
                "{}: ignoring snapshot from {:?}, at {:?}",
                self.config.name,
                snapshot.epoch,
                self.epoch
            );
            return Ok(());
        }
        let (raw_angle, visible_angle, pickup_on_axis, selected_index) = match snapshot.value {
            ControlValue::Angular {
                raw_angle,
                visible_angle,
                pickup_on_axis,
                selected_index,
            } => (raw_angle, visible_angle, pickup_on_axis, selected_index),
            ControlValue::Latch { .. } => {
                warn!("{}: got a push button snapshot", self.config.name);
                return Ok(());
            }
        };

        self.epoch = snapshot.epoch;
        self.holder = snapshot.holder;
        self.raw_angle = raw_angle;
        self.visible_angle = visible_angle;
        self.projection.set_pickup_on_axis(pickup_on_axis);
        let previous = self.selected_index;
        self.selected_index = selected_index;

        if previous != selected_index {
            if let Some(index) = selected_index {
                sinks.notify_index(index);
            }
        }
        if self.is_continuous() {
            self.emit_percent(sinks);
        }
        Ok(())
    }

    /// The replication channel decided who owns this control. Inheriting a
    /// control we did not claim, e.g. when its owner left mid-drag, drops the
    /// old holder and settles wherever the control was left.
    pub fn on_owner_changed(&mut self, owner: ParticipantId, epoch: Epoch, sinks: &mut ReceiverSet) {
        if epoch < self.epoch {
            trace!("{}: stale owner {} at {:?}", self.config.name, owner, epoch);
            return;
        }
        let was_local = self.authority.is_local();
        self.epoch = epoch;
        self.authority = Authority::for_owner(owner, self.local);
        if was_local != self.authority.is_local() {
            self.debouncer.reset();
        }
        if was_local && !self.authority.is_local() {
            debug!("{}: authority passed to {} at {:?}", self.config.name, owner, epoch);
            self.phase = Phase::Idle;
            self.holder = None;
        }
        if !was_local && self.authority.is_local() {
            debug!("{}: inherited from {:?} at {:?}", self.config.name, self.holder, epoch);
            self.phase = Phase::Idle;
            self.holder = None;
            self.settle(sinks);
        }
    }

    /// The snapshot to publish this tick, if we own the control and anything
    /// changed since the last one.
    pub fn take_pending_sync(&mut self) -> Option<Snapshot> {
        if !self.authority.is_local() {
            return None;
        }
        let snapshot = self.snapshot();
        self.debouncer.offer(snapshot)
    }

    /// The channel refused our last snapshot; offer it again next time.
    pub fn sync_refused(&mut self) {
        self.debouncer.reset();
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            control: self.config.id,
            epoch: self.epoch,
            holder: self.holder,
            value: ControlValue::Angular {
                raw_angle: self.raw_angle,
                visible_angle: self.visible_angle,
                pickup_on_axis: self.projection.pickup_on_axis(),
                selected_index: self.selected_index,
            },
        }
    }

    /// Rotation to apply to the visible part of the control.
    pub fn rotator_rotation(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_axis_angle(
            &self.projection.rotator_axis().unit(),
            self.visible_angle.to_radians(),
        )
    }

    pub fn id(&self) -> ControlId {
        self.config.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn authority(&self) -> Authority {
        self.authority
    }

    pub fn is_authority(&self) -> bool {
        self.authority.is_local()
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn holder(&self) -> Option<ParticipantId> {
        self.holder
    }

    pub fn raw_angle(&self) -> f64 {
        self.raw_angle
    }

    pub fn visible_angle(&self) -> f64 {
        self.visible_angle
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected_index
    }

    pub fn last_percent(&self) -> Option<f64> {
        self.last_percent
    }

    fn is_continuous(&self) -> bool {
        !self.config.detents.needs_snapping()
    }

    fn settle(&mut self, sinks: &mut ReceiverSet) {
        if self.config.detents.needs_snapping() {
            self.snap(sinks);
        } else {
            self.emit_percent(sinks);
        }
    }

    fn visible(&self, raw: f64) -> f64 {
        to_signed_rotation(normalize_360(raw + self.config.visual_offset))
    }

    fn clamp(&self, raw: f64) -> f64 {
        if let Some((first, last)) = self.config.detents.arc() {
            clamp_to_arc(raw, first, last)
        } else if let Some(range) = self.config.range {
            range.clamp(raw)
        } else {
            raw
        }
    }

    fn snap(&mut self, sinks: &mut ReceiverSet) {
        let (target, index) = match self
            .config
            .detents
            .nearest(self.raw_angle, self.config.distance)
        {
            Some(nearest) => nearest,
            None => return,
        };
        let target = normalize_360(target);
        self.raw_angle = target;
        self.projection.place_at(target);
        self.visible_angle = to_signed_rotation(normalize_360(target + self.config.snapping_offset));
        if self.selected_index != Some(index) {
            self.selected_index = Some(index);
            sinks.notify_index(index);
        }
    }

    fn percent(&self) -> Option<f64> {
        let range = self.config.range?;
        match degrees_to_percentage(
            self.clamp(self.raw_angle),
            range.from,
            range.to,
            self.config.percent_mapping,
        ) {
            Ok(percent) => Some(quantize(percent, self.config.percent_step)),
            Err(e) => {
                trace!("{}: {}", self.config.name, ControlError::from(e));
                None
            }
        }
    }

    fn emit_percent(&mut self, sinks: &mut ReceiverSet) {
        if let Some(percent) = self.percent() {
            let changed = self
                .last_percent
                .map_or(true, |last| last.to_bits() != percent.to_bits());
            if changed {
                self.last_percent = Some(percent);
                sinks.notify_percent(percent);
            }
        }
    }
}

fn quantize(percent: f64, step: f64) -> f64 {
    if step > 0. {
        (percent / step).round() * step
    } else {
        percent
    }
}
