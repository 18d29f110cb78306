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
    authority::{Authority, ControlId, Epoch, ParticipantId},
    config::ButtonConfig,
    error::ControlError,
    receiver::{LampState, ReceiverSet},
    replication::{ControlValue, Snapshot, SyncDebouncer},
};
use bevy_ecs::prelude::*;
use log::{debug, trace, warn};

/// A latching push button with two lamp sequences.
#[derive(Component, Debug)]
pub struct PushButton {
    config: ButtonConfig,
    local: ParticipantId,
    authority: Authority,
    epoch: Epoch,
    seq_one: bool,
    seq_two: bool,
    debouncer: SyncDebouncer,
}

impl PushButton {
    pub fn new(
        config: ButtonConfig,
        local: ParticipantId,
        authority: Authority,
    ) -> Result<Self, ControlError> {
        if config.volume.is_none() {
            return Err(ControlError::missing(&config.name, "activation volume"));
        }
        Ok(Self {
            config,
            local,
            authority,
            epoch: Epoch::default(),
            seq_one: false,
            seq_two: false,
            debouncer: SyncDebouncer::default(),
        })
    }

    /// Toggle the latch and take ownership. Returns the epoch to claim at.
    pub fn press(&mut self, sinks: &mut ReceiverSet) -> Epoch {
        if self.config.seq_two_togglable {
            self.seq_two = !self.seq_two;
        } else {
            self.seq_one = !self.seq_one;
        }
        let expected = self.epoch;
        self.epoch = expected.next();
        self.authority = Authority::Local;
        debug!("{}: pressed by {}: {:?}", self.config.name, self.local, self.lamps());
        sinks.notify_latch(self.lamps());
        expected
    }

    pub fn lamps(&self) -> LampState {
        let combined = self.config.combined;
        LampState {
            seq_one_lit: self.seq_one || (combined && self.seq_two),
            seq_two_lit: self.seq_two || (combined && self.seq_one),
        }
    }

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
            trace!("{}: ignoring snapshot from {:?}", self.config.name, snapshot.epoch);
            return Ok(());
        }
        let (seq_one, seq_two) = match snapshot.value {
            ControlValue::Latch { seq_one, seq_two } => (seq_one, seq_two),
            ControlValue::Angular { .. } => {
                warn!("{}: got a rotating control snapshot", self.config.name);
                return Ok(());
            }
        };
        self.epoch = snapshot.epoch;
        let before = self.lamps();
        self.seq_one = seq_one;
        self.seq_two = seq_two;
        if self.lamps() != before {
            sinks.notify_latch(self.lamps());
        }
        Ok(())
    }

    pub fn on_owner_changed(&mut self, owner: ParticipantId, epoch: Epoch) {
        if epoch < self.epoch {
            return;
        }
        let was_local = self.authority.is_local();
        self.epoch = epoch;
        self.authority = Authority::for_owner(owner, self.local);
        if was_local != self.authority.is_local() {
            self.debouncer.reset();
        }
    }

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
            holder: None,
            value: ControlValue::Latch {
                seq_one: self.seq_one,
                seq_two: self.seq_two,
            },
        }
    }

    pub fn id(&self) -> ControlId {
        self.config.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn authority(&self) -> Authority {
        self.authority
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn seq_one(&self) -> bool {
        self.seq_one
    }

    pub fn seq_two(&self) -> bool {
        self.seq_two
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        collision::ActivationVolume,
        receiver::{Notification, Recorder},
    };
    use geometry::Aabb3;

    const ME: ParticipantId = ParticipantId::new(1);
    const THEM: ParticipantId = ParticipantId::new(2);

    fn button(config: ButtonConfig, local: ParticipantId, authority: Authority) -> PushButton {
        PushButton::new(
            config.with_volume(ActivationVolume::Box(Aabb3::from_corners([0.; 3], [1.; 3]))),
            local,
            authority,
        )
        .expect("button")
    }

    #[test]
    fn test_press_toggles_seq_two() {
        let recorder = Recorder::default();
        let mut sinks = ReceiverSet::new("AP").with_sink(Box::new(recorder.clone()));
        let mut ap = button(ButtonConfig::new(ControlId::new(1), "AP"), ME, Authority::Remote(THEM));

        assert_eq!(ap.press(&mut sinks), Epoch::default());
        assert!(ap.seq_two() && !ap.seq_one());
        assert_eq!(ap.authority(), Authority::Local);
        ap.press(&mut sinks);
        assert_eq!(
            recorder.notifications(),
            vec![
                Notification::Latch(LampState {
                    seq_one_lit: false,
                    seq_two_lit: true
                }),
                Notification::Latch(LampState::default()),
            ]
        );
    }

    #[test]
    fn test_seq_one_and_combined_lamps() {
        let mut sinks = ReceiverSet::new("FD");
        let mut fd = button(
            ButtonConfig::new(ControlId::new(2), "FD")
                .with_seq_two_togglable(false)
                .with_combined(true),
            ME,
            Authority::Local,
        );
        fd.press(&mut sinks);
        assert!(fd.seq_one() && !fd.seq_two());
        assert_eq!(
            fd.lamps(),
            LampState {
                seq_one_lit: true,
                seq_two_lit: true
            }
        );
    }

    #[test]
    fn test_latch_replicates() {
        let recorder = Recorder::default();
        let mut owner_sinks = ReceiverSet::new("AP");
        let mut mirror_sinks = ReceiverSet::new("AP").with_sink(Box::new(recorder.clone()));
        let mut owner = button(ButtonConfig::new(ControlId::new(1), "AP"), ME, Authority::Local);
        let mut mirror = button(ButtonConfig::new(ControlId::new(1), "AP"), THEM, Authority::Remote(ME));

        let expected = owner.press(&mut owner_sinks);
        mirror.on_owner_changed(ME, expected.next());
        let snapshot = owner.take_pending_sync().expect("pressed");
        assert!(owner.take_pending_sync().is_none());
        owner.sync_refused();
        assert_eq!(owner.take_pending_sync(), Some(snapshot));
        mirror.apply_snapshot(&snapshot, &mut mirror_sinks).expect("remote");
        mirror.apply_snapshot(&snapshot, &mut mirror_sinks).expect("remote");
        assert_eq!(mirror.snapshot(), owner.snapshot());
        assert_eq!(recorder.notifications().len(), 1);

        assert!(owner.apply_snapshot(&snapshot, &mut owner_sinks).is_err());
        assert!(PushButton::new(ButtonConfig::new(ControlId::new(3), "X"), ME, Authority::Local).is_err());
    }
}
