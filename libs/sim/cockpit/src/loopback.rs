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

//! In-process replication for simulations and tests. The hub plays the part
//! of the network's ownership service: it serializes claims, decides owners
//! and fans accepted snapshots out to every other participant.
use crate::{
    authority::{ControlId, Epoch, ParticipantId},
    replication::{Replicated, ReplicationChannel, Snapshot},
};
use log::{debug, trace};
use parking_lot::Mutex;
use std::{collections::BTreeMap, sync::Arc};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HubStats {
    pub claims_accepted: usize,
    pub claims_rejected: usize,
    pub syncs_accepted: usize,
    pub syncs_rejected: usize,
}

#[derive(Debug)]
struct Slot {
    owner: ParticipantId,
    epoch: Epoch,
    latest: Option<Snapshot>,
}

#[derive(Debug)]
struct HubState {
    default_owner: ParticipantId,
    slots: BTreeMap<ControlId, Slot>,
    inboxes: BTreeMap<ParticipantId, Vec<Replicated>>,
    stats: BTreeMap<ParticipantId, HubStats>,
    holding: bool,
    in_flight: Vec<(ParticipantId, Replicated)>,
}

impl HubState {
    fn slot(&mut self, control: ControlId) -> &mut Slot {
        let default_owner = self.default_owner;
        self.slots.entry(control).or_insert_with(|| Slot {
            owner: default_owner,
            epoch: Epoch::default(),
            latest: None,
        })
    }

    fn send(&mut self, to: ParticipantId, message: Replicated) {
        if self.holding {
            self.in_flight.push((to, message));
        } else if let Some(inbox) = self.inboxes.get_mut(&to) {
            inbox.push(message);
        }
    }

    fn broadcast(&mut self, except: Option<ParticipantId>, message: Replicated) {
        let targets = self
            .inboxes
            .keys()
            .copied()
            .filter(|p| Some(*p) != except)
            .collect::<Vec<_>>();
        for to in targets {
            self.send(to, message);
        }
    }

    fn stats(&mut self, participant: ParticipantId) -> &mut HubStats {
        self.stats.entry(participant).or_default()
    }
}

/// Shared loopback hub. Clones refer to the same hub.
#[derive(Clone, Debug)]
pub struct LoopbackHub {
    state: Arc<Mutex<HubState>>,
}

impl LoopbackHub {
    /// Controls nobody has claimed yet belong to `default_owner`.
    pub fn new(default_owner: ParticipantId) -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState {
                default_owner,
                slots: BTreeMap::new(),
                inboxes: BTreeMap::new(),
                stats: BTreeMap::new(),
                holding: false,
                in_flight: Vec::new(),
            })),
        }
    }

    /// Connect a participant. It is sent the owner and latest snapshot of
    /// every control the hub has seen, so a late joiner starts in sync.
    pub fn join(&self, participant: ParticipantId) -> LoopbackChannel {
        let mut state = self.state.lock();
        let mut replay = Vec::new();
        for (control, slot) in &state.slots {
            replay.push(Replicated::OwnerChanged {
                control: *control,
                owner: slot.owner,
                epoch: slot.epoch,
            });
            if let Some(latest) = slot.latest {
                replay.push(Replicated::Snapshot(latest));
            }
        }
        debug!("{} joined; replaying {} messages", participant, replay.len());
        state.inboxes.insert(participant, replay);
        LoopbackChannel {
            participant,
            hub: self.clone(),
        }
    }

    /// Disconnect a participant. Its controls pass to the lowest numbered
    /// participant still connected.
    pub fn leave(&self, participant: ParticipantId) {
        let mut state = self.state.lock();
        state.inboxes.remove(&participant);
        let heir = match state.inboxes.keys().next() {
            Some(heir) => *heir,
            None => return,
        };
        let orphaned = state
            .slots
            .iter()
            .filter(|(_, slot)| slot.owner == participant)
            .map(|(control, _)| *control)
            .collect::<Vec<_>>();
        for control in orphaned {
            let slot = state.slot(control);
            slot.owner = heir;
            slot.epoch = slot.epoch.next();
            let epoch = slot.epoch;
            debug!("{} left; {} passes to {} at {:?}", participant, control, heir, epoch);
            state.broadcast(
                None,
                Replicated::OwnerChanged {
                    control,
                    owner: heir,
                    epoch,
                },
            );
        }
    }

    /// While held, messages queue up in flight instead of reaching inboxes,
    /// as if the network were slow. Releasing delivers them in send order.
    pub fn hold_deliveries(&self, hold: bool) {
        let mut state = self.state.lock();
        state.holding = hold;
        if !hold {
            for (to, message) in std::mem::take(&mut state.in_flight) {
                state.send(to, message);
            }
        }
    }

    pub fn owner_of(&self, control: ControlId) -> (ParticipantId, Epoch) {
        let mut state = self.state.lock();
        let slot = state.slot(control);
        (slot.owner, slot.epoch)
    }

    /// The last snapshot the hub accepted for `control`.
    pub fn latest(&self, control: ControlId) -> Option<Snapshot> {
        self.state
            .lock()
            .slots
            .get(&control)
            .and_then(|slot| slot.latest)
    }

    pub fn stats(&self, participant: ParticipantId) -> HubStats {
        self.state
            .lock()
            .stats
            .get(&participant)
            .copied()
            .unwrap_or_default()
    }

    fn claim(&self, claimant: ParticipantId, control: ControlId, expected: Epoch) {
        let mut state = self.state.lock();
        let slot = state.slot(control);
        if slot.epoch == expected {
            slot.owner = claimant;
            slot.epoch = slot.epoch.next();
            let epoch = slot.epoch;
            trace!("{} claimed {} at {:?}", claimant, control, epoch);
            state.stats(claimant).claims_accepted += 1;
            state.broadcast(
                None,
                Replicated::OwnerChanged {
                    control,
                    owner: claimant,
                    epoch,
                },
            );
        } else {
            let (owner, epoch) = (slot.owner, slot.epoch);
            trace!(
                "{} lost {} to {}: expected {:?}, now {:?}",
                claimant,
                control,
                owner,
                expected,
                epoch
            );
            state.stats(claimant).claims_rejected += 1;
            state.send(
                claimant,
                Replicated::OwnerChanged {
                    control,
                    owner,
                    epoch,
                },
            );
        }
    }

    fn sync(&self, sender: ParticipantId, snapshot: Snapshot) -> bool {
        let mut state = self.state.lock();
        let slot = state.slot(snapshot.control);
        if slot.owner != sender || slot.epoch != snapshot.epoch {
            trace!(
                "dropped {} from {}: owner is {} at {:?}",
                snapshot.control,
                sender,
                slot.owner,
                slot.epoch
            );
            state.stats(sender).syncs_rejected += 1;
            return false;
        }
        slot.latest = Some(snapshot);
        state.stats(sender).syncs_accepted += 1;
        state.broadcast(Some(sender), Replicated::Snapshot(snapshot));
        true
    }

    fn drain(&self, participant: ParticipantId) -> Vec<Replicated> {
        self.state
            .lock()
            .inboxes
            .get_mut(&participant)
            .map(std::mem::take)
            .unwrap_or_default()
    }
}

/// One participant's connection to a `LoopbackHub`.
#[derive(Clone, Debug)]
pub struct LoopbackChannel {
    participant: ParticipantId,
    hub: LoopbackHub,
}

impl LoopbackChannel {
    pub fn hub(&self) -> &LoopbackHub {
        &self.hub
    }
}

impl ReplicationChannel for LoopbackChannel {
    fn participant(&self) -> ParticipantId {
        self.participant
    }

    fn claim(&mut self, control: ControlId, expected: Epoch) {
        self.hub.claim(self.participant, control, expected);
    }

    fn request_sync(&mut self, snapshot: Snapshot) -> bool {
        self.hub.sync(self.participant, snapshot)
    }

    fn poll(&mut self) -> Vec<Replicated> {
        self.hub.drain(self.participant)
    }
}
