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
use crate::authority::{ControlId, Epoch, ParticipantId};

/// The replicated part of a control.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ControlValue {
    Angular {
        raw_angle: f64,
        visible_angle: f64,
        pickup_on_axis: f64,
        selected_index: Option<usize>,
    },
    Latch {
        seq_one: bool,
        seq_two: bool,
    },
}

impl ControlValue {
    // Compares floats by bit pattern so that a resend of an unchanged value
    // is always caught, NaN included.
    fn bitwise_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Angular {
                    raw_angle: r0,
                    visible_angle: v0,
                    pickup_on_axis: p0,
                    selected_index: i0,
                },
                Self::Angular {
                    raw_angle: r1,
                    visible_angle: v1,
                    pickup_on_axis: p1,
                    selected_index: i1,
                },
            ) => {
                r0.to_bits() == r1.to_bits()
                    && v0.to_bits() == v1.to_bits()
                    && p0.to_bits() == p1.to_bits()
                    && i0 == i1
            }
            (
                Self::Latch {
                    seq_one: a0,
                    seq_two: b0,
                },
                Self::Latch {
                    seq_one: a1,
                    seq_two: b1,
                },
            ) => a0 == a1 && b0 == b1,
            _ => false,
        }
    }
}

/// One control's replicated state, stamped with the ownership epoch it was
/// written under.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Snapshot {
    pub control: ControlId,
    pub epoch: Epoch,
    /// Who is manipulating the control, if anyone.
    pub holder: Option<ParticipantId>,
    pub value: ControlValue,
}

impl Snapshot {
    pub fn bitwise_eq(&self, other: &Self) -> bool {
        self.control == other.control
            && self.epoch == other.epoch
            && self.holder == other.holder
            && self.value.bitwise_eq(&other.value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Replicated {
    Snapshot(Snapshot),
    OwnerChanged {
        control: ControlId,
        owner: ParticipantId,
        epoch: Epoch,
    },
}

/// Transport between participants. Ownership of each control is decided by
/// the channel: `claim` is a compare-and-swap on the control's epoch, and the
/// outcome always comes back through `poll` as `OwnerChanged`.
pub trait ReplicationChannel: Send + Sync {
    fn participant(&self) -> ParticipantId;

    /// Ask to own `control`, believing its current epoch is `expected`.
    fn claim(&mut self, control: ControlId, expected: Epoch);

    /// Send state as owner. Returns false if it was not sent.
    fn request_sync(&mut self, snapshot: Snapshot) -> bool;

    /// Everything received since the last poll, in arrival order.
    fn poll(&mut self) -> Vec<Replicated>;
}

/// Drops snapshots equal to the last one sent.
#[derive(Clone, Debug, Default)]
pub struct SyncDebouncer {
    last_sent: Option<Snapshot>,
}

impl SyncDebouncer {
    pub fn offer(&mut self, snapshot: Snapshot) -> Option<Snapshot> {
        match &self.last_sent {
            Some(last) if last.bitwise_eq(&snapshot) => None,
            _ => {
                self.last_sent = Some(snapshot);
                Some(snapshot)
            }
        }
    }

    /// Forget what was sent; the next offer always goes out.
    pub fn reset(&mut self) {
        self.last_sent = None;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn knob(raw_angle: f64, epoch: u64) -> Snapshot {
        Snapshot {
            control: ControlId::new(1),
            epoch: Epoch::new(epoch),
            holder: None,
            value: ControlValue::Angular {
                raw_angle,
                visible_angle: raw_angle,
                pickup_on_axis: raw_angle,
                selected_index: None,
            },
        }
    }

    #[test]
    fn test_debounce_drops_repeats() {
        let mut debouncer = SyncDebouncer::default();
        assert!(debouncer.offer(knob(10., 1)).is_some());
        assert!(debouncer.offer(knob(10., 1)).is_none());
        assert!(debouncer.offer(knob(11., 1)).is_some());
        // Same value under a new epoch still has to go out.
        assert!(debouncer.offer(knob(11., 2)).is_some());
        debouncer.reset();
        assert!(debouncer.offer(knob(11., 2)).is_some());
    }

    #[test]
    fn test_bitwise_compare() {
        assert!(!knob(0., 1).bitwise_eq(&knob(-0., 1)));
        assert!(knob(f64::NAN, 1).bitwise_eq(&knob(f64::NAN, 1)));
        let latch = Snapshot {
            value: ControlValue::Latch {
                seq_one: true,
                seq_two: false,
            },
            ..knob(0., 1)
        };
        assert!(!latch.bitwise_eq(&knob(0., 1)));
    }
}
