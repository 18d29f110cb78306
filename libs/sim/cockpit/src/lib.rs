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
mod authority;
mod collision;
mod config;
mod detent;
mod error;
mod loopback;
mod pose;
mod projection;
mod push_button;
mod receiver;
mod replication;
mod schedule;
mod state;
mod systems;

pub use crate::{
    authority::{Authority, ControlId, Epoch, ParticipantId},
    collision::{ActivationVolume, CollisionProbe, HoverDetector, HoverTransition, HOVER_SUSPEND},
    config::{ButtonConfig, CockpitConfig, ControlConfig, ControlKind},
    detent::{ControlRange, DetentSet, UNSET_ANGLE},
    error::ControlError,
    loopback::{HubStats, LoopbackChannel, LoopbackHub},
    pose::{Bone, HandPose, HandSample, PoseProvider, ScriptedPose, TrackedPose},
    projection::{
        Axis, GeometryProjection, ProjectionConfig, SlideProjection, SwingProjection,
        TwistProjection,
    },
    push_button::PushButton,
    receiver::{
        CabinLight, EngineVolume, LampState, Notification, PageDisplay, ReceiverSet, ReceiverSink,
        ReceiverSpec, Recorder, SpeedReadout, StrobeLights,
    },
    replication::{ControlValue, Replicated, ReplicationChannel, Snapshot, SyncDebouncer},
    schedule::TickSchedule,
    state::{ControlState, Phase},
    systems::{
        Cockpit, CockpitStep, ControlIndex, GrabEvent, GrabEvents, GrabScript, HandTracking,
        ProbePoint, Replication, Session,
    },
};
