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

//! Cockpit descriptions. A description is a JSON document listing controls
//! and push buttons; everything in it is fixed once the cockpit is built.
use crate::{
    authority::ControlId,
    collision::ActivationVolume,
    detent::{ControlRange, DetentSet, UNSET_ANGLE},
    projection::{Axis, ProjectionConfig},
    receiver::ReceiverSpec,
};
use angle_math::{Distance, PercentMapping};
use anyhow::{anyhow, bail, ensure, Context, Result};
use geometry::{Aabb3, Sphere};
use json::JsonValue;
use log::warn;
use nalgebra::{Point3, Vector3};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ControlKind {
    Knob,
    Lever,
    Switch,
    VerticalLever,
    AxisInput,
}

impl ControlKind {
    pub fn from_name(name: &str) -> Result<Self> {
        Ok(match name {
            "knob" => Self::Knob,
            "lever" => Self::Lever,
            "switch" => Self::Switch,
            "vertical_lever" => Self::VerticalLever,
            "axis_input" => Self::AxisInput,
            _ => bail!("unknown control kind: {}", name),
        })
    }

    /// Knobs measure the reflex arc and compare detents around the dial;
    /// everything else reads straight along its travel.
    pub fn default_percent_mapping(self) -> PercentMapping {
        match self {
            Self::Knob => PercentMapping::Reflex,
            _ => PercentMapping::Directional,
        }
    }

    pub fn default_distance(self) -> Distance {
        match self {
            Self::Knob => Distance::Circular,
            _ => Distance::Absolute,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ControlConfig {
    pub id: ControlId,
    pub name: String,
    pub kind: ControlKind,
    pub projection: Option<ProjectionConfig>,
    pub volume: Option<ActivationVolume>,
    pub detents: DetentSet,
    pub range: Option<ControlRange>,
    pub visual_offset: f64,
    pub snapping_offset: f64,
    pub default_rotation: f64,
    pub default_rotation_offset: f64,
    /// Probe with the index fingertip instead of the hand.
    pub finger_collision: bool,
    pub tick_period: u32,
    pub percent_mapping: PercentMapping,
    pub distance: Distance,
    /// Percentages are rounded to this step before comparing; 0 compares
    /// exactly.
    pub percent_step: f64,
    pub receivers: Vec<ReceiverSpec>,
}

impl ControlConfig {
    pub fn new(id: ControlId, name: &str, kind: ControlKind) -> Self {
        Self {
            id,
            name: name.to_owned(),
            kind,
            projection: None,
            volume: None,
            detents: DetentSet::default(),
            range: None,
            visual_offset: 0.,
            snapping_offset: 0.,
            default_rotation: 0.,
            default_rotation_offset: 0.,
            finger_collision: false,
            tick_period: 1,
            percent_mapping: kind.default_percent_mapping(),
            distance: kind.default_distance(),
            percent_step: 1.,
            receivers: Vec::new(),
        }
    }

    pub fn with_projection(mut self, projection: ProjectionConfig) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn with_volume(mut self, volume: ActivationVolume) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_detents(mut self, detents: &[f64]) -> Self {
        self.detents = DetentSet::new(detents.to_vec());
        self
    }

    pub fn with_range(mut self, from: f64, to: f64) -> Self {
        self.range = ControlRange::from_sentinel(from, to);
        self
    }

    pub fn with_visual_offset(mut self, offset: f64) -> Self {
        self.visual_offset = offset;
        self
    }

    pub fn with_snapping_offset(mut self, offset: f64) -> Self {
        self.snapping_offset = offset;
        self
    }

    pub fn with_default_rotation(mut self, rotation: f64, offset: f64) -> Self {
        self.default_rotation = rotation;
        self.default_rotation_offset = offset;
        self
    }

    pub fn with_finger_collision(mut self, finger_collision: bool) -> Self {
        self.finger_collision = finger_collision;
        self
    }

    pub fn with_tick_period(mut self, period: u32) -> Self {
        self.tick_period = period;
        self
    }

    pub fn with_percent_mapping(mut self, mapping: PercentMapping) -> Self {
        self.percent_mapping = mapping;
        self
    }

    pub fn with_distance(mut self, distance: Distance) -> Self {
        self.distance = distance;
        self
    }

    pub fn with_percent_step(mut self, step: f64) -> Self {
        self.percent_step = step;
        self
    }

    pub fn with_receiver(mut self, receiver: ReceiverSpec) -> Self {
        self.receivers.push(receiver);
        self
    }

    pub fn from_json(value: &JsonValue) -> Result<Self> {
        let id = value["id"]
            .as_u32()
            .ok_or_else(|| anyhow!("control has no id"))?;
        let name = value["name"]
            .as_str()
            .ok_or_else(|| anyhow!("control {} has no name", id))?;
        let kind = ControlKind::from_name(
            value["kind"]
                .as_str()
                .ok_or_else(|| anyhow!("{} has no kind", name))?,
        )?;
        let mut config = Self::new(ControlId::new(id), name, kind);

        if !value["projection"].is_null() {
            config.projection =
                Some(read_projection(&value["projection"]).with_context(|| format!("{} projection", name))?);
        }
        if !value["volume"].is_null() {
            config.volume =
                Some(read_volume(&value["volume"]).with_context(|| format!("{} volume", name))?);
        }
        let mut detents = Vec::new();
        for member in value["detents"].members() {
            detents.push(
                member
                    .as_f64()
                    .ok_or_else(|| anyhow!("{}: detent is not a number", name))?,
            );
        }
        config.detents = DetentSet::new(detents);
        config.range = ControlRange::from_sentinel(
            read_f64(value, "from_angle", UNSET_ANGLE)?,
            read_f64(value, "to_angle", UNSET_ANGLE)?,
        );
        config.visual_offset = read_f64(value, "visual_offset", 0.)?;
        config.snapping_offset = read_f64(value, "snapping_offset", 0.)?;
        config.default_rotation = read_f64(value, "default_rotation", 0.)?;
        config.default_rotation_offset = read_f64(value, "default_rotation_offset", 0.)?;
        config.finger_collision = read_bool(value, "finger_collision", false)?;
        config.tick_period = read_tick_period(value).with_context(|| format!("{} tick period", name))?;
        config.percent_step = read_f64(value, "percent_step", 1.)?;
        ensure!(config.percent_step >= 0., "{}: negative percent step", name);
        if let Some(mapping) = value["percent_mapping"].as_str() {
            config.percent_mapping = PercentMapping::from_name(mapping)
                .ok_or_else(|| anyhow!("{}: unknown percent mapping {}", name, mapping))?;
        }
        if let Some(distance) = value["distance"].as_str() {
            config.distance = Distance::from_name(distance)
                .ok_or_else(|| anyhow!("{}: unknown distance {}", name, distance))?;
        }
        config.receivers = read_receivers(&value["receivers"], name);
        Ok(config)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ButtonConfig {
    pub id: ControlId,
    pub name: String,
    pub volume: Option<ActivationVolume>,
    /// When false a press toggles sequence one instead of sequence two.
    pub seq_two_togglable: bool,
    /// Light both lamps when either sequence is on.
    pub combined: bool,
    pub receivers: Vec<ReceiverSpec>,
}

impl ButtonConfig {
    pub fn new(id: ControlId, name: &str) -> Self {
        Self {
            id,
            name: name.to_owned(),
            volume: None,
            seq_two_togglable: true,
            combined: false,
            receivers: Vec::new(),
        }
    }

    pub fn with_volume(mut self, volume: ActivationVolume) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_seq_two_togglable(mut self, togglable: bool) -> Self {
        self.seq_two_togglable = togglable;
        self
    }

    pub fn with_combined(mut self, combined: bool) -> Self {
        self.combined = combined;
        self
    }

    pub fn with_receiver(mut self, receiver: ReceiverSpec) -> Self {
        self.receivers.push(receiver);
        self
    }

    pub fn from_json(value: &JsonValue) -> Result<Self> {
        let id = value["id"]
            .as_u32()
            .ok_or_else(|| anyhow!("button has no id"))?;
        let name = value["name"]
            .as_str()
            .ok_or_else(|| anyhow!("button {} has no name", id))?;
        let mut config = Self::new(ControlId::new(id), name);
        if !value["volume"].is_null() {
            config.volume =
                Some(read_volume(&value["volume"]).with_context(|| format!("{} volume", name))?);
        }
        config.seq_two_togglable = read_bool(value, "seq_two_togglable", true)?;
        config.combined = read_bool(value, "combined", false)?;
        config.receivers = read_receivers(&value["receivers"], name);
        Ok(config)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CockpitConfig {
    pub name: String,
    pub controls: Vec<ControlConfig>,
    pub buttons: Vec<ButtonConfig>,
}

impl CockpitConfig {
    /// Parse a cockpit description. Entries that do not parse are logged
    /// and left out; the rest of the cockpit still loads.
    pub fn from_json(content: &str) -> Result<Self> {
        let root = json::parse(content).context("cockpit description is not json")?;
        ensure!(root.is_object(), "cockpit description must be an object");
        let name = root["name"].as_str().unwrap_or("cockpit").to_owned();

        let mut controls = Vec::new();
        for (i, value) in root["controls"].members().enumerate() {
            match ControlConfig::from_json(value) {
                Ok(control) => controls.push(control),
                Err(e) => warn!("{}: skipping control {}: {:#}", name, i, e),
            }
        }
        let mut buttons = Vec::new();
        for (i, value) in root["buttons"].members().enumerate() {
            match ButtonConfig::from_json(value) {
                Ok(button) => buttons.push(button),
                Err(e) => warn!("{}: skipping button {}: {:#}", name, i, e),
            }
        }
        Ok(Self {
            name,
            controls,
            buttons,
        })
    }

    pub fn control(&self, name: &str) -> Option<&ControlConfig> {
        self.controls.iter().find(|c| c.name == name)
    }

    pub fn button(&self, name: &str) -> Option<&ButtonConfig> {
        self.buttons.iter().find(|b| b.name == name)
    }
}

fn read_f64(value: &JsonValue, key: &str, default: f64) -> Result<f64> {
    let v = &value[key];
    if v.is_null() {
        return Ok(default);
    }
    v.as_f64()
        .ok_or_else(|| anyhow!("{} is not a number", key))
}

fn read_tick_period(value: &JsonValue) -> Result<u32> {
    let v = &value["tick_period"];
    if v.is_null() {
        return Ok(1);
    }
    let whole = v.as_f64().map(|f| f.fract() == 0.).unwrap_or(false);
    let period = v
        .as_u32()
        .filter(|_| whole)
        .ok_or_else(|| anyhow!("tick_period must be a whole number, not {}", v))?;
    ensure!(period >= 1, "tick_period must be at least 1");
    Ok(period)
}

fn read_bool(value: &JsonValue, key: &str, default: bool) -> Result<bool> {
    let v = &value[key];
    if v.is_null() {
        return Ok(default);
    }
    v.as_bool().ok_or_else(|| anyhow!("{} is not a bool", key))
}

fn read_triple(value: &JsonValue, key: &str) -> Result<[f64; 3]> {
    let v = &value[key];
    ensure!(v.is_array() && v.len() == 3, "{} must be three numbers", key);
    let mut out = [0f64; 3];
    for (slot, member) in out.iter_mut().zip(v.members()) {
        *slot = member
            .as_f64()
            .ok_or_else(|| anyhow!("{} must be three numbers", key))?;
    }
    Ok(out)
}

fn read_point(value: &JsonValue, key: &str) -> Result<Point3<f64>> {
    Ok(Point3::from(read_triple(value, key)?))
}

fn read_vector(value: &JsonValue, key: &str, default: Vector3<f64>) -> Result<Vector3<f64>> {
    if value[key].is_null() {
        return Ok(default);
    }
    Ok(Vector3::from(read_triple(value, key)?))
}

fn read_axis(value: &JsonValue, key: &str, default: Axis) -> Result<Axis> {
    match value[key].as_str() {
        None => Ok(default),
        Some(name) => Axis::from_name(name).ok_or_else(|| anyhow!("unknown axis {}", name)),
    }
}

fn read_volume(value: &JsonValue) -> Result<ActivationVolume> {
    if value.has_key("box") {
        let b = &value["box"];
        Ok(ActivationVolume::Box(Aabb3::from_corners(
            read_triple(b, "lo")?,
            read_triple(b, "hi")?,
        )))
    } else if value.has_key("sphere") {
        let s = &value["sphere"];
        let radius = s["radius"]
            .as_f64()
            .ok_or_else(|| anyhow!("sphere has no radius"))?;
        Ok(ActivationVolume::Sphere(Sphere::from_center_and_radius(
            &read_point(s, "center")?,
            radius,
        )))
    } else {
        bail!("volume must be a box or a sphere")
    }
}

fn read_projection(value: &JsonValue) -> Result<ProjectionConfig> {
    if value.has_key("twist") {
        let t = &value["twist"];
        let axis = read_axis(t, "axis", Axis::Z)?;
        Ok(ProjectionConfig::Twist {
            axis,
            rotator_axis: read_axis(t, "rotator_axis", axis)?,
            invert: read_bool(t, "invert", false)?,
        })
    } else if value.has_key("slide") {
        let s = &value["slide"];
        let travel = if s["travel"].is_null() {
            None
        } else {
            let lo = s["travel"][0]
                .as_f64()
                .ok_or_else(|| anyhow!("travel must be two numbers"))?;
            let hi = s["travel"][1]
                .as_f64()
                .ok_or_else(|| anyhow!("travel must be two numbers"))?;
            Some((lo, hi))
        };
        Ok(ProjectionConfig::Slide {
            pivot: read_point(s, "pivot")?,
            handle: read_point(s, "handle")?,
            slide_axis: read_axis(s, "slide_axis", Axis::Z)?,
            rotator_axis: read_axis(s, "rotator_axis", Axis::X)?,
            travel,
            reference: read_vector(s, "reference", -Vector3::z())?,
            side: read_vector(s, "side", Vector3::y())?,
            reference_offset: read_f64(s, "reference_offset", 0.)?,
        })
    } else if value.has_key("swing") {
        let s = &value["swing"];
        Ok(ProjectionConfig::Swing {
            pivot: read_point(s, "pivot")?,
            handle: read_point(s, "handle")?,
            axis: read_axis(s, "axis", Axis::X)?,
            forward: read_vector(s, "forward", Vector3::z())?,
        })
    } else {
        bail!("projection must be twist, slide or swing")
    }
}

fn read_receivers(value: &JsonValue, owner: &str) -> Vec<ReceiverSpec> {
    let mut out = Vec::new();
    for member in value.members() {
        let spec = if let Some(name) = member.as_str() {
            ReceiverSpec::from_name(name)
        } else if let Some(gain) = member["cabin_light"]["gain"].as_f64() {
            Some(ReceiverSpec::CabinLight { gain })
        } else {
            None
        };
        match spec {
            Some(spec) => out.push(spec),
            None => warn!("{}: ignoring unknown receiver {}", owner, member.dump()),
        }
    }
    out
}
