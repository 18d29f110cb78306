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
use anyhow::{ensure, Result};
use bevy_ecs::prelude::*;
use log::{debug, warn};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::{fmt, sync::Arc};

/// Lamp state of a two sequence push button.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct LampState {
    pub seq_one_lit: bool,
    pub seq_two_lit: bool,
}

/// Something in the cockpit that reacts to a control. Every hook defaults to
/// doing nothing, so a sink only implements what it cares about.
pub trait ReceiverSink: Send + Sync {
    fn name(&self) -> &str;

    fn on_percent(&mut self, _percent: f64) -> Result<()> {
        Ok(())
    }

    fn on_index(&mut self, _index: usize) -> Result<()> {
        Ok(())
    }

    fn on_latch(&mut self, _lamps: LampState) -> Result<()> {
        Ok(())
    }
}

/// The receivers attached to one control, notified in the order they were
/// added. A failing receiver is logged and the rest still run.
#[derive(Component, Default)]
pub struct ReceiverSet {
    control: String,
    sinks: SmallVec<[Box<dyn ReceiverSink>; 2]>,
}

impl fmt::Debug for ReceiverSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiverSet")
            .field("control", &self.control)
            .field(
                "sinks",
                &self.sinks.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ReceiverSet {
    pub fn new(control: &str) -> Self {
        Self {
            control: control.to_owned(),
            sinks: SmallVec::new(),
        }
    }

    pub fn from_specs(control: &str, specs: &[ReceiverSpec]) -> Self {
        let mut out = Self::new(control);
        for spec in specs {
            out.push(spec.build());
        }
        out
    }

    pub fn with_sink(mut self, sink: Box<dyn ReceiverSink>) -> Self {
        self.push(sink);
        self
    }

    pub fn push(&mut self, sink: Box<dyn ReceiverSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    fn deliver<F>(&mut self, what: &str, mut f: F)
    where
        F: FnMut(&mut dyn ReceiverSink) -> Result<()>,
    {
        for sink in self.sinks.iter_mut() {
            if let Err(e) = f(sink.as_mut()) {
                warn!("{}: receiver {} failed on {}: {:#}", self.control, sink.name(), what, e);
            }
        }
    }

    pub fn notify_percent(&mut self, percent: f64) {
        debug!("{}: percent {}", self.control, percent);
        self.deliver("percent", |sink| sink.on_percent(percent));
    }

    pub fn notify_index(&mut self, index: usize) {
        debug!("{}: index {}", self.control, index);
        self.deliver("index", |sink| sink.on_index(index));
    }

    pub fn notify_latch(&mut self, lamps: LampState) {
        debug!("{}: lamps {:?}", self.control, lamps);
        self.deliver("latch", |sink| sink.on_latch(lamps));
    }
}

/// Autopilot speed window: 0 to 400 knots across the control's range.
#[derive(Clone, Debug, Default)]
pub struct SpeedReadout {
    knots: f64,
    text: String,
}

impl SpeedReadout {
    pub const MAX_KNOTS: f64 = 400.;

    pub fn knots(&self) -> f64 {
        self.knots
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl ReceiverSink for SpeedReadout {
    fn name(&self) -> &str {
        "speed_readout"
    }

    fn on_percent(&mut self, percent: f64) -> Result<()> {
        ensure!(percent.is_finite(), "speed percent is not a number");
        self.knots = (Self::MAX_KNOTS * percent / 100.).clamp(0., Self::MAX_KNOTS);
        self.text = format!("{:03}", self.knots.round() as u32);
        Ok(())
    }
}

/// Reading light; dark until the control passes 1%.
#[derive(Clone, Debug)]
pub struct CabinLight {
    gain: f64,
    lit: bool,
    intensity: f64,
}

impl Default for CabinLight {
    fn default() -> Self {
        Self::with_gain(2.)
    }
}

impl CabinLight {
    pub fn with_gain(gain: f64) -> Self {
        Self {
            gain,
            lit: false,
            intensity: 0.,
        }
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    pub fn intensity(&self) -> f64 {
        self.intensity
    }
}

impl ReceiverSink for CabinLight {
    fn name(&self) -> &str {
        "cabin_light"
    }

    fn on_percent(&mut self, percent: f64) -> Result<()> {
        self.lit = percent > 1.;
        self.intensity = percent / 100. * self.gain;
        Ok(())
    }
}

/// Engine sound level, full volume at 100%.
#[derive(Clone, Debug, Default)]
pub struct EngineVolume {
    volume: f64,
}

impl EngineVolume {
    pub fn volume(&self) -> f64 {
        self.volume
    }
}

impl ReceiverSink for EngineVolume {
    fn name(&self) -> &str {
        "engine_volume"
    }

    fn on_percent(&mut self, percent: f64) -> Result<()> {
        ensure!(percent.is_finite(), "engine percent is not a number");
        self.volume = (percent / 100.).clamp(0., 1.);
        Ok(())
    }
}

/// Strobes flash in the first detent and are off in the others.
#[derive(Clone, Debug, Default)]
pub struct StrobeLights {
    on: bool,
}

impl StrobeLights {
    pub fn is_on(&self) -> bool {
        self.on
    }
}

impl ReceiverSink for StrobeLights {
    fn name(&self) -> &str {
        "strobe_lights"
    }

    fn on_index(&mut self, index: usize) -> Result<()> {
        self.on = index == 0;
        Ok(())
    }
}

/// A display that pages through a texture strip, one page per detent.
#[derive(Clone, Debug, Default)]
pub struct PageDisplay {
    offset: f64,
}

impl PageDisplay {
    pub const PAGE_STRIDE: f64 = 0.2;

    pub fn texture_offset(&self) -> f64 {
        self.offset
    }
}

impl ReceiverSink for PageDisplay {
    fn name(&self) -> &str {
        "page_display"
    }

    fn on_index(&mut self, index: usize) -> Result<()> {
        self.offset = Self::PAGE_STRIDE * index as f64;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Notification {
    Percent(f64),
    Index(usize),
    Latch(LampState),
}

/// Remembers every notification. Clones share the log.
#[derive(Clone, Debug, Default)]
pub struct Recorder {
    log: Arc<Mutex<Vec<Notification>>>,
}

impl Recorder {
    pub fn notifications(&self) -> Vec<Notification> {
        self.log.lock().clone()
    }

    pub fn percents(&self) -> Vec<f64> {
        self.log
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notification::Percent(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    pub fn indices(&self) -> Vec<usize> {
        self.log
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notification::Index(i) => Some(*i),
                _ => None,
            })
            .collect()
    }

    pub fn last(&self) -> Option<Notification> {
        self.log.lock().last().copied()
    }

    pub fn clear(&self) {
        self.log.lock().clear();
    }
}

impl ReceiverSink for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn on_percent(&mut self, percent: f64) -> Result<()> {
        self.log.lock().push(Notification::Percent(percent));
        Ok(())
    }

    fn on_index(&mut self, index: usize) -> Result<()> {
        self.log.lock().push(Notification::Index(index));
        Ok(())
    }

    fn on_latch(&mut self, lamps: LampState) -> Result<()> {
        self.log.lock().push(Notification::Latch(lamps));
        Ok(())
    }
}

/// Receivers a cockpit description can name.
#[derive(Clone, Debug, PartialEq)]
pub enum ReceiverSpec {
    SpeedReadout,
    CabinLight { gain: f64 },
    EngineVolume,
    StrobeLights,
    PageDisplay,
}

impl ReceiverSpec {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "speed_readout" => Self::SpeedReadout,
            "cabin_light" => Self::CabinLight { gain: 2. },
            "engine_volume" => Self::EngineVolume,
            "strobe_lights" => Self::StrobeLights,
            "page_display" => Self::PageDisplay,
            _ => return None,
        })
    }

    pub fn build(&self) -> Box<dyn ReceiverSink> {
        match self {
            Self::SpeedReadout => Box::new(SpeedReadout::default()),
            Self::CabinLight { gain } => Box::new(CabinLight::with_gain(*gain)),
            Self::EngineVolume => Box::new(EngineVolume::default()),
            Self::StrobeLights => Box::new(StrobeLights::default()),
            Self::PageDisplay => Box::new(PageDisplay::default()),
        }
    }
}
