//! Light effects for resolved rolls.
//!
//! Each [`ResultTier`] maps to a short sequence of light steps. The
//! [`HomeAssistantPayloadDispatcher`] renders those steps as Home Assistant
//! `light` service calls, one JSON object per line, instead of calling the
//! Home Assistant API itself.

use std::io::{self, Write};
use std::time::Duration;

use pixelroll_session::{DispatchError, EffectDispatcher, Outcome, ResultTier};
use serde::Serialize;
use tracing::debug;

/// Interval between color cycle and blink steps.
pub const CYCLE_INTERVAL: Duration = Duration::from_millis(500);

/// Warm white the light returns to after an effect.
pub const DEFAULT_RESTORE_COLOR_TEMP: u16 = 2500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const RED: Self = Self(255, 0, 0);
    pub const ORANGE: Self = Self(255, 165, 0);
    pub const YELLOW: Self = Self(255, 255, 0);
    pub const GREEN: Self = Self(0, 128, 0);
    pub const BLUE: Self = Self(0, 0, 255);
    pub const INDIGO: Self = Self(75, 0, 130);
    pub const PURPLE: Self = Self(128, 0, 128);
    pub const ROYAL_BLUE: Self = Self(65, 105, 225);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightAction {
    Color(Rgb),
    ColorTemperature(u16),
    Off,
}

/// One light change followed by a pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightStep {
    pub action: LightAction,
    pub hold: Duration,
}

/// The light sequence shown for one outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightEffect {
    steps: Vec<LightStep>,
}

impl LightEffect {
    pub fn for_tier(tier: ResultTier) -> Self {
        match tier {
            ResultTier::Critical => Self::cycle(&[
                Rgb::RED,
                Rgb::ORANGE,
                Rgb::YELLOW,
                Rgb::GREEN,
                Rgb::BLUE,
                Rgb::INDIGO,
                Rgb::PURPLE,
            ]),
            ResultTier::High => Self::solid(Rgb::ROYAL_BLUE),
            ResultTier::Mid => Self::solid(Rgb::GREEN),
            ResultTier::Low => Self::solid(Rgb::ORANGE),
            ResultTier::Minimal => Self::solid(Rgb::RED),
            ResultTier::Fumble => Self::cycle(&[Rgb::RED, Rgb::RED, Rgb::RED]),
        }
    }

    fn solid(color: Rgb) -> Self {
        Self {
            steps: vec![LightStep {
                action: LightAction::Color(color),
                hold: Duration::ZERO,
            }],
        }
    }

    /// Show each color in turn, switching off between colors.
    /// The last color stays on.
    fn cycle(colors: &[Rgb]) -> Self {
        let mut steps = Vec::with_capacity(colors.len() * 2);
        if let Some((last, rest)) = colors.split_last() {
            for &color in rest {
                steps.push(LightStep {
                    action: LightAction::Color(color),
                    hold: CYCLE_INTERVAL,
                });
                steps.push(LightStep {
                    action: LightAction::Off,
                    hold: CYCLE_INTERVAL,
                });
            }
            steps.push(LightStep {
                action: LightAction::Color(*last),
                hold: Duration::ZERO,
            });
        }
        Self { steps }
    }

    /// Hold the final step, then return the light to a color temperature.
    pub fn with_restore(mut self, color_temp: u16) -> Self {
        if let Some(last) = self.steps.last_mut() {
            last.hold = CYCLE_INTERVAL;
        }
        self.steps.push(LightStep {
            action: LightAction::ColorTemperature(color_temp),
            hold: Duration::ZERO,
        });
        self
    }

    pub fn steps(&self) -> &[LightStep] {
        &self.steps
    }

    /// Total time the effect takes to play.
    pub fn duration(&self) -> Duration {
        self.steps.iter().map(|step| step.hold).sum()
    }
}

#[derive(Serialize)]
struct ServiceCall<'a> {
    domain: &'static str,
    service: &'static str,
    data: ServiceData<'a>,
}

#[derive(Serialize)]
struct ServiceData<'a> {
    entity_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    rgb_color: Option<[u8; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color_temp: Option<u16>,
}

impl<'a> ServiceCall<'a> {
    fn for_action(entity_id: &'a str, action: LightAction) -> Self {
        let (service, rgb_color, color_temp) = match action {
            LightAction::Color(Rgb(r, g, b)) => ("turn_on", Some([r, g, b]), None),
            LightAction::ColorTemperature(temp) => ("turn_on", None, Some(temp)),
            LightAction::Off => ("turn_off", None, None),
        };
        Self {
            domain: "light",
            service,
            data: ServiceData {
                entity_id,
                rgb_color,
                color_temp,
            },
        }
    }
}

/// Writes the light effect for each outcome as Home Assistant service calls.
///
/// Steps are written immediately; their hold times are not slept.
pub struct HomeAssistantPayloadDispatcher<W> {
    writer: W,
    entity_id: String,
    restore_color_temp: Option<u16>,
}

impl<W: Write> HomeAssistantPayloadDispatcher<W> {
    pub fn new(writer: W, entity_id: impl Into<String>) -> Self {
        Self {
            writer,
            entity_id: entity_id.into(),
            restore_color_temp: None,
        }
    }

    /// Return the light to `color_temp` after every effect.
    pub fn with_restore(mut self, color_temp: u16) -> Self {
        self.restore_color_temp = Some(color_temp);
        self
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// The effect this dispatcher plays for `tier`.
    pub fn effect(&self, tier: ResultTier) -> LightEffect {
        let effect = LightEffect::for_tier(tier);
        match self.restore_color_temp {
            Some(temp) => effect.with_restore(temp),
            None => effect,
        }
    }

    fn write_effect(&mut self, effect: &LightEffect) -> io::Result<()> {
        for step in effect.steps() {
            let call = ServiceCall::for_action(&self.entity_id, step.action);
            serde_json::to_writer(&mut self.writer, &call)?;
            self.writer.write_all(b"\n")?;
        }
        self.writer.flush()
    }
}

impl<W: Write> EffectDispatcher for HomeAssistantPayloadDispatcher<W> {
    fn dispatch(&mut self, outcome: &Outcome) -> Result<(), DispatchError> {
        let effect = self.effect(outcome.tier());
        debug!(
            entity_id = %self.entity_id,
            tier = %outcome.tier(),
            steps = effect.steps().len(),
            "writing light effect"
        );
        self.write_effect(&effect)?;
        Ok(())
    }
}
