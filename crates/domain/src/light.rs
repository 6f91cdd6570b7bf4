//! Light colour model and the unit conversions used when mirroring a light
//! onto accessory characteristics.
//!
//! Platform lights report brightness as `0..=255`, colour as a `(hue,
//! saturation)` float pair and colour temperature in mireds. Accessory
//! characteristics carry brightness as a `0..=100` percentage and integer
//! hue, saturation, and mireds.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entity::{AttributeValue, Entity};

/// Service domain for lights.
pub const DOMAIN: &str = "light";
pub const SERVICE_TURN_ON: &str = "turn_on";
pub const SERVICE_TURN_OFF: &str = "turn_off";

pub const ATTR_BRIGHTNESS: &str = "brightness";
pub const ATTR_BRIGHTNESS_PCT: &str = "brightness_pct";
pub const ATTR_COLOR_MODE: &str = "color_mode";
pub const ATTR_COLOR_TEMP: &str = "color_temp";
pub const ATTR_HS_COLOR: &str = "hs_color";
pub const ATTR_SUPPORTED_COLOR_MODES: &str = "supported_color_modes";
pub const ATTR_MIN_MIREDS: &str = "min_mireds";
pub const ATTR_MAX_MIREDS: &str = "max_mireds";

pub const DEFAULT_MIN_MIREDS: u16 = 153;
pub const DEFAULT_MAX_MIREDS: u16 = 500;

/// How a light is currently (or can be) driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    Onoff,
    Brightness,
    ColorTemp,
    Hs,
    Xy,
    Rgb,
    Rgbw,
    Rgbww,
    White,
    #[serde(other)]
    Unknown,
}

impl ColorMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Onoff => "onoff",
            Self::Brightness => "brightness",
            Self::ColorTemp => "color_temp",
            Self::Hs => "hs",
            Self::Xy => "xy",
            Self::Rgb => "rgb",
            Self::Rgbw => "rgbw",
            Self::Rgbww => "rgbww",
            Self::White => "white",
            Self::Unknown => "unknown",
        }
    }

    fn is_color(self) -> bool {
        matches!(
            self,
            Self::Hs | Self::Xy | Self::Rgb | Self::Rgbw | Self::Rgbww
        )
    }

    fn has_brightness(self) -> bool {
        !matches!(self, Self::Onoff | Self::Unknown)
    }
}

impl FromStr for ColorMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "onoff" => Self::Onoff,
            "brightness" => Self::Brightness,
            "color_temp" => Self::ColorTemp,
            "hs" => Self::Hs,
            "xy" => Self::Xy,
            "rgb" => Self::Rgb,
            "rgbw" => Self::Rgbw,
            "rgbww" => Self::Rgbww,
            "white" => Self::White,
            _ => Self::Unknown,
        })
    }
}

impl std::fmt::Display for ColorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether any of the modes can dim the light.
#[must_use]
pub fn brightness_supported(modes: &[ColorMode]) -> bool {
    modes.iter().any(|mode| mode.has_brightness())
}

/// Whether any of the modes can set a colour.
#[must_use]
pub fn color_supported(modes: &[ColorMode]) -> bool {
    modes.iter().any(|mode| mode.is_color())
}

/// Whether the light can set a colour temperature.
#[must_use]
pub fn color_temp_supported(modes: &[ColorMode]) -> bool {
    modes.contains(&ColorMode::ColorTemp)
}

/// Static capabilities of a light, read from its state attributes or from
/// the registry when no state exists yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightCapabilities {
    pub supported_color_modes: Vec<ColorMode>,
    pub min_mireds: u16,
    pub max_mireds: u16,
}

impl Default for LightCapabilities {
    fn default() -> Self {
        Self {
            supported_color_modes: Vec::new(),
            min_mireds: DEFAULT_MIN_MIREDS,
            max_mireds: DEFAULT_MAX_MIREDS,
        }
    }
}

impl LightCapabilities {
    /// Read capabilities from a state's attributes.
    #[must_use]
    pub fn from_entity(entity: &Entity) -> Self {
        let modes = entity
            .get_attribute(ATTR_SUPPORTED_COLOR_MODES)
            .map(AttributeValue::to_json);
        let min = entity.get_attribute(ATTR_MIN_MIREDS).and_then(AttributeValue::as_f64);
        let max = entity.get_attribute(ATTR_MAX_MIREDS).and_then(AttributeValue::as_f64);
        Self::from_parts(modes.as_ref(), min, max)
    }

    /// Read capabilities from a registry capabilities object, e.g.
    /// `{"supported_color_modes": ["brightness"]}`.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        Self::from_parts(
            value.get(ATTR_SUPPORTED_COLOR_MODES),
            value.get(ATTR_MIN_MIREDS).and_then(serde_json::Value::as_f64),
            value.get(ATTR_MAX_MIREDS).and_then(serde_json::Value::as_f64),
        )
    }

    fn from_parts(modes: Option<&serde_json::Value>, min: Option<f64>, max: Option<f64>) -> Self {
        let supported_color_modes = modes
            .and_then(serde_json::Value::as_array)
            .map(|modes| {
                modes
                    .iter()
                    .filter_map(serde_json::Value::as_str)
                    .filter_map(|mode| mode.parse().ok())
                    .collect()
            })
            .unwrap_or_default();
        Self {
            supported_color_modes,
            min_mireds: min.map_or(DEFAULT_MIN_MIREDS, truncate_mireds),
            max_mireds: max.map_or(DEFAULT_MAX_MIREDS, truncate_mireds),
        }
    }

    #[must_use]
    pub fn supports_brightness(&self) -> bool {
        brightness_supported(&self.supported_color_modes)
    }

    #[must_use]
    pub fn supports_color(&self) -> bool {
        color_supported(&self.supported_color_modes)
    }

    #[must_use]
    pub fn supports_color_temp(&self) -> bool {
        color_temp_supported(&self.supported_color_modes)
    }
}

/// Convert a `0..=255` brightness into a `0..=100` percentage.
///
/// A light that is on never reports `0`: the accessory controller treats a
/// stored `0` as "off" and restores `100` on the next turn-on.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn brightness_to_percentage(brightness: f64, is_on: bool) -> u8 {
    let pct = (brightness / 255.0 * 100.0).round_ties_even().clamp(0.0, 100.0) as u8;
    if pct == 0 && is_on { 1 } else { pct }
}

/// Truncate a platform `(hue, saturation)` pair to characteristic integers.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn truncate_hs(hue: f64, saturation: f64) -> (u16, u8) {
    (
        hue.trunc().clamp(0.0, 360.0) as u16,
        saturation.trunc().clamp(0.0, 100.0) as u8,
    )
}

/// Truncate a colour temperature in mireds to a characteristic integer.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn truncate_mireds(mireds: f64) -> u16 {
    mireds.trunc().clamp(0.0, f64::from(u16::MAX)) as u16
}

/// Current brightness (`0..=255`), if numeric.
#[must_use]
pub fn brightness(entity: &Entity) -> Option<f64> {
    entity.get_attribute(ATTR_BRIGHTNESS).and_then(AttributeValue::as_f64)
}

/// Current colour temperature in mireds, if numeric.
#[must_use]
pub fn color_temp(entity: &Entity) -> Option<f64> {
    entity.get_attribute(ATTR_COLOR_TEMP).and_then(AttributeValue::as_f64)
}

/// Current colour mode, if reported.
#[must_use]
pub fn color_mode(entity: &Entity) -> Option<ColorMode> {
    entity
        .get_attribute(ATTR_COLOR_MODE)
        .and_then(AttributeValue::as_str)
        .and_then(|mode| mode.parse().ok())
}

/// Current `(hue, saturation)`, only when both parts are numeric.
#[must_use]
pub fn hs_color(entity: &Entity) -> Option<(f64, f64)> {
    let value = entity.get_attribute(ATTR_HS_COLOR)?.to_json();
    let pair = value.as_array()?;
    match pair.as_slice() {
        [hue, saturation] => Some((hue.as_f64()?, saturation.as_f64()?)),
        _ => None,
    }
}
