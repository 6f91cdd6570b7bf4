//! Characteristics: the typed values a HomeKit service exposes.

use serde::Serialize;

/// Kinds of characteristic used by the accessories of this bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CharKind {
    On,
    Brightness,
    Hue,
    Saturation,
    ColorTemperature,
    Name,
    Manufacturer,
    Model,
    SerialNumber,
    FirmwareRevision,
}

impl CharKind {
    /// Short form of the HAP type UUID.
    #[must_use]
    pub fn hap_type(self) -> &'static str {
        match self {
            Self::On => "25",
            Self::Brightness => "8",
            Self::Hue => "13",
            Self::Saturation => "2F",
            Self::ColorTemperature => "CE",
            Self::Name => "23",
            Self::Manufacturer => "20",
            Self::Model => "21",
            Self::SerialNumber => "30",
            Self::FirmwareRevision => "52",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "On",
            Self::Brightness => "Brightness",
            Self::Hue => "Hue",
            Self::Saturation => "Saturation",
            Self::ColorTemperature => "ColorTemperature",
            Self::Name => "Name",
            Self::Manufacturer => "Manufacturer",
            Self::Model => "Model",
            Self::SerialNumber => "SerialNumber",
            Self::FirmwareRevision => "FirmwareRevision",
        }
    }

    /// Whether the value is a string rather than a number.
    #[must_use]
    pub fn is_text(self) -> bool {
        matches!(
            self,
            Self::Name
                | Self::Manufacturer
                | Self::Model
                | Self::SerialNumber
                | Self::FirmwareRevision
        )
    }

    /// Whether a controller may write the value.
    #[must_use]
    pub fn is_writable(self) -> bool {
        !self.is_text()
    }

    fn default_range(self) -> Option<(i64, i64)> {
        match self {
            Self::On => Some((0, 1)),
            Self::Brightness | Self::Saturation => Some((0, 100)),
            Self::Hue => Some((0, 360)),
            Self::ColorTemperature => Some((140, 500)),
            _ => None,
        }
    }
}

impl std::fmt::Display for CharKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CharValue {
    Int(i64),
    Text(String),
}

impl CharValue {
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Text(_) => None,
        }
    }

    /// Read a numeric value sent by a controller; booleans count as `0`/`1`
    /// and fractional numbers are truncated.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn numeric_from_json(value: &serde_json::Value) -> Option<i64> {
        match value {
            serde_json::Value::Bool(value) => Some(i64::from(*value)),
            serde_json::Value::Number(number) => number
                .as_i64()
                .or_else(|| number.as_f64().map(|value| value.trunc() as i64)),
            _ => None,
        }
    }
}

/// A single characteristic with its instance id inside the accessory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Characteristic {
    pub kind: CharKind,
    pub iid: u64,
    value: CharValue,
    min: Option<i64>,
    max: Option<i64>,
}

impl Characteristic {
    /// Create a characteristic holding the kind's zero value.
    #[must_use]
    pub fn new(kind: CharKind, iid: u64) -> Self {
        let (min, max) = kind.default_range().unzip();
        let value = if kind.is_text() {
            CharValue::Text(String::new())
        } else {
            CharValue::Int(min.unwrap_or_default())
        };
        Self {
            kind,
            iid,
            value,
            min,
            max,
        }
    }

    /// Replace the allowed range, re-clamping the current value.
    pub fn set_range(&mut self, min: i64, max: i64) {
        self.min = Some(min);
        self.max = Some(max.max(min));
        if let CharValue::Int(value) = self.value {
            self.set_value(value);
        }
    }

    #[must_use]
    pub fn value(&self) -> &CharValue {
        &self.value
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.value.as_i64()
    }

    #[must_use]
    pub fn min(&self) -> Option<i64> {
        self.min
    }

    #[must_use]
    pub fn max(&self) -> Option<i64> {
        self.max
    }

    /// Store a numeric value clamped to the range, returning what was stored.
    pub fn set_value(&mut self, value: i64) -> i64 {
        let mut value = value;
        if let Some(min) = self.min {
            value = value.max(min);
        }
        if let Some(max) = self.max {
            value = value.min(max);
        }
        self.value = CharValue::Int(value);
        value
    }

    pub fn set_text(&mut self, value: impl Into<String>) {
        self.value = CharValue::Text(value.into());
    }

    /// HAP `/accessories` representation.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let perms: &[&str] = if self.kind.is_writable() {
            &["pr", "pw", "ev"]
        } else {
            &["pr"]
        };
        let mut json = serde_json::json!({
            "iid": self.iid,
            "type": self.kind.hap_type(),
            "perms": perms,
            "value": self.value,
        });
        if let (Some(min), Some(max)) = (self.min, self.max) {
            json["minValue"] = min.into();
            json["maxValue"] = max.into();
        }
        json
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_clamp_value_to_range() {
        let mut brightness = Characteristic::new(CharKind::Brightness, 9);
        assert_eq!(brightness.set_value(140), 100);
        assert_eq!(brightness.set_value(-3), 0);
        assert_eq!(brightness.as_i64(), Some(0));
    }

    #[test]
    fn should_reclamp_value_when_range_changes() {
        let mut temperature = Characteristic::new(CharKind::ColorTemperature, 9);
        temperature.set_value(500);
        temperature.set_range(153, 400);
        assert_eq!(temperature.as_i64(), Some(400));
        assert_eq!(temperature.min(), Some(153));
    }

    #[test]
    fn should_start_text_characteristic_empty() {
        let name = Characteristic::new(CharKind::Name, 2);
        assert_eq!(name.value(), &CharValue::Text(String::new()));
        assert_eq!(name.as_i64(), None);
    }

    #[test]
    fn should_read_controller_values_as_integers() {
        assert_eq!(CharValue::numeric_from_json(&serde_json::json!(true)), Some(1));
        assert_eq!(CharValue::numeric_from_json(&serde_json::json!(0)), Some(0));
        assert_eq!(
            CharValue::numeric_from_json(&serde_json::json!(145.7)),
            Some(145)
        );
        assert_eq!(CharValue::numeric_from_json(&serde_json::json!("on")), None);
    }

    #[test]
    fn should_describe_range_in_hap_json() {
        let hue = Characteristic::new(CharKind::Hue, 12);
        let json = hue.to_json();
        assert_eq!(json["type"], "13");
        assert_eq!(json["minValue"], 0);
        assert_eq!(json["maxValue"], 360);
        assert_eq!(json["perms"], serde_json::json!(["pr", "pw", "ev"]));
    }
}
