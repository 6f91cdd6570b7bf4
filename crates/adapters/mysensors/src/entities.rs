//! Mapping of nodes and child sensors onto devices and entities.

use homelink_app::ports::DiscoveredDevice;
use homelink_domain::device::Device;
use homelink_domain::entity::{AttributeValue, Entity, EntityState};
use homelink_domain::error::HubError;

use crate::DOMAIN;
use crate::node::{ChildSensor, Node};
use crate::protocol::{presentation, set_req};

const SENSOR_DOMAIN: &str = "sensor";
const MANUFACTURER: &str = "MySensors";

/// What a value type measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Temperature,
    Humidity,
    Power,
    Energy,
    Position,
    Other(u8),
}

impl ValueKind {
    #[must_use]
    pub fn from_value_type(value_type: u8) -> Self {
        match value_type {
            set_req::V_TEMP => Self::Temperature,
            set_req::V_HUM => Self::Humidity,
            set_req::V_WATT => Self::Power,
            set_req::V_KWH => Self::Energy,
            set_req::V_POSITION => Self::Position,
            other => Self::Other(other),
        }
    }

    #[must_use]
    pub fn unit(self) -> Option<&'static str> {
        match self {
            Self::Temperature => Some("°C"),
            Self::Humidity => Some("%"),
            Self::Power => Some("W"),
            Self::Energy => Some("kWh"),
            Self::Position | Self::Other(_) => None,
        }
    }

    #[must_use]
    pub fn device_class(self) -> Option<&'static str> {
        match self {
            Self::Temperature => Some("temperature"),
            Self::Humidity => Some("humidity"),
            Self::Power => Some("power"),
            Self::Energy => Some("energy"),
            Self::Position | Self::Other(_) => None,
        }
    }

    fn suffix(self) -> String {
        match self {
            Self::Temperature => "temperature".to_string(),
            Self::Humidity => "humidity".to_string(),
            Self::Power => "power".to_string(),
            Self::Energy => "energy".to_string(),
            Self::Position => "position".to_string(),
            Self::Other(value_type) => format!("value_{value_type}"),
        }
    }
}

/// Value type a presentation reports first.
fn main_value_type(child: &ChildSensor) -> Option<u8> {
    let main = match child.presentation_type {
        presentation::S_TEMP => Some(set_req::V_TEMP),
        presentation::S_HUM => Some(set_req::V_HUM),
        presentation::S_POWER => Some(set_req::V_WATT),
        presentation::S_GPS => Some(set_req::V_POSITION),
        _ => None,
    };
    main.filter(|value_type| child.values.contains_key(value_type))
        .or_else(|| child.values.keys().next().copied())
}

/// Lowercase, `_`-separated form of a name.
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    slug
}

/// Build the device and `sensor.*` entities of a node.
///
/// Each child value becomes one entity. The child's main value is named
/// `sensor.<sketch>_<node>_<child>`; the others get a `_<kind>` suffix.
///
/// # Errors
///
/// Returns [`HubError::Validation`] when a generated id is invalid.
pub fn discover_node(gateway_id: &str, node: &Node) -> Result<DiscoveredDevice, HubError> {
    let name = node.name();
    let mut device = Device::builder()
        .name(format!("{name} {}", node.sensor_id))
        .integration(DOMAIN)
        .unique_id(format!("{gateway_id}-{}", node.sensor_id))
        .manufacturer(MANUFACTURER);
    if let Some(model) = &node.sketch_name {
        device = device.model(model.clone());
    }
    let device = device.build()?;

    let mut entities = Vec::new();
    for child in node.children.values() {
        let main = main_value_type(child);
        for (value_type, payload) in &child.values {
            let kind = ValueKind::from_value_type(*value_type);
            let base = format!("{name} {} {}", node.sensor_id, child.id);
            let (object_id, friendly_name) = if Some(*value_type) == main {
                (slugify(&base), base)
            } else {
                let suffix = kind.suffix();
                (format!("{}_{suffix}", slugify(&base)), format!("{base} {suffix}"))
            };

            let mut builder = Entity::builder()
                .device_id(device.id)
                .entity_id(format!("{SENSOR_DOMAIN}.{object_id}"))
                .friendly_name(friendly_name)
                .state(EntityState::Value(payload.clone()))
                .attribute("node_id", AttributeValue::Int(i64::from(node.sensor_id)))
                .attribute("child_id", AttributeValue::Int(i64::from(child.id)))
                .attribute(
                    "description",
                    AttributeValue::String(child.description.clone()),
                )
                .attribute(
                    "battery_level",
                    AttributeValue::Int(i64::from(node.battery_level)),
                )
                .attribute("heartbeat", AttributeValue::Int(i64::from(node.heartbeat)));
            if let Some(unit) = kind.unit() {
                builder = builder.attribute(
                    "unit_of_measurement",
                    AttributeValue::String(unit.to_string()),
                );
            }
            if let Some(device_class) = kind.device_class() {
                builder = builder.attribute(
                    "device_class",
                    AttributeValue::String(device_class.to_string()),
                );
            }
            if kind == ValueKind::Position {
                for (key, value) in ["latitude", "longitude", "altitude"]
                    .into_iter()
                    .zip(payload.split(',').map(|part| part.trim().parse::<f64>()))
                {
                    if let Ok(value) = value {
                        builder = builder.attribute(key, AttributeValue::Float(value));
                    }
                }
            }
            entities.push(builder.build()?);
        }
    }

    Ok(DiscoveredDevice { device, entities })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn node(children: Vec<ChildSensor>) -> Node {
        Node {
            sensor_id: 2,
            children: children.into_iter().map(|child| (child.id, child)).collect(),
            node_type: presentation::S_ARDUINO_NODE,
            sketch_name: Some("Climate Node".to_string()),
            sketch_version: Some("1.0".to_string()),
            battery_level: 90,
            protocol_version: Some("2.3.2".to_string()),
            heartbeat: 0,
        }
    }

    fn child(id: u8, presentation_type: u8, values: &[(u8, &str)]) -> ChildSensor {
        ChildSensor {
            id,
            presentation_type,
            description: String::new(),
            values: values
                .iter()
                .map(|(key, value)| (*key, (*value).to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn should_slugify_names() {
        assert_eq!(slugify("GPS Sensor 1 1"), "gps_sensor_1_1");
        assert_eq!(slugify("  Weird--Name! "), "weird_name");
    }

    #[test]
    fn should_describe_device_of_node() {
        let discovered = discover_node("/dev/ttyACM0", &node(Vec::new())).unwrap();
        assert_eq!(discovered.device.name, "Climate Node 2");
        assert_eq!(discovered.device.unique_id, "/dev/ttyACM0-2");
        assert_eq!(discovered.device.manufacturer.as_deref(), Some("MySensors"));
        assert!(discovered.entities.is_empty());
    }

    #[test]
    fn should_map_temperature_and_humidity_children() {
        let node = node(vec![
            child(0, presentation::S_TEMP, &[(set_req::V_TEMP, "21.5")]),
            child(1, presentation::S_HUM, &[(set_req::V_HUM, "48")]),
        ]);

        let discovered = discover_node("gw", &node).unwrap();

        let temperature = &discovered.entities[0];
        assert_eq!(temperature.entity_id, "sensor.climate_node_2_0");
        assert_eq!(temperature.state, EntityState::Value("21.5".to_string()));
        assert_eq!(
            temperature.get_attribute("unit_of_measurement"),
            Some(&AttributeValue::String("°C".to_string()))
        );
        assert_eq!(temperature.device_id, Some(discovered.device.id));

        let humidity = &discovered.entities[1];
        assert_eq!(humidity.entity_id, "sensor.climate_node_2_1");
        assert_eq!(
            humidity.get_attribute("device_class"),
            Some(&AttributeValue::String("humidity".to_string()))
        );
    }

    #[test]
    fn should_suffix_secondary_values() {
        let node = node(vec![child(
            3,
            presentation::S_TEMP,
            &[(set_req::V_TEMP, "20"), (42, "x")],
        )]);

        let discovered = discover_node("gw", &node).unwrap();

        assert_eq!(discovered.entities[0].entity_id, "sensor.climate_node_2_3");
        assert_eq!(
            discovered.entities[1].entity_id,
            "sensor.climate_node_2_3_value_42"
        );
    }
}
