//! Light accessory: maps a `light.*` entity onto a lightbulb accessory.
//!
//! A light supporting both colour and colour temperature gets two linked
//! lightbulb services, `RGB` (primary) and `Temperature` (secondary), so
//! controllers show both controls. Only one of them reports "on" at a time,
//! following the entity's colour mode.

use std::collections::BTreeMap;

use homelink_domain::entity::Entity;
use homelink_domain::light::{
    self, ATTR_BRIGHTNESS_PCT, ATTR_COLOR_TEMP, ATTR_HS_COLOR, ColorMode, LightCapabilities,
    SERVICE_TURN_OFF, SERVICE_TURN_ON,
};
use homelink_domain::service::ServiceCall;

use crate::accessory::{Accessory, Category, ServiceKind};
use crate::characteristic::CharKind;

const PRIMARY_NAME: &str = "RGB";
const SECONDARY_NAME: &str = "Temperature";
const INITIAL_BRIGHTNESS: i64 = 100;
const INITIAL_HUE: i64 = 0;
const INITIAL_SATURATION: i64 = 75;

/// Which of the light's lightbulb services a write landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightService {
    Primary,
    Secondary,
}

/// Characteristics a light accessory may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightChar {
    OnPrimary,
    OnSecondary,
    BrightnessPrimary,
    BrightnessSecondary,
    Hue,
    Saturation,
    ColorTemperature,
}

/// Service call produced by a characteristic write, with its log line.
#[derive(Debug, Clone, PartialEq)]
pub struct LightCommand {
    pub call: ServiceCall,
    /// e.g. `Set state to 1, brightness at 20%`.
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct LightAccessory {
    accessory: Accessory,
    entity_id: String,
    capabilities: LightCapabilities,
    chars_primary: Vec<CharKind>,
    chars_secondary: Vec<CharKind>,
    primary: usize,
    secondary: Option<usize>,
}

impl LightAccessory {
    /// Build the accessory for `entity_id`.
    ///
    /// Capabilities come from the current state when there is one, otherwise
    /// from the registry capabilities (e.g. `{"supported_color_modes":
    /// ["brightness"]}`), otherwise the light is treated as on/off only.
    #[must_use]
    pub fn new(
        aid: u64,
        display_name: impl Into<String>,
        entity_id: impl Into<String>,
        state: Option<&Entity>,
        registry_capabilities: Option<&serde_json::Value>,
    ) -> Self {
        let entity_id = entity_id.into();
        let capabilities = state
            .map(LightCapabilities::from_entity)
            .or_else(|| registry_capabilities.map(LightCapabilities::from_json))
            .unwrap_or_default();

        let dual = capabilities.supports_color() && capabilities.supports_color_temp();
        let mut chars_primary = Vec::new();
        let mut chars_secondary = Vec::new();
        if capabilities.supports_brightness() {
            chars_primary.push(CharKind::Brightness);
        }
        if capabilities.supports_color() {
            chars_primary.push(CharKind::Hue);
            chars_primary.push(CharKind::Saturation);
        }
        if dual {
            chars_primary.push(CharKind::Name);
            chars_secondary.extend([CharKind::Name, CharKind::ColorTemperature, CharKind::Brightness]);
        } else if capabilities.supports_color_temp() {
            chars_primary.push(CharKind::ColorTemperature);
        }

        let mut builder = Accessory::builder(aid, display_name, Category::Lightbulb);
        let primary = builder.add_service(ServiceKind::Lightbulb, &with_on(&chars_primary));
        let secondary =
            dual.then(|| builder.add_service(ServiceKind::Lightbulb, &with_on(&chars_secondary)));
        let mut accessory = builder.build();
        accessory.set_information("homelink", light::DOMAIN, &entity_id);
        accessory.services[primary].primary = true;
        if let Some(secondary) = secondary {
            let secondary_iid = accessory.services[secondary].iid;
            accessory.services[primary].linked.push(secondary_iid);
        }

        let mut this = Self {
            accessory,
            entity_id,
            capabilities,
            chars_primary,
            chars_secondary,
            primary,
            secondary,
        };
        this.initialize();
        if state.is_some() {
            this.update_state(state);
        }
        this
    }

    fn initialize(&mut self) {
        let (min_mireds, max_mireds) = (
            i64::from(self.capabilities.min_mireds),
            i64::from(self.capabilities.max_mireds),
        );
        let services = [Some(self.primary), self.secondary];
        for index in services.into_iter().flatten() {
            let name = if Some(index) == self.secondary {
                SECONDARY_NAME
            } else {
                PRIMARY_NAME
            };
            for characteristic in &mut self.accessory.services[index].characteristics {
                match characteristic.kind {
                    CharKind::Brightness => {
                        characteristic.set_value(INITIAL_BRIGHTNESS);
                    }
                    CharKind::Hue => {
                        characteristic.set_value(INITIAL_HUE);
                    }
                    CharKind::Saturation => {
                        characteristic.set_value(INITIAL_SATURATION);
                    }
                    CharKind::ColorTemperature => {
                        characteristic.set_range(min_mireds, max_mireds);
                        characteristic.set_value(min_mireds);
                    }
                    CharKind::Name => characteristic.set_text(name),
                    _ => {}
                }
            }
        }
    }

    #[must_use]
    pub fn aid(&self) -> u64 {
        self.accessory.aid
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.accessory.display_name
    }

    #[must_use]
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    #[must_use]
    pub fn accessory(&self) -> &Accessory {
        &self.accessory
    }

    #[must_use]
    pub fn capabilities(&self) -> &LightCapabilities {
        &self.capabilities
    }

    /// Optional characteristics of the primary service (`On` excluded).
    #[must_use]
    pub fn chars_primary(&self) -> &[CharKind] {
        &self.chars_primary
    }

    /// Optional characteristics of the secondary service, empty unless the
    /// light has both colour and colour temperature.
    #[must_use]
    pub fn chars_secondary(&self) -> &[CharKind] {
        &self.chars_secondary
    }

    #[must_use]
    pub fn is_dual(&self) -> bool {
        self.secondary.is_some()
    }

    /// Instance id of a characteristic, when the light exposes it.
    #[must_use]
    pub fn iid(&self, which: LightChar) -> Option<u64> {
        let (service, kind) = match which {
            LightChar::OnPrimary => (Some(self.primary), CharKind::On),
            LightChar::OnSecondary => (self.secondary, CharKind::On),
            LightChar::BrightnessPrimary => (Some(self.primary), CharKind::Brightness),
            LightChar::BrightnessSecondary => (self.secondary, CharKind::Brightness),
            LightChar::Hue => (Some(self.primary), CharKind::Hue),
            LightChar::Saturation => (Some(self.primary), CharKind::Saturation),
            LightChar::ColorTemperature => (
                Some(self.secondary.unwrap_or(self.primary)),
                CharKind::ColorTemperature,
            ),
        };
        self.accessory.services[service?]
            .characteristic(kind)
            .map(|c| c.iid)
    }

    /// Current value of a numeric characteristic.
    #[must_use]
    pub fn value(&self, which: LightChar) -> Option<i64> {
        let iid = self.iid(which)?;
        self.accessory.characteristic(iid).and_then(|c| c.as_i64())
    }

    fn set(&mut self, which: LightChar, value: i64) {
        if let Some(iid) = self.iid(which)
            && let Some(characteristic) = self.accessory.characteristic_mut(iid)
        {
            characteristic.set_value(value);
        }
    }

    /// Mirror the entity's state into the characteristics. `None` means the
    /// entity is gone and the light is reported off.
    pub fn update_state(&mut self, entity: Option<&Entity>) {
        let is_on = entity.is_some_and(|entity| entity.state.is_on());
        let on = i64::from(is_on);
        if self.is_dual() {
            let temp_mode = entity.and_then(light::color_mode) == Some(ColorMode::ColorTemp);
            let (primary, secondary) = if temp_mode { (0, on) } else { (on, 0) };
            self.set(LightChar::OnPrimary, primary);
            self.set(LightChar::OnSecondary, secondary);
        } else {
            self.set(LightChar::OnPrimary, on);
        }

        let Some(entity) = entity else {
            return;
        };
        if self.capabilities.supports_brightness()
            && let Some(brightness) = light::brightness(entity)
        {
            let pct = i64::from(light::brightness_to_percentage(brightness, is_on));
            self.set(LightChar::BrightnessPrimary, pct);
            self.set(LightChar::BrightnessSecondary, pct);
        }
        if self.capabilities.supports_color_temp()
            && let Some(mireds) = light::color_temp(entity)
        {
            self.set(
                LightChar::ColorTemperature,
                i64::from(light::truncate_mireds(mireds)),
            );
        }
        if self.capabilities.supports_color()
            && let Some((hue, saturation)) = light::hs_color(entity)
        {
            let (hue, saturation) = light::truncate_hs(hue, saturation);
            self.set(LightChar::Hue, i64::from(hue));
            self.set(LightChar::Saturation, i64::from(saturation));
        }
    }

    /// Apply controller writes given as `(iid, value)`, returning one command
    /// per lightbulb service touched, primary first.
    ///
    /// Writes to unknown or read-only characteristics are skipped.
    pub fn write(&mut self, writes: &[(u64, i64)]) -> Vec<LightCommand> {
        let mut primary = BTreeMap::new();
        let mut secondary = BTreeMap::new();
        for (iid, value) in writes {
            let Some(characteristic) = self.accessory.characteristic(*iid) else {
                tracing::warn!(aid = self.aid(), iid, "write to unknown characteristic");
                continue;
            };
            if !characteristic.kind.is_writable() {
                tracing::warn!(aid = self.aid(), iid, "write to read-only characteristic");
                continue;
            }
            let kind = characteristic.kind;
            match self.accessory.service_index_of(*iid) {
                Some(index) if index == self.primary => {
                    primary.insert(kind, *value);
                }
                Some(index) if Some(index) == self.secondary => {
                    secondary.insert(kind, *value);
                }
                _ => tracing::warn!(aid = self.aid(), iid, "write outside lightbulb services"),
            }
        }

        let mut commands = Vec::new();
        if !primary.is_empty() {
            commands.push(self.set_chars(&primary, LightService::Primary));
        }
        if !secondary.is_empty() {
            commands.push(self.set_chars(&secondary, LightService::Secondary));
        }
        commands
    }

    /// Store the written values on `service` and build the matching
    /// `light.turn_on` / `light.turn_off` call.
    pub fn set_chars(
        &mut self,
        values: &BTreeMap<CharKind, i64>,
        service: LightService,
    ) -> LightCommand {
        let index = match service {
            LightService::Secondary => self.secondary.unwrap_or(self.primary),
            LightService::Primary => self.primary,
        };
        let mut stored = BTreeMap::new();
        for characteristic in &mut self.accessory.services[index].characteristics {
            if let Some(value) = values.get(&characteristic.kind) {
                stored.insert(characteristic.kind, characteristic.set_value(*value));
            }
        }

        let mut events = Vec::new();
        let mut turn_off = false;
        let mut call = ServiceCall::for_entity(light::DOMAIN, SERVICE_TURN_ON, &self.entity_id);

        if let Some(on) = stored.get(&CharKind::On) {
            turn_off = *on == 0;
            events.push(format!("Set state to {on}"));
        }
        if let Some(brightness) = stored.get(&CharKind::Brightness) {
            if *brightness == 0 {
                let off = "Set state to 0".to_string();
                match events.last_mut() {
                    Some(last) => *last = off,
                    None => events.push(off),
                }
                turn_off = true;
            } else {
                call = call.with(ATTR_BRIGHTNESS_PCT, *brightness);
            }
            events.push(format!("brightness at {brightness}%"));
        }

        if turn_off {
            return LightCommand {
                call: ServiceCall::for_entity(light::DOMAIN, SERVICE_TURN_OFF, &self.entity_id),
                description: events.join(", "),
            };
        }

        let dual = self.is_dual();
        let wrote_temp = stored.contains_key(&CharKind::ColorTemperature);
        let wrote_color =
            stored.contains_key(&CharKind::Hue) || stored.contains_key(&CharKind::Saturation);
        if self.capabilities.supports_color_temp()
            && (wrote_temp || (dual && service == LightService::Secondary))
        {
            let mireds = stored
                .get(&CharKind::ColorTemperature)
                .copied()
                .or_else(|| self.value(LightChar::ColorTemperature));
            if let Some(mireds) = mireds {
                call = call.with(ATTR_COLOR_TEMP, mireds);
                events.push(format!("color temperature at {mireds}"));
            }
        } else if self.capabilities.supports_color()
            && (wrote_color || (dual && service == LightService::Primary))
        {
            let hue = stored
                .get(&CharKind::Hue)
                .copied()
                .or_else(|| self.value(LightChar::Hue));
            let saturation = stored
                .get(&CharKind::Saturation)
                .copied()
                .or_else(|| self.value(LightChar::Saturation));
            if let (Some(hue), Some(saturation)) = (hue, saturation) {
                call = call.with(ATTR_HS_COLOR, serde_json::json!([hue, saturation]));
                events.push(format!("set color at ({hue}, {saturation})"));
            }
        }

        LightCommand {
            call,
            description: events.join(", "),
        }
    }
}

fn with_on(optional: &[CharKind]) -> Vec<CharKind> {
    std::iter::once(CharKind::On)
        .chain(optional.iter().copied())
        .collect()
}
