//! Accessories and their services.
//!
//! Instance ids are allocated sequentially per accessory, starting with the
//! accessory-information service at `1`.

use crate::characteristic::{CharKind, Characteristic};

/// Accessory category advertised to controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Category {
    Other = 1,
    Bridge = 2,
    Lightbulb = 5,
    Sensor = 10,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    AccessoryInformation,
    Lightbulb,
}

impl ServiceKind {
    #[must_use]
    pub fn hap_type(self) -> &'static str {
        match self {
            Self::AccessoryInformation => "3E",
            Self::Lightbulb => "43",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub kind: ServiceKind,
    pub iid: u64,
    pub primary: bool,
    /// Instance ids of linked services.
    pub linked: Vec<u64>,
    pub characteristics: Vec<Characteristic>,
}

impl Service {
    #[must_use]
    pub fn characteristic(&self, kind: CharKind) -> Option<&Characteristic> {
        self.characteristics.iter().find(|c| c.kind == kind)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "iid": self.iid,
            "type": self.kind.hap_type(),
            "primary": self.primary,
            "linked": self.linked,
            "characteristics": self
                .characteristics
                .iter()
                .map(Characteristic::to_json)
                .collect::<Vec<_>>(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accessory {
    pub aid: u64,
    pub category: Category,
    pub display_name: String,
    pub services: Vec<Service>,
}

impl Accessory {
    #[must_use]
    pub fn builder(aid: u64, display_name: impl Into<String>, category: Category) -> AccessoryBuilder {
        AccessoryBuilder::new(aid, display_name, category)
    }

    #[must_use]
    pub fn characteristic(&self, iid: u64) -> Option<&Characteristic> {
        self.services
            .iter()
            .flat_map(|service| service.characteristics.iter())
            .find(|c| c.iid == iid)
    }

    pub fn characteristic_mut(&mut self, iid: u64) -> Option<&mut Characteristic> {
        self.services
            .iter_mut()
            .flat_map(|service| service.characteristics.iter_mut())
            .find(|c| c.iid == iid)
    }

    /// Index of the service owning the characteristic `iid`.
    #[must_use]
    pub fn service_index_of(&self, iid: u64) -> Option<usize> {
        self.services
            .iter()
            .position(|service| service.characteristics.iter().any(|c| c.iid == iid))
    }

    /// Fill the accessory-information service.
    pub fn set_information(&mut self, manufacturer: &str, model: &str, serial_number: &str) {
        let Some(info) = self
            .services
            .iter_mut()
            .find(|service| service.kind == ServiceKind::AccessoryInformation)
        else {
            return;
        };
        for characteristic in &mut info.characteristics {
            match characteristic.kind {
                CharKind::Manufacturer => characteristic.set_text(manufacturer),
                CharKind::Model => characteristic.set_text(model),
                CharKind::SerialNumber => characteristic.set_text(serial_number),
                _ => {}
            }
        }
    }

    /// HAP `/accessories` representation of this accessory.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "aid": self.aid,
            "services": self.services.iter().map(Service::to_json).collect::<Vec<_>>(),
        })
    }
}

/// Builder allocating instance ids as services are added.
#[derive(Debug)]
pub struct AccessoryBuilder {
    aid: u64,
    category: Category,
    display_name: String,
    next_iid: u64,
    services: Vec<Service>,
}

impl AccessoryBuilder {
    /// Start an accessory with its information service.
    #[must_use]
    pub fn new(aid: u64, display_name: impl Into<String>, category: Category) -> Self {
        let display_name = display_name.into();
        let mut builder = Self {
            aid,
            category,
            display_name: display_name.clone(),
            next_iid: 1,
            services: Vec::new(),
        };
        let index = builder.add_service(
            ServiceKind::AccessoryInformation,
            &[
                CharKind::Name,
                CharKind::Manufacturer,
                CharKind::Model,
                CharKind::SerialNumber,
                CharKind::FirmwareRevision,
            ],
        );
        builder.services[index].characteristics[0].set_text(display_name);
        builder.services[index].characteristics[4].set_text(env!("CARGO_PKG_VERSION"));
        builder
    }

    /// Add a service with the given characteristics, returning its index.
    pub fn add_service(&mut self, kind: ServiceKind, characteristics: &[CharKind]) -> usize {
        let iid = self.allocate();
        let characteristics = characteristics
            .iter()
            .map(|kind| Characteristic::new(*kind, self.allocate()))
            .collect();
        self.services.push(Service {
            kind,
            iid,
            primary: false,
            linked: Vec::new(),
            characteristics,
        });
        self.services.len() - 1
    }

    /// Access a service added earlier.
    pub fn service_mut(&mut self, index: usize) -> Option<&mut Service> {
        self.services.get_mut(index)
    }

    fn allocate(&mut self) -> u64 {
        let iid = self.next_iid;
        self.next_iid += 1;
        iid
    }

    #[must_use]
    pub fn build(self) -> Accessory {
        Accessory {
            aid: self.aid,
            category: self.category,
            display_name: self.display_name,
            services: self.services,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_start_with_information_service() {
        let accessory = Accessory::builder(2, "Light", Category::Lightbulb).build();

        let info = &accessory.services[0];
        assert_eq!(info.kind, ServiceKind::AccessoryInformation);
        assert_eq!(info.iid, 1);
        assert_eq!(
            info.characteristic(CharKind::Name).unwrap().value(),
            &crate::CharValue::Text("Light".to_string())
        );
    }

    #[test]
    fn should_allocate_sequential_instance_ids() {
        let mut builder = Accessory::builder(2, "Light", Category::Lightbulb);
        let index = builder.add_service(ServiceKind::Lightbulb, &[CharKind::On, CharKind::Brightness]);
        let accessory = builder.build();

        let light = &accessory.services[index];
        assert_eq!(light.iid, 7);
        assert_eq!(light.characteristics[0].iid, 8);
        assert_eq!(light.characteristics[1].iid, 9);
        assert_eq!(accessory.service_index_of(9), Some(index));
        assert_eq!(accessory.characteristic(8).unwrap().kind, CharKind::On);
        assert!(accessory.characteristic(42).is_none());
    }

    #[test]
    fn should_fill_information_service() {
        let mut accessory = Accessory::builder(2, "Light", Category::Lightbulb).build();
        accessory.set_information("homelink", "light", "light.demo");

        let json = accessory.to_json();
        assert_eq!(json["aid"], 2);
        assert_eq!(json["services"][0]["type"], "3E");
        assert_eq!(json["services"][0]["characteristics"][3]["value"], "light.demo");
    }
}
