//! Turning generic packets into typed views.
//!
//! Leaf packet classes are data, not types: a [`ClassRegistry`] maps a class
//! identifier to the payload format its data packets carry, and the factory
//! attaches that format when it builds a [`DataPacket`].
//!
//! ```rust
//! use vrtkit::{AnyPacket, ClassIdentifier, ClassRegistry, PacketFactory, PacketType, PayloadFormat, VrtConfig, VrtPacket};
//!
//! let class_id: ClassIdentifier = "FF-FF-FA:2011.0002".parse().unwrap();
//! let mut registry = ClassRegistry::default();
//! registry.register(class_id, PayloadFormat::INT16);
//!
//! let mut packet = VrtPacket::new(PacketType::Data, VrtConfig::default()).unwrap();
//! packet.set_class_identifier(Some(class_id)).unwrap();
//! match registry.build(packet) {
//!     AnyPacket::Data(data) => assert_eq!(data.payload_format(), Some(PayloadFormat::INT16)),
//!     other => panic!("expected a data packet, got {other:?}"),
//! }
//! ```

use crate::config::VrtConfig;
use crate::packet::{
    ClassIdentifier, ContextPacket, DataItemFormat, DataPacket, PackingMethod, PacketType, PayloadFormat,
    RealComplex, VrtPacket,
};
use crate::{Result, VrtError};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, warn};

/// A packet decoded into the view matching its type.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyPacket {
    Data(DataPacket<'static>),
    Context(ContextPacket<'static>),
    /// Reserved packet types.
    Other(VrtPacket<'static>),
}

impl AnyPacket {
    /// The generic packet underneath the view.
    pub fn packet(&self) -> &VrtPacket<'static> {
        match self {
            AnyPacket::Data(data) => &**data,
            AnyPacket::Context(context) => &**context,
            AnyPacket::Other(packet) => packet,
        }
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet().packet_type()
    }

    pub fn stream_identifier(&self) -> Option<u32> {
        self.packet().stream_identifier()
    }

    pub fn as_data(&self) -> Option<&DataPacket<'static>> {
        match self {
            AnyPacket::Data(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_context(&self) -> Option<&ContextPacket<'static>> {
        match self {
            AnyPacket::Context(context) => Some(context),
            _ => None,
        }
    }

    /// Drop the view and return the generic packet.
    pub fn into_packet(self) -> VrtPacket<'static> {
        match self {
            AnyPacket::Data(data) => data.into_packet(),
            AnyPacket::Context(context) => context.into_packet(),
            AnyPacket::Other(packet) => packet,
        }
    }
}

/// Builds typed views from generic packets.
pub trait PacketFactory: Send + Sync {
    /// Wrap `packet` in the view matching its type, falling back to
    /// [`AnyPacket::Other`].
    fn build(&self, packet: VrtPacket<'static>) -> AnyPacket;

    /// Create an empty packet of `packet_type` with `class_id` and wrap it.
    fn create(
        &self,
        packet_type: PacketType,
        class_id: Option<ClassIdentifier>,
        config: VrtConfig,
    ) -> Result<AnyPacket> {
        let mut packet = VrtPacket::new(packet_type, config)?;
        packet.set_class_identifier(class_id)?;
        Ok(self.build(packet))
    }
}

/// Factory that knows no packet classes: data packets get no payload format.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPacketFactory;

impl PacketFactory for DefaultPacketFactory {
    fn build(&self, packet: VrtPacket<'static>) -> AnyPacket {
        wrap(packet, None)
    }
}

fn wrap(packet: VrtPacket<'static>, format: Option<PayloadFormat>) -> AnyPacket {
    let packet = match DataPacket::try_wrap(packet) {
        Ok(data) => {
            return AnyPacket::Data(match format {
                Some(format) => data.with_format(format),
                None => data,
            });
        }
        Err(packet) => packet,
    };
    let packet = match ContextPacket::try_wrap(packet) {
        Ok(context) => return AnyPacket::Context(context),
        Err(packet) => packet,
    };
    warn!(packet_type = ?packet.packet_type(), "No view for packet type");
    AnyPacket::Other(packet)
}

/// Payload formats of known packet classes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassRegistry {
    formats: HashMap<ClassIdentifier, PayloadFormat>,
}

/// One class entry of a registry file.
#[derive(Debug, Deserialize)]
struct ClassEntry {
    item_format: DataItemFormat,
    item_size: u8,
    #[serde(default)]
    field_size: Option<u8>,
    #[serde(default)]
    fraction_size: u8,
    #[serde(default)]
    real_complex: RealComplex,
    #[serde(default)]
    packing: PackingMethod,
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    classes: BTreeMap<String, ClassEntry>,
}

impl ClassRegistry {
    /// Register `format` for `class_id`, returning the format it replaces.
    pub fn register(&mut self, class_id: ClassIdentifier, format: PayloadFormat) -> Option<PayloadFormat> {
        debug!(%class_id, ?format, "Registered packet class");
        self.formats.insert(class_id, format)
    }

    pub fn unregister(&mut self, class_id: ClassIdentifier) -> Option<PayloadFormat> {
        self.formats.remove(&class_id)
    }

    pub fn format(&self, class_id: ClassIdentifier) -> Option<PayloadFormat> {
        self.formats.get(&class_id).copied()
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// Parse a registry from YAML:
    ///
    /// ```yaml
    /// classes:
    ///   "FF-FF-FA:2011.0002":
    ///     item_format: SignedInt
    ///     item_size: 16
    ///     real_complex: ComplexCartesian
    /// ```
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let file: RegistryFile = serde_yaml_ng::from_str(yaml).map_err(|e| VrtError::Config {
            details: "Failed to parse class registry".to_string(),
            source: Some(e),
        })?;

        let mut registry = ClassRegistry::default();
        for (name, entry) in file.classes {
            let class_id: ClassIdentifier = name.parse()?;
            let mut format = PayloadFormat::new(entry.item_format, entry.item_size)?
                .with_real_complex(entry.real_complex)
                .with_packing(entry.packing);
            format.field_size = entry.field_size.unwrap_or(entry.item_size);
            format.fraction_size = entry.fraction_size;
            format.validate()?;
            registry.register(class_id, format);
        }
        Ok(registry)
    }

    /// Load a registry from a YAML file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(&path)
            .map_err(|e| VrtError::File { path: path.as_ref().to_path_buf(), source: e })?;
        Self::from_yaml_str(&text)
    }
}

impl PacketFactory for ClassRegistry {
    fn build(&self, packet: VrtPacket<'static>) -> AnyPacket {
        let format = packet.class_identifier().and_then(|class_id| self.format(class_id));
        wrap(packet, format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::FieldId;

    #[test]
    fn default_factory_picks_the_view() {
        let factory = DefaultPacketFactory;
        let config = VrtConfig::default();

        let data = factory.create(PacketType::Data, None, config).unwrap();
        assert!(data.as_data().is_some_and(|d| d.payload_format().is_none()));

        let context = factory.create(PacketType::Context, None, config).unwrap();
        assert_eq!(context.as_context().map(|c| c.present_fields()), Some(Vec::<FieldId>::new()));

        let mut bytes = VrtPacket::default().into_bytes();
        bytes[0] = 0x70;
        let reserved = VrtPacket::from_vec(bytes, config).unwrap();
        let other = factory.build(reserved.clone());
        assert_eq!(other, AnyPacket::Other(reserved));
        assert_eq!(other.packet_type(), PacketType::Reserved(7));
        assert!(factory.create(PacketType::Reserved(9), None, config).is_err());
    }

    #[test]
    fn registry_attaches_formats_by_class() {
        let known: ClassIdentifier = "00-12-A2:0001.0010".parse().unwrap();
        let unknown: ClassIdentifier = "00-12-A2:0001.0011".parse().unwrap();
        let mut registry = ClassRegistry::default();
        assert_eq!(registry.register(known, PayloadFormat::FLOAT32), None);

        let config = VrtConfig::default();
        let built = registry.create(PacketType::Data, Some(known), config).unwrap();
        assert_eq!(built.as_data().and_then(|d| d.payload_format()), Some(PayloadFormat::FLOAT32));

        let built = registry.create(PacketType::Data, Some(unknown), config).unwrap();
        assert_eq!(built.as_data().and_then(|d| d.payload_format()), None);

        let context = registry.create(PacketType::ExtContext, Some(known), config).unwrap();
        assert_eq!(context.packet().class_identifier(), Some(known));
        assert_eq!(context.into_packet().packet_type(), PacketType::ExtContext);
    }

    #[test]
    fn registry_loads_from_yaml() {
        let registry = ClassRegistry::from_yaml_str(
            r#"
classes:
  "FF-FF-FA:2011.0002":
    item_format: SignedInt
    item_size: 16
    real_complex: ComplexCartesian
  "FF-FF-FA:2011.0003":
    item_format: UnsignedInt
    item_size: 12
    field_size: 16
    packing: LinkEfficient
"#,
        )
        .unwrap();
        assert_eq!(registry.len(), 2);

        let iq = registry.format("FF-FF-FA:2011.0002".parse().unwrap()).unwrap();
        assert_eq!(iq, PayloadFormat::INT16.with_real_complex(RealComplex::ComplexCartesian));

        let padded = registry.format("FF-FF-FA:2011.0003".parse().unwrap()).unwrap();
        assert_eq!((padded.item_size, padded.field_size), (12, 16));
        assert_eq!(padded.packing, PackingMethod::LinkEfficient);

        assert!(ClassRegistry::from_yaml_str("classes:\n  bogus:\n    item_format: SignedInt\n    item_size: 8\n").is_err());
        assert!(matches!(ClassRegistry::from_yaml_str("classes: [1, 2]"), Err(VrtError::Config { .. })));
    }
}
