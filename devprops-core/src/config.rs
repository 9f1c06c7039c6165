//! The declarative device property configuration.
//!
//! Both lists are serde sequences rather than maps: processing order is part
//! of the contract (block entries before add entries, and within each list,
//! configuration order), and a JSON object would not preserve it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProperties {
    /// Properties to remove, processed first.
    #[serde(default)]
    pub block: Vec<BlockEntry>,
    /// Properties to insert where not already meaningfully present.
    #[serde(default)]
    pub add: Vec<AddEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEntry {
    /// Device path text, e.g. `PciRoot(0x0)/Pci(0x1,0x0)`. Parsed at
    /// processing time; a malformed path skips this entry only.
    pub device: String,
    #[serde(default)]
    pub properties: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddEntry {
    pub device: String,
    #[serde(default)]
    pub properties: Vec<PropertyAssignment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyAssignment {
    pub name: String,
    /// Opaque property value, base64 in the JSON form.
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,
}

/// Serde adapter: `Vec<u8>` as a standard base64 string.
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize as _, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let json = r#"
        {
            "block": [
                {
                    "device": "PciRoot(0x0)/Pci(0x1,0x0)",
                    "properties": ["built-in"]
                }
            ],
            "add": [
                {
                    "device": "PciRoot(0x0)/Pci(0x1,0x0)",
                    "properties": [
                        { "name": "device-id", "value": "qw==" }
                    ]
                }
            ]
        }
        "#;
        let config: DeviceProperties = serde_json::from_str(json).unwrap();
        assert_eq!(config.block.len(), 1);
        assert_eq!(config.block[0].properties, vec!["built-in"]);
        assert_eq!(config.add[0].properties[0].name, "device-id");
        assert_eq!(config.add[0].properties[0].value, vec![0xAB]);
    }

    #[test]
    fn lists_default_to_empty() {
        let config: DeviceProperties = serde_json::from_str("{}").unwrap();
        assert_eq!(config, DeviceProperties::default());
    }

    #[test]
    fn order_is_preserved() {
        let json = r#"
        {
            "block": [
                { "device": "PciRoot(0x2)", "properties": [] },
                { "device": "PciRoot(0x0)", "properties": [] },
                { "device": "PciRoot(0x1)", "properties": [] }
            ]
        }
        "#;
        let config: DeviceProperties = serde_json::from_str(json).unwrap();
        let devices: Vec<_> = config.block.iter().map(|e| e.device.as_str()).collect();
        assert_eq!(devices, vec!["PciRoot(0x2)", "PciRoot(0x0)", "PciRoot(0x1)"]);
    }

    #[test]
    fn value_round_trips_as_base64() {
        let entry = PropertyAssignment {
            name: "device-id".to_string(),
            value: vec![0xDE, 0xAD, 0xBE, 0xEF],
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["value"], serde_json::json!("3q2+7w=="));
        let back: PropertyAssignment = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn rejects_invalid_base64() {
        let json = r#"{ "name": "device-id", "value": "not base64!" }"#;
        assert!(serde_json::from_str::<PropertyAssignment>(json).is_err());
    }
}
