//! Persisted mapping format.
//!
//! A mapping file is a pretty-printed JSON array of class records. Each class carries its
//! human name and obfuscated name plus nested method and field records. Optional annotations
//! (`garbageValue` on methods, `getter`/`setter` multipliers on fields) are omitted when absent,
//! so save → load → save reproduces the same bytes.

use remora_utils::errors::MappingError;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// A class record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedClass {
    /// Human name; empty for scaffold records nobody has named yet.
    #[serde(default)]
    pub name: String,
    pub obfuscated_name: String,
    #[serde(default)]
    pub fields: Vec<MappedField>,
    #[serde(default)]
    pub methods: Vec<MappedMethod>,
}

/// A method record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedMethod {
    #[serde(default)]
    pub name: String,
    pub obfuscated_name: String,
    #[serde(default)]
    pub owner: String,
    pub owner_obfuscated_name: String,
    pub descriptor: String,
    /// Value that passes the method's opaque-predicate guards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub garbage_value: Option<i64>,
    #[serde(default)]
    pub is_static: bool,
}

/// A field record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedField {
    #[serde(default)]
    pub name: String,
    pub obfuscated_name: String,
    #[serde(default)]
    pub owner: String,
    pub owner_obfuscated_name: String,
    pub descriptor: String,
    /// Decode multiplier applied after reading the field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub getter: Option<i64>,
    /// Encode multiplier applied before writing the field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setter: Option<i64>,
    #[serde(default)]
    pub is_static: bool,
}

impl MappedMethod {
    /// `true` when a human has named this method.
    pub fn is_named(&self) -> bool {
        !self.name.is_empty()
    }
}

impl MappedField {
    /// `true` when a human has named this field.
    pub fn is_named(&self) -> bool {
        !self.name.is_empty()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MappingDocument {
    Many(Vec<MappedClass>),
    One(MappedClass),
}

/// Parses a mapping document. A single class object is accepted as a one-class mapping.
pub fn mapping_from_str(json: &str) -> Result<Vec<MappedClass>, MappingError> {
    Ok(match serde_json::from_str(json)? {
        MappingDocument::Many(classes) => classes,
        MappingDocument::One(class) => vec![class],
    })
}

/// Serializes a mapping the way it is written to disk.
pub fn mapping_to_string(classes: &[MappedClass]) -> Result<String, MappingError> {
    Ok(serde_json::to_string_pretty(classes)?)
}

/// Reads a mapping file.
pub fn load_mapping(path: impl AsRef<Path>) -> Result<Vec<MappedClass>, MappingError> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).map_err(|e| MappingError::FileRead {
        path: path.display().to_string(),
        source: e,
    })?;
    mapping_from_str(&json)
}

/// Writes a mapping file.
pub fn save_mapping(path: impl AsRef<Path>, classes: &[MappedClass]) -> Result<(), MappingError> {
    let path = path.as_ref();
    let json = mapping_to_string(classes)?;
    fs::write(path, json).map_err(|e| MappingError::FileWrite {
        path: path.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<MappedClass> {
        vec![
            MappedClass {
                name: "Client".into(),
                obfuscated_name: "client".into(),
                fields: vec![MappedField {
                    name: "cycle".into(),
                    obfuscated_name: "ab".into(),
                    owner: "Client".into(),
                    owner_obfuscated_name: "client".into(),
                    descriptor: "I".into(),
                    getter: Some(-1_640_531_535),
                    setter: Some(1_640_531_535),
                    is_static: true,
                }],
                methods: vec![MappedMethod {
                    name: "tick".into(),
                    obfuscated_name: "a".into(),
                    owner: "Client".into(),
                    owner_obfuscated_name: "client".into(),
                    descriptor: "(I)V".into(),
                    garbage_value: Some(7),
                    is_static: false,
                }],
            },
            MappedClass {
                obfuscated_name: "zq".into(),
                ..Default::default()
            },
        ]
    }

    #[test]
    fn second_serialization_is_byte_identical() {
        let first = mapping_to_string(&sample()).unwrap();
        let loaded = mapping_from_str(&first).unwrap();
        assert_eq!(loaded, sample());
        let second = mapping_to_string(&loaded).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn uses_camel_case_and_omits_absent_annotations() {
        let json = mapping_to_string(&sample()).unwrap();
        assert!(json.contains("\"obfuscatedName\": \"client\""));
        assert!(json.contains("\"ownerObfuscatedName\""));
        assert!(json.contains("\"garbageValue\": 7"));
        assert!(json.contains("\"isStatic\": true"));
        let bare = mapping_to_string(&sample()[1..]).unwrap();
        assert!(!bare.contains("garbageValue"));
        assert!(bare.contains("\"name\": \"\""));
    }

    #[test]
    fn accepts_a_single_class_object() {
        let one = r#"{"name": "Npc", "obfuscatedName": "bq"}"#;
        let classes = mapping_from_str(one).unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].obfuscated_name, "bq");
        assert!(classes[0].methods.is_empty());
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mappings.json");
        save_mapping(&path, &sample()).unwrap();
        assert_eq!(load_mapping(&path).unwrap(), sample());
        assert!(matches!(
            load_mapping(dir.path().join("missing.json")),
            Err(MappingError::FileRead { .. })
        ));
    }
}
