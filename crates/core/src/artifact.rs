//! remora's single entry-point for turning a parsed-artifact dump into the in-memory class model.
//!
//! The class-file parser is an external collaborator; it hands over a JSON document of the
//! shape `{ "classes": [ ... ] }`. Loading is lenient per member: a class, method or field that
//! cannot be taken is skipped with a diagnostic and recorded in the [`LoadReport`], so one
//! malformed member never aborts a run.

use crate::descriptor::{JavaType, MethodDescriptor};
use crate::insn::{Insn, LabelId, TryCatch};
use crate::keys::{FieldKey, MethodKey};
use remora_utils::errors::{ArtifactError, DescriptorError, MemberError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::{fs, path::Path};
use tracing::{debug, warn};

/// Structural kind of a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
    #[default]
    Class,
    Interface,
    Enum,
    Annotation,
}

/// A method with its body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: String,
    pub desc: String,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub instructions: Vec<Insn>,
    #[serde(default)]
    pub try_catch: Vec<TryCatch>,
}

impl MethodDef {
    /// Key of this method when declared in `owner`.
    pub fn key(&self, owner: &str) -> MethodKey {
        MethodKey::new(owner, &self.name, &self.desc)
    }

    /// Parses the method descriptor.
    pub fn descriptor(&self) -> Result<MethodDescriptor, DescriptorError> {
        MethodDescriptor::parse(&self.desc)
    }

    /// Instruction index of every label in the body.
    pub fn label_positions(&self) -> HashMap<LabelId, usize> {
        label_positions(&self.instructions)
    }

    /// Iterates the `(owner, name, desc)` of every call site in the body.
    pub fn call_sites(&self) -> impl Iterator<Item = MethodKey> + '_ {
        self.instructions.iter().filter_map(|insn| match insn {
            Insn::Invoke {
                owner, name, desc, ..
            } => Some(MethodKey::new(owner, name, desc)),
            _ => None,
        })
    }

    /// Checks labels are unique and every branch and handler refers to an existing label.
    pub fn validate(&self) -> Result<(), MemberError> {
        self.descriptor()?;
        let mut seen = HashSet::new();
        for insn in &self.instructions {
            if let Insn::Label { id } = insn {
                if !seen.insert(*id) {
                    return Err(MemberError::DuplicateLabel(id.0));
                }
            }
        }
        let referenced = self
            .instructions
            .iter()
            .flat_map(Insn::branch_targets)
            .chain(
                self.try_catch
                    .iter()
                    .flat_map(|tc| [tc.start, tc.end, tc.handler]),
            );
        for label in referenced {
            if !seen.contains(&label) {
                return Err(MemberError::UnknownLabel(label.0));
            }
        }
        Ok(())
    }
}

/// Instruction index of every label in `insns`.
pub fn label_positions(insns: &[Insn]) -> HashMap<LabelId, usize> {
    insns
        .iter()
        .enumerate()
        .filter_map(|(i, insn)| match insn {
            Insn::Label { id } => Some((*id, i)),
            _ => None,
        })
        .collect()
}

/// A field declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub desc: String,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_final: bool,
}

impl FieldDef {
    /// Key of this field when declared in `owner`.
    pub fn key(&self, owner: &str) -> FieldKey {
        FieldKey::new(owner, &self.name, &self.desc)
    }
}

/// A class with its members, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    #[serde(default)]
    pub super_name: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub kind: ClassKind,
    #[serde(default)]
    pub methods: Vec<MethodDef>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl ClassDef {
    /// Looks up a declared method by name and descriptor.
    pub fn method(&self, name: &str, desc: &str) -> Option<&MethodDef> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.desc == desc)
    }
}

/// An immutable set of classes with a by-name index.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Artifact {
    pub classes: Vec<ClassDef>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Artifact {
    /// Builds an artifact; later classes with an already-seen name are dropped.
    pub fn from_classes(classes: Vec<ClassDef>) -> Self {
        let mut kept = Vec::with_capacity(classes.len());
        let mut index = HashMap::with_capacity(classes.len());
        for class in classes {
            if index.contains_key(&class.name) {
                warn!("duplicate class {} dropped", class.name);
                continue;
            }
            index.insert(class.name.clone(), kept.len());
            kept.push(class);
        }
        Self {
            classes: kept,
            index,
        }
    }

    /// Looks up a class by internal name.
    pub fn class(&self, name: &str) -> Option<&ClassDef> {
        self.index.get(name).map(|&i| &self.classes[i])
    }

    /// Looks up a method by key.
    pub fn method(&self, key: &MethodKey) -> Option<&MethodDef> {
        self.class(&key.owner)?.method(&key.name, &key.desc)
    }

    /// Iterates every `(key, method)` pair in declaration order.
    pub fn methods(&self) -> impl Iterator<Item = (MethodKey, &MethodDef)> + '_ {
        self.classes
            .iter()
            .flat_map(|c| c.methods.iter().map(move |m| (m.key(&c.name), m)))
    }

    /// Iterates every `(key, field)` pair in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (FieldKey, &FieldDef)> + '_ {
        self.classes
            .iter()
            .flat_map(|c| c.fields.iter().map(move |f| (f.key(&c.name), f)))
    }

    pub fn method_count(&self) -> usize {
        self.classes.iter().map(|c| c.methods.len()).sum()
    }

    pub fn field_count(&self) -> usize {
        self.classes.iter().map(|c| c.fields.len()).sum()
    }
}

/// A member that was dropped while loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedMember {
    pub owner: String,
    pub name: String,
    pub desc: String,
    pub reason: String,
}

/// Metadata about the loaded artifact.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    /// number of bytes read
    pub byte_length: usize,
    /// hex SHA-256 of the raw document
    pub sha256: String,
    /// classes, methods and fields that could not be taken
    pub skipped: Vec<SkippedMember>,
}

/// Top-level document layout: `{ "classes": [...] }` or a bare array of classes.
#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Wrapped { classes: Vec<Value> },
    Bare(Vec<Value>),
}

/// Class header parsed before its members.
#[derive(Deserialize)]
struct ClassHeader {
    name: String,
    #[serde(default)]
    super_name: Option<String>,
    #[serde(default)]
    interfaces: Vec<String>,
    #[serde(default)]
    kind: ClassKind,
    #[serde(default)]
    methods: Vec<Value>,
    #[serde(default)]
    fields: Vec<Value>,
}

/// Reads and parses an artifact file.
pub fn load_artifact(path: impl AsRef<Path>) -> Result<(Artifact, LoadReport), ArtifactError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| ArtifactError::FileRead {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_artifact(&bytes)
}

/// Parses an artifact document from bytes, skipping malformed members.
///
/// # Returns
/// The artifact and a [`LoadReport`], or an error if the document itself is not an artifact.
pub fn parse_artifact(bytes: &[u8]) -> Result<(Artifact, LoadReport), ArtifactError> {
    let document: Document = serde_json::from_slice(bytes).map_err(|e| {
        if e.is_data() {
            ArtifactError::Structure("expected `{\"classes\": [...]}` or an array of classes".into())
        } else {
            ArtifactError::Json(e)
        }
    })?;
    let raw_classes = match document {
        Document::Wrapped { classes } | Document::Bare(classes) => classes,
    };

    let mut skipped = Vec::new();
    let mut classes = Vec::with_capacity(raw_classes.len());
    for (i, raw) in raw_classes.into_iter().enumerate() {
        let header: ClassHeader = match serde_json::from_value(raw) {
            Ok(h) => h,
            Err(e) => {
                warn!("skipping class #{i}: {e}");
                skipped.push(SkippedMember {
                    owner: format!("#{i}"),
                    name: String::new(),
                    desc: String::new(),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        classes.push(take_class(header, &mut skipped));
    }

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let report = LoadReport {
        byte_length: bytes.len(),
        sha256: hex::encode(hasher.finalize()),
        skipped,
    };

    let artifact = Artifact::from_classes(classes);
    debug!(
        "loaded {} classes, {} methods, {} fields ({} skipped)",
        artifact.classes.len(),
        artifact.method_count(),
        artifact.field_count(),
        report.skipped.len()
    );
    Ok((artifact, report))
}

fn take_class(header: ClassHeader, skipped: &mut Vec<SkippedMember>) -> ClassDef {
    let owner = header.name;
    let mut methods = Vec::with_capacity(header.methods.len());
    for raw in header.methods {
        let (name, desc) = member_identity(&raw);
        let parsed = serde_json::from_value::<MethodDef>(raw)
            .map_err(MemberError::from)
            .and_then(|m| m.validate().map(|()| m));
        match parsed {
            Ok(m) => methods.push(m),
            Err(e) => {
                warn!("skipping method {owner}.{name}{desc}: {e}");
                skipped.push(SkippedMember {
                    owner: owner.clone(),
                    name,
                    desc,
                    reason: e.to_string(),
                });
            }
        }
    }

    let mut fields = Vec::with_capacity(header.fields.len());
    for raw in header.fields {
        let (name, desc) = member_identity(&raw);
        let parsed = serde_json::from_value::<FieldDef>(raw)
            .map_err(MemberError::from)
            .and_then(|f| {
                JavaType::parse(&f.desc)
                    .map_err(MemberError::from)
                    .map(|_| f)
            });
        match parsed {
            Ok(f) => fields.push(f),
            Err(e) => {
                warn!("skipping field {owner}.{name} {desc}: {e}");
                skipped.push(SkippedMember {
                    owner: owner.clone(),
                    name,
                    desc,
                    reason: e.to_string(),
                });
            }
        }
    }

    ClassDef {
        name: owner,
        super_name: header.super_name,
        interfaces: header.interfaces,
        kind: header.kind,
        methods,
        fields,
    }
}

/// Best-effort `(name, desc)` of a raw member for diagnostics.
fn member_identity(raw: &Value) -> (String, String) {
    let get = |k: &str| {
        raw.get(k)
            .and_then(Value::as_str)
            .unwrap_or("?")
            .to_string()
    };
    (get("name"), get("desc"))
}
