use thiserror::Error;

/// Error type for JVM type and method descriptor parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    /// The descriptor string was empty where a type was required.
    #[error("empty descriptor")]
    Empty,
    /// The descriptor contains an unexpected character at the given offset.
    #[error("malformed descriptor `{descriptor}` at offset {offset}: {msg}")]
    Malformed {
        descriptor: String,
        offset: usize,
        msg: String,
    },
}

/// Errors raised while loading an input artifact.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("could not read artifact '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("artifact structure error: {0}")]
    Structure(String),
}

/// Error for a single class, method or field that cannot be taken from an artifact.
///
/// These never abort a load; the offending member is skipped and reported.
#[derive(Debug, Error)]
pub enum MemberError {
    #[error("member shape error: {0}")]
    Shape(#[from] serde_json::Error),

    #[error("bad descriptor: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("jump or handler refers to unknown label L{0}")]
    UnknownLabel(u32),

    #[error("label L{0} is defined twice")]
    DuplicateLabel(u32),
}

/// Errors raised while reading or writing a persisted mapping file.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("could not read mapping file '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write mapping file '{path}': {source}")]
    FileWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("mapping serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors for run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A weight or threshold lies outside its permitted range.
    #[error("`{name}` must lie in [{min}, {max}], got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// A count parameter that must be positive was zero.
    #[error("`{0}` must be greater than zero")]
    Zero(&'static str),

    #[error("could not read config '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error type for the matching stages.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The refiner's neighbor weight must be a probability.
    #[error("neighbor weight must lie in [0, 1], got {0}")]
    InvalidNeighborWeight(f64),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Errors that can occur during a full remap run.
#[derive(Debug, Error)]
pub enum RemapError {
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("matching error: {0}")]
    Match(#[from] MatchError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("report serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
