//! Error types for `TeraPak`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `TeraPak` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected end of data while parsing.
    #[error("unexpected end of data: needed {needed} bytes, {available} available")]
    UnexpectedEof {
        /// Bytes the parser wanted.
        needed: usize,
        /// Bytes remaining in the source.
        available: usize,
    },

    // ==================== Package Errors ====================
    /// The file does not start with the package tag.
    #[error("invalid package tag: expected 0x9E2A83C1, found {0:#010X}")]
    InvalidPackageTag(u32),

    /// A name index points outside the name table.
    #[error("name index {index} out of range (table has {len} names)")]
    NameIndexOutOfRange {
        /// The index found in the file.
        index: i32,
        /// Number of names in the table.
        len: usize,
    },

    /// A name used by a property or export is missing from the name table.
    #[error("name not in table: {0}")]
    NameNotInTable(String),

    /// An export's serial range lies outside the package data.
    #[error("export '{name}' data out of bounds: offset {offset}, size {size}")]
    ExportOutOfBounds {
        /// Object name of the export.
        name: String,
        /// Serial offset from the export table.
        offset: i64,
        /// Serial size from the export table.
        size: i64,
    },

    /// A composite container does not exist on disk.
    #[error("composite container not found: {path}")]
    CompositeContainerNotFound {
        /// The expected path to the container.
        path: PathBuf,
    },

    /// A composite sub-range reaches past the end of its container.
    #[error("composite entry '{uid}' out of bounds: offset {offset}, length {length}, container size {container_len}")]
    CompositeRangeOutOfBounds {
        /// Entry identifier.
        uid: String,
        /// Requested offset.
        offset: u64,
        /// Requested length.
        length: u64,
        /// Actual container length.
        container_len: u64,
    },

    // ==================== Chunk Errors ====================
    /// The chunk header does not carry the expected signature.
    #[error("invalid chunk signature: expected {expected:#010X}, found {found:#010X}")]
    InvalidChunkSignature {
        /// The signature constant.
        expected: u32,
        /// The value read from the chunk header.
        found: u32,
    },

    /// The chunk block size is zero, negative or beyond limits.
    #[error("invalid block size: {0}")]
    InvalidBlockSize(i64),

    /// A size field is negative or exceeds the sanity limit.
    #[error("invalid {field} size: {value}")]
    InvalidSize {
        /// Which field was rejected.
        field: &'static str,
        /// The offending value.
        value: i64,
    },

    /// A decompressed block did not produce the declared length.
    #[error("block {index} decompressed to {actual} bytes, expected {expected}")]
    BlockSizeMismatch {
        /// Block index within the chunk.
        index: usize,
        /// Declared uncompressed size.
        expected: usize,
        /// Produced length.
        actual: usize,
    },

    // ==================== Compression Errors ====================
    /// LZO compression failed.
    #[error("LZO compression failed: {message}")]
    LzoCompressionFailed {
        /// The error message.
        message: String,
    },

    /// LZO decompression failed.
    #[error("LZO decompression failed: {message}")]
    LzoDecompressionFailed {
        /// The error message.
        message: String,
    },

    /// Zlib decompression failed.
    #[error("Zlib decompression failed: {message}")]
    ZlibDecompressionFailed {
        /// The error message.
        message: String,
    },

    /// The flags select a compression scheme this crate does not implement.
    #[error("unsupported compression flags: {flags:#06X}")]
    UnsupportedCompression {
        /// The mip flags.
        flags: u32,
    },

    // ==================== Property Errors ====================
    /// A property payload could not be parsed.
    #[error("invalid property '{name}': {message}")]
    InvalidProperty {
        /// The property name.
        name: String,
        /// What went wrong.
        message: String,
    },

    // ==================== Texture Errors ====================
    /// The texture payload is malformed beyond level-local recovery.
    #[error("invalid texture payload: {0}")]
    InvalidTexture(String),

    /// No mip level carries pixel data.
    #[error("texture has no populated mip level")]
    NoPixelData,

    /// Failed to build a DDS container.
    #[error("DDS error: {0}")]
    DdsError(String),

    // ==================== Batch Errors ====================
    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),

    /// A job panicked; the panic was contained.
    #[error("job '{name}' panicked: {message}")]
    JobPanicked {
        /// The job name.
        name: String,
        /// The panic payload, if it was a string.
        message: String,
    },

    /// Some entries of a composite container failed; the rest were processed.
    #[error("{failed} of {total} entries in '{container}' failed")]
    CompositeEntriesFailed {
        /// Container file name.
        container: String,
        /// Entries that failed.
        failed: usize,
        /// Entries in the container.
        total: usize,
    },

    // ==================== Config Errors ====================
    /// Configuration could not be parsed.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration values are out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    // ==================== Parsing Errors ====================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ==================== File System Errors ====================
    /// Directory traversal error.
    #[error("directory walk error: {0}")]
    WalkDirError(String),
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::WalkDirError(err.to_string())
    }
}

/// A specialized Result type for `TeraPak` operations.
pub type Result<T> = std::result::Result<T, Error>;
