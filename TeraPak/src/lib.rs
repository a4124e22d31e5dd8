//! # TeraPak
//!
//! A pure-Rust library for reading, extracting and rebuilding TERA package
//! files (`.gpk`, `.gmp`, `.upk`).
//!
//! ## Features
//!
//! - **Packages** - Name/import/export tables, tagged properties, composite sub-packages
//! - **Textures** - Mip chains with LZO/zlib chunks and `.tfc` cache lookups
//! - **DDS** - Export of the largest decoded mip level
//! - **Batch** - Throttled parallel load/extract/rebuild jobs with aggregate progress, table dumps
//!
//! ## Quick Start
//!
//! ### Reading a Package
//!
//! ```no_run
//! use terapak::package::{read_package, PackageReadOptions};
//!
//! let package = read_package("S1Game/CookedPC/Rock.gpk", &PackageReadOptions::new())?;
//! for texture in package.textures() {
//!     println!("{}", package.object_path(texture));
//! }
//! # Ok::<(), terapak::Error>(())
//! ```
//!
//! ### Extracting Many Packages
//!
//! ```no_run
//! use terapak::prelude::*;
//!
//! let config = EngineConfig::load("terapak.toml")?;
//! let orchestrator = BatchOrchestrator::new(BatchOptions::from_config(&config))?;
//! let options = PackageReadOptions::from_config(&config);
//!
//! let jobs: Vec<Box<dyn Job>> = find_package_files("S1Game/CookedPC")?
//!     .into_iter()
//!     .map(|path| Box::new(ExtractJob::new(path, "out/", options.clone())) as Box<dyn Job>)
//!     .collect();
//!
//! let report = orchestrator
//!     .submit(jobs)?
//!     .wait_with_progress(|progress| println!("{progress}"));
//! println!("{}", report.to_json()?);
//! # Ok::<(), terapak::Error>(())
//! ```

pub mod batch;
pub mod cache;
pub mod chunk;
pub mod compression;
pub mod config;
pub mod error;
pub mod package;
pub mod progress;
pub mod property;
pub mod texture;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::config::EngineConfig;

    // Package model
    pub use crate::package::{
        read_package, save_package, save_package_padded, write_package, write_package_padded,
        read_composite_entry, group_by_container,
        CompositeEntry, ExportEntry, ExportPayload, Package, PackageReadOptions,
    };
    pub use crate::property::{find_property, PropertyRecord, PropertyValue};

    // Texture codec
    pub use crate::texture::{
        build_dds, read_mip_chain, write_mip_chain, MipFlags, MipLevel, MipStorage,
        TextureFormat, TexturePayload,
    };
    pub use crate::cache::{CacheLookup, CacheResolver};
    pub use crate::compression::BlockCodec;

    // Batch operations
    pub use crate::batch::{
        dump_headers, find_package_files, write_header_dump, AggregateHandle, BatchOptions, BatchOrchestrator, BatchReport,
        CompositeExtractJob, ExtractJob, FnJob, Job, LoadJob, LoadedPackage, RebuildJob,
    };
    pub use crate::progress::{AggregateProgress, JobState, JobStatus, ProgressSnapshot, ProgressStatus};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
