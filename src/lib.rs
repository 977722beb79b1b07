//! # updatr
//!
//! Keep a local photo collection, the metadata records stored next to it and
//! its Flickr mirror consistent over time.
//!
//! Two halves do the work:
//!
//! - the **metadata codec** maps a [`metadata::LogicalRecord`] (caption,
//!   credit, copyright, keywords, capture date, GPS) onto the EXIF and IPTC
//!   fields embedded in a JPEG and back, eliding collection defaults and
//!   re-deriving the caption colophon;
//! - the **reconciliation engine** diffs the albums each photo should be in
//!   (one per keyword) against what Flickr shows, applies the difference and
//!   puts touched albums back in capture-date order.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use updatr::config::CollectionPaths;
//! use updatr::pacing::NoDelay;
//! use updatr::pipeline::{Collection, Command, Updatr};
//! use updatr::remote::{MemoryService, Remote};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let paths = CollectionPaths::new(Path::new("/photos"), Path::new("_local"), "nha");
//!     let remote = Remote::with_service(Arc::new(MemoryService::new()), Arc::new(NoDelay));
//!     let updatr = Updatr::new(Collection::open(paths, None)?)?.with_remote(remote, 3);
//!
//!     let report = updatr.run(&Command::Sync { force: false }).await?;
//!     print!("{report}");
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`exif`]: TIFF/EXIF and IPTC codecs and JPEG segment handling
//! - [`metadata`]: logical records, field mapping, GPS, colophon and the codec
//! - [`changes`]: which photos need import, export or sync
//! - [`remote`]: the photo service trait, Flickr and in-memory services
//! - [`snapshot`], [`planner`], [`mutator`]: observe, diff and apply
//! - [`pipeline`]: collections and commands
//! - [`config`], [`pacing`], [`report`]

pub mod changes;
pub mod config;
pub mod exif;
pub mod metadata;
pub mod mutator;
pub mod pacing;
pub mod pipeline;
pub mod planner;
pub mod remote;
pub mod report;
pub mod snapshot;
