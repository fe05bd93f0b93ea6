//! Asset pipeline of the Cruel engine.
//!
//! Source assets (glTF/GLB/OBJ meshes, images) get a stable identity through a
//! `.meta` sidecar, are converted once into binary artifacts in the Library, and
//! are served at runtime through a [`ResourceManager`] that keeps at most one
//! GPU copy per identity.
//!
//! ```no_run
//! use std::{path::Path, rc::Rc};
//! use cruel_assets::{HeadlessDevice, PipelineConfig, ResourceManager};
//!
//! let mut manager = ResourceManager::new(PipelineConfig::default(), Rc::new(HeadlessDevice::new()));
//! manager.import_all_assets(Path::new("Assets"));
//!
//! if let Some(house) = manager.get_or_load_path(Path::new("Assets/house.glb")) {
//!     house.borrow_mut().bind(manager.device(), 0);
//! }
//! ```

pub mod codec;
pub mod config;
pub mod data;
pub mod device;
pub mod error;
pub mod handles;
pub mod library;
pub mod loader;
pub mod mesh;
pub mod meta;
pub mod opengl;
pub mod resource;
pub mod resources;
pub mod scan;
pub mod textures;

pub use config::PipelineConfig;
pub use device::{GraphicsDevice, HeadlessDevice};
pub use error::{AssetError, Result};
pub use handles::{AssetUid, ResourceKind};
pub use library::LibraryStore;
pub use meta::MetadataStore;
pub use opengl::GlowDevice;
pub use resource::{Resource, ResourceHandle};
pub use resources::{ResourceEntry, ResourceManager};
pub use scan::{CancelToken, ImportBatch, ImportOutcome, ImportProgress, ImportReport};
