//! Model resource pipeline: loads model descriptions once per path, lays out
//! their geometry for the GPU, bakes skeletons into bone textures, animates
//! them and composes shader variants for their materials.

pub mod asset;
pub mod config;
pub mod error;
pub mod model;
pub mod renderer;
pub mod resource_system;
pub mod sim;

pub use asset::{AssetHost, MemoryAssetHost};
pub use config::ModelManagerConfig;
pub use error::{AnimationError, LoadError};
pub use model::Model;
pub use resource_system::io_worker::FileSystemAssetHost;
pub use renderer::camera::Camera;
pub use resource_system::model_manager::{LoadedModel, ModelManager, ModelResources};
