pub mod file_formats;
pub mod io_worker;
pub mod loader;
pub mod model_manager;
pub mod texture;
