pub mod camera;
pub mod geometry;
pub mod lights;
pub mod material;
pub mod shader;
pub mod skeleton;
