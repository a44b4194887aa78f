pub mod manifest;
pub mod modelspec;
