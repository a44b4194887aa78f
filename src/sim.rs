pub mod animator;
pub mod track;
