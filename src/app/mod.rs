pub mod batch;
pub mod render;
