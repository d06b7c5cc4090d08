pub mod cache;
pub mod error;
pub mod normalize;
pub mod transform_model;
