pub mod identity;
pub mod node_model;
pub mod patcher;
