pub mod analyze;
pub mod check;
pub mod config;
pub mod normalize;
