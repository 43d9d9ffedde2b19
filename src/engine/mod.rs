pub mod recompute;
pub mod statistics;

pub use recompute::RecomputeService;
pub use statistics::compute;
