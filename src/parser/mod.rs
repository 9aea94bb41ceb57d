pub mod size;

pub use size::parse_size;
