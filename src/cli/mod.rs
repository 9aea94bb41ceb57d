pub mod args;

pub use args::Args;
pub use crate::extract::ExtractorChoice;
