pub mod cli;
pub mod error;
pub mod interpolate;
pub mod layout;
pub mod model;
pub mod process;
pub mod record;
pub mod report;
pub mod summary;
