pub mod args;
pub mod browse;
pub mod validation;
