pub mod formatters;
pub mod validators;
