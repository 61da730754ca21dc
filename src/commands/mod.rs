pub mod authoring;
pub mod content;
