pub mod action;
pub mod tool;
pub mod transcript;
