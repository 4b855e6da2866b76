// Integration tests for modelmig

pub mod cli;
pub mod helpers;
pub mod integration;
pub mod unit;
