pub mod fakes;
pub mod project;
