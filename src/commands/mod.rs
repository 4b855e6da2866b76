pub mod generate;

pub use generate::{GenerateArgs, cmd_generate};
