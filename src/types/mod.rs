pub mod trading;
pub mod webhook;

pub use trading::*;
pub use webhook::*;
