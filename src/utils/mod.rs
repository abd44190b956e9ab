pub mod logging;
pub mod wire;
