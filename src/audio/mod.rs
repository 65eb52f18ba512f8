pub mod analyzer;
pub mod buffer;
pub mod decode;
pub mod feeder;
pub mod pitch;
