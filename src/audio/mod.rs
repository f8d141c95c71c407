pub mod decode;
pub mod isolate;
pub mod pitch;
pub mod silence;
pub mod tempo;
