//! Audio infrastructure adapters

mod cpal_source;
pub mod wav;

pub use cpal_source::{list_input_devices, CpalAudioSource};
