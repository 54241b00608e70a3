//! Configuration infrastructure adapters

mod xdg;

pub use xdg::XdgSettingsStore;
