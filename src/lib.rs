pub mod audio;
pub mod commands;
pub mod config;
pub mod events;
pub mod keyboard;
pub mod notes;

#[cfg(feature = "desktop")]
mod audio_output;
#[cfg(feature = "desktop")]
mod desktop;

#[cfg(feature = "desktop")]
pub use desktop::run;
