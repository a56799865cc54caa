//! Shared type definitions for the moka pot brew simulator.
//!
//! This crate is the single source of truth for the data that crosses
//! process boundaries: the published state channels, their payload
//! encodings, and the plain-text control commands. Types defined here
//! flow downstream to `TypeScript` via `ts-rs` for the browser UI.
//!
//! # Modules
//!
//! - [`enums`] -- Brew phase and published channel enumerations
//! - [`snapshot`] -- Immutable snapshot of the four published fields
//! - [`command`] -- Control commands accepted over HTTP and the bus

pub mod command;
pub mod enums;
pub mod snapshot;

// Re-export all public types at crate root for convenience.
pub use command::{CONTROL_CHANNEL, ControlCommand, ParseCommandError};
pub use enums::{Channel, ParsePhaseError, Phase};
pub use snapshot::{Snapshot, topic};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for the browser UI.

    #[test]
    fn export_bindings() {
        // The actual files are written to the `bindings/` directory
        // relative to the crate root.
        use ts_rs::TS;

        let _ = crate::enums::Phase::export_all();
        let _ = crate::enums::Channel::export_all();
        let _ = crate::snapshot::Snapshot::export_all();
        let _ = crate::command::ControlCommand::export_all();
    }
}
