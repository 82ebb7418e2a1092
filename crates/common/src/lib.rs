//! Shared types for PassMint: designs, pass records, platforms and the
//! error taxonomy used across the issuer.

pub mod blob;
pub mod design;
pub mod error;
pub mod pass;
pub mod platform;

pub use blob::BlobStore;
pub use design::{Design, DesignTemplate};
pub use error::{Error, PlatformError, PlatformFailure, Result};
pub use pass::{IssuedPass, Pass, PassStats, PassUpdate, PlatformInfo};
pub use platform::Platform;
