//! Wallet platforms a pass can be issued to

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A third-party wallet ecosystem.
///
/// Variant order is priority order: when several platforms succeed, the
/// earliest one supplies the deep link rendered into the QR code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Apple,
    Google,
}

impl Platform {
    /// Every supported platform, in priority order.
    pub const ALL: [Platform; 2] = [Platform::Apple, Platform::Google];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Apple => "apple",
            Platform::Google => "google",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "apple" => Ok(Platform::Apple),
            "google" => Ok(Platform::Google),
            other => Err(Error::Validation(format!("unknown platform: {}", other))),
        }
    }
}
