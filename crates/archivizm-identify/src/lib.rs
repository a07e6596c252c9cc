//! File format identification for archivizm.
//!
//! Each file is first offered to the siegfried signature tool (`sf`). When
//! the tool is missing, fails, or has no confident match, a magic-byte
//! check on the first 512 bytes runs, then an extension lookup. A file that
//! matches nothing is labelled `Unrecognized`, which is a valid result and
//! not an error.
//!
//! ```rust,no_run
//! use archivizm_identify::{FormatIdentifier, IdentifyConfig};
//!
//! let identifier = FormatIdentifier::new(&IdentifyConfig::default());
//! let id = identifier.identify("/media/cd/IMG_0001.JPG".as_ref());
//! println!("{} ({})", id.result.label, id.result.method);
//! ```

mod config;
mod error;
mod identifier;
pub mod magic;
mod permits;
mod siegfried;

pub use config::{DEFAULT_TOOL_NAME, IdentifyConfig, IdentifyConfigBuilder};
pub use error::ToolError;
pub use identifier::{FormatIdentifier, Identification};
pub use permits::{Permit, ToolPermits};
pub use siegfried::{Siegfried, SignatureTool};
