// crates/toucan-media/src/archive/mod.rs
//
// Archive support for the timeline wrapper (§4.C / §6): the `.otioz` zip
// path lives in `zip`, memory-mapped and parsed without extraction per the
// design notes dropping the original's temp-directory fallback.

pub mod zip;

pub use zip::{ZipArchive, ZipEntry};
