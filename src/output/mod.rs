//! Output processing.
//!
//! Remote output is returned verbatim; this module offers ANSI stripping for
//! callers that want plain text (Android tools often colorize output).

mod sanitizer;

pub use sanitizer::OutputSanitizer;
