//! xmload: load XML files into a document sink as generic JSON-like
//! documents.
//!
//! The pipeline is: seed a shared work queue with the command-line roots,
//! let a fixed pool of worker threads expand directories and parse files
//! ([`markup`]), convert each XML tree into an ordered generic document
//! ([`convert`], [`document`]), and stream the conversions to an
//! asynchronous sink ([`sink`]) through a bounded in-flight write buffer
//! ([`queue`]) that throttles the parsers when the sink falls behind.

pub mod cli;
pub mod convert;
pub mod document;
pub mod loader;
pub mod markup;
pub mod queue;
pub mod sink;
