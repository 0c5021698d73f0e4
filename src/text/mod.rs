//! Source documents and fragment segmentation.

pub mod fragmenter;
pub mod source;

pub use fragmenter::{Fragment, segment};
pub use source::load_document;
