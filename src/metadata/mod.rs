pub mod file_type;
pub mod filename;

pub use file_type::FileType;
pub use filename::{basename, parse_filename, FileMetadata};
