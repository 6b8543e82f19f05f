pub mod detect;
pub mod extract;

use std::path::PathBuf;
use thiserror::Error;

pub use detect::{detect_file_type, FileType};
pub use extract::{extract_archive, stage_pdf};

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("unsupported file type: {}", .0.display())]
    UnsupportedFileType(PathBuf),

    #[error("unsafe entry in archive: {0}")]
    UnsafeArchiveEntry(String),

    #[error("missing dependency: {0}")]
    MissingDependency(&'static str),

    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("archive does not contain PDF files")]
    NoPdfInArchive,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}
