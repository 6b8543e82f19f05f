use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::ArchiveError;

// Local file, end-of-central-directory and spanned-archive markers.
const ZIP_MAGICS: [&[u8]; 3] = [b"PK\x03\x04", b"PK\x05\x06", b"PK\x07\x08"];
const PDF_MAGIC: &[u8] = b"%PDF-";
const SEVENZ_MAGIC: &[u8] = b"7z\xBC\xAF\x27\x1C";
const RAR4_MAGIC: &[u8] = b"Rar!\x1A\x07\x00";
const RAR5_MAGIC: &[u8] = b"Rar!\x1A\x07\x01\x00";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Pdf,
    Zip,
    SevenZ,
    Rar,
}

impl FileType {
    pub fn extension(self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Zip => "zip",
            FileType::SevenZ => "7z",
            FileType::Rar => "rar",
        }
    }
}

/// Match the leading bytes against known signatures.
pub fn sniff_file_type(header: &[u8]) -> Option<FileType> {
    if header.starts_with(PDF_MAGIC) {
        return Some(FileType::Pdf);
    }
    if ZIP_MAGICS.iter().any(|magic| header.starts_with(magic)) {
        return Some(FileType::Zip);
    }
    if header.starts_with(SEVENZ_MAGIC) {
        return Some(FileType::SevenZ);
    }
    if header.starts_with(RAR4_MAGIC) || header.starts_with(RAR5_MAGIC) {
        return Some(FileType::Rar);
    }
    None
}

/// Sniff a downloaded file by magic bytes, falling back to the extension.
pub fn detect_file_type(path: &Path) -> Result<FileType, ArchiveError> {
    let file = File::open(path)?;
    let mut header = Vec::with_capacity(8);
    file.take(8).read_to_end(&mut header)?;

    if let Some(file_type) = sniff_file_type(&header) {
        return Ok(file_type);
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => Ok(FileType::Pdf),
        Some("zip") => Ok(FileType::Zip),
        Some("7z") => Ok(FileType::SevenZ),
        Some("rar") => Ok(FileType::Rar),
        _ => Err(ArchiveError::UnsupportedFileType(path.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn signatures_are_recognized() {
        assert_eq!(sniff_file_type(b"%PDF-1.4 rest"), Some(FileType::Pdf));
        assert_eq!(sniff_file_type(b"PK\x03\x04abcd"), Some(FileType::Zip));
        assert_eq!(sniff_file_type(b"PK\x05\x06"), Some(FileType::Zip));
        assert_eq!(sniff_file_type(b"PK\x07\x08"), Some(FileType::Zip));
        assert_eq!(sniff_file_type(b"7z\xBC\xAF\x27\x1C--"), Some(FileType::SevenZ));
        assert_eq!(sniff_file_type(b"Rar!\x1A\x07\x00\x00"), Some(FileType::Rar));
        assert_eq!(sniff_file_type(b"Rar!\x1A\x07\x01\x00"), Some(FileType::Rar));
        assert_eq!(sniff_file_type(b"<html>..."), None);
        assert_eq!(sniff_file_type(b""), None);
    }

    #[test]
    fn magic_bytes_win_over_the_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mislabeled.zip");
        let mut f = File::create(&path).unwrap();
        f.write_all(b"%PDF-1.7\nstuff").unwrap();
        assert_eq!(detect_file_type(&path).unwrap(), FileType::Pdf);
    }

    #[test]
    fn unknown_bytes_fall_back_to_the_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.RAR");
        File::create(&path)
            .unwrap()
            .write_all(b"not a signature")
            .unwrap();
        assert_eq!(detect_file_type(&path).unwrap(), FileType::Rar);
    }

    #[test]
    fn unknown_bytes_and_extension_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listing.html");
        File::create(&path)
            .unwrap()
            .write_all(b"<html></html>")
            .unwrap();
        let err = detect_file_type(&path).unwrap_err();
        assert!(matches!(err, ArchiveError::UnsupportedFileType(_)));
    }

    #[test]
    fn short_files_still_sniff_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.pdf");
        File::create(&path).unwrap().write_all(b"%P").unwrap();
        assert_eq!(detect_file_type(&path).unwrap(), FileType::Pdf);
    }
}
