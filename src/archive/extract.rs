use log::{debug, info, warn};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use walkdir::WalkDir;
use zip::ZipArchive;

use super::detect::FileType;
use super::ArchiveError;

/// Command-line rar extractors, tried in this order.
const RAR_TOOLS: [&str; 2] = ["unar", "unrar"];

fn dir_is_nonempty(dir: &Path) -> Result<bool, ArchiveError> {
    Ok(fs::read_dir(dir)?.next().is_some())
}

/// Unpack an archive into `target_dir`.
///
/// A non-empty target directory counts as already extracted. Every
/// non-pdf path ends with a containment walk over the extracted tree,
/// so a hostile archive cannot place files outside `target_dir`.
pub fn extract_archive(
    archive_path: &Path,
    target_dir: &Path,
    file_type: FileType,
) -> Result<(), ArchiveError> {
    if target_dir.is_dir() && dir_is_nonempty(target_dir)? {
        debug!("reusing extracted content in {}", target_dir.display());
        return Ok(());
    }
    fs::create_dir_all(target_dir)?;

    match file_type {
        FileType::Pdf => {
            return Err(ArchiveError::UnsupportedFileType(archive_path.to_path_buf()))
        }
        FileType::Zip => extract_zip(archive_path, target_dir)?,
        FileType::SevenZ => extract_7z(archive_path, target_dir)?,
        FileType::Rar => extract_rar(archive_path, target_dir)?,
    }

    verify_extracted_within(target_dir)?;
    info!(
        "extracted {} into {}",
        archive_path.display(),
        target_dir.display()
    );
    Ok(())
}

/// Two passes: refuse the whole archive before writing anything if any
/// entry would escape the target, then extract entry by entry.
fn extract_zip(archive_path: &Path, target_dir: &Path) -> Result<(), ArchiveError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;

    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if entry.enclosed_name().is_none() {
            return Err(ArchiveError::UnsafeArchiveEntry(entry.name().to_string()));
        }
    }

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let rel = match entry.enclosed_name() {
            Some(rel) => rel,
            None => continue,
        };
        let out_path = target_dir.join(rel);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
    }

    Ok(())
}

#[cfg(feature = "sevenz")]
fn extract_7z(archive_path: &Path, target_dir: &Path) -> Result<(), ArchiveError> {
    sevenz_rust::decompress_file(archive_path, target_dir)
        .map_err(|e| ArchiveError::ExtractionFailed(format!("7z: {}", e)))
}

#[cfg(not(feature = "sevenz"))]
fn extract_7z(_archive_path: &Path, _target_dir: &Path) -> Result<(), ArchiveError> {
    Err(ArchiveError::MissingDependency(
        "7z archives need this binary built with the sevenz feature",
    ))
}

fn tool_diagnostics(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stdout = stdout.trim();
    if !stdout.is_empty() {
        return stdout.to_string();
    }
    format!("exit status {}", output.status)
}

fn run_rar_tool(tool: &str, archive_path: &Path, target_dir: &Path) -> Result<(), String> {
    let result = match tool {
        "unar" => Command::new(tool)
            .arg("-quiet")
            .arg("-force-overwrite")
            .arg("-output-directory")
            .arg(target_dir)
            .arg(archive_path)
            .output(),
        _ => {
            // unrar wants the destination with a trailing separator.
            let mut dest = target_dir.as_os_str().to_os_string();
            dest.push("/");
            Command::new(tool)
                .arg("x")
                .arg("-o+")
                .arg("-inul")
                .arg(archive_path)
                .arg(dest)
                .output()
        }
    };

    match result {
        Ok(output) if output.status.success() => Ok(()),
        Ok(output) => Err(tool_diagnostics(&output)),
        Err(e) => Err(e.to_string()),
    }
}

fn extract_rar(archive_path: &Path, target_dir: &Path) -> Result<(), ArchiveError> {
    let mut failures = Vec::new();

    for tool in RAR_TOOLS {
        match run_rar_tool(tool, archive_path, target_dir) {
            Ok(()) => {
                info!("extracted {} with {}", archive_path.display(), tool);
                return Ok(());
            }
            Err(diagnostic) => {
                warn!("{} failed on {}: {}", tool, archive_path.display(), diagnostic);
                failures.push(format!("{}: {}", tool, diagnostic));
            }
        }
    }

    Err(ArchiveError::ExtractionFailed(failures.join("; ")))
}

/// Re-check after extraction that nothing, symlinks included, resolves
/// outside the target directory.
fn verify_extracted_within(target_dir: &Path) -> Result<(), ArchiveError> {
    let root = fs::canonicalize(target_dir)?;

    for entry in WalkDir::new(target_dir) {
        let entry = entry.map_err(io::Error::from)?;
        let resolved = fs::canonicalize(entry.path())?;
        if !resolved.starts_with(&root) {
            return Err(ArchiveError::UnsafeArchiveEntry(
                entry.path().display().to_string(),
            ));
        }
    }

    Ok(())
}

/// Copy the first PDF (lexicographic path order) out of `extract_dir`
/// into `final_pdf`. Idempotent once the final file exists.
pub fn stage_pdf(extract_dir: &Path, final_pdf: &Path) -> Result<PathBuf, ArchiveError> {
    if final_pdf.exists() {
        return Ok(final_pdf.to_path_buf());
    }

    let mut pdfs: Vec<PathBuf> = WalkDir::new(extract_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false)
        })
        .collect();

    if pdfs.is_empty() {
        return Err(ArchiveError::NoPdfInArchive);
    }
    pdfs.sort();

    if let Some(parent) = final_pdf.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(&pdfs[0], final_pdf)?;
    debug!("staged {} as {}", pdfs[0].display(), final_pdf.display());
    Ok(final_pdf.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = ZipWriter::new(file);
        for (name, content) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn zip_extraction_restores_the_tree() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("report.zip");
        write_zip(
            &archive,
            &[
                ("docs/report.pdf", b"%PDF-1.4 fake"),
                ("readme.txt", b"hello"),
            ],
        );

        let target = dir.path().join("out");
        extract_archive(&archive, &target, FileType::Zip).unwrap();

        assert_eq!(
            fs::read(target.join("docs/report.pdf")).unwrap(),
            b"%PDF-1.4 fake"
        );
        assert_eq!(fs::read(target.join("readme.txt")).unwrap(), b"hello");
    }

    #[test]
    fn traversal_entries_fail_before_anything_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("evil.zip");
        write_zip(
            &archive,
            &[("innocent.txt", b"ok"), ("../../evil", b"payload")],
        );

        let target = dir.path().join("jail").join("out");
        let err = extract_archive(&archive, &target, FileType::Zip).unwrap_err();
        assert!(matches!(err, ArchiveError::UnsafeArchiveEntry(ref name) if name.contains("evil")));

        // The validation pass runs before extraction, so not even the
        // harmless entry may appear, and nothing escapes the jail.
        assert!(!target.join("innocent.txt").exists());
        assert!(!dir.path().join("evil").exists());
        assert!(!dir.path().join("jail").join("evil").exists());
    }

    #[test]
    fn populated_target_dir_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("already.pdf"), b"%PDF-").unwrap();

        // Archive path does not even exist; the guard returns first.
        let missing = dir.path().join("missing.zip");
        extract_archive(&missing, &target, FileType::Zip).unwrap();
    }

    #[test]
    fn empty_target_dir_is_not_treated_as_extracted() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("report.zip");
        write_zip(&archive, &[("a.pdf", b"%PDF-")]);

        let target = dir.path().join("out");
        fs::create_dir_all(&target).unwrap();
        extract_archive(&archive, &target, FileType::Zip).unwrap();
        assert!(target.join("a.pdf").exists());
    }

    #[cfg(not(feature = "sevenz"))]
    #[test]
    fn sevenz_without_the_feature_reports_missing_dependency() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("report.7z");
        fs::write(&archive, b"7z\xBC\xAF\x27\x1C").unwrap();
        let err = extract_archive(&archive, &dir.path().join("out"), FileType::SevenZ).unwrap_err();
        assert!(matches!(err, ArchiveError::MissingDependency(_)));
    }

    #[test]
    fn rar_failures_aggregate_both_tools() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("report.rar");
        fs::write(&archive, b"Rar!\x1A\x07\x00 truncated").unwrap();

        let err = extract_archive(&archive, &dir.path().join("out"), FileType::Rar).unwrap_err();
        match err {
            ArchiveError::ExtractionFailed(diag) => {
                assert!(diag.contains("unar"));
                assert!(diag.contains("unrar"));
            }
            other => panic!("expected ExtractionFailed, got {:?}", other),
        }
    }

    #[test]
    fn staging_picks_the_lexicographically_first_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let extracted = dir.path().join("tree");
        fs::create_dir_all(extracted.join("b")).unwrap();
        fs::create_dir_all(extracted.join("a")).unwrap();
        fs::write(extracted.join("b/report.pdf"), b"second").unwrap();
        fs::write(extracted.join("a/report.pdf"), b"first").unwrap();

        let final_pdf = dir.path().join("final.pdf");
        let staged = stage_pdf(&extracted, &final_pdf).unwrap();
        assert_eq!(staged, final_pdf);
        assert_eq!(fs::read(&final_pdf).unwrap(), b"first");
    }

    #[test]
    fn staging_matches_pdf_suffix_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        let extracted = dir.path().join("tree");
        fs::create_dir_all(&extracted).unwrap();
        fs::write(extracted.join("REPORT.PDF"), b"upper").unwrap();

        let final_pdf = dir.path().join("final.pdf");
        stage_pdf(&extracted, &final_pdf).unwrap();
        assert_eq!(fs::read(&final_pdf).unwrap(), b"upper");
    }

    #[test]
    fn staging_without_pdfs_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let extracted = dir.path().join("tree");
        fs::create_dir_all(&extracted).unwrap();
        fs::write(extracted.join("notes.txt"), b"no pdfs here").unwrap();

        let err = stage_pdf(&extracted, &dir.path().join("final.pdf")).unwrap_err();
        assert!(matches!(err, ArchiveError::NoPdfInArchive));
    }

    #[test]
    fn staging_is_idempotent_once_the_final_pdf_exists() {
        let dir = tempfile::tempdir().unwrap();
        let final_pdf = dir.path().join("final.pdf");
        fs::write(&final_pdf, b"already staged").unwrap();

        // Extraction dir does not exist; the early return wins.
        let staged = stage_pdf(&dir.path().join("nowhere"), &final_pdf).unwrap();
        assert_eq!(staged, final_pdf);
        assert_eq!(fs::read(&final_pdf).unwrap(), b"already staged");
    }
}
