//! Unpacks staged archives into a working directory.
//!
//! Vendor archives arrive as zip; tarballs are accepted too so the stage is
//! not bound to one packaging.

use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Result};
use flate2::read::GzDecoder;
use tar::Archive;
use zip::ZipArchive;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    pub fn detect(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        if name.ends_with(".zip") {
            Ok(ArchiveFormat::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Ok(ArchiveFormat::TarGz)
        } else {
            Err(anyhow!("unsupported archive format: {}", path.display()))
        }
    }
}

/// Extracts the archive into `dest`, returning the extracted file paths.
pub fn extract_archive(archive_path: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dest)?;

    match ArchiveFormat::detect(archive_path)? {
        ArchiveFormat::Zip => extract_zip(archive_path, dest),
        ArchiveFormat::TarGz => extract_tar_gz(archive_path, dest),
    }
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;
    let mut extracted = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;

        // Entries with paths escaping the destination are skipped.
        let Some(relative) = entry.enclosed_name() else {
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
        extracted.push(out_path);
    }

    Ok(extracted)
}

fn extract_tar_gz(archive_path: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let tar_gz = File::open(archive_path)?;
    let tar = GzDecoder::new(tar_gz);
    let mut archive = Archive::new(tar);
    let mut extracted = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let out_path = dest.join(entry.path()?);
        entry.unpack_in(dest)?;

        if out_path.is_file() {
            extracted.push(out_path);
        }
    }

    Ok(extracted)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {

    use std::io::Write;

    use flate2::{write::GzEncoder, Compression};
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    use super::*;

    #[test]
    fn should_detect_format_from_file_name() {
        assert_eq!(
            ArchiveFormat::detect(Path::new("dvs_year_2019.zip")).unwrap(),
            ArchiveFormat::Zip
        );
        assert_eq!(
            ArchiveFormat::detect(Path::new("archive.tar.gz")).unwrap(),
            ArchiveFormat::TarGz
        );
        assert!(ArchiveFormat::detect(Path::new("readings.txt")).is_err());
    }

    #[test]
    fn should_extract_zip_with_nested_entries() {
        let tmp_dir = TempDir::new().unwrap();
        let zip_path = tmp_dir.path().join("archive.zip");

        let file = File::create(&zip_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file("Maize_DVS_2019.nc", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"grid data").unwrap();
        writer
            .start_file("docs/readme.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"notes").unwrap();
        writer.finish().unwrap();

        let dest = tmp_dir.path().join("out");
        let extracted = extract_archive(&zip_path, &dest).unwrap();

        assert_eq!(extracted.len(), 2);
        assert!(dest.join("Maize_DVS_2019.nc").is_file());
        assert!(dest.join("docs/readme.txt").is_file());
        assert_eq!(
            fs::read_to_string(dest.join("Maize_DVS_2019.nc")).unwrap(),
            "grid data"
        );
    }

    #[test]
    fn should_extract_tarball() {
        let tmp_dir = TempDir::new().unwrap();
        let tar_path = tmp_dir.path().join("archive.tar.gz");

        let tar_gz = File::create(&tar_path).unwrap();
        let encoder = GzEncoder::new(tar_gz, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let data = b"grid data";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "Maize_TAGP_2020.nc", &data[..])
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        let dest = tmp_dir.path().join("out");
        let extracted = extract_archive(&tar_path, &dest).unwrap();

        assert_eq!(extracted.len(), 1);
        assert_eq!(
            fs::read_to_string(dest.join("Maize_TAGP_2020.nc")).unwrap(),
            "grid data"
        );
    }
}
