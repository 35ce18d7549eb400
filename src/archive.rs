// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Archive detection and extraction

use flate2::read::GzDecoder;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::placement;
use crate::record::FileRecord;
use crate::{AppConfig, Result, SortwiseError};

/// Archive formats the built-in extractor understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
    /// A single gzip-compressed file
    Gz,
}

impl ArchiveFormat {
    /// Detect the format from the file name
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else if name.ends_with(".zip") || name.ends_with(".jar") {
            Some(Self::Zip)
        } else if name.ends_with(".gz") {
            Some(Self::Gz)
        } else {
            None
        }
    }

    fn suffixes(&self) -> &'static [&'static str] {
        match self {
            Self::Zip => &[".zip", ".jar"],
            Self::Tar => &[".tar"],
            Self::TarGz => &[".tar.gz", ".tgz"],
            Self::Gz => &[".gz"],
        }
    }
}

/// Name of an archive without its archive suffix (`photos.tar.gz` -> `photos`)
pub fn base_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let lower = name.to_lowercase();

    if let Some(format) = ArchiveFormat::detect(path) {
        for suffix in format.suffixes() {
            if lower.ends_with(suffix) && name.len() > suffix.len() {
                return name[..name.len() - suffix.len()].to_string();
            }
        }
    }
    name
}

/// Deterministic extraction target: the archive's directory plus its base name
pub fn extraction_dir(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    parent.join(base_name(path))
}

/// Result of handing a record to the archive handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    /// Extraction disabled, dry run, or not an archive
    NotApplicable,
    Extracted {
        target_dir: PathBuf,
        files: Vec<PathBuf>,
        source_deleted: bool,
    },
}

/// Backend that unpacks an archive into a directory
pub trait ArchiveExtractor: Send + Sync {
    /// Unpack `archive` into `target` and return the extracted file paths.
    fn extract(&self, archive: &Path, target: &Path) -> Result<Vec<PathBuf>>;
}

/// zip / tar / gzip extraction
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinExtractor;

impl BuiltinExtractor {
    fn extract_zip(archive: &Path, target: &Path) -> Result<Vec<PathBuf>> {
        let file = File::open(archive)?;
        let mut zip = zip::ZipArchive::new(file)?;
        let mut files = Vec::new();

        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            let relative = match entry.enclosed_name() {
                Some(p) => p.to_path_buf(),
                None => {
                    return Err(SortwiseError::Archive(format!(
                        "Unsafe entry path: {}",
                        entry.name()
                    )))
                }
            };
            let out = target.join(&relative);

            if entry.is_dir() {
                fs::create_dir_all(&out)?;
                continue;
            }
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut writer = File::create(&out)?;
            io::copy(&mut entry, &mut writer)?;
            files.push(out);
        }

        Ok(files)
    }

    fn extract_tar(archive: &Path, target: &Path, gzipped: bool) -> Result<Vec<PathBuf>> {
        let file = File::open(archive)?;
        let reader: Box<dyn Read> = if gzipped {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };

        let mut tarball = tar::Archive::new(reader);
        fs::create_dir_all(target)?;
        let mut files = Vec::new();

        for entry in tarball.entries()? {
            let mut entry = entry?;
            let relative = entry.path()?.to_path_buf();
            let is_file = entry.header().entry_type().is_file();

            if !entry.unpack_in(target)? {
                return Err(SortwiseError::Archive(format!(
                    "Unsafe entry path: {}",
                    relative.display()
                )));
            }
            if is_file {
                files.push(target.join(relative));
            }
        }

        Ok(files)
    }

    fn extract_gz(archive: &Path, target: &Path) -> Result<Vec<PathBuf>> {
        let file = File::open(archive)?;
        let mut decoder = GzDecoder::new(file);
        fs::create_dir_all(target)?;

        let out = target.join(base_name(archive));
        let mut writer = File::create(&out)?;
        io::copy(&mut decoder, &mut writer)?;
        Ok(vec![out])
    }
}

impl ArchiveExtractor for BuiltinExtractor {
    fn extract(&self, archive: &Path, target: &Path) -> Result<Vec<PathBuf>> {
        match ArchiveFormat::detect(archive) {
            Some(ArchiveFormat::Zip) => Self::extract_zip(archive, target),
            Some(ArchiveFormat::Tar) => Self::extract_tar(archive, target, false),
            Some(ArchiveFormat::TarGz) => Self::extract_tar(archive, target, true),
            Some(ArchiveFormat::Gz) => Self::extract_gz(archive, target),
            None => Err(SortwiseError::Archive(format!(
                "Unsupported archive format: {}",
                archive.display()
            ))),
        }
    }
}

/// Extracts archives under the configured policy
#[derive(Clone)]
pub struct ArchiveHandler {
    extractor: Arc<dyn ArchiveExtractor>,
}

impl Default for ArchiveHandler {
    fn default() -> Self {
        Self::new(Arc::new(BuiltinExtractor))
    }
}

impl ArchiveHandler {
    pub fn new(extractor: Arc<dyn ArchiveExtractor>) -> Self {
        Self { extractor }
    }

    /// Extract `record` if it is an archive and extraction is enabled.
    ///
    /// Output is unpacked into a hidden staging directory and moved to the
    /// target only on success. On any failure the source archive is left
    /// untouched and an [`SortwiseError::Archive`] is returned.
    pub fn handle(&self, config: &AppConfig, record: &FileRecord) -> Result<ExtractionOutcome> {
        if !config.rules.extract_archives || ArchiveFormat::detect(&record.path).is_none() {
            return Ok(ExtractionOutcome::NotApplicable);
        }

        let target_dir = extraction_dir(&record.path);
        if config.rules.dry_run {
            info!("DRY RUN: Would extract {:?} into {:?}", record.path, target_dir);
            return Ok(ExtractionOutcome::NotApplicable);
        }

        info!("Extracting {:?} into {:?}", record.path, target_dir);
        let staging = staging_dir(&target_dir);

        let files = self
            .extractor
            .extract(&record.path, &staging)
            .and_then(|files| commit(&staging, &target_dir, files))
            .map_err(|e| {
                let _ = fs::remove_dir_all(&staging);
                SortwiseError::Archive(format!("{}: {}", record.path.display(), archive_message(e)))
            })?;

        let mut source_deleted = false;
        if config.deletes_archives() {
            match fs::remove_file(&record.path) {
                Ok(()) => {
                    source_deleted = true;
                    debug!("Deleted archive {:?}", record.path);
                }
                Err(e) => warn!("Extracted but could not delete {:?}: {}", record.path, e),
            }
        }

        info!("Extracted {} files from {:?}", files.len(), record.path);
        Ok(ExtractionOutcome::Extracted { target_dir, files, source_deleted })
    }
}

fn archive_message(e: SortwiseError) -> String {
    match e {
        SortwiseError::Archive(msg) => msg,
        other => other.to_string(),
    }
}

fn staging_dir(target_dir: &Path) -> PathBuf {
    let name = target_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    target_dir.with_file_name(format!(".{}.sortwise-extract-{}", name, uuid::Uuid::new_v4()))
}

/// Move staged output into the target directory, merging if it exists.
///
/// Entries that collide with existing files get a free name. If the merge
/// fails part way, everything already moved goes back to staging.
fn commit(staging: &Path, target_dir: &Path, files: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    if !staging.exists() {
        fs::create_dir_all(staging)?;
    }

    if !target_dir.exists() {
        fs::rename(staging, target_dir)?;
        return Ok(files
            .into_iter()
            .map(|f| rebase(&f, staging, target_dir))
            .collect());
    }

    let mut merge = Merge::default();
    for file in &files {
        if let Err(e) = merge.place(file, rebase(file, staging, target_dir)) {
            merge.roll_back();
            return Err(e);
        }
    }
    fs::remove_dir_all(staging)?;
    Ok(merge.moved.into_iter().map(|(_, dest)| dest).collect())
}

/// Bookkeeping for a merge into an existing directory
#[derive(Default)]
struct Merge {
    /// (staged, committed) pairs in move order
    moved: Vec<(PathBuf, PathBuf)>,
    claimed: HashSet<PathBuf>,
    /// Directories created in the target, shallowest first
    created: Vec<PathBuf>,
}

impl Merge {
    fn place(&mut self, staged: &Path, dest: PathBuf) -> Result<()> {
        let parent = dest.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut missing = Vec::new();
        let mut dir = parent.as_path();
        while !dir.as_os_str().is_empty() && !dir.exists() {
            missing.push(dir.to_path_buf());
            dir = dir.parent().unwrap_or(Path::new(""));
        }
        fs::create_dir_all(&parent)?;
        self.created.extend(missing.into_iter().rev());

        let wanted = dest.clone();
        let dest = self.free_name(dest, &parent);
        if dest != wanted {
            debug!("{:?} exists, extracting as {:?}", wanted, dest);
        }
        fs::rename(staged, &dest)?;
        self.claimed.insert(dest.clone());
        self.moved.push((staged.to_path_buf(), dest));
        Ok(())
    }

    fn free_name(&self, dest: PathBuf, parent: &Path) -> PathBuf {
        if !dest.exists() && !self.claimed.contains(&dest) {
            return dest;
        }
        let name = file_name(&dest);
        let mut candidate = placement::unique_destination(parent, &name);
        let mut n = 1u32;
        while self.claimed.contains(&candidate) {
            candidate = placement::unique_destination(parent, &format!("{}_{}", n, name));
            n += 1;
        }
        candidate
    }

    fn roll_back(&self) {
        for (staged, dest) in self.moved.iter().rev() {
            if let Err(e) = fs::rename(dest, staged) {
                warn!("Could not take back {:?}: {}", dest, e);
            }
        }
        for dir in self.created.iter().rev() {
            let _ = fs::remove_dir(dir);
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn rebase(path: &Path, from: &Path, to: &Path) -> PathBuf {
    match path.strip_prefix(from) {
        Ok(rel) => to.join(rel),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn make_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    fn make_tar_gz(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    fn extracting_config(delete: bool) -> AppConfig {
        let mut config = AppConfig::default();
        config.rules.extract_archives = true;
        config.rules.delete_archives = delete;
        config
    }

    struct FailingExtractor;

    impl ArchiveExtractor for FailingExtractor {
        fn extract(&self, _archive: &Path, target: &Path) -> Result<Vec<PathBuf>> {
            fs::create_dir_all(target)?;
            fs::write(target.join("partial.txt"), b"half")?;
            Err(SortwiseError::Archive("corrupt central directory".to_string()))
        }
    }

    #[test]
    fn test_base_name_and_target() {
        assert_eq!(base_name(Path::new("/x/photos.tar.gz")), "photos");
        assert_eq!(base_name(Path::new("/x/Backup.TGZ")), "Backup");
        assert_eq!(base_name(Path::new("/x/lib.jar")), "lib");
        assert_eq!(extraction_dir(Path::new("/x/docs.zip")), PathBuf::from("/x/docs"));
        assert!(ArchiveFormat::detect(Path::new("notes.txt")).is_none());
    }

    #[test]
    fn test_extract_zip_and_delete_source() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bundle.zip");
        make_zip(&archive, &[("a.txt", b"alpha"), ("sub/b.txt", b"beta")]);
        let record = FileRecord::from_path(dir.path(), &archive).unwrap();

        let outcome = ArchiveHandler::default().handle(&extracting_config(true), &record).unwrap();
        match outcome {
            ExtractionOutcome::Extracted { target_dir, files, source_deleted } => {
                assert_eq!(target_dir, dir.path().join("bundle"));
                assert_eq!(files.len(), 2);
                assert_eq!(fs::read(target_dir.join("sub/b.txt")).unwrap(), b"beta");
                assert!(source_deleted);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(!archive.exists());
    }

    #[test]
    fn test_extract_tar_gz_into_existing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("logs.tar.gz");
        make_tar_gz(&archive, &[("day1.log", b"one"), ("nested/day2.log", b"two")]);
        fs::create_dir_all(dir.path().join("logs")).unwrap();
        fs::write(dir.path().join("logs/keep.txt"), b"keep").unwrap();
        let record = FileRecord::from_path(dir.path(), &archive).unwrap();

        let outcome = ArchiveHandler::default().handle(&extracting_config(false), &record).unwrap();
        let ExtractionOutcome::Extracted { files, source_deleted, .. } = outcome else {
            panic!("expected extraction");
        };
        assert_eq!(files.len(), 2);
        assert!(!source_deleted);
        assert!(archive.exists());
        assert!(dir.path().join("logs/keep.txt").exists());
        assert_eq!(fs::read(dir.path().join("logs/nested/day2.log")).unwrap(), b"two");
    }

    #[test]
    fn test_merge_keeps_colliding_user_file() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("logs.zip");
        make_zip(&archive, &[("day1.log", b"from archive"), ("day2.log", b"fresh")]);
        fs::create_dir_all(dir.path().join("logs")).unwrap();
        fs::write(dir.path().join("logs/day1.log"), b"user data").unwrap();
        let record = FileRecord::from_path(dir.path(), &archive).unwrap();

        let outcome = ArchiveHandler::default().handle(&extracting_config(false), &record).unwrap();
        let ExtractionOutcome::Extracted { files, .. } = outcome else {
            panic!("expected extraction");
        };

        assert_eq!(fs::read(dir.path().join("logs/day1.log")).unwrap(), b"user data");
        assert_eq!(fs::read(dir.path().join("logs/day2.log")).unwrap(), b"fresh");
        assert_eq!(files.len(), 2);
        let renamed: Vec<_> = files
            .iter()
            .filter(|f| f.file_name().unwrap() != "day2.log")
            .collect();
        assert_eq!(renamed.len(), 1);
        let name = renamed[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("day1_") && name.ends_with(".log"));
        assert_eq!(fs::read(renamed[0]).unwrap(), b"from archive");
        assert_eq!(fs::read_dir(dir.path().join("logs")).unwrap().count(), 3);
    }

    /// Stages a top-level file and one under `sub/`
    struct TwoEntryExtractor;

    impl ArchiveExtractor for TwoEntryExtractor {
        fn extract(&self, _archive: &Path, target: &Path) -> Result<Vec<PathBuf>> {
            fs::create_dir_all(target.join("sub"))?;
            fs::write(target.join("a.txt"), b"a")?;
            fs::write(target.join("sub/x.txt"), b"x")?;
            Ok(vec![target.join("a.txt"), target.join("sub/x.txt")])
        }
    }

    #[test]
    fn test_failed_merge_leaves_target_as_it_was() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bundle.zip");
        fs::write(&archive, b"stand-in").unwrap();
        fs::create_dir_all(dir.path().join("bundle")).unwrap();
        // A plain file where the archive wants a directory
        fs::write(dir.path().join("bundle/sub"), b"in the way").unwrap();
        let record = FileRecord::from_path(dir.path(), &archive).unwrap();

        let handler = ArchiveHandler::new(Arc::new(TwoEntryExtractor));
        let err = handler.handle(&extracting_config(true), &record).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Archive);

        assert!(archive.exists());
        assert!(!dir.path().join("bundle/a.txt").exists());
        let target: Vec<_> = fs::read_dir(dir.path().join("bundle")).unwrap().flatten().collect();
        assert_eq!(target.len(), 1);
        let siblings: Vec<_> = fs::read_dir(dir.path()).unwrap().flatten().collect();
        assert_eq!(siblings.len(), 2);
    }

    #[test]
    fn test_failed_extraction_never_deletes_source() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("broken.zip");
        fs::write(&archive, b"not really a zip").unwrap();
        let record = FileRecord::from_path(dir.path(), &archive).unwrap();
        let config = extracting_config(true);

        let err = ArchiveHandler::default().handle(&config, &record).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Archive);
        assert!(archive.exists());
        assert!(!dir.path().join("broken").exists());

        let handler = ArchiveHandler::new(Arc::new(FailingExtractor));
        assert!(handler.handle(&config, &record).is_err());
        assert!(archive.exists());
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().flatten().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_disabled_or_not_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bundle.zip");
        make_zip(&archive, &[("a.txt", b"alpha")]);
        let record = FileRecord::from_path(dir.path(), &archive).unwrap();

        let mut config = extracting_config(true);
        config.rules.extract_archives = false;
        assert_eq!(
            ArchiveHandler::default().handle(&config, &record).unwrap(),
            ExtractionOutcome::NotApplicable
        );

        let text = dir.path().join("plain.txt");
        fs::write(&text, b"hi").unwrap();
        let record = FileRecord::from_path(dir.path(), &text).unwrap();
        assert_eq!(
            ArchiveHandler::default().handle(&extracting_config(true), &record).unwrap(),
            ExtractionOutcome::NotApplicable
        );
    }
}
