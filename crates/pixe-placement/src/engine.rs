//! Per-file placement
//!
//! Each file goes through identify, extract, plan, materialize and tag. The
//! first failing step ends processing for that file only.
//!
//! Materializing stages the bytes in a temporary file inside the destination
//! directory and renames it into place, so an interrupted run never leaves a
//! truncated file at a final path. The primary destination is claimed with a
//! no-clobber rename. If another worker claimed it after the existence check,
//! the file is redirected to the quarantine subtree as if the check had seen
//! it. Quarantine paths themselves are not checked again.

use crate::config::{PlacementConfig, Transfer};
use crate::context::RunContext;
use crate::outcome::{Placement, PlacementFailure, PlacementOutcome};
use crate::plan::DestinationPlan;
use pixe_filetypes::{FileHandle, MetadataFields, PixeError, Registry, Result, TypeHandler};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, info, warn};

pub struct PlacementEngine<'a> {
    registry: &'a Registry,
    context: &'a RunContext,
    transfer: Transfer,
    tags: &'a MetadataFields,
}

impl<'a> PlacementEngine<'a> {
    pub fn new(
        registry: &'a Registry,
        context: &'a RunContext,
        config: &'a PlacementConfig,
    ) -> Self {
        Self {
            registry,
            context,
            transfer: config.transfer,
            tags: &config.tags,
        }
    }

    /// Place one file. Never panics on per-file errors; they are returned as
    /// [`PlacementOutcome::Failed`].
    pub fn place(&self, file: FileHandle) -> PlacementOutcome {
        let outcome = match self.place_file(&file) {
            Ok(placement) => match self
                .release_source(&placement.source)
                .and(self.tag(&placement.destination))
            {
                Ok(()) => PlacementOutcome::Placed(placement),
                Err(error) => PlacementOutcome::Failed(PlacementFailure {
                    source: placement.source,
                    destination: Some(placement.destination),
                    quarantined: placement.quarantined,
                    error,
                }),
            },
            Err(error) => PlacementOutcome::Failed(PlacementFailure {
                source: file.into_path(),
                destination: None,
                quarantined: false,
                error,
            }),
        };

        match &outcome {
            PlacementOutcome::Placed(placement) if placement.quarantined => {
                info!("Duplicate quarantined: {}", outcome)
            }
            PlacementOutcome::Placed(_) => debug!("{}", outcome),
            PlacementOutcome::Failed(_) => warn!("{}", outcome),
        }

        outcome
    }

    fn place_file(&self, file: &FileHandle) -> Result<Placement> {
        let handler = self.registry.resolve(file)?;
        let digest = handler.checksum()?;
        let date = handler.capture_date()?;
        debug!(
            "{}: digest {} captured {}",
            file.path().display(),
            digest,
            date
        );

        let mut plan = DestinationPlan::compute(self.context, &date, &digest, file.extension());
        let destination = self.materialize(file.path(), &mut plan)?;

        Ok(Placement {
            source: file.path().to_path_buf(),
            destination,
            quarantined: plan.collision,
        })
    }

    fn materialize(&self, source: &Path, plan: &mut DestinationPlan) -> Result<PathBuf> {
        let dir = plan.final_dir().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| PixeError::io("create directory", &dir, e))?;

        let staged = stage_copy(source, &dir)?;

        if plan.collision {
            let destination = plan.final_path();
            staged
                .persist(&destination)
                .map_err(|e| PixeError::io("rename", &destination, e.error))?;
            return Ok(destination);
        }

        let primary = plan.primary_path();
        match staged.persist_noclobber(&primary) {
            Ok(_) => Ok(primary),
            Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!(
                    "{} was claimed concurrently, redirecting to quarantine",
                    primary.display()
                );
                plan.redirect();

                let quarantine = plan.final_dir().to_path_buf();
                fs::create_dir_all(&quarantine)
                    .map_err(|e| PixeError::io("create directory", &quarantine, e))?;

                let destination = plan.final_path();
                err.file
                    .persist(&destination)
                    .map_err(|e| PixeError::io("rename", &destination, e.error))?;
                Ok(destination)
            }
            Err(err) => Err(PixeError::io("rename", &primary, err.error)),
        }
    }

    /// Remove the source of a completed move. The file is already placed, so
    /// a failure here is reported against the destination.
    fn release_source(&self, source: &Path) -> Result<()> {
        if self.transfer != Transfer::Move {
            return Ok(());
        }
        fs::remove_file(source).map_err(|e| PixeError::io("remove source", source, e))
    }

    /// Apply requested metadata through a handler bound to the destination
    fn tag(&self, destination: &Path) -> Result<()> {
        if self.tags.is_empty() {
            return Ok(());
        }
        self.registry
            .resolve_path(destination)?
            .set_metadata(self.tags)
    }
}

/// Copy `source` into a synced temporary file in `dir`, keeping its permissions
fn stage_copy(source: &Path, dir: &Path) -> Result<NamedTempFile> {
    let mut input = File::open(source).map_err(|e| PixeError::io("open", source, e))?;
    let mut staged = Builder::new()
        .prefix(".pixe-")
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(|e| PixeError::io("create temporary file", dir, e))?;

    io::copy(&mut input, staged.as_file_mut()).map_err(|e| PixeError::io("copy", source, e))?;

    let permissions = input
        .metadata()
        .map_err(|e| PixeError::io("stat", source, e))?
        .permissions();
    staged
        .as_file()
        .set_permissions(permissions)
        .map_err(|e| PixeError::io("set permissions", staged.path(), e))?;
    staged
        .as_file()
        .sync_all()
        .map_err(|e| PixeError::io("sync", staged.path(), e))?;

    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use chrono::{NaiveDate, NaiveDateTime};
    use pixe_filetypes::{ErrorKind, TagWriter};
    use pixe_test_support::{tree_paths, write_solid_jpeg, Exif};
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingWriter {
        paths: Mutex<Vec<PathBuf>>,
    }

    impl TagWriter for RecordingWriter {
        fn write_tags(
            &self,
            path: &Path,
            _tags: &[(&'static str, String)],
        ) -> pixe_filetypes::Result<()> {
            self.paths.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    fn started() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(7, 8, 9)
            .unwrap()
    }

    fn registry() -> (Registry, Arc<RecordingWriter>) {
        let writer = Arc::new(RecordingWriter::default());
        (Registry::with_defaults(writer.clone()), writer)
    }

    #[test]
    fn test_places_dated_file() -> Result<()> {
        let src = tempdir()?;
        let dest = tempdir()?;
        let path = src.path().join("IMG_0001.JPG");
        write_solid_jpeg(&path, [200, 10, 10], Exif::DateTimeOriginal("2020:03:21 03:13:12"))?;

        let (registry, _) = registry();
        let config = PlacementConfig {
            dest_root: dest.path().to_path_buf(),
            ..Default::default()
        };
        let context = RunContext::with_start_time(src.path(), dest.path(), started());
        let engine = PlacementEngine::new(&registry, &context, &config);

        let outcome = engine.place(FileHandle::new(&path));
        assert!(outcome.is_success(), "{}", outcome);

        let expected_digest = registry.resolve_path(&path)?.checksum()?;
        let destination = outcome.destination().unwrap().to_path_buf();
        assert_eq!(
            destination,
            dest.path()
                .join("2020/03-Mar")
                .join(format!("20200321_031312_{}.jpg", expected_digest))
        );
        assert_eq!(fs::read(&destination)?, fs::read(&path)?);
        assert_eq!(registry.resolve_path(&destination)?.checksum()?, expected_digest);

        // no staging leftovers
        assert_eq!(tree_paths(dest.path())?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_second_placement_is_quarantined() -> Result<()> {
        let src = tempdir()?;
        let dest = tempdir()?;
        let path = src.path().join("a.jpg");
        write_solid_jpeg(&path, [1, 2, 3], Exif::DateTimeOriginal("2021:01:02 03:04:05"))?;

        let (registry, _) = registry();
        let config = PlacementConfig::default();
        let context = RunContext::with_start_time(src.path(), dest.path(), started());
        let engine = PlacementEngine::new(&registry, &context, &config);

        let first = engine.place(FileHandle::new(&path));
        let second = engine.place(FileHandle::new(&path));
        assert!(!first.is_quarantined());
        assert!(second.is_quarantined());

        let second_dest = second.destination().unwrap();
        assert!(second_dest.starts_with(dest.path().join("dups/20240506_070809/2021/01-Jan")));
        assert_eq!(second_dest.file_name(), first.destination().unwrap().file_name());
        assert_eq!(tree_paths(dest.path())?.len(), 2);
        Ok(())
    }

    #[test]
    fn test_move_removes_source() -> Result<()> {
        let src = tempdir()?;
        let dest = tempdir()?;
        let path = src.path().join("move.jpeg");
        write_solid_jpeg(&path, [9, 9, 9], Exif::None)?;
        let original = fs::read(&path)?;

        let (registry, _) = registry();
        let config = PlacementConfig {
            transfer: Transfer::Move,
            ..Default::default()
        };
        let context = RunContext::with_start_time(src.path(), dest.path(), started());
        let outcome =
            PlacementEngine::new(&registry, &context, &config).place(FileHandle::new(&path));

        assert!(outcome.is_success(), "{}", outcome);
        assert!(!path.exists());
        let destination = outcome.destination().unwrap();
        assert!(destination.starts_with(dest.path().join("1902/02-Feb")));
        assert!(destination.to_string_lossy().ends_with(".jpeg"));
        assert_eq!(fs::read(destination)?, original);
        Ok(())
    }

    #[test]
    fn test_unsupported_and_undecodable_files_fail() -> Result<()> {
        let src = tempdir()?;
        let dest = tempdir()?;
        let notes = src.path().join("notes.txt");
        let broken = src.path().join("broken.jpg");
        fs::write(&notes, "hello")?;
        fs::write(&broken, "not really a jpeg")?;

        let (registry, _) = registry();
        let config = PlacementConfig::default();
        let context = RunContext::with_start_time(src.path(), dest.path(), started());
        let engine = PlacementEngine::new(&registry, &context, &config);

        let outcome = engine.place(FileHandle::new(&notes));
        assert_eq!(outcome.error().map(PixeError::kind), Some(ErrorKind::UnsupportedType));
        assert!(outcome.to_string().contains("FAILED [UnsupportedType]"));

        let outcome = engine.place(FileHandle::new(&broken));
        assert_eq!(outcome.error().map(PixeError::kind), Some(ErrorKind::Decode));
        assert!(outcome.destination().is_none());

        assert!(tree_paths(dest.path())?.is_empty());
        assert!(broken.exists());
        Ok(())
    }

    #[test]
    fn test_tags_are_written_to_destination_only() -> Result<()> {
        let src = tempdir()?;
        let dest = tempdir()?;
        let path = src.path().join("owned.jpg");
        write_solid_jpeg(&path, [50, 50, 50], Exif::None)?;

        let (registry, writer) = registry();
        let mut config = PlacementConfig::default();
        config.tags.insert("owner".to_string(), "Jane".to_string());
        let context = RunContext::with_start_time(src.path(), dest.path(), started());
        let outcome =
            PlacementEngine::new(&registry, &context, &config).place(FileHandle::new(&path));

        assert!(outcome.is_success(), "{}", outcome);
        let paths = writer.paths.lock().unwrap();
        assert_eq!(paths.as_slice(), &[outcome.destination().unwrap().to_path_buf()]);
        Ok(())
    }

    #[test]
    fn test_disallowed_tag_leaves_destination_untouched() -> Result<()> {
        let src = tempdir()?;
        let dest = tempdir()?;
        let path = src.path().join("a.jpg");
        write_solid_jpeg(&path, [77, 0, 77], Exif::DateTimeOriginal("2020:03:21 03:13:12"))?;

        let (registry, writer) = registry();
        let mut config = PlacementConfig::default();
        config.tags.insert("owner".to_string(), "Jane".to_string());
        config.tags.insert("copyright".to_string(), "ACME".to_string());
        let context = RunContext::with_start_time(src.path(), dest.path(), started());
        let outcome =
            PlacementEngine::new(&registry, &context, &config).place(FileHandle::new(&path));

        assert_eq!(outcome.error().map(PixeError::kind), Some(ErrorKind::DisallowedTag));
        let destination = outcome.destination().expect("file is placed before tagging");
        assert_eq!(fs::read(destination)?, fs::read(&path)?);
        assert!(writer.paths.lock().unwrap().is_empty());
        Ok(())
    }

    #[test]
    fn test_noclobber_race_redirects_to_quarantine() -> Result<()> {
        let src = tempdir()?;
        let dest = tempdir()?;
        let path = src.path().join("race.jpg");
        write_solid_jpeg(&path, [3, 3, 3], Exif::DateTimeOriginal("2020:03:21 03:13:12"))?;

        let (registry, _) = registry();
        let config = PlacementConfig::default();
        let context = RunContext::with_start_time(src.path(), dest.path(), started());
        let engine = PlacementEngine::new(&registry, &context, &config);

        let handler = registry.resolve_path(&path)?;
        let mut plan = DestinationPlan::compute(
            &context,
            &handler.capture_date()?,
            &handler.checksum()?,
            "jpg",
        );
        assert!(!plan.collision);

        // another worker wins between the check and the rename
        fs::create_dir_all(&plan.target_dir)?;
        fs::write(plan.primary_path(), b"winner")?;

        let destination = engine.materialize(&path, &mut plan)?;
        assert!(plan.collision);
        assert!(destination.starts_with(context.quarantine_root()));
        assert_eq!(fs::read(plan.primary_path())?, b"winner");
        assert_eq!(fs::read(&destination)?, fs::read(&path)?);
        assert_eq!(tree_paths(dest.path())?.len(), 2);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_keeps_permissions() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let src = tempdir()?;
        let dest = tempdir()?;
        let path = src.path().join("perm.jpg");
        write_solid_jpeg(&path, [4, 4, 4], Exif::None)?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640))?;

        let (registry, _) = registry();
        let config = PlacementConfig::default();
        let context = RunContext::with_start_time(src.path(), dest.path(), started());
        let outcome =
            PlacementEngine::new(&registry, &context, &config).place(FileHandle::new(&path));

        let mode = fs::metadata(outcome.destination().unwrap())?.permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_source_removal_reports_destination() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let src = tempdir()?;
        let dest = tempdir()?;
        let locked = src.path().join("locked");
        let path = locked.join("keep.jpg");
        write_solid_jpeg(&path, [33, 66, 99], Exif::DateTimeOriginal("2020:03:21 03:13:12"))?;
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555))?;

        // privileged users can still unlink from a read-only directory
        if File::create(locked.join("write-check")).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))?;
            println!("directory permissions not enforced, skipping");
            return Ok(());
        }

        let (registry, writer) = registry();
        let mut config = PlacementConfig {
            transfer: Transfer::Move,
            ..Default::default()
        };
        config.tags.insert("owner".to_string(), "Jane".to_string());
        let context = RunContext::with_start_time(src.path(), dest.path(), started());
        let outcome =
            PlacementEngine::new(&registry, &context, &config).place(FileHandle::new(&path));
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))?;

        assert_eq!(outcome.error().map(PixeError::kind), Some(ErrorKind::Filesystem));
        assert!(!outcome.is_quarantined());
        let destination = outcome.destination().expect("file was placed");
        assert!(destination.starts_with(dest.path().join("2020/03-Mar")));
        assert_eq!(fs::read(destination)?, fs::read(&path)?);
        assert!(outcome.to_string().contains(&destination.display().to_string()));

        // tagging still ran against the placed copy
        let written = writer.paths.lock().unwrap();
        assert_eq!(written.as_slice(), &[destination.to_path_buf()]);
        Ok(())
    }

    #[test]
    fn test_handler_round_trip() -> Result<()> {
        let src = tempdir()?;
        let dest = tempdir()?;
        let path = src.path().join("UPPER.JPG");
        write_solid_jpeg(&path, [120, 130, 140], Exif::DateTimeOriginal("2018:08:08 08:08:08"))?;

        let (registry, _) = registry();
        let config = PlacementConfig::default();
        let context = RunContext::with_start_time(src.path(), dest.path(), started());
        let outcome =
            PlacementEngine::new(&registry, &context, &config).place(FileHandle::new(&path));

        let destination = outcome.destination().unwrap();
        assert!(destination.to_string_lossy().ends_with(".jpg"));
        let source_handler: Box<dyn TypeHandler> = registry.resolve_path(&path)?;
        let dest_handler = registry.resolve_path(destination)?;
        assert_eq!(source_handler.checksum()?, dest_handler.checksum()?);
        assert_eq!(source_handler.capture_date()?, dest_handler.capture_date()?);
        Ok(())
    }
}
