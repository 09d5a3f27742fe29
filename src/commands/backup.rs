use std::path::PathBuf;

use crate::archive;
use crate::cleanup::{self, ScratchDir, TrashBin};
use crate::config::Config;
use crate::error::{BackupError, BackupResult};
use crate::locator;
use crate::storage::{self, ArchiveStore};
use crate::types::{BackupName, RunReport};

const TRACING_TARGET: &str = "backhaul::backup";

/// Per-run switches taken from the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub trash_backup_folder: bool,
    pub verify_digest: bool,
}

/// Everything a run needs, resolved once at startup
pub struct RunContext {
    pub config: Config,
    pub store: ArchiveStore,
    pub scratch_dir: PathBuf,
    pub options: RunOptions,
}

/// Locate, archive, upload, verify, then clean up.
///
/// The scratch sweep runs whether or not the upload worked; the backup folder
/// is only trashed after a verified upload.
pub async fn execute(ctx: &RunContext, trash: &dyn TrashBin) -> BackupResult<RunReport> {
    let scratch = ScratchDir::create(&ctx.scratch_dir)?;

    let outcome = ship(ctx, &scratch).await;

    tracing::info!(target: TRACING_TARGET, "Cleaning things up");
    let swept = scratch.sweep_archives();

    let mut report = match (outcome, swept) {
        (Ok(report), Ok(_)) => report,
        (Ok(_), Err(e)) | (Err(e), Ok(_)) => return Err(e),
        (Err(e), Err(sweep_err)) => {
            tracing::warn!(
                target: TRACING_TARGET,
                error = %sweep_err,
                "Scratch sweep also failed"
            );
            return Err(e);
        }
    };

    if ctx.options.trash_backup_folder {
        cleanup::trash_backup_folder(trash, &report.source)?;
        report.trashed = true;
    }

    Ok(report)
}

async fn ship(ctx: &RunContext, scratch: &ScratchDir) -> BackupResult<RunReport> {
    let candidate = locator::find_backup_folder(&ctx.config.machine.backup_folder_path)?;
    let name = BackupName::now();

    tracing::info!(
        target: TRACING_TARGET,
        source = %candidate.path.display(),
        "Will attempt to back up directory"
    );

    let info = archive::create_archive(&candidate.path, &scratch.path().join(name.as_str()))?;

    tracing::info!(
        target: TRACING_TARGET,
        archive = %info.path.display(),
        files = info.file_count,
        size = info.size,
        "Placed the zipped directory"
    );

    let sha256 = storage::file_sha256(&info.path)
        .map_err(|e| BackupError::archive(format!("cannot hash {}: {}", info.path.display(), e)))?;

    let key = storage::object_key(&ctx.config.machine.name, &name);
    let sent = ctx.store.upload(&info.path, &key).await?;

    let expected_digest = ctx.options.verify_digest.then_some(sha256.as_str());
    ctx.store.verify(&key, sent, expected_digest).await?;

    Ok(RunReport {
        source: candidate.path,
        key,
        size: sent,
        sha256,
        trashed: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::read_archive;
    use crate::cleanup::tests::FolderTrash;
    use crate::config::{MachineConfig, WasabiConfig};
    use crate::storage::tests::{broken_store, memory_store, stored};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::fs::{self, File};
    use std::path::Path;
    use std::time::{Duration, UNIX_EPOCH};

    const MACHINE: &str = "workstation";

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        scratch: PathBuf,
        trash: FolderTrash,
    }

    impl Fixture {
        /// Backup root with `run_a` (older) and `run_b` (newer)
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().join("backups");
            fs::create_dir(&root).unwrap();

            for (name, secs) in [("run_a", 1_000u64), ("run_b", 2_000)] {
                let path = root.join(name);
                fs::create_dir_all(path.join("nested")).unwrap();
                fs::write(path.join("dump.sql"), format!("contents of {name}")).unwrap();
                fs::write(path.join("nested/extra.bin"), vec![7u8; 1024]).unwrap();
                File::open(&path)
                    .unwrap()
                    .set_modified(UNIX_EPOCH + Duration::from_secs(secs))
                    .unwrap();
            }

            let scratch = dir.path().join("temp");
            let trash = FolderTrash::new(&dir.path().join(".trash"));

            Self {
                root,
                scratch,
                trash,
                _dir: dir,
            }
        }

        fn context(&self, store: ArchiveStore, options: RunOptions) -> RunContext {
            RunContext {
                config: Config {
                    machine: MachineConfig {
                        name: MACHINE.to_string(),
                        backup_folder_path: self.root.clone(),
                        scratch_dir: None,
                    },
                    wasabi: WasabiConfig {
                        bucket_endpoint: "http://127.0.0.1:9".to_string(),
                        archive_bucket_name: "archives".to_string(),
                        region: "us-east-1".to_string(),
                    },
                },
                store,
                scratch_dir: self.scratch.clone(),
                options,
            }
        }

        fn zips_in_scratch(&self) -> Vec<PathBuf> {
            fs::read_dir(&self.scratch)
                .unwrap()
                .map(|e| e.unwrap().path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "zip"))
                .collect()
        }
    }

    fn expected_contents(name: &str) -> BTreeMap<String, Vec<u8>> {
        BTreeMap::from([
            ("dump.sql".to_string(), format!("contents of {name}").into_bytes()),
            ("nested/extra.bin".to_string(), vec![7u8; 1024]),
        ])
    }

    fn assert_backup_key(key: &str) {
        let file = key.strip_prefix(&format!("{MACHINE}/")).unwrap();
        let stamp = file
            .strip_prefix("backup_")
            .and_then(|rest| rest.strip_suffix(".zip"))
            .unwrap();
        assert_eq!(stamp.len(), "20120515-155045".len());
        assert!(chrono::NaiveDateTime::parse_from_str(stamp, "%Y%m%d-%H%M%S").is_ok());
    }

    async fn uploaded_contents(store: &ArchiveStore, key: &str, dir: &Path) -> BTreeMap<String, Vec<u8>> {
        let local = dir.join("downloaded.zip");
        fs::write(&local, stored(store, key).await).unwrap();
        read_archive(&local)
    }

    #[tokio::test]
    async fn test_ships_newest_folder_and_keeps_source() {
        let fx = Fixture::new();
        let store = memory_store();
        let ctx = fx.context(store.clone(), RunOptions::default());

        let report = execute(&ctx, &fx.trash).await.unwrap();

        assert_eq!(report.source, fx.root.join("run_b"));
        assert_backup_key(&report.key);
        assert!(!report.trashed);
        assert!(fx.zips_in_scratch().is_empty());
        assert!(fx.root.join("run_b").is_dir());
        assert!(fx.trash.discarded.borrow().is_empty());

        let download_dir = tempfile::tempdir().unwrap();
        assert_eq!(
            uploaded_contents(&store, &report.key, download_dir.path()).await,
            expected_contents("run_b")
        );
    }

    #[tokio::test]
    async fn test_trash_flag_moves_source_after_upload() {
        let fx = Fixture::new();
        let store = memory_store();
        let options = RunOptions {
            trash_backup_folder: true,
            verify_digest: true,
        };
        let ctx = fx.context(store.clone(), options);

        let report = execute(&ctx, &fx.trash).await.unwrap();

        assert!(report.trashed);
        assert!(!fx.root.join("run_b").exists());
        assert!(fx.root.join("run_a").is_dir());
        assert_eq!(*fx.trash.discarded.borrow(), vec![fx.root.join("run_b")]);
        assert!(fx.trash.root.join("run_b/dump.sql").is_file());
        assert!(fx.zips_in_scratch().is_empty());
    }

    #[tokio::test]
    async fn test_stale_archives_are_swept() {
        let fx = Fixture::new();
        fs::create_dir_all(&fx.scratch).unwrap();
        fs::write(fx.scratch.join("backup_19990101-000000.zip"), b"stale").unwrap();
        fs::write(fx.scratch.join("keep.txt"), b"keep").unwrap();
        let ctx = fx.context(memory_store(), RunOptions::default());

        execute(&ctx, &fx.trash).await.unwrap();

        assert!(fx.zips_in_scratch().is_empty());
        assert!(fx.scratch.join("keep.txt").is_file());
    }

    #[tokio::test]
    async fn test_upload_failure_sweeps_but_never_trashes() {
        let fx = Fixture::new();
        let bucket_dir = fx.scratch.parent().unwrap().join("bucket");
        let store = broken_store(&bucket_dir, MACHINE);
        let options = RunOptions {
            trash_backup_folder: true,
            verify_digest: false,
        };
        let ctx = fx.context(store, options);

        let err = execute(&ctx, &fx.trash).await.unwrap_err();

        assert!(matches!(err, BackupError::Upload(_)));
        assert!(fx.zips_in_scratch().is_empty());
        assert!(fx.root.join("run_b").is_dir());
        assert!(fx.trash.discarded.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_empty_root_fails_without_upload() {
        let fx = Fixture::new();
        fs::remove_dir_all(fx.root.join("run_a")).unwrap();
        fs::remove_dir_all(fx.root.join("run_b")).unwrap();
        let ctx = fx.context(memory_store(), RunOptions::default());

        let err = execute(&ctx, &fx.trash).await.unwrap_err();

        assert!(matches!(err, BackupError::NoCandidates(_)));
        assert!(fx.scratch.is_dir());
    }
}
