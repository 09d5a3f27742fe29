use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Datelike, Local, Timelike};

use zip::result::{ZipError, ZipResult};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{BackupError, BackupResult};
use crate::types::{ARCHIVE_EXTENSION, ArchiveInfo};

const TRACING_TARGET: &str = "backhaul::archive";

/// Zip everything under `source` into `<destination_base>.zip`.
///
/// An existing archive at that path is overwritten. Entry names are relative
/// to `source` and always use `/`.
pub fn create_archive(source: &Path, destination_base: &Path) -> BackupResult<ArchiveInfo> {
    let target = archive_path(destination_base);

    tracing::debug!(
        target: TRACING_TARGET,
        source = %source.display(),
        archive = %target.display(),
        "Creating archive"
    );

    let file_count = write_zip(source, &target).map_err(|e| {
        BackupError::archive(format!(
            "failed to zip {} into {}: {}",
            source.display(),
            target.display(),
            e
        ))
    })?;

    let size = fs::metadata(&target)
        .map_err(|e| BackupError::archive(format!("{}: {}", target.display(), e)))?
        .len();

    tracing::debug!(
        target: TRACING_TARGET,
        archive = %target.display(),
        files = file_count,
        size,
        "Archive complete"
    );

    Ok(ArchiveInfo {
        path: target,
        file_count,
        size,
    })
}

/// `<base>.zip`, keeping any dots already in the base name
pub fn archive_path(destination_base: &Path) -> PathBuf {
    let mut name = destination_base.as_os_str().to_owned();
    name.push(".");
    name.push(ARCHIVE_EXTENSION);
    PathBuf::from(name)
}

fn write_zip(source: &Path, target: &Path) -> ZipResult<usize> {
    if !fs::metadata(source)?.is_dir() {
        return Err(ZipError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a directory", source.display()),
        )));
    }

    let file = File::create(target)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut file_count = 0;
    append_dir(&mut zip, source, source, options, &mut file_count)?;

    let mut writer = zip.finish()?;
    io::Write::flush(&mut writer)?;

    Ok(file_count)
}

/// Walk directory tree into the archive
fn append_dir(
    zip: &mut ZipWriter<BufWriter<File>>,
    base: &Path,
    dir: &Path,
    options: SimpleFileOptions,
    file_count: &mut usize,
) -> ZipResult<()> {
    let mut entries = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let name = entry_name(base, &path)?;
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            let metadata = entry.metadata()?;
            zip.add_directory(format!("{}/", name), entry_options(options, &metadata))?;
            append_dir(zip, base, &path, options, file_count)?;
            continue;
        }

        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound && file_type.is_symlink() => {
                tracing::warn!(target: TRACING_TARGET, path = %path.display(), "Skipping dangling symlink");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        // Linked directories are recorded but not followed, they may loop back
        if metadata.is_dir() {
            tracing::warn!(
                target: TRACING_TARGET,
                path = %path.display(),
                "Recording symlinked directory without its contents"
            );
            zip.add_directory(format!("{}/", name), entry_options(options, &metadata))?;
            continue;
        }

        if !metadata.is_file() {
            tracing::warn!(target: TRACING_TARGET, path = %path.display(), "Skipping non-regular entry");
            continue;
        }

        let file_options = entry_options(options, &metadata).large_file(metadata.len() >= u32::MAX as u64);
        zip.start_file(name, file_options)?;
        let mut input = File::open(&path)?;
        io::copy(&mut input, zip)?;
        *file_count += 1;
    }

    Ok(())
}

/// Carry the source's mtime and permission bits into the entry
fn entry_options(options: SimpleFileOptions, metadata: &fs::Metadata) -> SimpleFileOptions {
    let mut options = match metadata.modified().ok().and_then(zip_time) {
        Some(time) => options.last_modified_time(time),
        None => options,
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        options = options.unix_permissions(metadata.permissions().mode() & 0o7777);
    }

    options
}

/// Local wall-clock time, as zip tools expect. `None` outside the DOS range (1980-2107).
fn zip_time(time: SystemTime) -> Option<zip::DateTime> {
    let local: DateTime<Local> = time.into();
    zip::DateTime::from_date_and_time(
        u16::try_from(local.year()).ok()?,
        local.month() as u8,
        local.day() as u8,
        local.hour() as u8,
        local.minute() as u8,
        local.second() as u8,
    )
    .ok()
}

fn entry_name(base: &Path, path: &Path) -> ZipResult<String> {
    let relative = path
        .strip_prefix(base)
        .map_err(|e| ZipError::Io(io::Error::new(io::ErrorKind::InvalidInput, e)))?;

    let mut parts = Vec::new();
    for component in relative.components() {
        let part = component.as_os_str().to_str().ok_or_else(|| {
            ZipError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("non UTF-8 file name: {}", path.display()),
            ))
        })?;
        parts.push(part);
    }

    Ok(parts.join("/"))
}
