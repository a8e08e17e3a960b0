//! Private-permission file writes for config and recovered key material.

use eyre::Context as _;
use rand::Rng as _;
use std::{
    fs::{self, OpenOptions},
    io::Write as _,
    path::{Path, PathBuf},
};

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt as _, PermissionsExt as _};

pub const MODE_DIR_PRIVATE: u32 = 0o700;
pub const MODE_FILE_PRIVATE: u32 = 0o600;

fn is_symlink(p: &Path) -> eyre::Result<bool> {
    let md = fs::symlink_metadata(p).with_context(|| format!("stat {}", p.display()))?;
    Ok(md.file_type().is_symlink())
}

pub fn ensure_private_dir(dir: &Path) -> eyre::Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir).with_context(|| format!("create dir {}", dir.display()))?;
    } else if is_symlink(dir)? {
        eyre::bail!("refusing to use symlinked directory: {}", dir.display());
    }

    let md = fs::metadata(dir).with_context(|| format!("stat {}", dir.display()))?;
    if !md.is_dir() {
        eyre::bail!("expected directory at {}", dir.display());
    }

    // Clamp to 0700 if group or other have any bits.
    #[cfg(unix)]
    if (md.permissions().mode() & 0o077) != 0 {
        fs::set_permissions(dir, fs::Permissions::from_mode(MODE_DIR_PRIVATE))
            .with_context(|| format!("chmod {MODE_DIR_PRIVATE:o} {}", dir.display()))?;
    }

    Ok(())
}

fn tmp_path_for(parent: &Path, final_name: &Path) -> PathBuf {
    let base = final_name
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    let mut rand_bytes = [0_u8; 8];
    rand::rng().fill_bytes(&mut rand_bytes);
    parent.join(format!(".{base}.tmp.{}", hex::encode(rand_bytes)))
}

fn open_new(path: &Path, mode: u32) -> eyre::Result<fs::File> {
    let mut oo = OpenOptions::new();
    oo.create_new(true).write(true);
    #[cfg(unix)]
    oo.mode(mode);
    #[cfg(not(unix))]
    let _unused = mode;
    oo.open(path)
        .with_context(|| format!("open temp {}", path.display()))
}

fn parent_of(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        Some(_) | None => Path::new("."),
    }
}

/// Writes `bytes` to a fresh temp file next to `path`, fsyncs it, then renames it into place.
fn write_via_temp(path: &Path, bytes: &[u8], mode: u32) -> eyre::Result<()> {
    if path.exists() && is_symlink(path)? {
        eyre::bail!("refusing to write to symlink: {}", path.display());
    }

    let tmp = tmp_path_for(parent_of(path), path);
    let mut f = open_new(&tmp, mode)?;
    let written = f
        .write_all(bytes)
        .and_then(|()| f.flush())
        .and_then(|()| f.sync_all());
    drop(f);
    if let Err(e) = written {
        drop(fs::remove_file(&tmp));
        return Err(eyre::Report::new(e).wrap_err(format!("write {}", tmp.display())));
    }

    // Windows refuses to rename over an existing file.
    #[cfg(windows)]
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("remove existing {}", path.display()))?;
    }

    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))
}

/// Atomic write into a directory owned by this tool; the parent is made private.
pub fn write_atomic_restrictive(path: &Path, bytes: &[u8], mode: u32) -> eyre::Result<()> {
    ensure_private_dir(parent_of(path))?;
    write_via_temp(path, bytes, mode)
}

pub fn write_string_atomic_restrictive(path: &Path, s: &str, mode: u32) -> eyre::Result<()> {
    write_atomic_restrictive(path, s.as_bytes(), mode)
}

/// Saves recovered key material with owner-only permissions.
///
/// A missing parent is created private; an existing one keeps its permissions.
/// An existing file is only replaced when `overwrite` is set.
pub fn write_secret_output(path: &Path, s: &str, overwrite: bool) -> eyre::Result<()> {
    if !overwrite && fs::symlink_metadata(path).is_ok() {
        eyre::bail!(
            "{} already exists; pass --force to replace it",
            path.display()
        );
    }
    let parent = parent_of(path);
    if !parent.exists() {
        ensure_private_dir(parent)?;
    }
    write_via_temp(path, s.as_bytes(), MODE_FILE_PRIVATE)
}
