//! Bundle extraction: unpacks a gzip-compressed tar archive into a fresh
//! working directory.
//!
//! Decompresses a gzip stream, iterates tar entries, and writes regular
//! files into a working directory. Directories are created on demand.
//! Symlinks, hardlinks, devices and other non-regular-file entries are
//! silently ignored. Every entry is first passed through
//! [`security::sanitize_entry_path`]; any entry that fails is a hard
//! `BundleUnsafe` error for the whole extraction.

mod security;

use std::fs::{self, File};
use std::io::{Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use tar::{Archive, EntryType};

use crate::error::{ErrorExt, ErrorKind, Result, SupervisorError};
use crate::model::Owner;

/// Decompress and unpack `bundle` into `work_dir`. `work_dir` must already
/// exist and be empty; it is not created by this function (the temp-folder
/// allocator owns that). On any I/O, format, or security error the partial
/// tree is removed recursively before the error is surfaced — extraction
/// is not resumable, so callers must obtain a fresh working directory to
/// retry.
pub async fn extract(bundle: &Path, work_dir: &Path, owner: Option<Owner>) -> Result<()> {
    let bundle = bundle.to_path_buf();
    let work_dir = work_dir.to_path_buf();

    tokio::task::spawn_blocking(move || extract_blocking(&bundle, &work_dir, owner))
        .await
        .expect("extraction task panicked")
        .inspect_err(|_| {
            let _ = fs::remove_dir_all(&work_dir);
        })
}

fn extract_blocking(bundle: &Path, work_dir: &Path, owner: Option<Owner>) -> Result<()> {
    let file = File::open(bundle).reason(ErrorKind::BundleIo)?;
    let decoder = flate2::read::GzDecoder::new(file);
    let mut archive = Archive::new(decoder);

    let entries = archive.entries().reason(ErrorKind::BundleIo)?;
    for entry in entries {
        let mut entry = entry.reason(ErrorKind::BundleIo)?;
        let entry_type = entry.header().entry_type();

        let raw_path = entry.path().reason(ErrorKind::BundleUnsafe)?.into_owned();
        let Some(relative) = security::sanitize_entry_path(&raw_path) else {
            return Err(SupervisorError::new(ErrorKind::BundleUnsafe));
        };

        match entry_type {
            EntryType::Directory => {
                create_dir(work_dir, &relative, owner)?;
            }
            EntryType::Regular => {
                write_file(&mut entry, work_dir, &relative, owner)?;
            }
            // Symlinks, hardlinks, devices, fifos: ignored.
            _ => {}
        }
    }

    Ok(())
}

fn create_dir(work_dir: &Path, relative: &Path, owner: Option<Owner>) -> Result<()> {
    let target = work_dir.join(relative);
    create_dir_all_chowned(work_dir, &target, owner)
}

fn write_file(
    entry: &mut tar::Entry<'_, impl Read>,
    work_dir: &Path,
    relative: &Path,
    owner: Option<Owner>,
) -> Result<()> {
    let target = work_dir.join(relative);
    if let Some(parent) = target.parent() {
        create_dir_all_chowned(work_dir, parent, owner)?;
    }

    let mode = entry.header().mode().unwrap_or(0o644);

    // O_CLOEXEC so a subsequent child `exec` never inherits this descriptor.
    let mut out = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .custom_flags(nix::libc::O_CLOEXEC)
        .open(&target)
        .reason(ErrorKind::BundleIo)?;

    // Ownership must be set before content is visible to other processes,
    // while the descriptor is still exclusively held.
    if let Some(owner) = owner {
        chown_fd(&out, owner)?;
    }

    std::io::copy(entry, &mut out).reason(ErrorKind::BundleIo)?;
    out.flush().reason(ErrorKind::BundleIo)?;

    Ok(())
}

/// Create `target` (and any missing ancestors up to, but not including,
/// `work_dir`) and chown each directory this call actually creates.
/// `fs::create_dir_all` alone would silently create un-chowned ancestors
/// for a tar entry nested under directories with no entry of their own.
fn create_dir_all_chowned(work_dir: &Path, target: &Path, owner: Option<Owner>) -> Result<()> {
    let mut missing = Vec::new();
    let mut cur = target;
    while cur != work_dir && !cur.exists() {
        missing.push(cur.to_path_buf());
        match cur.parent() {
            Some(parent) => cur = parent,
            None => break,
        }
    }

    for dir in missing.into_iter().rev() {
        fs::create_dir(&dir).reason(ErrorKind::BundleIo)?;
        if let Some(owner) = owner {
            chown_path(&dir, owner)?;
        }
    }

    Ok(())
}

fn chown_path(path: &Path, owner: Owner) -> Result<()> {
    nix::unistd::chown(
        path,
        Some(nix::unistd::Uid::from_raw(owner.uid)),
        Some(nix::unistd::Gid::from_raw(owner.gid)),
    )
    .reason(ErrorKind::BundleIo)
}

fn chown_fd(file: &File, owner: Owner) -> Result<()> {
    nix::unistd::fchown(
        file,
        Some(nix::unistd::Uid::from_raw(owner.uid)),
        Some(nix::unistd::Gid::from_raw(owner.gid)),
    )
    .reason(ErrorKind::BundleIo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn build_tar_gz(entries: &[(&str, &[u8], EntryType)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, contents, kind) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_entry_type(*kind);
            header.set_cksum();
            builder.append_data(&mut header, path, *contents).unwrap();
        }
        let tar_bytes = builder.into_inner().unwrap();

        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&tar_bytes).unwrap();
        encoder.finish().unwrap()
    }

    fn write_bundle(dir: &Path, bytes: &[u8]) -> PathBuf {
        let bundle_path = dir.join("bundle.tar.gz");
        fs::write(&bundle_path, bytes).unwrap();
        bundle_path
    }

    #[tokio::test]
    async fn extracts_regular_files_and_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let bytes = build_tar_gz(&[
            ("config/keter.yaml", b"host: a.example\n", EntryType::Regular),
            ("config/app", b"#!/bin/sh\necho hi\n", EntryType::Regular),
        ]);
        let bundle = write_bundle(tmp.path(), &bytes);
        let work_dir = tmp.path().join("work");
        fs::create_dir_all(&work_dir).unwrap();

        extract(&bundle, &work_dir, None).await.unwrap();

        assert!(work_dir.join("config/keter.yaml").is_file());
        assert!(work_dir.join("config/app").is_file());
        let contents = fs::read_to_string(work_dir.join("config/keter.yaml")).unwrap();
        assert_eq!(contents, "host: a.example\n");
    }

    #[tokio::test]
    async fn rejects_path_traversal_and_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let bytes = build_tar_gz(&[
            ("config/keter.yaml", b"host: a.example\n", EntryType::Regular),
            ("../etc/passwd", b"root:x:0:0\n", EntryType::Regular),
        ]);
        let bundle = write_bundle(tmp.path(), &bytes);
        let work_dir = tmp.path().join("work");
        fs::create_dir_all(&work_dir).unwrap();

        let err = extract(&bundle, &work_dir, None).await.unwrap_err();
        assert_eq!(*err.kind(), ErrorKind::BundleUnsafe);
        assert!(!work_dir.exists());
    }

    #[tokio::test]
    async fn ignores_symlinks() {
        let tmp = tempfile::tempdir().unwrap();
        let bytes = build_tar_gz(&[
            ("config/keter.yaml", b"host: a.example\n", EntryType::Regular),
            ("config/evil-link", b"/etc/passwd", EntryType::Symlink),
        ]);
        let bundle = write_bundle(tmp.path(), &bytes);
        let work_dir = tmp.path().join("work");
        fs::create_dir_all(&work_dir).unwrap();

        extract(&bundle, &work_dir, None).await.unwrap();

        assert!(work_dir.join("config/keter.yaml").is_file());
        assert!(!work_dir.join("config/evil-link").exists());
    }
}
