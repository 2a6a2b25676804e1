//! Read-only image layers.
//!
//! An image is a tar archive named after the image under the images
//! directory. It is extracted once into `<layers>/<image>/`; later
//! containers reuse the extracted tree.

use std::path::{Path, PathBuf};

use minibox_common::error::{MiniboxError, Result};

/// Archive suffixes tried for an image, in order.
const ARCHIVE_SUFFIXES: [&str; 3] = ["tar", "tar.gz", "tgz"];

/// Returns the archive for `image` under `images_dir`.
///
/// # Errors
///
/// Returns [`MiniboxError::NotFound`] if no archive exists.
pub fn find_image_archive(images_dir: &Path, image: &str) -> Result<PathBuf> {
    ARCHIVE_SUFFIXES
        .iter()
        .map(|suffix| images_dir.join(format!("{image}.{suffix}")))
        .find(|p| p.is_file())
        .ok_or_else(|| MiniboxError::NotFound {
            kind: "image archive",
            id: images_dir.join(format!("{image}.tar")).display().to_string(),
        })
}

/// Extracts a tar archive to the target directory.
///
/// Supports both plain `.tar` and gzip-compressed `.tar.gz` / `.tgz` archives.
///
/// # Errors
///
/// Returns an error if the archive cannot be opened or unpacked.
pub fn extract_archive(archive_path: &Path, target: &Path) -> Result<()> {
    tracing::info!(
        archive = %archive_path.display(),
        target = %target.display(),
        "extracting image layer"
    );

    std::fs::create_dir_all(target).map_err(|e| MiniboxError::io(target, e))?;
    let file = std::fs::File::open(archive_path).map_err(|e| MiniboxError::io(archive_path, e))?;

    let unpacked = if is_gzip_archive(archive_path) {
        tar::Archive::new(flate2::read::GzDecoder::new(file)).unpack(target)
    } else {
        tar::Archive::new(file).unpack(target)
    };
    unpacked.map_err(|e| MiniboxError::io(target, e))
}

/// Makes sure `image` is extracted under `layers_dir` and returns its path.
///
/// Extraction is skipped when the layer directory already exists. A fresh
/// extraction goes to a sibling staging directory first and is renamed into
/// place, so a failed extraction never leaves a half-populated layer behind.
///
/// # Errors
///
/// Returns an error if the archive is missing or extraction fails.
pub fn ensure_image_layer(images_dir: &Path, layers_dir: &Path, image: &str) -> Result<PathBuf> {
    let layer = layers_dir.join(image);
    if layer.is_dir() {
        tracing::debug!(layer = %layer.display(), "image layer already extracted");
        return Ok(layer);
    }

    let archive = find_image_archive(images_dir, image)?;
    let staging = layers_dir.join(format!(".{image}.partial"));
    if staging.exists() {
        std::fs::remove_dir_all(&staging).map_err(|e| MiniboxError::io(&staging, e))?;
    }
    if let Err(e) = extract_archive(&archive, &staging) {
        let _ = std::fs::remove_dir_all(&staging);
        return Err(e);
    }
    std::fs::rename(&staging, &layer).map_err(|e| MiniboxError::io(&layer, e))?;
    tracing::info!(image, layer = %layer.display(), "image layer ready");
    Ok(layer)
}

/// Determines whether the archive is gzip-compressed based on extension.
fn is_gzip_archive(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz") || ext.eq_ignore_ascii_case("tgz"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_image_tar(dir: &Path, name: &str) -> PathBuf {
        std::fs::create_dir_all(dir).expect("create images dir");
        let tar_path = dir.join(format!("{name}.tar"));
        let file = std::fs::File::create(&tar_path).expect("failed to create tar file");
        let mut builder = tar::Builder::new(file);
        let data = b"#!/bin/sh\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, "bin/sh", &data[..])
            .expect("failed to append data");
        builder.finish().expect("failed to finish tar");
        tar_path
    }

    fn create_image_tar_gz(dir: &Path, name: &str) -> PathBuf {
        std::fs::create_dir_all(dir).expect("create images dir");
        let path = dir.join(format!("{name}.tar.gz"));
        let file = std::fs::File::create(&path).expect("failed to create tar.gz");
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let data = b"alpine";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "etc/os-release", &data[..])
            .expect("failed to append data");
        let encoder = builder.into_inner().expect("failed to finish encoder");
        let _ = encoder.finish().expect("failed to finish gzip");
        path
    }

    #[test]
    fn ensure_extracts_plain_tar_once() {
        let root = tempfile::tempdir().expect("tempdir");
        let images = root.path().join("images");
        let layers = root.path().join("layers");
        let _ = create_image_tar(&images, "busybox");

        let layer = ensure_image_layer(&images, &layers, "busybox").expect("extract");
        assert!(layer.join("bin/sh").is_file());

        std::fs::write(layer.join("marker"), "kept").expect("write marker");
        let again = ensure_image_layer(&images, &layers, "busybox").expect("reuse");
        assert_eq!(again, layer);
        assert!(again.join("marker").exists());
    }

    #[test]
    fn ensure_extracts_gzip_archive() {
        let root = tempfile::tempdir().expect("tempdir");
        let images = root.path().join("images");
        let layers = root.path().join("layers");
        let _ = create_image_tar_gz(&images, "alpine");

        let layer = ensure_image_layer(&images, &layers, "alpine").expect("extract");
        let content = std::fs::read_to_string(layer.join("etc/os-release")).expect("read");
        assert_eq!(content, "alpine");
    }

    #[test]
    fn missing_image_is_not_found() {
        let root = tempfile::tempdir().expect("tempdir");
        let err = ensure_image_layer(&root.path().join("images"), &root.path().join("layers"), "nope")
            .unwrap_err();
        assert!(matches!(err, MiniboxError::NotFound { kind: "image archive", .. }));
        assert!(!root.path().join("layers/nope").exists());
    }

    #[test]
    fn corrupt_archive_leaves_no_layer() {
        let root = tempfile::tempdir().expect("tempdir");
        let images = root.path().join("images");
        std::fs::create_dir_all(&images).expect("mkdir");
        std::fs::write(images.join("broken.tar.gz"), b"not gzip").expect("write");
        let layers = root.path().join("layers");

        assert!(ensure_image_layer(&images, &layers, "broken").is_err());
        assert!(!layers.join("broken").exists());
        assert!(!layers.join(".broken.partial").exists());
    }
}
