//! Directory scanner for discovering sheet images to digitize in bulk

use crate::digitize::IMAGE_EXTENSIONS;
use crate::error::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Scan one or more directories for image files.
///
/// Paths are returned sorted so a batch runs in a stable order. Unreadable
/// entries below a root are skipped; a root that cannot be read is an error.
pub fn scan_images<P: AsRef<Path>>(roots: &[P]) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();

    for root in roots {
        let mut walker = WalkDir::new(root.as_ref()).follow_links(true).into_iter();

        // surface a bad root instead of silently returning nothing
        if let Some(first) = walker.next() {
            let first = first?;
            if first.file_type().is_file() && is_image(first.path()) {
                images.push(first.path().to_path_buf());
            }
        }

        for entry in walker.filter_map(|e| e.ok()) {
            if entry.file_type().is_file() && is_image(entry.path()) {
                images.push(entry.path().to_path_buf());
            }
        }
    }

    images.sort();
    images.dedup();
    Ok(images)
}

/// Check whether a path has one of the known image extensions
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_is_image() {
        assert!(is_image(Path::new("tp4/sheet.jpg")));
        assert!(is_image(Path::new("SHEET.PNG")));
        assert!(!is_image(Path::new("notes.txt")));
        assert!(!is_image(Path::new("jpg")));
    }

    #[test]
    fn test_scan_images_recursive_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("week2")).unwrap();
        fs::write(dir.path().join("week2/b.png"), b"x").unwrap();
        fs::write(dir.path().join("a.jpeg"), b"x").unwrap();
        fs::write(dir.path().join("readme.md"), b"x").unwrap();

        let images = scan_images(&[dir.path()]).unwrap();
        assert_eq!(
            images,
            vec![dir.path().join("a.jpeg"), dir.path().join("week2/b.png")]
        );
    }

    #[test]
    fn test_scan_single_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("one.webp");
        fs::write(&file, b"x").unwrap();

        assert_eq!(scan_images(&[&file]).unwrap(), vec![file.clone()]);
    }

    #[test]
    fn test_scan_missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan_images(&[dir.path().join("missing")]).is_err());
    }
}
