// content-index/src/walker.rs
//! Lazy recursive walk over every configured root, yielding files whose
//! extension is on the allow-list.
//!
//! Error policy:
//! - a root or subdirectory that cannot be read is returned as `Err` and
//!   the caller is expected to abort;
//! - an entry that disappears mid-walk is logged and skipped;
//! - with `follow_symlinks`, a link back to an ancestor is logged and that
//!   branch skipped.

use std::{
    io::ErrorKind,
    path::PathBuf,
    vec
};
use tracing::warn;
use walkdir::WalkDir;
use crate::{
    error::{
        IndexError,
        Result
    },
    util
};


pub const DEFAULT_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".gif"];

#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Normalized (`.ext`, lowercase) allow-list.
    pub extensions: Vec<String>,
    pub follow_symlinks: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            follow_symlinks: false,
        }
    }
}

/// Single-pass iterator over candidate files. Roots are visited in order,
/// entries within a directory in whatever order the OS returns them.
pub struct ImageWalker {
    roots: vec::IntoIter<PathBuf>,
    current: Option<walkdir::IntoIter>,
    opts: WalkOptions,
}

impl ImageWalker {
    pub fn new(roots: Vec<PathBuf>, opts: WalkOptions) -> Self {
        Self {
            roots: roots.into_iter(),
            current: None,
            opts,
        }
    }

    fn open_next_root(&mut self) -> bool {
        match self.roots.next() {
            Some(root) => {
                let walk = WalkDir::new(&root)
                    .follow_links(self.opts.follow_symlinks)
                    .into_iter();
                self.current = Some(walk);
                true
            }
            None => false,
        }
    }
}

impl Iterator for ImageWalker {
    type Item = Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some(walk) = self.current.as_mut() else {
                if !self.open_next_root() {
                    return None;
                }
                continue;
            };

            let entry = match walk.next() {
                Some(Ok(entry)) => entry,
                Some(Err(err)) => {
                    if let Some(ancestor) = err.loop_ancestor() {
                        warn!(
                            path = %err.path().map(|p| p.display().to_string()).unwrap_or_default(),
                            ancestor = %ancestor.display(),
                            "symlink cycle, skipping branch"
                        );
                        continue;
                    }
                    let vanished = err.depth() > 0
                        && err.io_error().map(|e| e.kind()) == Some(ErrorKind::NotFound);
                    if vanished {
                        warn!(error = %err, "entry disappeared during walk, skipping");
                        continue;
                    }
                    let path = err.path().map(|p| p.to_path_buf()).unwrap_or_default();
                    return Some(Err(IndexError::Walk { path, source: err }));
                }
                None => {
                    self.current = None;
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }
            if util::has_allowed_extension(entry.path(), &self.opts.extensions) {
                return Some(Ok(entry.into_path()));
            }
        }
    }
}

/// Convenience for callers that want the whole list up front.
pub fn collect_paths(roots: Vec<PathBuf>, opts: WalkOptions) -> Result<Vec<PathBuf>> {
    ImageWalker::new(roots, opts).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn names(paths: &[PathBuf]) -> Vec<String> {
        let mut v: Vec<String> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        v.sort();
        v
    }

    #[test]
    fn filters_by_extension_case_insensitively() {
        let tmp = TempDir::new().unwrap();
        for f in ["a.jpg", "b.txt", "c.PNG"] {
            fs::write(tmp.path().join(f), f).unwrap();
        }
        let got = collect_paths(vec![tmp.path().to_path_buf()], WalkOptions::default()).unwrap();
        assert_eq!(names(&got), vec!["a.jpg", "c.PNG"]);
    }

    #[test]
    fn recurses_into_nested_dirs_across_roots() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        fs::create_dir_all(a.path().join("x/y/z")).unwrap();
        fs::write(a.path().join("x/y/z/deep.gif"), "d").unwrap();
        fs::write(a.path().join("top.jpeg"), "t").unwrap();
        fs::write(b.path().join("other.jpg"), "o").unwrap();
        // directories with image-like names are walked, not yielded
        fs::create_dir_all(b.path().join("album.jpg")).unwrap();
        fs::write(b.path().join("album.jpg/inner.png"), "i").unwrap();

        let roots = vec![a.path().to_path_buf(), b.path().to_path_buf()];
        let got = collect_paths(roots, WalkOptions::default()).unwrap();
        assert_eq!(names(&got), vec!["deep.gif", "inner.png", "other.jpg", "top.jpeg"]);
    }

    #[test]
    fn roots_are_visited_in_order() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        fs::write(a.path().join("1.jpg"), "1").unwrap();
        fs::write(b.path().join("2.jpg"), "2").unwrap();
        let got = collect_paths(
            vec![b.path().to_path_buf(), a.path().to_path_buf()],
            WalkOptions::default(),
        )
        .unwrap();
        assert!(got[0].starts_with(b.path()));
        assert!(got[1].starts_with(a.path()));
    }

    #[test]
    fn missing_root_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        let mut walker = ImageWalker::new(vec![missing.clone()], WalkOptions::default());
        match walker.next() {
            Some(Err(IndexError::Walk { path, .. })) => assert_eq!(path, missing),
            other => panic!("expected walk error, got {other:?}"),
        }
    }

    #[test]
    fn walk_is_lazy() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.jpg"), "a").unwrap();
        let missing = tmp.path().join("later");
        let mut walker = ImageWalker::new(
            vec![tmp.path().to_path_buf(), missing],
            WalkOptions::default(),
        );
        // first root yields before the second root is ever opened
        assert!(matches!(walker.next(), Some(Ok(_))));
        assert!(matches!(walker.next(), Some(Err(_))));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_dirs_are_not_descended_by_default() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("sub/a.jpg"), "a").unwrap();
        std::os::unix::fs::symlink(&root, root.join("sub/loop")).unwrap();

        let got = collect_paths(vec![root.clone()], WalkOptions::default()).unwrap();
        assert_eq!(names(&got), vec!["a.jpg"]);
    }

    #[cfg(unix)]
    #[test]
    fn followed_symlink_cycle_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("sub/a.jpg"), "a").unwrap();
        std::os::unix::fs::symlink(&root, root.join("sub/loop")).unwrap();

        let opts = WalkOptions { follow_symlinks: true, ..WalkOptions::default() };
        let got = collect_paths(vec![root.clone()], opts).unwrap();
        assert_eq!(names(&got), vec!["a.jpg"]);
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_is_yielded_as_candidate() {
        let tmp = TempDir::new().unwrap();
        std::os::unix::fs::symlink(tmp.path().join("gone"), tmp.path().join("broken.jpg")).unwrap();
        let got = collect_paths(vec![tmp.path().to_path_buf()], WalkOptions::default()).unwrap();
        assert_eq!(names(&got), vec!["broken.jpg"]);
    }
}
