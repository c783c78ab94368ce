use rand::{seq::SliceRandom, Rng};
use regex::{Regex, RegexBuilder};
use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::{config::Settings, error::RotationError, notify::Notifier};

#[derive(Debug, Clone)]
pub struct WildcardPattern {
    source: String,
    regex: Regex,
}

impl WildcardPattern {
    pub fn new(pattern: &str) -> Result<Self, RotationError> {
        let mut expr = String::with_capacity(pattern.len() + 8);
        expr.push('^');
        for ch in pattern.chars() {
            match ch {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }
        expr.push('$');

        let regex = RegexBuilder::new(&expr)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
            .map_err(|source| RotationError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, file_name: &OsStr) -> bool {
        self.regex.is_match(&file_name.to_string_lossy())
    }
}

/// Any enumeration error aborts the whole pattern.
pub fn scan(dir: &Path, pattern: &WildcardPattern, recursive: bool) -> Result<Vec<PathBuf>, RotationError> {
    let mut walker = WalkDir::new(dir).min_depth(1);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|source| RotationError::Enumerate {
            pattern: pattern.as_str().to_string(),
            dir: dir.to_path_buf(),
            source,
        })?;

        let is_file = entry.file_type().is_file()
            || (entry.path_is_symlink() && entry.path().is_file());
        if is_file && pattern.matches(entry.file_name()) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

pub fn build_index<R: Rng + ?Sized>(
    settings: &Settings,
    rng: &mut R,
    notifier: &dyn Notifier,
) -> Vec<PathBuf> {
    let Some(dir) = settings.wallpaper_path.as_deref() else {
        debug!("wallpaper path unset, index left empty");
        return Vec::new();
    };
    let dir = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());

    let mut files = Vec::new();
    for raw in settings.patterns() {
        let found = WildcardPattern::new(raw)
            .and_then(|pattern| scan(&dir, &pattern, settings.get_files_recursively));

        match found {
            Ok(mut matched) => {
                debug!("pattern {raw:?} matched {} files", matched.len());
                files.append(&mut matched);
            }
            Err(err) => notifier.error(&err.to_string()),
        }
    }

    if settings.shuffle_images {
        files.shuffle(rng);
    } else {
        files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    }

    info!("indexed {} files from {}", files.len(), dir.display());
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::RecordingNotifier;
    use rand::{rngs::StdRng, SeedableRng};
    use std::fs;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    fn names(files: &[PathBuf], root: &Path) -> Vec<String> {
        files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    fn settings_for(dir: &Path, patterns: &str) -> Settings {
        Settings {
            wallpaper_path: Some(dir.to_path_buf()),
            file_patterns: patterns.to_string(),
            ..Settings::default()
        }
    }

    #[test]
    fn wildcard_matches_like_file_search() {
        let jpg = WildcardPattern::new("*.jpg").unwrap();
        assert!(jpg.matches(OsStr::new("a.jpg")));
        assert!(jpg.matches(OsStr::new("B.JPG")));
        assert!(!jpg.matches(OsStr::new("a.jpeg")));
        assert!(!jpg.matches(OsStr::new("a.jpg.txt")));

        let single = WildcardPattern::new("img?.png").unwrap();
        assert!(single.matches(OsStr::new("img1.png")));
        assert!(!single.matches(OsStr::new("img10.png")));

        let literal = WildcardPattern::new("a+b(1).png").unwrap();
        assert!(literal.matches(OsStr::new("a+b(1).png")));
        assert!(!literal.matches(OsStr::new("aab1.png")));
    }

    #[test]
    fn unset_directory_yields_empty_index() {
        let notifier = RecordingNotifier::default();
        let files = build_index(&Settings::default(), &mut StdRng::seed_from_u64(1), &notifier);
        assert!(files.is_empty());
        assert!(notifier.messages().is_empty());
    }

    #[test]
    fn top_level_scan_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.jpg", "a.jpg", "b.jpg", "notes.txt"] {
            touch(&dir.path().join(name));
        }
        touch(&dir.path().join("sub/d.jpg"));

        let notifier = RecordingNotifier::default();
        let files = build_index(
            &settings_for(dir.path(), "*.jpg"),
            &mut StdRng::seed_from_u64(1),
            &notifier,
        );

        let root = std::path::absolute(dir.path()).unwrap();
        assert_eq!(names(&files, &root), vec!["a.jpg", "b.jpg", "c.jpg"]);
        assert!(files.iter().all(|p| p.is_absolute()));
    }

    #[test]
    fn recursive_scan_unions_patterns_and_keeps_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.jpg"));
        touch(&dir.path().join("x/b.png"));
        touch(&dir.path().join("x/y/c.jpg"));

        let mut settings = settings_for(dir.path(), "*.jpg;*");
        settings.get_files_recursively = true;

        let notifier = RecordingNotifier::default();
        let files = build_index(&settings, &mut StdRng::seed_from_u64(1), &notifier);

        let root = std::path::absolute(dir.path()).unwrap();
        assert_eq!(
            names(&files, &root),
            vec!["a.jpg", "a.jpg", "x/b.png", "x/y/c.jpg", "x/y/c.jpg"]
        );
    }

    #[test]
    fn shuffle_is_a_permutation_of_sorted_index() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..20 {
            touch(&dir.path().join(format!("{i:02}.jpg")));
        }

        let mut settings = settings_for(dir.path(), "*.jpg");
        let notifier = RecordingNotifier::default();
        let sorted = build_index(&settings, &mut StdRng::seed_from_u64(7), &notifier);

        settings.shuffle_images = true;
        let mut shuffled = build_index(&settings, &mut StdRng::seed_from_u64(7), &notifier);
        assert_eq!(shuffled.len(), sorted.len());

        shuffled.sort();
        assert_eq!(shuffled, sorted);
    }

    #[test]
    fn failing_pattern_is_reported_and_others_still_run() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");

        let notifier = RecordingNotifier::default();
        let files = build_index(
            &settings_for(&missing, "*.jpg;*.png"),
            &mut StdRng::seed_from_u64(1),
            &notifier,
        );
        assert!(files.is_empty());
        assert_eq!(notifier.messages().len(), 2);
        assert!(notifier.messages()[0].contains("*.jpg"));
        assert!(notifier.messages()[1].contains("*.png"));
    }
}
