use rand::Rng;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::RotationError;

#[derive(Debug, Clone)]
pub struct Playlist {
    files: Vec<PathBuf>,
    cursor: Option<usize>,
}

impl Playlist {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self { files, cursor: None }
    }

    pub fn replace(&mut self, files: Vec<PathBuf>) {
        self.files = files;
        self.cursor = None;
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    #[cfg(test)]
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn select_next<R: Rng + ?Sized>(
        &mut self,
        random: bool,
        rng: &mut R,
    ) -> Result<PathBuf, RotationError> {
        self.select_next_with(random, rng, Path::is_file)
    }

    /// Files failing `exists` are dropped for good and selection retries.
    pub fn select_next_with<R, F>(
        &mut self,
        random: bool,
        rng: &mut R,
        exists: F,
    ) -> Result<PathBuf, RotationError>
    where
        R: Rng + ?Sized,
        F: Fn(&Path) -> bool,
    {
        loop {
            if self.files.is_empty() {
                self.cursor = None;
                return Err(RotationError::NoFiles);
            }

            let index = if random {
                rng.gen_range(0..self.files.len())
            } else {
                match self.cursor {
                    Some(i) if i + 1 < self.files.len() => i + 1,
                    _ => 0,
                }
            };
            self.cursor = Some(index);

            let file = &self.files[index];
            if exists(file) {
                debug!("selected {} (#{index})", file.display());
                return Ok(file.clone());
            }

            warn!("{} no longer exists, dropping it from the index", file.display());
            self.files.remove(index);
            // Step back so the next advance lands on the entry that shifted into this slot.
            self.cursor = index.checked_sub(1);
        }
    }
}
