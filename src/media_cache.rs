//! Bounded cache of decoded still images.
//!
//! Image and background components are looked up here by [`MediaRef`] so that
//! re-rendering a slide on every tick does not hit the disk. The cache holds at
//! most `capacity` images and evicts the least recently used one; entries for
//! deleted media are dropped with [`MediaCache::invalidate`]. A reference that
//! failed to decode is remembered until it is invalidated, so a missing file is
//! read and reported once rather than on every tick.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;
use log::{debug, info, trace, warn};

use super::errors::MediaError;
use crate::model::MediaRef;

#[derive(Debug)]
pub struct MediaCache {
    capacity: usize,
    images: HashMap<MediaRef, Arc<RgbaImage>>,
    /// Least recently used at the front.
    recency: VecDeque<MediaRef>,
    /// Decode failures, kept until `invalidate` or `clear`.
    failed: HashMap<MediaRef, String>,
}

impl MediaCache {
    pub fn new(capacity: usize) -> Self {
        debug!("Initializing media cache with capacity {}", capacity);
        Self { capacity: capacity.max(1), images: HashMap::new(), recency: VecDeque::new(), failed: HashMap::new() }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn contains(&self, reference: &MediaRef) -> bool {
        self.images.contains_key(reference)
    }

    pub fn has_failed(&self, reference: &MediaRef) -> bool {
        self.failed.contains_key(reference)
    }

    /// Returns the cached image, marking it as recently used.
    pub fn get(&mut self, reference: &MediaRef) -> Option<Arc<RgbaImage>> {
        let image = self.images.get(reference).cloned()?;
        self.touch(reference);
        trace!("Media cache hit for '{}'", reference);
        Some(image)
    }

    /// Returns the cached image or decodes it from the filesystem.
    ///
    /// # Errors
    /// Returns `MediaError::Image` if the file is missing or cannot be decoded.
    /// Later calls for the same reference return `MediaError::Unavailable`
    /// without touching the disk until the reference is invalidated.
    #[must_use = "loading media can fail; the Result must be handled"]
    pub fn get_or_load(&mut self, reference: &MediaRef) -> Result<Arc<RgbaImage>, MediaError> {
        if let Some(image) = self.get(reference) {
            return Ok(image);
        }
        if let Some(reason) = self.failed.get(reference) {
            trace!("Skipping '{}', it failed to decode earlier", reference);
            return Err(MediaError::Unavailable(format!("{}: {}", reference, reason)));
        }
        debug!("Media cache miss for '{}', decoding from disk", reference);
        let decoded = match image::open(Path::new(reference.as_str())) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("Failed to decode image '{}': {}", reference, e);
                self.failed.insert(reference.clone(), e.to_string());
                return Err(MediaError::Image(e));
            }
        };
        let image = Arc::new(decoded.to_rgba8());
        self.insert(reference.clone(), image.clone());
        Ok(image)
    }

    /// Stores an already decoded image, evicting the least recently used
    /// entry if the cache is full.
    pub fn insert(&mut self, reference: MediaRef, image: Arc<RgbaImage>) {
        if self.images.insert(reference.clone(), image).is_some() {
            self.touch(&reference);
            return;
        }
        self.recency.push_back(reference);
        while self.images.len() > self.capacity {
            let Some(oldest) = self.recency.pop_front() else { break };
            self.images.remove(&oldest);
            debug!("Evicted '{}' from media cache", oldest);
        }
    }

    /// Forgets one entry or remembered failure, e.g. after the underlying
    /// file was deleted, replaced or created.
    pub fn invalidate(&mut self, reference: &MediaRef) -> bool {
        let removed = self.images.remove(reference).is_some();
        if removed {
            self.recency.retain(|r| r != reference);
            info!("Invalidated cached media '{}'", reference);
        }
        let forgotten = self.failed.remove(reference).is_some();
        if forgotten {
            info!("Retrying media '{}' on next use", reference);
        }
        removed || forgotten
    }

    pub fn clear(&mut self) {
        if !self.images.is_empty() {
            info!("Clearing media cache ({} entries)", self.images.len());
        }
        self.images.clear();
        self.recency.clear();
        self.failed.clear();
    }

    fn touch(&mut self, reference: &MediaRef) {
        if let Some(pos) = self.recency.iter().position(|r| r == reference) {
            if let Some(r) = self.recency.remove(pos) {
                self.recency.push_back(r);
            }
        }
    }
}
