use crate::marker::{DecodedMarker, MarkerDecoder};
use image::GrayImage;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One decoded grayscale video frame.
///
/// Marker decodes are cached per decoder object, so the detector and the
/// correspondence search share a single decode per frame when they share a
/// decoder, and a different decoder always sees its own results.
#[derive(Debug)]
pub struct Frame {
    pub index: u64,
    pub image: GrayImage,
    markers: Mutex<Vec<(usize, Arc<[DecodedMarker]>)>>,
}

/// Address of the decoder object, used as its cache key.
fn decoder_key(decoder: &dyn MarkerDecoder) -> usize {
    (decoder as *const dyn MarkerDecoder).cast::<()>() as usize
}

impl Frame {
    pub fn new(index: u64, image: GrayImage) -> Self {
        Self {
            index,
            image,
            markers: Mutex::new(Vec::new()),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    fn cache(&self) -> MutexGuard<'_, Vec<(usize, Arc<[DecodedMarker]>)>> {
        self.markers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Markers `decoder` finds in this frame, decoded on its first request.
    pub fn markers_with(&self, decoder: &dyn MarkerDecoder) -> Arc<[DecodedMarker]> {
        let key = decoder_key(decoder);
        if let Some((_, cached)) = self.cache().iter().find(|(k, _)| *k == key) {
            return Arc::clone(cached);
        }

        let found: Arc<[DecodedMarker]> = decoder.decode(&self.image).into();
        if !found.is_empty() {
            log::debug!("frame {}: decoded {} marker(s)", self.index, found.len());
        }
        self.cache().push((key, Arc::clone(&found)));
        found
    }
}
