//! Animated GIF rendering of imagery sequences.
//!
//! Builds an infinite-loop GIF from the granules matching a year/month
//! filter. Frames are resized to a fixed output size and played in
//! chronological order regardless of the table's row order.

use crate::dataset::{Record, Table};
use crate::error::AquaviewError;
use crate::models::AnimationRequest;

use bytes::Bytes;
use image::codecs::gif::{GifEncoder, Repeat};
use image::imageops::FilterType;
use image::{Delay, Frame};

/// Output frame width in pixels.
pub const FRAME_WIDTH: u32 = 800;
/// Output frame height in pixels.
pub const FRAME_HEIGHT: u32 = 600;

/// A fully encoded animation and the metadata reported alongside it.
#[derive(Clone, Debug)]
pub struct Animation {
    /// The encoded GIF
    pub gif: Bytes,
    /// Number of frames in the animation
    pub frames: usize,
    /// Per-frame display duration in milliseconds
    pub frame_duration_ms: u32,
}

/// Suggested download filename for an animation with the given frame count.
pub fn filename(frames: usize) -> String {
    format!("modis_aqua_animation_{frames}frames.gif")
}

/// Select the records matching the request's year and month ranges, in
/// chronological `(year, month)` order.
///
/// The sort is stable, so records sharing a year and month keep their table
/// order. Records without an embedded image cannot contribute a frame and are
/// skipped. The table itself is never reordered.
pub fn select_frames<'a>(table: &'a Table, request: &AnimationRequest) -> Vec<&'a Record> {
    let (y0, y1) = request.years;
    let (m0, m1) = request.months;
    let mut selected: Vec<&Record> = table
        .records()
        .iter()
        .filter(|r| r.image.is_some())
        .filter(|r| (y0..=y1).contains(&r.year) && (m0..=m1).contains(&r.month))
        .collect();
    selected.sort_by_key(|r| (r.year, r.month));
    selected
}

/// Build an animation from the records matching the request.
///
/// Each selected image is decoded, resized to 800x600 with Lanczos
/// resampling, and appended as a frame with the request's per-frame duration.
/// The GIF loops forever. `progress` is called after each frame with the
/// completed fraction in `(0, 1]`.
///
/// Fails with [AquaviewError::EmptySelection] when fewer than two frames
/// match; a single image is not an animation.
pub fn build_animation(
    table: &Table,
    request: &AnimationRequest,
    mut progress: impl FnMut(f32),
) -> Result<Animation, AquaviewError> {
    let selected = select_frames(table, request);
    if selected.len() < 2 {
        return Err(AquaviewError::EmptySelection {
            frames: selected.len(),
        });
    }
    let frame_duration_ms = request.fps.frame_duration_ms();
    let delay = Delay::from_numer_denom_ms(frame_duration_ms, 1);

    let mut buf = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buf);
        encoder.set_repeat(Repeat::Infinite)?;
        for (index, record) in selected.iter().enumerate() {
            // Selection guarantees the image is present.
            let Some(raw) = record.image.as_ref() else {
                continue;
            };
            let decoded = image::load_from_memory(raw).map_err(|err| {
                AquaviewError::ImageDecode {
                    granule: record.granule_id.clone(),
                    source: err,
                }
            })?;
            let resized = decoded.resize_exact(FRAME_WIDTH, FRAME_HEIGHT, FilterType::Lanczos3);
            let frame = Frame::from_parts(resized.into_rgba8(), 0, 0, delay);
            encoder.encode_frame(frame)?;
            progress((index + 1) as f32 / selected.len() as f32);
        }
    }
    tracing::debug!(
        frames = selected.len(),
        frame_duration_ms,
        bytes = buf.len(),
        "encoded animation"
    );
    Ok(Animation {
        gif: Bytes::from(buf),
        frames: selected.len(),
        frame_duration_ms,
    })
}
