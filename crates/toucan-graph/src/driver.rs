// crates/toucan-graph/src/driver.rs
//
// §4.J Render Driver: the one entry point that turns (timeline, time,
// target_size) into a pixel buffer. Compiles a fresh graph every call —
// frame caching is left to whatever calls this, per §5's "the driver never
// caches frames; caching is a collaborator".

use toucan_core::node::{ImageBuf, ImageSpec};
use toucan_core::time::{RationalTime, TimeRange};
use toucan_core::Result;
use toucan_media::TimelineWrapper;

use crate::compiler::Compiler;

/// Clamps `time` into the timeline's range (closed start, exclusive end, per
/// §4.J step 1): below start snaps to start, at or past the end snaps to the
/// last representable tick before `end_exclusive()`.
fn clamp_to_range(time: RationalTime, range: TimeRange) -> RationalTime {
    let time = time.rescaled_to(range.start.rate);
    if time < range.start {
        range.start
    } else if time >= range.end_exclusive() {
        let one_tick = RationalTime::new(1.0, range.start.rate);
        range.end_exclusive() - one_tick
    } else {
        time
    }
}

/// Renders one frame (§4.J): compiles the graph at the clamped time,
/// executes the root, and resizes to `target_size` if it differs from the
/// graph's native output size.
pub fn render_frame(
    compiler: &Compiler,
    wrapper: &TimelineWrapper,
    time: RationalTime,
    target_size: Option<(usize, usize)>,
) -> Result<ImageBuf> {
    let clamped = clamp_to_range(time, wrapper.time_range());
    let mut root = compiler.compile(wrapper, clamped)?;
    root.set_time(clamped);
    let buf = root.exec()?;

    match target_size {
        Some((w, h)) if (w, h) != (buf.width(), buf.height()) => Ok(resize_nearest(&buf, w, h)),
        _ => Ok(buf),
    }
}

/// Nearest-neighbor resample, the "caller-chosen filter" §4.J leaves
/// unspecified beyond "a resize happens" — nearest is the cheapest filter
/// that needs no extra dependency beyond what this crate already pulls in.
fn resize_nearest(src: &ImageBuf, width: usize, height: usize) -> ImageBuf {
    let spec = ImageSpec::rgba8(width, height);
    let mut out = ImageBuf::new(spec);
    if src.width() == 0 || src.height() == 0 {
        return out;
    }
    for y in 0..height {
        let src_y = (y * src.height()) / height.max(1);
        for x in 0..width {
            let src_x = (x * src.width()) / width.max(1);
            let src_idx = (src_y * src.width() + src_x) * 4;
            let dst_idx = (y * width + x) * 4;
            out.data[dst_idx..dst_idx + 4].copy_from_slice(&src.data[src_idx..src_idx + 4]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_snaps_below_start_to_start() {
        let range = TimeRange::new(RationalTime::new(10.0, 24.0), RationalTime::new(48.0, 24.0));
        let clamped = clamp_to_range(RationalTime::new(0.0, 24.0), range);
        assert_eq!(clamped.value, 10.0);
    }

    #[test]
    fn clamp_snaps_at_end_to_last_tick() {
        let range = TimeRange::new(RationalTime::new(0.0, 24.0), RationalTime::new(48.0, 24.0));
        let clamped = clamp_to_range(RationalTime::new(48.0, 24.0), range);
        assert_eq!(clamped.value, 47.0);
    }

    #[test]
    fn resize_preserves_corner_pixels() {
        let mut src = ImageBuf::new(ImageSpec::rgba8(2, 2));
        src.data[0..4].copy_from_slice(&[255, 0, 0, 255]);
        let out = resize_nearest(&src, 4, 4);
        assert_eq!(&out.data[0..4], &[255, 0, 0, 255]);
    }
}
