// crates/toucan-media/src/read/movie_read.rs
//
// Wraps an FFmpeg input context behind the abstract `spec`/`time_range`/
// `get_image(time)` contract §4.D calls a movie decoder's "abstract
// interface": stateful, seeks once then decodes forward, pared down to the
// single "decode frame at time T" contract the core needs — each
// `get_image` seeks then decodes forward to the first frame at or past the
// target PTS, the same burn-through approach without any continuous-
// playback state.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::{input, Pixel};
use ffmpeg::media::Type;
use ffmpeg::software::scaling::{context::Context as SwsContext, flag::Flags};
use toucan_core::node::{ComponentType, ImageBuf, ImageNode, ImageSpec, NodeState};
use toucan_core::time::{RationalTime, TimeRange};
use toucan_core::{Error, Result};
use tracing::warn;

pub struct MovieDecoder {
    path: PathBuf,
    ictx: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::video::Video,
    video_index: usize,
    time_base: (i32, i32),
    width: u32,
    height: u32,
    frame_count: i64,
    rate: f64,
}

impl MovieDecoder {
    pub fn open(path: &Path) -> Result<Self> {
        let ictx = input(path).map_err(|e| Error::OpenFailed { path: path.to_path_buf(), cause: e.to_string() })?;
        let stream = ictx
            .streams()
            .best(Type::Video)
            .ok_or_else(|| Error::OpenFailed { path: path.to_path_buf(), cause: "no video stream".to_string() })?;
        let video_index = stream.index();
        let time_base = stream.time_base();
        let rate = stream.rate();
        let rate = if rate.denominator() > 0 { rate.numerator() as f64 / rate.denominator() as f64 } else { 24.0 };
        let duration_ts = stream.duration().max(0);
        let decoder_ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| Error::OpenFailed { path: path.to_path_buf(), cause: e.to_string() })?;
        let decoder = decoder_ctx
            .decoder()
            .video()
            .map_err(|e| Error::OpenFailed { path: path.to_path_buf(), cause: e.to_string() })?;
        let (width, height) = (decoder.width(), decoder.height());
        let frame_count = if duration_ts > 0 && time_base.numerator() > 0 {
            ((duration_ts as f64) * time_base.numerator() as f64 / time_base.denominator() as f64 * rate).round() as i64
        } else {
            0
        };

        Ok(Self {
            path: path.to_path_buf(),
            ictx,
            decoder,
            video_index,
            time_base: (time_base.numerator(), time_base.denominator()),
            width,
            height,
            frame_count: frame_count.max(1),
            rate,
        })
    }

    pub fn spec(&self) -> ImageSpec {
        ImageSpec::new(self.width as usize, self.height as usize, 4, ComponentType::U8)
    }

    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(RationalTime::new(0.0, self.rate), RationalTime::new(self.frame_count as f64, self.rate))
    }

    fn seconds_to_pts(&self, seconds: f64) -> i64 {
        let (num, den) = self.time_base;
        if num <= 0 {
            return 0;
        }
        (seconds * den as f64 / num as f64) as i64
    }

    /// Decodes the frame at or immediately after `time`, per §5's "decode
    /// one frame at a time" model. A decode failure at this time returns a
    /// transparent frame and a log record rather than propagating an error
    /// (§7: decode errors never abort the graph).
    pub fn get_image(&mut self, time: RationalTime) -> Result<ImageBuf> {
        let target_seconds = time.to_seconds();
        let target_pts = self.seconds_to_pts(target_seconds);
        if self.ictx.seek(target_pts, ..target_pts).is_err() {
            warn!(path = %self.path.display(), "seek failed, decoding from current position");
        }

        let width = self.width;
        let height = self.height;
        let format = self.decoder.format();
        let mut scaler = match SwsContext::get(format, width, height, Pixel::RGBA, width, height, Flags::BILINEAR) {
            Ok(s) => s,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to build scaler");
                return Ok(ImageBuf::transparent(width as usize, height as usize));
            }
        };

        for (stream, packet) in self.ictx.packets().flatten() {
            if stream.index() != self.video_index {
                continue;
            }
            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }
            let mut decoded = ffmpeg::util::frame::video::Video::empty();
            while self.decoder.receive_frame(&mut decoded).is_ok() {
                let pts = decoded.pts().unwrap_or(0);
                if pts < target_pts {
                    continue;
                }
                let mut scaled = ffmpeg::util::frame::video::Video::empty();
                if scaler.run(&decoded, &mut scaled).is_err() {
                    warn!(path = %self.path.display(), "scale failed, returning transparent frame");
                    return Ok(ImageBuf::transparent(width as usize, height as usize));
                }
                let stride = scaled.stride(0);
                let raw = scaled.data(0);
                let mut data = Vec::with_capacity(width as usize * height as usize * 4);
                for row in 0..height as usize {
                    let start = row * stride;
                    data.extend_from_slice(&raw[start..start + width as usize * 4]);
                }
                return Ok(ImageBuf { spec: self.spec(), data });
            }
        }

        warn!(path = %self.path.display(), time = target_seconds, "no frame decoded at time, returning transparent frame");
        Ok(ImageBuf::transparent(width as usize, height as usize))
    }
}

pub struct MovieReadNode {
    state: NodeState,
    inputs: Vec<Box<dyn ImageNode>>,
    decoder: Rc<RefCell<MovieDecoder>>,
    label: String,
}

impl MovieReadNode {
    pub fn new(decoder: Rc<RefCell<MovieDecoder>>, label: impl Into<String>) -> Self {
        Self { state: NodeState::new(), inputs: Vec::new(), decoder, label: label.into() }
    }

    pub fn spec(&self) -> ImageSpec {
        self.decoder.borrow().spec()
    }

    pub fn time_range(&self) -> TimeRange {
        self.decoder.borrow().time_range()
    }
}

impl ImageNode for MovieReadNode {
    fn label(&self) -> &str {
        &self.label
    }

    fn inputs(&self) -> &[Box<dyn ImageNode>] {
        &self.inputs
    }

    fn inputs_mut(&mut self) -> &mut Vec<Box<dyn ImageNode>> {
        &mut self.inputs
    }

    fn time(&self) -> RationalTime {
        self.state.time
    }

    fn set_time(&mut self, time: RationalTime) {
        self.state.time = time;
    }

    fn time_offset(&self) -> RationalTime {
        self.state.time_offset
    }

    fn set_time_offset(&mut self, offset: RationalTime) {
        self.state.time_offset = offset;
    }

    fn exec(&mut self) -> Result<ImageBuf> {
        self.decoder.borrow_mut().get_image(self.state.time)
    }
}

impl std::fmt::Debug for MovieReadNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MovieReadNode").field("label", &self.label).finish()
    }
}
