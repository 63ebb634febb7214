// crates/toucan-media/src/writer.rs
//
// §4.K Writer adapter: the two destinations a rendered frame can be pushed
// to. `SequenceWriter` writes one still image per frame through the
// `image` crate's encoder (any still format the caller names by
// extension, not just PNG); `MovieWriter`
// opens an ffmpeg output context on the first frame and follows the usual
// add_stream/configure/write_header encoder setup, minus the audio stream
// and multi-clip concatenation this crate has no use for.

use std::path::{Path, PathBuf};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::{self, encoder, Id as CodecId};
use ffmpeg::format::Pixel;
use ffmpeg::software::scaling::{context::Context as SwsContext, flag::Flags};
use ffmpeg::util::rational::Rational;
use toucan_core::node::ImageBuf;
use toucan_core::time::RationalTime;
use toucan_core::util::format_sequence_frame;
use toucan_core::{Error, Result};

/// Writes a numbered sequence of still images (§4.K "sequence export").
pub struct SequenceWriter {
    dir: PathBuf,
    name_prefix: String,
    name_suffix: String,
    zero_padding: usize,
}

impl SequenceWriter {
    pub fn new(dir: impl Into<PathBuf>, name_prefix: impl Into<String>, name_suffix: impl Into<String>, zero_padding: usize) -> Self {
        Self { dir: dir.into(), name_prefix: name_prefix.into(), name_suffix: name_suffix.into(), zero_padding }
    }

    /// Writes `buf` as frame number `frame`; filename is
    /// `name_prefix + zero_pad(frame, padding) + name_suffix`.
    pub fn write_frame(&self, frame: i64, buf: &ImageBuf) -> Result<()> {
        let filename = format_sequence_frame(&self.name_prefix, frame, self.zero_padding, &self.name_suffix);
        let path = self.dir.join(&filename);
        let image_buffer =
            image::RgbaImage::from_raw(buf.spec.width as u32, buf.spec.height as u32, buf.data.clone()).ok_or_else(
                || Error::OpenFailed { path: path.clone(), cause: "image buffer size mismatch".to_string() },
            )?;
        image_buffer.save(&path).map_err(|e| Error::OpenFailed { path: path.clone(), cause: e.to_string() })
    }
}

/// Writes a movie file frame by frame (§4.K "movie export"). The encoder is
/// opened lazily on the first pushed frame, using that frame's dimensions
/// as the target size — one fixed-size encoder context set up once and
/// reused for every subsequent frame.
pub struct MovieWriter {
    path: PathBuf,
    rate: f64,
    state: Option<EncoderState>,
}

struct EncoderState {
    octx: ffmpeg::format::context::Output,
    encoder: ffmpeg::encoder::Video,
    scaler: SwsContext,
    time_base: Rational,
    width: u32,
    height: u32,
    frame_index: i64,
}

impl MovieWriter {
    pub fn create(path: impl Into<PathBuf>, rate: f64) -> Self {
        Self { path: path.into(), rate, state: None }
    }

    fn open(&mut self, width: u32, height: u32) -> Result<()> {
        let mut octx = ffmpeg::format::output(&self.path)
            .map_err(|e| Error::OpenFailed { path: self.path.clone(), cause: e.to_string() })?;

        let time_base = Rational::new(1, self.rate.round().max(1.0) as i32);
        let h264 = encoder::find(CodecId::H264)
            .ok_or_else(|| Error::OpenFailed { path: self.path.clone(), cause: "H.264 encoder not found".to_string() })?;

        let mut ost = octx
            .add_stream(h264)
            .map_err(|e| Error::OpenFailed { path: self.path.clone(), cause: e.to_string() })?;
        ost.set_time_base(time_base);

        let enc_ctx = codec::context::Context::new_with_codec(h264);
        let mut video_enc = enc_ctx
            .encoder()
            .video()
            .map_err(|e| Error::OpenFailed { path: self.path.clone(), cause: e.to_string() })?;
        video_enc.set_width(width);
        video_enc.set_height(height);
        video_enc.set_format(Pixel::YUV420P);
        video_enc.set_time_base(time_base);
        video_enc.set_frame_rate(Some(Rational::new(self.rate.round().max(1.0) as i32, 1)));
        video_enc.set_bit_rate(0);

        let mut opts = ffmpeg::Dictionary::new();
        opts.set("crf", "18");
        opts.set("preset", "fast");
        let encoder = video_enc
            .open_as_with(h264, opts)
            .map_err(|e| Error::OpenFailed { path: self.path.clone(), cause: e.to_string() })?;

        unsafe {
            let ret = ffmpeg::ffi::avcodec_parameters_from_context(
                (**(*octx.as_mut_ptr()).streams.add(0)).codecpar,
                encoder.as_ptr() as *mut ffmpeg::ffi::AVCodecContext,
            );
            if ret < 0 {
                return Err(Error::OpenFailed {
                    path: self.path.clone(),
                    cause: format!("avcodec_parameters_from_context failed: {ret}"),
                });
            }
        }

        octx.write_header().map_err(|e| Error::OpenFailed { path: self.path.clone(), cause: e.to_string() })?;

        let scaler = SwsContext::get(Pixel::RGBA, width, height, Pixel::YUV420P, width, height, Flags::BILINEAR)
            .map_err(|e| Error::OpenFailed { path: self.path.clone(), cause: e.to_string() })?;

        self.state = Some(EncoderState { octx, encoder, scaler, time_base, width, height, frame_index: 0 });
        Ok(())
    }

    /// Pushes a frame at `time`; opens the encoder on the first call, sized
    /// to that frame's spec (§4.K: "on first frame, open the movie encoder
    /// with (target_size, ...)").
    pub fn write_frame(&mut self, _time: RationalTime, buf: &ImageBuf) -> Result<()> {
        if self.state.is_none() {
            self.open(buf.spec.width as u32, buf.spec.height as u32)?;
        }
        let path = self.path.clone();
        let state = self.state.as_mut().expect("opened above");

        let mut rgba = ffmpeg::util::frame::video::Video::new(Pixel::RGBA, state.width, state.height);
        let stride = rgba.stride(0);
        {
            let data = rgba.data_mut(0);
            for row in 0..state.height as usize {
                let src_start = row * state.width as usize * 4;
                let dst_start = row * stride;
                data[dst_start..dst_start + state.width as usize * 4]
                    .copy_from_slice(&buf.data[src_start..src_start + state.width as usize * 4]);
            }
        }

        let mut yuv = ffmpeg::util::frame::video::Video::empty();
        state.scaler.run(&rgba, &mut yuv).map_err(|e| Error::OpenFailed { path: path.clone(), cause: e.to_string() })?;
        yuv.set_pts(Some(state.frame_index));
        state.frame_index += 1;

        state.encoder.send_frame(&yuv).map_err(|e| Error::OpenFailed { path: path.clone(), cause: e.to_string() })?;
        drain_packets(state, &path)
    }

    /// Flushes with a null frame and writes the container trailer (§4.K).
    pub fn close(mut self) -> Result<()> {
        let path = self.path.clone();
        if let Some(state) = self.state.as_mut() {
            state.encoder.send_eof().map_err(|e| Error::OpenFailed { path: path.clone(), cause: e.to_string() })?;
            drain_packets(state, &path)?;
            state.octx.write_trailer().map_err(|e| Error::OpenFailed { path: path.clone(), cause: e.to_string() })?;
        }
        Ok(())
    }
}

fn drain_packets(state: &mut EncoderState, path: &Path) -> Result<()> {
    let mut packet = ffmpeg::Packet::empty();
    while state.encoder.receive_packet(&mut packet).is_ok() {
        packet.set_stream(0);
        let ost_tb = state.octx.stream(0).expect("stream 0 exists").time_base();
        packet.rescale_ts(state.time_base, ost_tb);
        packet
            .write_interleaved(&mut state.octx)
            .map_err(|e| Error::OpenFailed { path: path.to_path_buf(), cause: e.to_string() })?;
    }
    Ok(())
}
