// crates/toucan-media/src/wrapper.rs
//
// The archive-aware timeline wrapper (§4.C). Owns whichever of a plain
// document, a directory archive, or a memory-mapped zip archive backs the
// timeline, and resolves every clip's media reference to either a
// filesystem path or a byte range inside the mapping. A movie file or
// still image/sequence with no timeline document at all gets a synthesized
// one-track, one-clip timeline (§4.C "degenerate timeline").

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use lru::LruCache;
use toucan_core::timeline::{
    Clip, Composable, ExternalReference, Item, MediaReference, Stack, Timeline,
};
use toucan_core::util::split_url_protocol;
use toucan_core::{Error, Result};
use toucan_core::{ImageNode, RationalTime, TimeRange};

use crate::archive::ZipArchive;
use crate::read::{ImageReadNode, MovieDecoder, MovieReadNode, SequenceReadNode};

const MOVIE_EXTENSIONS: &[&str] = &["mov", "mp4", "mkv", "avi", "webm", "m4v"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tga", "tif", "tiff"];
const DEFAULT_MOVIE_DECODER_CACHE_SIZE: usize = 8;

fn extension_of(path: &Path) -> String {
    path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase()
}

fn is_movie_extension(ext: &str) -> bool {
    MOVIE_EXTENSIONS.contains(&ext)
}

fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext)
}

/// Where a media url's bytes actually live, once resolved against whatever
/// archive (if any) backs the wrapper.
pub enum MediaLocation {
    Path(PathBuf),
    Memory { archive: Arc<ZipArchive>, entry_name: String },
}

pub struct TimelineWrapper {
    path: PathBuf,
    timeline: Timeline,
    /// Set for directory archives: the directory relative urls resolve
    /// against, instead of the document's own parent directory.
    archive_root: Option<PathBuf>,
    /// Set for zip archives: the memory-mapped bundle referenced urls are
    /// looked up in first, before falling back to a filesystem path.
    archive: Option<Arc<ZipArchive>>,
    movie_decoders: RefCell<LruCache<String, Rc<RefCell<MovieDecoder>>>>,
}

impl TimelineWrapper {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = extension_of(path);
        match ext.as_str() {
            "otio" => Self::open_plain(path),
            "otiod" => Self::open_directory_archive(path),
            "otioz" => Self::open_zip_archive(path),
            _ if is_movie_extension(&ext) => Self::open_movie_degenerate(path),
            _ if is_image_extension(&ext) => Self::open_image_degenerate(path),
            _ => Err(Error::UnsupportedFormat { extension: ext }),
        }
    }

    fn new_cache() -> RefCell<LruCache<String, Rc<RefCell<MovieDecoder>>>> {
        RefCell::new(LruCache::new(std::num::NonZeroUsize::new(DEFAULT_MOVIE_DECODER_CACHE_SIZE).unwrap()))
    }

    fn open_plain(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::OpenFailed { path: path.to_path_buf(), cause: e.to_string() })?;
        let timeline = toucan_core::timeline::schema::parse_timeline(&text)
            .map_err(|e| Error::OpenFailed { path: path.to_path_buf(), cause: e.to_string() })?;
        Ok(Self {
            path: path.to_path_buf(),
            timeline,
            archive_root: None,
            archive: None,
            movie_decoders: Self::new_cache(),
        })
    }

    fn open_directory_archive(path: &Path) -> Result<Self> {
        let content_path = path.join("content.otio");
        let text = std::fs::read_to_string(&content_path)
            .map_err(|e| Error::OpenFailed { path: content_path.clone(), cause: e.to_string() })?;
        let timeline = toucan_core::timeline::schema::parse_timeline(&text)
            .map_err(|e| Error::OpenFailed { path: content_path.clone(), cause: e.to_string() })?;
        Ok(Self {
            path: path.to_path_buf(),
            timeline,
            archive_root: Some(path.to_path_buf()),
            archive: None,
            movie_decoders: Self::new_cache(),
        })
    }

    fn open_zip_archive(path: &Path) -> Result<Self> {
        let archive = ZipArchive::open(path)?;
        let entry = archive
            .entry("content.otio")
            .ok_or_else(|| Error::OpenFailed { path: path.to_path_buf(), cause: "content.otio not found in archive".into() })?;
        // §4.C: the original retains a temp-extraction fallback for
        // compressed entries; the target drops it, so a deflated
        // content.otio is reported the same way a deflated media entry is.
        if !entry.is_stored() {
            return Err(Error::ArchiveCompressed { entry: "content.otio".to_string() });
        }
        let bytes = archive.slice(entry);
        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::OpenFailed { path: path.to_path_buf(), cause: e.to_string() })?;
        let timeline = toucan_core::timeline::schema::parse_timeline(text)
            .map_err(|e| Error::OpenFailed { path: path.to_path_buf(), cause: e.to_string() })?;
        Ok(Self {
            path: path.to_path_buf(),
            timeline,
            archive_root: None,
            archive: Some(Arc::new(archive)),
            movie_decoders: Self::new_cache(),
        })
    }

    fn open_movie_degenerate(path: &Path) -> Result<Self> {
        let decoder = MovieDecoder::open(path)?;
        let range = decoder.time_range();
        let timeline = degenerate_timeline(range, ExternalReference { url: file_url(path) });
        Ok(Self {
            path: path.to_path_buf(),
            timeline,
            archive_root: None,
            archive: None,
            movie_decoders: Self::new_cache(),
        })
    }

    fn open_image_degenerate(path: &Path) -> Result<Self> {
        let timeline = if let Some((prefix, digits, suffix)) = sequence_digits(path) {
            let dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
            let padding = digits.len();
            let frames = scan_sequence_frames(&dir, &prefix, &suffix, padding)?;
            let start_frame = frames.first().copied().unwrap_or(1);
            let frame_count = frames.len().max(1) as f64;
            let reference = toucan_core::timeline::ImageSequenceReference {
                url_base: format!("{}/", dir.to_string_lossy()),
                name_prefix: prefix,
                name_suffix: suffix,
                start_frame,
                frame_step: 1,
                rate: 24.0,
                zero_padding: padding,
            };
            degenerate_sequence_timeline(
                TimeRange::new(RationalTime::new(start_frame as f64, 24.0), RationalTime::new(frame_count, 24.0)),
                reference,
            )
        } else {
            let range = TimeRange::new(RationalTime::new(0.0, 24.0), RationalTime::new(1.0, 24.0));
            degenerate_timeline(range, ExternalReference { url: file_url(path) })
        };
        Ok(Self {
            path: path.to_path_buf(),
            timeline,
            archive_root: None,
            archive: None,
            movie_decoders: Self::new_cache(),
        })
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn time_range(&self) -> TimeRange {
        self.timeline.time_range()
    }

    fn archive_entry_name(&self, url: &str) -> String {
        let (_, rest) = split_url_protocol(url);
        rest.trim_start_matches("./").trim_start_matches('/').to_string()
    }

    /// §4.C: returns the url unchanged for archive-memory references
    /// (caller must consult `memory_reference`); an absolute filesystem
    /// path otherwise.
    pub fn resolve_media_path(&self, url: &str) -> Result<String> {
        if let Some(archive) = &self.archive {
            let entry_name = self.archive_entry_name(url);
            if archive.entry(&entry_name).is_some() {
                return Ok(url.to_string());
            }
        }
        match self.locate(url)? {
            MediaLocation::Path(p) => Ok(p.to_string_lossy().into_owned()),
            MediaLocation::Memory { .. } => Ok(url.to_string()),
        }
    }

    /// §4.C: byte range for a url backed by the archive mapping, if any.
    pub fn memory_reference(&self, url: &str) -> Option<(u64, u64)> {
        let archive = self.archive.as_ref()?;
        let entry_name = self.archive_entry_name(url);
        archive.entry(&entry_name).map(|e| (e.offset, e.len))
    }

    fn locate(&self, url: &str) -> Result<MediaLocation> {
        if let Some(archive) = &self.archive {
            let entry_name = self.archive_entry_name(url);
            if archive.entry(&entry_name).is_some() {
                return Ok(MediaLocation::Memory { archive: Arc::clone(archive), entry_name });
            }
        }
        let (_, rest) = split_url_protocol(url);
        let candidate = PathBuf::from(rest);
        let resolved = if candidate.is_absolute() {
            candidate
        } else if let Some(root) = &self.archive_root {
            root.join(rest)
        } else if let Some(parent) = self.path.parent() {
            parent.join(rest)
        } else {
            candidate
        };
        Ok(MediaLocation::Path(resolved))
    }

    fn movie_decoder_for(&self, url: &str, path: PathBuf) -> Result<Rc<RefCell<MovieDecoder>>> {
        if let Some(existing) = self.movie_decoders.borrow_mut().get(url) {
            return Ok(Rc::clone(existing));
        }
        let decoder = Rc::new(RefCell::new(MovieDecoder::open(&path)?));
        self.movie_decoders.borrow_mut().put(url.to_string(), Rc::clone(&decoder));
        Ok(decoder)
    }

    /// §4.G step 1: iterate video clips until one yields a defined spec.
    pub fn probe_image_size(&self) -> Option<(usize, usize)> {
        for clip in self.iter_clips() {
            if let Some(spec) = self.probe_clip(clip) {
                return Some((spec.width, spec.height));
            }
        }
        None
    }

    fn probe_clip(&self, clip: &Clip) -> Option<toucan_core::node::ImageSpec> {
        match &clip.media_reference {
            MediaReference::External(ext) => {
                let ext_kind = extension_of(Path::new(&ext.url));
                if is_movie_extension(&ext_kind) {
                    let path = match self.locate(&ext.url).ok()? {
                        MediaLocation::Path(p) => p,
                        MediaLocation::Memory { .. } => return None,
                    };
                    MovieDecoder::open(&path).ok().map(|d| d.spec())
                } else {
                    match self.locate(&ext.url).ok()? {
                        MediaLocation::Path(p) => ImageReadNode::from_disk(p, "probe").spec().ok(),
                        MediaLocation::Memory { archive, entry_name } => {
                            ImageReadNode::from_archive(archive, entry_name, "probe").spec().ok()
                        }
                    }
                }
            }
            MediaReference::ImageSequence(seq) => {
                let node = self.make_sequence_read_node(seq, "probe").ok()?;
                node.spec().ok()
            }
            MediaReference::Generator(_) => None,
        }
    }

    fn iter_clips(&self) -> Vec<&Clip> {
        let mut out = Vec::new();
        collect_clips(&self.timeline.tracks, &mut out);
        out
    }

    fn make_sequence_read_node(
        &self,
        seq: &toucan_core::timeline::ImageSequenceReference,
        label: impl Into<String> + Clone,
    ) -> Result<SequenceReadNode> {
        if let Some(archive) = &self.archive {
            let base_name = self.archive_entry_name(&seq.url_base);
            return Ok(SequenceReadNode::from_archive(
                Arc::clone(archive),
                base_name,
                seq.name_prefix.clone(),
                seq.name_suffix.clone(),
                seq.start_frame,
                seq.frame_step,
                seq.rate,
                seq.zero_padding,
                label,
            ));
        }
        let (_, rest) = split_url_protocol(&seq.url_base);
        let candidate = PathBuf::from(rest);
        let base_dir = if candidate.is_absolute() {
            candidate
        } else if let Some(root) = &self.archive_root {
            root.join(rest)
        } else if let Some(parent) = self.path.parent() {
            parent.join(rest)
        } else {
            candidate
        };
        Ok(SequenceReadNode::from_disk(
            base_dir,
            seq.name_prefix.clone(),
            seq.name_suffix.clone(),
            seq.start_frame,
            seq.frame_step,
            seq.rate,
            seq.zero_padding,
            label,
        ))
    }

    /// §4.D: selects the concrete Read node for a clip's media reference.
    /// `ExternalReference` dispatches on file extension between
    /// `ImageRead` and `MovieRead`; `ImageSequenceReference` always builds
    /// a `SequenceRead`. Generator references are not handled here — the
    /// compiler asks the effect host for those instead (§4.G). Returns the
    /// node's own `time_range()` alongside it, since §4.G's per-item
    /// construction needs to compare it against `clip.available_range`
    /// before the node is boxed and that inherent method is lost.
    pub fn make_read_node(
        &self,
        clip: &Clip,
        label: impl Into<String> + Clone,
    ) -> Result<(Box<dyn ImageNode>, TimeRange)> {
        match &clip.media_reference {
            MediaReference::External(ext) => {
                let ext_kind = extension_of(Path::new(&ext.url));
                if is_movie_extension(&ext_kind) {
                    let path = match self.locate(&ext.url)? {
                        MediaLocation::Path(p) => p,
                        MediaLocation::Memory { .. } => {
                            return Err(Error::UnsupportedFormat { extension: ext_kind });
                        }
                    };
                    let decoder = self.movie_decoder_for(&ext.url, path)?;
                    let range = decoder.borrow().time_range();
                    Ok((Box::new(MovieReadNode::new(decoder, label)), range))
                } else {
                    match self.locate(&ext.url)? {
                        MediaLocation::Path(p) => {
                            let node = ImageReadNode::from_disk(p, label);
                            let range = node.time_range();
                            Ok((Box::new(node), range))
                        }
                        MediaLocation::Memory { archive, entry_name } => {
                            let node = ImageReadNode::from_archive(archive, entry_name, label);
                            let range = node.time_range();
                            Ok((Box::new(node), range))
                        }
                    }
                }
            }
            MediaReference::ImageSequence(seq) => {
                let node = self.make_sequence_read_node(seq, label)?;
                let range = node.time_range();
                Ok((Box::new(node), range))
            }
            MediaReference::Generator(_) => Err(Error::UnsupportedFormat { extension: "generator".to_string() }),
        }
    }
}

fn file_url(path: &Path) -> String {
    format!("file://{}", path.to_string_lossy())
}

fn sequence_digits(path: &Path) -> Option<(String, String, String)> {
    let stem = path.file_stem()?.to_str()?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let (prefix, digits, mid_suffix) = toucan_core::util::split_file_name_number(stem)?;
    if digits.is_empty() || !mid_suffix.is_empty() {
        return None;
    }
    let suffix = if ext.is_empty() { String::new() } else { format!(".{ext}") };
    Some((prefix.to_string(), digits.to_string(), suffix))
}

fn scan_sequence_frames(dir: &Path, prefix: &str, suffix: &str, padding: usize) -> Result<Vec<i64>> {
    let entries =
        std::fs::read_dir(dir).map_err(|e| Error::OpenFailed { path: dir.to_path_buf(), cause: e.to_string() })?;
    let mut frames = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some((file_prefix, digits, file_suffix)) = toucan_core::util::split_file_name_number(name) {
            if file_prefix == prefix && file_suffix == suffix && digits.len() == padding {
                if let Ok(n) = digits.parse::<i64>() {
                    frames.push(n);
                }
            }
        }
    }
    frames.sort_unstable();
    Ok(frames)
}

fn collect_clips<'a>(stack: &'a Stack, out: &mut Vec<&'a Clip>) {
    for track in &stack.tracks {
        for child in &track.children {
            if let Composable::Item(item) = child {
                match item {
                    Item::Clip(c) => out.push(c),
                    Item::Stack(s) => collect_clips(s, out),
                    Item::Gap(_) => {}
                }
            }
        }
    }
}

fn degenerate_timeline(range: TimeRange, reference: ExternalReference) -> Timeline {
    use toucan_core::timeline::{ItemBase, Track, TrackKind};
    let clip = Item::Clip(Clip {
        base: ItemBase { name: "clip".to_string(), effects: Vec::new(), source_range: Some(range) },
        media_reference: MediaReference::External(reference),
        available_range: Some(range),
    });
    let track = Track {
        name: "V1".to_string(),
        kind: TrackKind::Video,
        children: vec![Composable::Item(clip)],
        effects: Vec::new(),
        source_range: None,
    };
    Timeline {
        name: "degenerate".to_string(),
        global_start_time: range.start,
        tracks: Stack { effects: Vec::new(), source_range: None, tracks: vec![track] },
    }
}

fn degenerate_sequence_timeline(range: TimeRange, reference: toucan_core::timeline::ImageSequenceReference) -> Timeline {
    use toucan_core::timeline::{ItemBase, Track, TrackKind};
    let clip = Item::Clip(Clip {
        base: ItemBase { name: "sequence".to_string(), effects: Vec::new(), source_range: Some(range) },
        media_reference: MediaReference::ImageSequence(reference),
        available_range: Some(range),
    });
    let track = Track {
        name: "V1".to_string(),
        kind: TrackKind::Video,
        children: vec![Composable::Item(clip)],
        effects: Vec::new(),
        source_range: None,
    };
    Timeline {
        name: "degenerate-sequence".to_string(),
        global_start_time: range.start,
        tracks: Stack { effects: Vec::new(), source_range: None, tracks: vec![track] },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_digits_splits_stem() {
        let (prefix, digits, suffix) = sequence_digits(Path::new("/tmp/render.0042.png")).unwrap();
        assert_eq!(prefix, "render.");
        assert_eq!(digits, "0042");
        assert_eq!(suffix, ".png");
    }

    #[test]
    fn sequence_digits_none_for_plain_stem() {
        assert!(sequence_digits(Path::new("/tmp/picture.png")).is_none());
    }
}
