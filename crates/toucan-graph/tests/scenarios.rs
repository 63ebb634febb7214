// End-to-end scenarios against the compiler + driver, exercising a real
// timeline document on disk and real decoded frames rather than hand-built
// node trees — the integration-level counterpart to the inline unit tests
// in each crate. Mirrors the pack's own `tests/smoke.rs` style: plain
// `#[test]` functions driving the crate's public API.

use std::cell::RefCell;
use std::rc::Rc;

use image::{Rgba, RgbaImage};
use toucan_core::time::RationalTime;
use toucan_core::EffectRegistry;
use toucan_graph::{render_frame, Compiler};
use toucan_host::Host;
use toucan_media::TimelineWrapper;

fn write_frame(dir: &std::path::Path, name: &str, color: [u8; 4]) {
    let img = RgbaImage::from_pixel(4, 4, Rgba(color));
    img.save(dir.join(name)).unwrap();
}

fn empty_host() -> Rc<RefCell<Host>> {
    Rc::new(RefCell::new(Host::discover(&[], &["generator", "filter", "transition"]).unwrap()))
}

/// §8 scenario 1: a single 24-frame image-sequence clip. At time 12@24 the
/// compiler should select frame 13 (`start_frame` 1 + floor(12)), and the
/// rendered output should equal that frame's decoded pixels composited
/// opaquely over the background.
#[test]
fn single_clip_identity_selects_expected_frame() {
    let dir = tempfile::tempdir().unwrap();
    for frame in 1..=24 {
        write_frame(dir.path(), &format!("render.{frame:04}.png"), [frame as u8 * 5, 0, 0, 255]);
    }

    let doc = format!(
        r#"{{
            "OTIO_SCHEMA": "Timeline.1",
            "name": "identity",
            "global_start_time": {{ "value": 0.0, "rate": 24.0 }},
            "tracks": {{
                "OTIO_SCHEMA": "Stack.1",
                "children": [
                    {{
                        "OTIO_SCHEMA": "Track.1",
                        "name": "V1",
                        "kind": "Video",
                        "children": [
                            {{
                                "OTIO_SCHEMA": "Clip.2",
                                "name": "c1",
                                "source_range": {{
                                    "start_time": {{ "value": 0.0, "rate": 24.0 }},
                                    "duration": {{ "value": 24.0, "rate": 24.0 }}
                                }},
                                "available_range": {{
                                    "start_time": {{ "value": 0.0, "rate": 24.0 }},
                                    "duration": {{ "value": 24.0, "rate": 24.0 }}
                                }},
                                "media_reference": {{
                                    "OTIO_SCHEMA": "ImageSequenceReference.1",
                                    "target_url_base": "{base}/",
                                    "name_prefix": "render.",
                                    "name_suffix": ".png",
                                    "start_frame": 1,
                                    "frame_step": 1,
                                    "rate": 24.0,
                                    "frame_zero_padding": 4
                                }}
                            }}
                        ]
                    }}
                ]
            }}
        }}"#,
        base = dir.path().to_string_lossy()
    );

    let doc_path = dir.path().join("timeline.otio");
    std::fs::write(&doc_path, doc).unwrap();

    let wrapper = TimelineWrapper::open(&doc_path).unwrap();
    let host = empty_host();
    let compiler = Compiler::new(&wrapper, host, EffectRegistry::new());

    let frame = render_frame(&compiler, &wrapper, RationalTime::new(12.0, 24.0), None).unwrap();
    // Frame 13's color: 13 * 5 = 65.
    assert_eq!(&frame.data[0..4], &[65, 0, 0, 255]);
}

/// §8 scenario 3: a clip with a 2x `LinearTimeWarp` effect. At parent time
/// 10@24 the read should be evaluated at 20@24 (frame 21).
#[test]
fn linear_speed_up_doubles_query_time() {
    let dir = tempfile::tempdir().unwrap();
    for frame in 1..=48 {
        write_frame(dir.path(), &format!("render.{frame:04}.png"), [0, frame as u8, 0, 255]);
    }

    let doc = format!(
        r#"{{
            "OTIO_SCHEMA": "Timeline.1",
            "name": "speed-up",
            "global_start_time": {{ "value": 0.0, "rate": 24.0 }},
            "tracks": {{
                "OTIO_SCHEMA": "Stack.1",
                "children": [
                    {{
                        "OTIO_SCHEMA": "Track.1",
                        "name": "V1",
                        "kind": "Video",
                        "children": [
                            {{
                                "OTIO_SCHEMA": "Clip.2",
                                "name": "c1",
                                "available_range": {{
                                    "start_time": {{ "value": 0.0, "rate": 24.0 }},
                                    "duration": {{ "value": 48.0, "rate": 24.0 }}
                                }},
                                "effects": [
                                    {{
                                        "OTIO_SCHEMA": "LinearTimeWarp.1",
                                        "time_scalar": 2.0
                                    }}
                                ],
                                "media_reference": {{
                                    "OTIO_SCHEMA": "ImageSequenceReference.1",
                                    "target_url_base": "{base}/",
                                    "name_prefix": "render.",
                                    "name_suffix": ".png",
                                    "start_frame": 1,
                                    "frame_step": 1,
                                    "rate": 24.0,
                                    "frame_zero_padding": 4
                                }}
                            }}
                        ]
                    }}
                ]
            }}
        }}"#,
        base = dir.path().to_string_lossy()
    );

    let doc_path = dir.path().join("timeline.otio");
    std::fs::write(&doc_path, doc).unwrap();

    let wrapper = TimelineWrapper::open(&doc_path).unwrap();
    let host = empty_host();
    let compiler = Compiler::new(&wrapper, host, EffectRegistry::new());

    let frame = render_frame(&compiler, &wrapper, RationalTime::new(10.0, 24.0), None).unwrap();
    // Frame 21's color: green channel = 21.
    assert_eq!(&frame.data[0..4], &[0, 21, 0, 255]);
}

/// §8 scenario 6: an empty timeline (no tracks) renders without error to a
/// zero-sized frame.
#[test]
fn empty_timeline_renders_zero_sized_frame_without_error() {
    let dir = tempfile::tempdir().unwrap();
    let doc = r#"{
        "OTIO_SCHEMA": "Timeline.1",
        "name": "empty",
        "global_start_time": { "value": 0.0, "rate": 24.0 },
        "tracks": { "OTIO_SCHEMA": "Stack.1", "children": [] }
    }"#;
    let doc_path = dir.path().join("timeline.otio");
    std::fs::write(&doc_path, doc).unwrap();

    let wrapper = TimelineWrapper::open(&doc_path).unwrap();
    let host = empty_host();
    let compiler = Compiler::new(&wrapper, host, EffectRegistry::new());

    let frame = render_frame(&compiler, &wrapper, RationalTime::new(0.0, 24.0), None).unwrap();
    assert_eq!(frame.width(), 0);
    assert_eq!(frame.height(), 0);
}

/// §8 scenario 2: two clips joined by a transition with no matching plugin
/// fall back to the built-in `Dissolve`. At the transition's midpoint the
/// composited pixel should be an even blend of the outgoing and incoming
/// clips' colors.
#[test]
fn crossfade_blends_outgoing_and_incoming_at_midpoint() {
    let dir = tempfile::tempdir().unwrap();
    for frame in 1..=36 {
        write_frame(dir.path(), &format!("a.{frame:04}.png", frame = frame), [200, 0, 0, 255]);
        write_frame(dir.path(), &format!("b.{frame:04}.png", frame = frame), [0, 0, 200, 255]);
    }

    let doc = format!(
        r#"{{
            "OTIO_SCHEMA": "Timeline.1",
            "name": "crossfade",
            "global_start_time": {{ "value": 0.0, "rate": 24.0 }},
            "tracks": {{
                "OTIO_SCHEMA": "Stack.1",
                "children": [
                    {{
                        "OTIO_SCHEMA": "Track.1",
                        "name": "V1",
                        "kind": "Video",
                        "children": [
                            {{
                                "OTIO_SCHEMA": "Clip.2",
                                "name": "c1",
                                "available_range": {{
                                    "start_time": {{ "value": 0.0, "rate": 24.0 }},
                                    "duration": {{ "value": 24.0, "rate": 24.0 }}
                                }},
                                "media_reference": {{
                                    "OTIO_SCHEMA": "ImageSequenceReference.1",
                                    "target_url_base": "{base}/",
                                    "name_prefix": "a.",
                                    "name_suffix": ".png",
                                    "start_frame": 1,
                                    "frame_step": 1,
                                    "rate": 24.0,
                                    "frame_zero_padding": 4
                                }}
                            }},
                            {{
                                "OTIO_SCHEMA": "Transition.1",
                                "transition_type": "SMPTE_Dissolve",
                                "in_offset": {{ "value": 6.0, "rate": 24.0 }},
                                "out_offset": {{ "value": 6.0, "rate": 24.0 }}
                            }},
                            {{
                                "OTIO_SCHEMA": "Clip.2",
                                "name": "c2",
                                "available_range": {{
                                    "start_time": {{ "value": 0.0, "rate": 24.0 }},
                                    "duration": {{ "value": 24.0, "rate": 24.0 }}
                                }},
                                "media_reference": {{
                                    "OTIO_SCHEMA": "ImageSequenceReference.1",
                                    "target_url_base": "{base}/",
                                    "name_prefix": "b.",
                                    "name_suffix": ".png",
                                    "start_frame": 1,
                                    "frame_step": 1,
                                    "rate": 24.0,
                                    "frame_zero_padding": 4
                                }}
                            }}
                        ]
                    }}
                ]
            }}
        }}"#,
        base = dir.path().to_string_lossy()
    );

    let doc_path = dir.path().join("timeline.otio");
    std::fs::write(&doc_path, doc).unwrap();

    let wrapper = TimelineWrapper::open(&doc_path).unwrap();
    let host = empty_host();
    let compiler = Compiler::new(&wrapper, host, EffectRegistry::new());

    // Transition spans [18, 30); its midpoint sits at the cut point, 24.
    let frame = render_frame(&compiler, &wrapper, RationalTime::new(24.0, 24.0), None).unwrap();
    assert_eq!(&frame.data[0..4], &[100, 0, 100, 255]);
}

/// §8 invariant 6: the same clip content rendered through a directory
/// archive (`.otiod`) and a stored-mode zip archive (`.otioz`) must produce
/// identical pixels — the archive backing a timeline is an implementation
/// detail media resolution hides.
#[test]
fn zip_archive_renders_same_as_directory_archive() {
    let still = image::RgbaImage::from_pixel(4, 4, image::Rgba([50, 60, 70, 255]));
    let scratch = tempfile::tempdir().unwrap();
    let still_path = scratch.path().join("still.png");
    still.save(&still_path).unwrap();
    let png_bytes = std::fs::read(&still_path).unwrap();

    let doc = r#"{
        "OTIO_SCHEMA": "Timeline.1",
        "name": "archived",
        "global_start_time": { "value": 0.0, "rate": 24.0 },
        "tracks": {
            "OTIO_SCHEMA": "Stack.1",
            "children": [
                {
                    "OTIO_SCHEMA": "Track.1",
                    "name": "V1",
                    "kind": "Video",
                    "children": [
                        {
                            "OTIO_SCHEMA": "Clip.2",
                            "name": "c1",
                            "source_range": {
                                "start_time": { "value": 0.0, "rate": 24.0 },
                                "duration": { "value": 24.0, "rate": 24.0 }
                            },
                            "media_reference": {
                                "OTIO_SCHEMA": "ExternalReference.1",
                                "target_url": "media/still.png"
                            }
                        }
                    ]
                }
            ]
        }
    }"#;

    // Directory archive: content.otio plus the referenced media file under
    // the archive's own root.
    let dir_root = tempfile::tempdir().unwrap();
    let otiod_path = dir_root.path().join("bundle.otiod");
    std::fs::create_dir_all(otiod_path.join("media")).unwrap();
    std::fs::write(otiod_path.join("content.otio"), doc).unwrap();
    std::fs::write(otiod_path.join("media").join("still.png"), &png_bytes).unwrap();

    // Zip archive: the same two entries, both stored uncompressed.
    let zip_bytes = build_zip(&[("content.otio", doc.as_bytes()), ("media/still.png", &png_bytes)]);
    let otioz_path = dir_root.path().join("bundle.otioz");
    std::fs::write(&otioz_path, zip_bytes).unwrap();

    let host_dir = empty_host();
    let wrapper_dir = TimelineWrapper::open(&otiod_path).unwrap();
    let compiler_dir = Compiler::new(&wrapper_dir, host_dir, EffectRegistry::new());
    let frame_dir = render_frame(&compiler_dir, &wrapper_dir, RationalTime::new(0.0, 24.0), None).unwrap();

    let host_zip = empty_host();
    let wrapper_zip = TimelineWrapper::open(&otioz_path).unwrap();
    let compiler_zip = Compiler::new(&wrapper_zip, host_zip, EffectRegistry::new());
    let frame_zip = render_frame(&compiler_zip, &wrapper_zip, RationalTime::new(0.0, 24.0), None).unwrap();

    assert_eq!(frame_dir.data, frame_zip.data);
    assert_eq!(&frame_dir.data[0..4], &[50, 60, 70, 255]);
}

/// Builds a minimal multi-entry stored-mode zip in memory, the same layout
/// `archive::zip`'s own unit tests use for a single entry, extended to
/// several so a `content.otio` plus its referenced media can share one
/// `.otioz` fixture.
fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    const CENTRAL_DIR_SIGNATURE: u32 = 0x0201_4b50;
    const EOCD_SIGNATURE: u32 = 0x0605_4b50;

    let mut out = Vec::new();
    let mut central = Vec::new();
    let mut offsets = Vec::new();

    for (name, content) in entries {
        offsets.push(out.len() as u32);
        out.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(content.len() as u32).to_le_bytes());
        out.extend_from_slice(&(content.len() as u32).to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(content);
    }

    let cd_start = out.len() as u32;
    for ((name, content), local_offset) in entries.iter().zip(offsets.iter()) {
        central.extend_from_slice(&CENTRAL_DIR_SIGNATURE.to_le_bytes());
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u32.to_le_bytes());
        central.extend_from_slice(&(content.len() as u32).to_le_bytes());
        central.extend_from_slice(&(content.len() as u32).to_le_bytes());
        central.extend_from_slice(&(name.len() as u16).to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u32.to_le_bytes());
        central.extend_from_slice(&local_offset.to_le_bytes());
        central.extend_from_slice(name.as_bytes());
    }
    let cd_size = central.len() as u32;
    out.extend_from_slice(&central);

    out.extend_from_slice(&EOCD_SIGNATURE.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    out.extend_from_slice(&cd_size.to_le_bytes());
    out.extend_from_slice(&cd_start.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out
}

/// §8 invariant 5: a 3-channel source still decodes into a 4-channel buffer
/// with alpha fully opaque.
#[test]
fn three_channel_source_synthesizes_opaque_alpha() {
    let dir = tempfile::tempdir().unwrap();
    let rgb = image::RgbImage::from_pixel(4, 4, image::Rgb([10, 20, 30]));
    let path = dir.path().join("still.png");
    rgb.save(&path).unwrap();

    let doc = format!(
        r#"{{
            "OTIO_SCHEMA": "Timeline.1",
            "name": "still",
            "global_start_time": {{ "value": 0.0, "rate": 24.0 }},
            "tracks": {{
                "OTIO_SCHEMA": "Stack.1",
                "children": [
                    {{
                        "OTIO_SCHEMA": "Track.1",
                        "name": "V1",
                        "kind": "Video",
                        "children": [
                            {{
                                "OTIO_SCHEMA": "Clip.2",
                                "name": "c1",
                                "source_range": {{
                                    "start_time": {{ "value": 0.0, "rate": 24.0 }},
                                    "duration": {{ "value": 24.0, "rate": 24.0 }}
                                }},
                                "media_reference": {{
                                    "OTIO_SCHEMA": "ExternalReference.1",
                                    "target_url": "{url}"
                                }}
                            }}
                        ]
                    }}
                ]
            }}
        }}"#,
        url = path.to_string_lossy()
    );

    let doc_path = dir.path().join("timeline.otio");
    std::fs::write(&doc_path, doc).unwrap();

    let wrapper = TimelineWrapper::open(&doc_path).unwrap();
    let host = empty_host();
    let compiler = Compiler::new(&wrapper, host, EffectRegistry::new());

    let frame = render_frame(&compiler, &wrapper, RationalTime::new(0.0, 24.0), None).unwrap();
    assert_eq!(frame.data[0..4], [10, 20, 30, 255]);
}
