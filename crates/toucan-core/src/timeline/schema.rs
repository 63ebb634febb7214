// crates/toucan-core/src/timeline/schema.rs
//
// Parses the on-disk timeline document (§6: "text JSON conforming to the
// established interchange schema for non-linear editing timelines") into
// the typed model in the rest of this module. Read-only — nothing here
// writes a timeline back out.
//
// Shape (every node carries an `OTIO_SCHEMA` discriminant the way the real
// interchange format does):
//
//   Timeline.1   { name, global_start_time, tracks: Stack.1 }
//   Stack.1      { effects?, children: [Track.1, ...] }
//   Track.1      { name, kind: "Video"|"Audio", effects?, children: [...] }
//   Clip.2       { name, source_range?, available_range?, effects?, media_reference }
//   Gap.1        { name?, source_range }
//   Transition.1 { transition_type, in_offset, out_offset, metadata? }
//   ExternalReference.1       { target_url }
//   ImageSequenceReference.1  { target_url_base, name_prefix, name_suffix,
//                                start_frame, frame_step, rate, frame_zero_padding }
//   GeneratorReference.1      { generator_kind, parameters? }
//   Effect.1 / LinearTimeWarp.1 { effect_name?, time_scalar?, metadata? }

use serde_json::Value;

use crate::time::{RationalTime, TimeRange};
use crate::timeline::effect::{Effect, Parameters};
use crate::timeline::item::{Clip, Gap, Item, ItemBase, Stack};
use crate::timeline::media_reference::{ExternalReference, GeneratorReference, ImageSequenceReference, MediaReference};
use crate::timeline::track::{Track, TrackKind};
use crate::timeline::transition::Transition;
use crate::timeline::{Composable, Timeline};

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("unrecognized OTIO_SCHEMA value: {0}")]
    UnknownSchema(String),
}

type Result<T> = std::result::Result<T, SchemaError>;

pub fn parse_timeline(text: &str) -> Result<Timeline> {
    let value: Value = serde_json::from_str(text)?;
    parse_timeline_value(&value)
}

fn parse_timeline_value(value: &Value) -> Result<Timeline> {
    let name = string_field(value, "name").unwrap_or_default();
    let global_start_time = value
        .get("global_start_time")
        .map(parse_rational_time)
        .transpose()?
        .unwrap_or(RationalTime::new(0.0, 24.0));
    let tracks_value = value.get("tracks").ok_or(SchemaError::MissingField("tracks"))?;
    let tracks = parse_stack(tracks_value)?;
    Ok(Timeline { name, global_start_time, tracks })
}

fn schema_name(value: &Value) -> Option<&str> {
    value.get("OTIO_SCHEMA").and_then(Value::as_str)
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn parse_rational_time(value: &Value) -> Result<RationalTime> {
    let v = value.get("value").and_then(Value::as_f64).unwrap_or(0.0);
    let rate = value.get("rate").and_then(Value::as_f64).unwrap_or(24.0);
    Ok(RationalTime::new(v, rate))
}

fn parse_time_range(value: &Value) -> Result<TimeRange> {
    let start = value.get("start_time").map(parse_rational_time).transpose()?
        .unwrap_or(RationalTime::new(0.0, 24.0));
    let duration = value.get("duration").map(parse_rational_time).transpose()?
        .unwrap_or(RationalTime::new(0.0, 24.0));
    Ok(TimeRange::new(start, duration))
}

fn parse_optional_time_range(value: &Value, key: &str) -> Result<Option<TimeRange>> {
    match value.get(key) {
        Some(v) if !v.is_null() => Ok(Some(parse_time_range(v)?)),
        _ => Ok(None),
    }
}

fn parse_parameters(value: &Value, key: &str) -> Parameters {
    value
        .get(key)
        .and_then(Value::as_object)
        .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

fn parse_effects(value: &Value) -> Result<Vec<Effect>> {
    let Some(arr) = value.get("effects").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };
    arr.iter().map(parse_effect).collect()
}

fn parse_effect(value: &Value) -> Result<Effect> {
    let schema = schema_name(value).unwrap_or("Effect.1");
    let effect_name = string_field(value, "effect_name").unwrap_or_else(|| {
        schema.split('.').next().unwrap_or(schema).to_string()
    });
    let mut parameters = parse_parameters(value, "metadata");
    if parameters.is_empty() {
        parameters = parse_parameters(value, "parameters");
    }
    if schema.starts_with("LinearTimeWarp") {
        if let Some(scalar) = value.get("time_scalar").and_then(Value::as_f64) {
            parameters.insert("time_scalar".to_string(), Value::from(scalar));
        }
        return Ok(Effect::new("LinearTimeWarp", parameters));
    }
    Ok(Effect::new(effect_name, parameters))
}

fn parse_media_reference(value: &Value) -> Result<MediaReference> {
    let schema = schema_name(value).unwrap_or_default();
    if schema.starts_with("ExternalReference") {
        let url = string_field(value, "target_url").ok_or(SchemaError::MissingField("target_url"))?;
        Ok(MediaReference::External(ExternalReference { url }))
    } else if schema.starts_with("ImageSequenceReference") {
        Ok(MediaReference::ImageSequence(ImageSequenceReference {
            url_base: string_field(value, "target_url_base").unwrap_or_default(),
            name_prefix: string_field(value, "name_prefix").unwrap_or_default(),
            name_suffix: string_field(value, "name_suffix").unwrap_or_default(),
            start_frame: value.get("start_frame").and_then(Value::as_i64).unwrap_or(1),
            frame_step: value.get("frame_step").and_then(Value::as_i64).unwrap_or(1),
            rate: value.get("rate").and_then(Value::as_f64).unwrap_or(24.0),
            zero_padding: value.get("frame_zero_padding").and_then(Value::as_u64).unwrap_or(0) as usize,
        }))
    } else if schema.starts_with("GeneratorReference") {
        Ok(MediaReference::Generator(GeneratorReference {
            kind: string_field(value, "generator_kind").unwrap_or_default(),
            parameters: parse_parameters(value, "parameters"),
        }))
    } else {
        Err(SchemaError::UnknownSchema(schema.to_string()))
    }
}

fn parse_item(value: &Value) -> Result<Item> {
    let schema = schema_name(value).unwrap_or_default();
    let base = ItemBase {
        name: string_field(value, "name").unwrap_or_default(),
        effects: parse_effects(value)?,
        source_range: parse_optional_time_range(value, "source_range")?,
    };
    if schema.starts_with("Clip") {
        let media_reference = value
            .get("media_reference")
            .map(parse_media_reference)
            .transpose()?
            .unwrap_or(MediaReference::External(ExternalReference { url: String::new() }));
        let available_range = parse_optional_time_range(value, "available_range")?;
        Ok(Item::Clip(Clip { base, media_reference, available_range }))
    } else if schema.starts_with("Gap") {
        Ok(Item::Gap(Gap { base }))
    } else if schema.starts_with("Stack") {
        let children = value
            .get("children")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().map(parse_track).collect::<Result<Vec<_>>>())
            .transpose()?
            .unwrap_or_default();
        Ok(Item::Stack(Stack { effects: base.effects, source_range: base.source_range, tracks: children }))
    } else {
        Err(SchemaError::UnknownSchema(schema.to_string()))
    }
}

fn parse_transition(value: &Value) -> Result<Transition> {
    let transition_type = string_field(value, "transition_type").unwrap_or_default();
    let in_offset = value.get("in_offset").map(parse_rational_time).transpose()?
        .unwrap_or(RationalTime::new(0.0, 24.0));
    let out_offset = value.get("out_offset").map(parse_rational_time).transpose()?
        .unwrap_or(RationalTime::new(0.0, 24.0));
    let parameters = parse_parameters(value, "metadata");
    Ok(Transition::new(transition_type, in_offset, out_offset, parameters))
}

fn parse_composable(value: &Value) -> Result<Composable> {
    let schema = schema_name(value).unwrap_or_default();
    if schema.starts_with("Transition") {
        Ok(Composable::Transition(parse_transition(value)?))
    } else {
        Ok(Composable::Item(parse_item(value)?))
    }
}

fn parse_track(value: &Value) -> Result<Track> {
    let name = string_field(value, "name").unwrap_or_default();
    let kind = match string_field(value, "kind").as_deref() {
        Some("Audio") => TrackKind::Audio,
        _ => TrackKind::Video,
    };
    let effects = parse_effects(value)?;
    let source_range = parse_optional_time_range(value, "source_range")?;
    let children = value
        .get("children")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().map(parse_composable).collect::<Result<Vec<_>>>())
        .transpose()?
        .unwrap_or_default();
    Ok(Track { name, kind, children, effects, source_range })
}

fn parse_stack(value: &Value) -> Result<Stack> {
    let effects = parse_effects(value)?;
    let source_range = parse_optional_time_range(value, "source_range")?;
    let tracks = value
        .get("children")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().map(parse_track).collect::<Result<Vec<_>>>())
        .transpose()?
        .unwrap_or_default();
    Ok(Stack { effects, source_range, tracks })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_clip_doc() -> &'static str {
        r#"
        {
            "OTIO_SCHEMA": "Timeline.1",
            "name": "single clip",
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
                                "name": "clip-1",
                                "source_range": {
                                    "start_time": { "value": 0.0, "rate": 24.0 },
                                    "duration": { "value": 24.0, "rate": 24.0 }
                                },
                                "media_reference": {
                                    "OTIO_SCHEMA": "ExternalReference.1",
                                    "target_url": "file:///clip.mov"
                                }
                            }
                        ]
                    }
                ]
            }
        }
        "#
    }

    #[test]
    fn parses_single_clip_timeline() {
        let tl = parse_timeline(single_clip_doc()).unwrap();
        assert_eq!(tl.name, "single clip");
        assert_eq!(tl.tracks.tracks.len(), 1);
        let track = &tl.tracks.tracks[0];
        assert_eq!(track.children.len(), 1);
        match track.children[0].as_item().unwrap() {
            Item::Clip(c) => {
                assert_eq!(c.media_reference.as_external().unwrap().url, "file:///clip.mov");
            }
            _ => panic!("expected clip"),
        }
    }

    #[test]
    fn unknown_schema_errors() {
        let v: Value = serde_json::from_str(r#"{"OTIO_SCHEMA": "Mystery.7"}"#).unwrap();
        assert!(parse_item(&v).is_err());
    }
}
