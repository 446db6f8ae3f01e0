use serde::Serialize;
use serde_json::json;
use vgm_render_core::{FormatRegistry, StreamInfo};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize)]
struct InfoReport<'a> {
    version: &'a str,
    #[serde(flatten)]
    info: &'a StreamInfo,
}

/// Header plus stream description, as printed before decoding.
pub fn describe_text(infile: &str, info: &StreamInfo, metadata_only: bool) -> String {
    let heading = if metadata_only { "metadata for" } else { "decoding" };
    format!("{} {}\n{}", heading, infile, info.describe())
}

pub fn describe_json(info: &StreamInfo) -> serde_json::Result<String> {
    serde_json::to_string(&InfoReport {
        version: VERSION,
        info,
    })
}

/// `-V` output: program version and supported extensions.
pub fn version_json(registry: &FormatRegistry) -> serde_json::Result<String> {
    serde_json::to_string(&json!({
        "version": VERSION,
        "extensions": {
            "vgm": registry.extensions(),
            "common": Vec::<&str>::new(),
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgm_render_core::models::info::SubsongInfo;

    fn info() -> StreamInfo {
        StreamInfo {
            sample_rate: 22050,
            channels: 2,
            mixing_info: None,
            looping_info: None,
            interleave_info: None,
            number_of_samples: 2205,
            play_samples: Some(2205),
            encoding: "Playstation 4-bit ADPCM".into(),
            layout: "interleave".into(),
            frame_size: Some(0x10),
            metadata_source: "Sony VAG header".into(),
            stream_info: SubsongInfo {
                index: 0,
                name: None,
                total: 1,
            },
        }
    }

    #[test]
    fn text_heading() {
        let text = describe_text("a.vag", &info(), true);
        assert!(text.starts_with("metadata for a.vag\n"));
        assert!(text.contains("sample rate: 22050 Hz"));
        assert!(describe_text("a.vag", &info(), false).starts_with("decoding a.vag"));
    }

    #[test]
    fn json_is_flattened_with_version() {
        let value: serde_json::Value = serde_json::from_str(&describe_json(&info()).unwrap()).unwrap();
        assert_eq!(value["version"], VERSION);
        assert_eq!(value["sampleRate"], 22050);
        assert_eq!(value["numberOfSamples"], 2205);
        assert_eq!(value["streamInfo"]["total"], 1);
    }

    #[test]
    fn version_lists_extensions() {
        let value: serde_json::Value =
            serde_json::from_str(&version_json(&FormatRegistry::with_defaults()).unwrap()).unwrap();
        let vgm = value["extensions"]["vgm"].as_array().unwrap();
        assert!(vgm.iter().any(|e| e == "spm"));
        assert!(vgm.iter().any(|e| e == "vag"));
        assert!(value["extensions"]["common"].as_array().unwrap().is_empty());
    }
}
