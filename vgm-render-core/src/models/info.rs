use serde::Serialize;

/// Channel counts before and after the mixing graph, present only when the
/// graph changes the channel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MixingInfo {
    pub input_channels: usize,
    pub output_channels: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopingInfo {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterleaveInfo {
    pub first_block: usize,
    pub last_block: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsongInfo {
    pub index: usize,
    pub name: Option<String>,
    pub total: usize,
}

/// Snapshot of an opened stream for reports and `--json` output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamInfo {
    pub sample_rate: u32,
    pub channels: usize,
    pub mixing_info: Option<MixingInfo>,
    /// Loop region after playback overrides.
    pub looping_info: Option<LoopingInfo>,
    pub interleave_info: Option<InterleaveInfo>,
    pub number_of_samples: usize,
    /// Samples a full render produces; `None` when playing forever.
    pub play_samples: Option<usize>,
    pub encoding: String,
    pub layout: String,
    pub frame_size: Option<usize>,
    pub metadata_source: String,
    pub stream_info: SubsongInfo,
}

impl StreamInfo {
    pub fn duration_secs(&self, samples: usize) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        samples as f64 / self.sample_rate as f64
    }

    /// Human-readable description, one property per line.
    pub fn describe(&self) -> String {
        let mut lines = vec![format!("sample rate: {} Hz", self.sample_rate)];
        lines.push(format!("channels: {}", self.channels));
        if let Some(mixing) = self.mixing_info {
            lines.push(format!(
                "mixing: {} -> {} channels",
                mixing.input_channels, mixing.output_channels
            ));
        }
        if let Some(looping) = self.looping_info {
            lines.push(format!(
                "loop start: {} samples ({:.3} seconds)",
                looping.start,
                self.duration_secs(looping.start)
            ));
            lines.push(format!(
                "loop end: {} samples ({:.3} seconds)",
                looping.end,
                self.duration_secs(looping.end)
            ));
        }
        lines.push(format!(
            "stream total samples: {} ({:.3} seconds)",
            self.number_of_samples,
            self.duration_secs(self.number_of_samples)
        ));
        lines.push(format!("encoding: {}", self.encoding));
        lines.push(format!("layout: {}", self.layout));
        if let Some(interleave) = self.interleave_info {
            lines.push(format!("interleave: {:#x} bytes", interleave.first_block));
            if let Some(last) = interleave.last_block {
                lines.push(format!("interleave last block: {:#x} bytes", last));
            }
        }
        lines.push(format!("metadata from: {}", self.metadata_source));
        if self.stream_info.total > 1 {
            lines.push(format!("stream count: {}", self.stream_info.total));
            lines.push(format!("stream index: {}", self.stream_info.index));
        }
        if let Some(name) = &self.stream_info.name {
            lines.push(format!("stream name: {}", name));
        }
        match self.play_samples {
            Some(samples) => lines.push(format!(
                "play duration: {} samples ({:.3} seconds)",
                samples,
                self.duration_secs(samples)
            )),
            None => lines.push("play duration: endless".into()),
        }
        lines.join("\n")
    }
}
