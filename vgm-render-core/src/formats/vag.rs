use std::sync::Arc;

use crate::codec::psx;
use crate::codec::CodingKind;
use crate::models::descriptor::{ChannelSource, Layout, StreamDescriptor};
use crate::models::error::StreamError;
use crate::traits::recognizer::FormatRecognizer;
use crate::traits::stream_file::StreamFile;

/// "VAGp"
const VAG_MAGIC: u32 = 0x5641_4770;
const START_OFFSET: u64 = 0x30;
const NAME_OFFSET: u64 = 0x20;
const NAME_SIZE: usize = 0x10;

/// Sony VAG mono voice files (PS1/PS2 SDK).
///
/// Big-endian header: data size at 0x0C, sample rate at 0x10, a NUL-padded
/// name at 0x20, PS-ADPCM frames from 0x30.
#[derive(Debug, Default, Clone, Copy)]
pub struct VagRecognizer;

impl FormatRecognizer for VagRecognizer {
    fn name(&self) -> &'static str {
        "Sony VAG header"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["vag"]
    }

    fn recognize(
        &self,
        file: &Arc<dyn StreamFile>,
        _subsong: usize,
    ) -> Result<Option<StreamDescriptor>, StreamError> {
        match file.extension() {
            Some(ext) if self.accepts_extension(&ext) => {}
            _ => return Ok(None),
        }
        match file.read_u32_be(0x00) {
            Ok(VAG_MAGIC) => {}
            _ => return Ok(None),
        }

        let mut data_size = file.read_u32_be(0x0C)? as u64;
        let sample_rate = file.read_u32_be(0x10)?;
        if sample_rate == 0 {
            log::debug!("{}: VAG header with zero sample rate", file.name());
            return Ok(None);
        }
        let available = file.size().saturating_sub(START_OFFSET);
        if data_size > available {
            log::warn!(
                "{}: header declares 0x{:x} data bytes, file holds 0x{:x}",
                file.name(),
                data_size,
                available
            );
            data_size = available;
        }

        let mut name = [0u8; NAME_SIZE];
        file.read_exact_at(NAME_OFFSET, &mut name)?;
        let stream_name = parse_name(&name);

        let num_samples = (data_size as usize / psx::FRAME_SIZE) * psx::SAMPLES_PER_FRAME;

        Ok(Some(StreamDescriptor {
            channel_count: 1,
            sample_rate,
            num_samples,
            coding: CodingKind::PsxAdpcm,
            layout: Layout::Flat,
            loop_points: None,
            subsong_index: 0,
            subsong_count: 1,
            stream_name,
            format_name: self.name(),
            channels: vec![ChannelSource::new(file.reopen()?, START_OFFSET)],
        }))
    }
}

fn parse_name(raw: &[u8]) -> Option<String> {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let name = String::from_utf8_lossy(&raw[..end]).trim().to_string();
    (!name.is_empty()).then_some(name)
}
