use std::io::{self, IsTerminal};

use anyhow::{anyhow, bail, Context};
use vgm_render_core::{FormatRegistry, LoopPoints, StreamEngine, StreamError, WavSpec};

use crate::cli::{Cli, UsageError};
use crate::output::{self, PcmSink, WriteStatus};
use crate::report;
use crate::stdio_file::StdioStreamFile;

/// Frames rendered per call.
pub const BLOCK_FRAMES: usize = 32768;

pub fn run(cli: &Cli) -> anyhow::Result<()> {
    let registry = FormatRegistry::with_defaults();

    if cli.version_json {
        println!("{}", report::version_json(&registry)?);
        return Ok(());
    }

    cli.validate(io::stdout().is_terminal())?;

    let infile = cli
        .infile
        .as_deref()
        .ok_or_else(|| anyhow!("missing input file"))?;
    let infile_name = infile.to_string_lossy().into_owned();

    if cli.validate_extension && !registry.is_supported_extension(&infile_name) {
        return Err(UsageError::UnsupportedExtension(infile_name).into());
    }

    let file = StdioStreamFile::open(infile)?.shared();
    let mut engine = StreamEngine::open(&file, cli.subsong, &registry, cli.playback_config())
        .with_context(|| format!("failed opening {}", infile_name))?;

    if engine.effective_total_samples() == Some(0) {
        bail!("stream has no samples to play: {}", infile_name);
    }

    let descriptor = engine.descriptor();
    let outfile = output::resolve_output_name(
        cli.outfile.as_deref(),
        infile,
        descriptor.subsong_index,
        descriptor.stream_name.as_deref(),
    );
    if !cli.to_stdout() && !cli.decode_only && outfile == infile {
        return Err(UsageError::SameInOut(infile_name).into());
    }

    let info = engine.info();
    if cli.json_info {
        println!("{}", report::describe_json(&info)?);
    } else if cli.metadata_only() || !cli.to_stdout() {
        println!("{}", report::describe_text(&infile_name, &info, cli.metadata_only()));
    }
    if cli.metadata_only() {
        return Ok(());
    }

    apply_seeks(&mut engine, cli)?;

    let mut spec = WavSpec::new(engine.descriptor().sample_rate, engine.output_channels() as u16);
    if cli.loop_wav {
        if let Some((start, end)) = smpl_loop(engine.descriptor().loop_points) {
            spec = spec.with_smpl_loop(start, end);
        }
    }

    if engine.plays_forever() {
        log::info!("looping {} forever to stdout", infile_name);
        let mut sink = PcmSink::stdout(&spec, None)?;
        let result = render_to(&mut engine, &mut sink);
        sink.finish()?;
        return result;
    }

    let sink = open_sink(cli, &spec, &engine, outfile.clone())?;
    let digest = decode(&mut engine, sink)?;

    if cli.test_reset {
        engine.reset();
        apply_seeks(&mut engine, cli)?;
        let reset_file = output::reset_output_name(&outfile);
        let sink = open_sink(cli, &spec, &engine, reset_file.clone())?;
        let reset_digest = decode(&mut engine, sink)?;
        if reset_digest != digest {
            bail!(
                "output after reset differs from first pass: {} vs {}",
                reset_file.display(),
                outfile.display()
            );
        }
        log::info!("reset pass matches first pass ({})", digest);
    }
    Ok(())
}

/// `smpl` loop for `-L`, end inclusive. Empty loops get no chunk.
fn smpl_loop(loop_points: Option<LoopPoints>) -> Option<(u32, u32)> {
    loop_points
        .filter(|lp| lp.start < lp.end)
        .map(|lp| (lp.start as u32, (lp.end - 1) as u32))
}

/// Apply `-k` then `-K`. Below -1 means the loop start; -1 means no seek;
/// targets at or past the play length are ignored.
fn apply_seeks(engine: &mut StreamEngine, cli: &Cli) -> anyhow::Result<()> {
    for target in [cli.seek, cli.seek_again].into_iter().flatten() {
        let target = match target {
            -1 => continue,
            t if t < -1 => engine
                .policy()
                .loop_region()
                .map_or(0, |lp| lp.start as i64),
            t => t,
        };
        if let Some(total) = engine.effective_total_samples() {
            if target >= total as i64 {
                log::warn!("ignoring seek to {}, past the play length {}", target, total);
                continue;
            }
        }
        engine.seek(target)?;
    }
    Ok(())
}

fn open_sink(
    cli: &Cli,
    spec: &WavSpec,
    engine: &StreamEngine,
    path: std::path::PathBuf,
) -> anyhow::Result<PcmSink> {
    if cli.decode_only {
        return Ok(PcmSink::discard());
    }
    if cli.to_stdout() {
        let frames = engine.remaining_samples().unwrap_or(0);
        return PcmSink::stdout(spec, Some(spec.data_size(frames)));
    }
    PcmSink::wav(path, *spec)
}

/// Render until the end and close the sink, even when rendering fails.
/// Returns the PCM digest.
fn decode(engine: &mut StreamEngine, mut sink: PcmSink) -> anyhow::Result<String> {
    let result = render_to(engine, &mut sink);
    let finished = sink.finish();
    result?;
    let (digest, summary) = finished?;
    if let Some(summary) = summary {
        log::info!(
            "wrote {} frames to {}",
            summary.frames_written,
            summary.file_path.display()
        );
    }
    Ok(digest)
}

fn render_to(engine: &mut StreamEngine, sink: &mut PcmSink) -> anyhow::Result<()> {
    let mut buf = vec![0i16; BLOCK_FRAMES * engine.buffer_channels()];
    let out_channels = engine.output_channels();
    loop {
        let frames = match engine.render(&mut buf, BLOCK_FRAMES) {
            Ok(0) => return Ok(()),
            Ok(frames) => frames,
            Err(e) => {
                if let StreamError::DecodeFault { samples_done, .. } = &e {
                    sink.write(&buf[..samples_done * out_channels])?;
                }
                return Err(e.into());
            }
        };
        if sink.write(&buf[..frames * out_channels])? == WriteStatus::Closed {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::{Path, PathBuf};

    /// Stereo SPM file looping end to end; left is 10*i, right its negation.
    fn write_spm(name: &str, frames: usize) -> PathBuf {
        let mut data = vec![0u8; 0x800];
        data[0..4].copy_from_slice(b"SPM\0");
        let data_size = (frames * 4) as u32;
        data[4..8].copy_from_slice(&data_size.to_le_bytes());
        data[8..12].copy_from_slice(&0u32.to_le_bytes());
        data[12..16].copy_from_slice(&(frames as u32).to_le_bytes());
        for i in 0..frames {
            let left = (i as i16) * 10;
            data.extend_from_slice(&left.to_le_bytes());
            data.extend_from_slice(&(-left).to_le_bytes());
        }
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("vgm-render").chain(args.iter().copied())).unwrap()
    }

    fn wav_data(path: &Path) -> Vec<u8> {
        let bytes = std::fs::read(path).unwrap();
        bytes[0x2C..].to_vec()
    }

    #[test]
    fn decodes_once_to_wav() {
        let input = write_spm("vgm_render_run_once.spm", 100);
        let out = std::env::temp_dir().join("vgm_render_run_once.wav");
        run(&cli(&["-i", "-o", out.to_str().unwrap(), input.to_str().unwrap()])).unwrap();

        let data = wav_data(&out);
        assert_eq!(data.len(), 100 * 4);
        assert_eq!(&data[4..8], &[10, 0, 0xF6, 0xFF]);

        std::fs::remove_file(&input).ok();
        std::fs::remove_file(&out).ok();
    }

    #[test]
    fn reset_pass_writes_identical_file() {
        let input = write_spm("vgm_render_run_reset.spm", 64);
        let out = std::env::temp_dir().join("vgm_render_run_reset.wav");
        run(&cli(&[
            "-r",
            "-l",
            "1",
            "-f",
            "0.001",
            "-o",
            out.to_str().unwrap(),
            input.to_str().unwrap(),
        ]))
        .unwrap();

        let reset = output::reset_output_name(&out);
        assert_eq!(wav_data(&out), wav_data(&reset));

        for path in [&input, &out, &reset] {
            std::fs::remove_file(path).ok();
        }
    }

    #[test]
    fn seek_shortens_output() {
        let input = write_spm("vgm_render_run_seek.spm", 100);
        let out = std::env::temp_dir().join("vgm_render_run_seek.wav");
        run(&cli(&["-i", "-k", "40", "-o", out.to_str().unwrap(), input.to_str().unwrap()])).unwrap();

        let data = wav_data(&out);
        assert_eq!(data.len(), 60 * 4);
        assert_eq!(&data[0..2], &400i16.to_le_bytes());

        std::fs::remove_file(&input).ok();
        std::fs::remove_file(&out).ok();
    }

    #[test]
    fn loop_wav_writes_smpl_chunk() {
        let input = write_spm("vgm_render_run_lwav.spm", 50);
        let out = std::env::temp_dir().join("vgm_render_run_lwav.wav");
        run(&cli(&["-L", "-i", "-o", out.to_str().unwrap(), input.to_str().unwrap()])).unwrap();

        let bytes = std::fs::read(&out).unwrap();
        assert_eq!(&bytes[0x24..0x28], b"smpl");
        assert_eq!(&bytes[0x24 + 0x34..0x24 + 0x38], &0u32.to_le_bytes());
        assert_eq!(&bytes[0x24 + 0x38..0x24 + 0x3C], &49u32.to_le_bytes());
        assert_eq!(bytes.len(), 0x70 + 50 * 4);

        std::fs::remove_file(&input).ok();
        std::fs::remove_file(&out).ok();
    }

    #[test]
    fn empty_loop_gets_no_smpl_chunk() {
        assert_eq!(smpl_loop(Some(LoopPoints { start: 10, end: 10 })), None);
        assert_eq!(smpl_loop(Some(LoopPoints { start: 0, end: 0 })), None);
        assert_eq!(smpl_loop(None), None);
        assert_eq!(smpl_loop(Some(LoopPoints { start: 10, end: 11 })), Some((10, 10)));
    }

    #[test]
    fn rejects_unsupported_extension() {
        let err = run(&cli(&["-v", "-m", "song.xyz"])).unwrap_err();
        assert!(err.downcast_ref::<UsageError>().is_some());
    }

    #[test]
    fn rejects_same_input_and_output() {
        let input = write_spm("vgm_render_run_same.spm", 8);
        let err = run(&cli(&["-o", input.to_str().unwrap(), input.to_str().unwrap()])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<UsageError>(),
            Some(UsageError::SameInOut(_))
        ));
        std::fs::remove_file(&input).ok();
    }

    #[test]
    fn unrecognized_input_fails() {
        let path = std::env::temp_dir().join("vgm_render_run_bad.spm");
        std::fs::write(&path, vec![0u8; 0x900]).unwrap();
        let err = run(&cli(&["-m", path.to_str().unwrap()])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StreamError>(),
            Some(StreamError::UnrecognizedFormat(_))
        ));
        std::fs::remove_file(&path).ok();
    }
}
