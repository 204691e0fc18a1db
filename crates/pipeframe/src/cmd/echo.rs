use std::io;

use pipeframe_frame::{FrameConfig, FrameReader, FrameWriter};

use crate::cmd::EchoArgs;
use crate::exit::{frame_error, CliResult, SUCCESS};

pub fn run(args: EchoArgs) -> CliResult<i32> {
    let config = FrameConfig {
        max_payload_size: args.max_payload,
        ..FrameConfig::default()
    };
    let reader = FrameReader::with_config(io::stdin().lock(), config.clone());
    let writer = FrameWriter::with_config(io::stdout().lock(), config);

    let echoed = echo_frames(reader, writer)?;
    tracing::info!(frames = echoed, "input closed");
    Ok(SUCCESS)
}

fn echo_frames<R: io::Read, W: io::Write>(
    reader: FrameReader<R>,
    mut writer: FrameWriter<W>,
) -> CliResult<usize> {
    let mut echoed = 0usize;
    for frame in reader {
        let frame = frame.map_err(|err| frame_error("receive failed", err))?;
        tracing::debug!(size = frame.len(), "echoing frame");
        writer
            .send(&frame)
            .map_err(|err| frame_error("echo send failed", err))?;
        echoed += 1;
    }
    Ok(echoed)
}
