use std::fs::File;
use std::io::{self, Read};

use pipeframe_frame::{FrameConfig, FrameReader};

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, io_error, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = FrameConfig {
        max_payload_size: args.max_payload,
        ..FrameConfig::default()
    };

    let (input, source): (Box<dyn Read>, String) = match &args.file {
        Some(path) => {
            let file = File::open(path).map_err(|err| {
                io_error(&format!("failed opening {}", path.display()), err)
            })?;
            (Box::new(file), path.display().to_string())
        }
        None => (Box::new(io::stdin().lock()), "stdin".to_string()),
    };

    let mut seq = 0usize;
    for frame in FrameReader::with_config(input, config) {
        let frame = frame.map_err(|err| {
            frame_error(&format!("decode failed after {seq} frames"), err)
        })?;
        seq += 1;
        print_frame(seq, &frame, &source, format);
    }

    tracing::debug!(frames = seq, "end of input");
    Ok(SUCCESS)
}
