use std::io::{self, BufRead, Write};

use pipeframe_frame::{FrameConfig, FrameWriter};

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS};

pub fn run(args: EncodeArgs) -> CliResult<i32> {
    let config = FrameConfig {
        max_payload_size: args.max_payload,
        ..FrameConfig::default()
    };
    let writer = FrameWriter::with_config(io::stdout().lock(), config);

    let encoded = encode_lines(io::stdin().lock(), writer, args.json)?;
    tracing::debug!(frames = encoded, "end of input");
    Ok(SUCCESS)
}

/// Frame each line of `input` (without its line terminator) as one payload.
fn encode_lines<R: BufRead, W: Write>(
    input: R,
    mut writer: FrameWriter<W>,
    require_json: bool,
) -> CliResult<usize> {
    let mut encoded = 0usize;
    for (index, line) in input.lines().enumerate() {
        let line = line.map_err(|err| io_error("failed reading stdin", err))?;
        if require_json {
            serde_json::from_str::<serde_json::Value>(&line).map_err(|err| {
                CliError::new(
                    DATA_INVALID,
                    format!("line {} is not valid JSON: {err}", index + 1),
                )
            })?;
        }
        writer
            .send(line.as_bytes())
            .map_err(|err| frame_error("write failed", err))?;
        encoded += 1;
    }
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn each_line_becomes_one_frame() {
        let mut out = Vec::new();
        let encoded = encode_lines(
            Cursor::new("hello\n\nworld\n"),
            FrameWriter::new(&mut out),
            false,
        )
        .unwrap();

        assert_eq!(encoded, 3);
        assert_eq!(out, b"\x05hello\x00\x05world");
    }

    #[test]
    fn crlf_terminators_are_stripped() {
        let mut out = Vec::new();
        encode_lines(Cursor::new("a\r\nb"), FrameWriter::new(&mut out), false).unwrap();
        assert_eq!(out, b"\x01a\x01b");
    }

    #[test]
    fn json_mode_rejects_invalid_line() {
        let mut out = Vec::new();
        let err = encode_lines(
            Cursor::new("{\"ok\":true}\nnot json\n"),
            FrameWriter::new(&mut out),
            true,
        )
        .unwrap_err();

        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.contains("line 2"));
        assert_eq!(out, b"\x0b{\"ok\":true}");
    }

    #[test]
    fn oversized_line_is_data_invalid() {
        let mut out = Vec::new();
        let config = FrameConfig {
            max_payload_size: 3,
            ..FrameConfig::default()
        };
        let err = encode_lines(
            Cursor::new("toolong\n"),
            FrameWriter::with_config(&mut out, config),
            false,
        )
        .unwrap_err();
        assert_eq!(err.code, DATA_INVALID);
    }
}
