use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use pipeframe_frame::FrameConfig;
use pipeframe_process::ProcessConfig;
use pipeframe_transport::{
    ProcessTransport, RawCodec, TransportConfig, TransportError, TransportEvent,
};

use crate::cmd::RunArgs;
use crate::exit::{transport_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_frame, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = args.timeout.as_deref().map(parse_duration).transpose()?;
    let messages = resolve_messages(&args)?;

    let (program, child_args) = args
        .command
        .split_first()
        .ok_or_else(|| CliError::new(USAGE, "missing program to run"))?;
    let process = ProcessConfig::new(program).with_args(child_args);
    let config = TransportConfig {
        frame: FrameConfig {
            max_payload_size: args.max_payload,
            ..FrameConfig::default()
        },
        ..TransportConfig::default()
    };

    let mut transport = ProcessTransport::spawn_with_config(&process, RawCodec, config)
        .map_err(|err| transport_error("spawn failed", err))?;
    let source = format!("pid:{}", transport.pid());

    let interrupted = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(interrupted.clone())?;

    for message in &messages {
        transport
            .send(message)
            .map_err(|err| transport_error("send failed", err))?;
    }
    tracing::debug!(count = messages.len(), "sent messages");

    let deadline = timeout.map(|timeout| Instant::now() + timeout);
    let mut session = Session::default();

    loop {
        if transport.state().is_active() {
            if interrupted.load(Ordering::SeqCst) {
                tracing::info!("interrupted; shutting down child");
                session.shutdown(&mut transport)?;
            } else if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                session.fail(CliError::new(TIMEOUT, "timed out waiting for child"));
                session.shutdown(&mut transport)?;
            }
        } else if session.grace_expired() {
            tracing::warn!("child did not exit after shutdown; killing it");
            break;
        }

        let event = match transport.recv_timeout(POLL_INTERVAL) {
            Some(event) => event,
            None if transport.state().is_terminal() => break,
            None => continue,
        };

        match event {
            TransportEvent::MessageReceived(payload) => {
                session.received += 1;
                print_frame(session.received, &payload, &source, format);
                if args.count.is_some_and(|count| session.received >= count) {
                    session.shutdown(&mut transport)?;
                }
            }
            TransportEvent::Exited => break,
            TransportEvent::Error(err) => {
                let fatal = matches!(err, TransportError::AbnormalExit(_));
                let corrupt = matches!(err, TransportError::Protocol(_));
                tracing::warn!(error = %err, "transport error");
                session.fail(transport_error("child transport", err));
                if fatal {
                    break;
                }
                if corrupt {
                    session.shutdown(&mut transport)?;
                }
            }
        }
    }

    if let Some(err) = session.failure {
        return Err(err);
    }
    if let Some(count) = args.count {
        if session.received < count {
            return Err(CliError::new(
                FAILURE,
                format!(
                    "child exited after {} of {count} messages",
                    session.received
                ),
            ));
        }
    }
    Ok(SUCCESS)
}

#[derive(Default)]
struct Session {
    received: usize,
    failure: Option<CliError>,
    shutdown_at: Option<Instant>,
}

impl Session {
    fn shutdown(&mut self, transport: &mut ProcessTransport<RawCodec>) -> CliResult<()> {
        if self.shutdown_at.is_some() {
            return Ok(());
        }
        self.shutdown_at = Some(Instant::now());
        transport
            .shutdown()
            .map_err(|err| transport_error("shutdown failed", err))
    }

    /// Keeps the first failure; later ones are usually consequences of it.
    fn fail(&mut self, err: CliError) {
        self.failure.get_or_insert(err);
    }

    fn grace_expired(&self) -> bool {
        self.shutdown_at
            .is_some_and(|at| at.elapsed() >= SHUTDOWN_GRACE)
    }
}

fn resolve_messages(args: &RunArgs) -> CliResult<Vec<Bytes>> {
    let mut messages = Vec::with_capacity(args.json.len() + args.data.len());
    for json in &args.json {
        serde_json::from_str::<serde_json::Value>(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        messages.push(Bytes::from(json.clone()));
    }
    for data in &args.data {
        messages.push(Bytes::from(data.clone()));
    }
    Ok(messages)
}

fn install_ctrlc_handler(interrupted: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        interrupted.store(true, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
