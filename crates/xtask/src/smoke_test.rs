//! Postinstall smoke test (§6): spawns the host, performs `initialize`
//! with an 8 s timeout, then `shutdown` with a 4 s exit timeout. Any
//! `error`-kind notification observed before success fails the test. This
//! runs the same wire protocol as production, shortened to a two-message
//! lifecycle, and doubles as an acceptance gate in CI.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use clap::Args;
use serde_json::json;
use tokio::process::Command as TokioCommand;

use fmt_protocol::codec::tokio_io::{write_frame, AsyncFrameReader};
use fmt_protocol::envelope::{Command as WireCommand, Envelope, EnvelopeType};
use fmt_protocol::payload::{
    InitializeOptions, InitializeRequest, InitializeResponse, ShutdownRequest, ShutdownResponse,
};

use crate::error::XtaskError;

const INITIALIZE_TIMEOUT: Duration = Duration::from_secs(8);
const SHUTDOWN_EXIT_TIMEOUT: Duration = Duration::from_secs(4);

#[derive(Debug, Args)]
pub struct SmokeTestArgs {
    /// Explicit path to the host binary. Defaults to `FMT_BRIDGE_HOST_PATH`
    /// or the conventional build-output locations.
    #[arg(long)]
    pub host_path: Option<PathBuf>,
}

pub async fn run(args: SmokeTestArgs) -> Result<(), XtaskError> {
    let host_path = args
        .host_path
        .or_else(fmt_client::defaults::host_path_override)
        .unwrap_or_else(|| PathBuf::from("target/release/fmt_host"));

    let mut child = TokioCommand::new(&host_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| XtaskError::Spawn {
            path: host_path.clone(),
            source,
        })?;

    let mut stdin = child.stdin.take().expect("piped stdin");
    let stdout = child.stdout.take().expect("piped stdout");
    let mut reader = AsyncFrameReader::new(stdout);

    let initialize_request = InitializeRequest {
        client_version: env!("CARGO_PKG_VERSION").to_string(),
        host_binary_version: env!("CARGO_PKG_VERSION").to_string(),
        platform: fmt_protocol::current_platform_key().unwrap_or("unknown").to_string(),
        options: InitializeOptions {
            roslyn_language_version: None,
            msbuild_sdks_path: None,
        },
    };
    let envelope = Envelope::request(
        "smoke-init",
        WireCommand::Initialize,
        serde_json::to_value(initialize_request).expect("payload serializes"),
    );
    write_frame(&mut stdin, &envelope).await?;

    let initialize_response = tokio::time::timeout(
        INITIALIZE_TIMEOUT,
        await_response_or_fatal(&mut reader, "smoke-init"),
    )
    .await
    .map_err(|_| XtaskError::InitializeTimeout(INITIALIZE_TIMEOUT))??;

    let parsed: InitializeResponse = serde_json::from_value(initialize_response.payload)
        .map_err(|_| XtaskError::HostRejected {
            command: "initialize",
            message: "malformed initialize response".to_string(),
        })?;
    if !parsed.ok {
        return Err(XtaskError::HostRejected {
            command: "initialize",
            message: parsed.reason.unwrap_or_else(|| "initialize returned ok:false".to_string()),
        });
    }

    let shutdown_envelope = Envelope::request(
        "smoke-shutdown",
        WireCommand::Shutdown,
        json!(ShutdownRequest { reason: Some("smoke-test".to_string()) }),
    );
    write_frame(&mut stdin, &shutdown_envelope).await?;

    let shutdown_response = tokio::time::timeout(
        SHUTDOWN_EXIT_TIMEOUT,
        await_response_or_fatal(&mut reader, "smoke-shutdown"),
    )
    .await
    .map_err(|_| XtaskError::ShutdownTimeout(SHUTDOWN_EXIT_TIMEOUT))??;

    let parsed: ShutdownResponse = serde_json::from_value(shutdown_response.payload)
        .map_err(|_| XtaskError::HostRejected {
            command: "shutdown",
            message: "malformed shutdown response".to_string(),
        })?;
    if !parsed.ok {
        return Err(XtaskError::HostRejected {
            command: "shutdown",
            message: "shutdown returned ok:false".to_string(),
        });
    }

    let exited = tokio::time::timeout(SHUTDOWN_EXIT_TIMEOUT, child.wait())
        .await
        .map_err(|_| XtaskError::ShutdownTimeout(SHUTDOWN_EXIT_TIMEOUT))?;
    match exited {
        Ok(status) if status.success() => {
            println!("smoke test passed: {}", host_path.display());
            Ok(())
        }
        Ok(status) => Err(XtaskError::HostRejected {
            command: "shutdown",
            message: format!("host exited with {status}"),
        }),
        Err(err) => Err(XtaskError::Io(err)),
    }
}

/// Reads frames until the response matching `request_id` arrives. Any
/// `error` notification observed first fails the smoke test immediately,
/// regardless of whether a response eventually follows.
async fn await_response_or_fatal(
    reader: &mut AsyncFrameReader<tokio::process::ChildStdout>,
    request_id: &str,
) -> Result<Envelope, XtaskError> {
    loop {
        let envelope = reader.read_frame().await?.ok_or(XtaskError::UnexpectedEof)?;
        match envelope.envelope_type {
            EnvelopeType::Response if envelope.request_id.as_deref() == Some(request_id) => {
                return Ok(envelope);
            }
            EnvelopeType::Notification if envelope.command == WireCommand::Error => {
                let message = envelope
                    .payload
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown error")
                    .to_string();
                return Err(XtaskError::ErrorNotification(message));
            }
            _ => continue,
        }
    }
}
