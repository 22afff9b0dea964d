#![forbid(unsafe_code)]

use fmt_protocol::codec::decode_envelope;
use fmt_protocol::codec::tokio_io::{write_frame, AsyncFrameReader};
use fmt_protocol::envelope::EnvelopeType;
use fmt_protocol::error::ErrorCode;
use fmt_protocol::payload::FormatResponse;
use fmt_protocol::Envelope;
use fmt_host::defaults;
use fmt_host::dispatch::{self, HOST_VERSION};
use fmt_host::formatter::PassthroughFormatter;
use fmt_host::state::HostState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_tracing();

    let formatter = PassthroughFormatter;
    let mut state = HostState::new(HOST_VERSION);
    let mut reader = AsyncFrameReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();

    loop {
        // Framing errors and I/O failures mean the byte stream itself can no
        // longer be trusted; everything past this point is a per-request
        // concern and must not take the process down.
        let body = match reader.read_frame_body().await {
            Ok(Some(body)) => body,
            Ok(None) => {
                tracing::info!("end of input observed, terminating cleanly");
                std::process::exit(0);
            }
            Err(err) => {
                tracing::error!(error = %err, "fatal frame error");
                std::process::exit(1);
            }
        };

        let envelope = match decode_envelope(&body) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(error = %err, "rejecting frame that failed to decode");
                let recovered_request_id = serde_json::from_slice::<serde_json::Value>(&body)
                    .ok()
                    .and_then(|value| {
                        value.get("requestId").and_then(|v| v.as_str()).map(str::to_string)
                    });
                let outbound = match recovered_request_id {
                    Some(request_id) => dispatch::decode_error_response(request_id, &err).response,
                    None => dispatch::decode_error_notification(&err),
                };
                if write_frame(&mut stdout, &outbound).await.is_err() {
                    tracing::error!("failed writing error frame, standard output closed");
                    std::process::exit(1);
                }
                continue;
            }
        };

        if envelope.envelope_type != EnvelopeType::Request {
            tracing::warn!(command = envelope.command.as_str(), "rejecting non-request envelope");
            if let Some(request_id) = envelope.request_id.clone() {
                let response = Envelope::response(
                    request_id,
                    envelope.command,
                    serde_json::to_value(FormatResponse {
                        ok: false,
                        error_code: Some(ErrorCode::InvalidMessage.as_str().to_string()),
                        message: Some("only request envelopes are accepted".to_string()),
                        ..Default::default()
                    })
                    .expect("payload serializes"),
                );
                let _ = write_frame(&mut stdout, &response).await;
            }
            continue;
        }

        let outcome = match dispatch::dispatch(envelope, &mut state, &formatter) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(error = %err, "internal dispatch error");
                std::process::exit(1);
            }
        };

        if write_frame(&mut stdout, &outcome.response).await.is_err() {
            tracing::error!("failed writing response frame, standard output closed");
            std::process::exit(1);
        }
        for notification in &outcome.notifications {
            if write_frame(&mut stdout, notification).await.is_err() {
                tracing::error!("failed writing notification frame, standard output closed");
                std::process::exit(1);
            }
        }

        if let Some(exit_code) = outcome.exit_code {
            std::process::exit(exit_code);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_new(defaults::default_log_level_value())
        .unwrap_or_else(|_| EnvFilter::new(defaults::DEFAULT_LOG_LEVEL));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
