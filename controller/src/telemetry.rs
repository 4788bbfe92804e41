use std::time::Duration;

use anyhow::Context;
use serial2_tokio::SerialPort;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader},
    sync::mpsc,
};
use tracing::{info, warn};

use ivt490_common::config::SerialConfig;

/// The heat pump line is ~37 short fields; anything much longer is noise.
const MAX_LINE_BYTES: u64 = 512;
const REOPEN_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryLine {
    Text(String),
    /// No newline within `MAX_LINE_BYTES`; the line was skipped.
    TooLong,
}

/// Reads the next newline-terminated line. `None` at end of stream.
pub async fn read_line<R>(reader: &mut R) -> std::io::Result<Option<TelemetryLine>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let read = (&mut *reader)
        .take(MAX_LINE_BYTES)
        .read_until(b'\n', &mut buf)
        .await?;
    if read == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') || (buf.len() as u64) < MAX_LINE_BYTES {
        let line = String::from_utf8_lossy(&buf);
        return Ok(Some(TelemetryLine::Text(
            line.trim_end_matches(['\r', '\n']).to_string(),
        )));
    }

    // Drop the rest of the overlong line, still in bounded chunks.
    loop {
        buf.clear();
        let read = (&mut *reader)
            .take(MAX_LINE_BYTES)
            .read_until(b'\n', &mut buf)
            .await?;
        if read == 0 || buf.last() == Some(&b'\n') {
            return Ok(Some(TelemetryLine::TooLong));
        }
    }
}

/// Reads telemetry lines from the heat pump's serial port and forwards them.
/// The port is reopened after errors; the task ends when the receiver is gone.
pub fn spawn_serial_reader(config: SerialConfig, lines: mpsc::Sender<String>) {
    tokio::spawn(async move {
        loop {
            if let Err(err) = read_serial_lines(&config, &lines).await {
                warn!("telemetry serial error: {err:#}");
            }
            if lines.is_closed() {
                return;
            }
            tokio::time::sleep(REOPEN_DELAY).await;
        }
    });
}

async fn read_serial_lines(
    config: &SerialConfig,
    lines: &mpsc::Sender<String>,
) -> anyhow::Result<()> {
    let port = SerialPort::open(&config.device, config.baud_rate).with_context(|| {
        format!("failed to open {} at {} baud", config.device, config.baud_rate)
    })?;
    info!("listening for heat pump telemetry on {}", config.device);

    let mut reader = BufReader::new(port);
    loop {
        let line = read_line(&mut reader)
            .await
            .with_context(|| format!("failed to read from {}", config.device))?;

        match line {
            None => anyhow::bail!("{} closed", config.device),
            Some(TelemetryLine::TooLong) => {
                warn!("dropping telemetry line longer than {MAX_LINE_BYTES} bytes");
            }
            Some(TelemetryLine::Text(line)) => {
                if lines.send(line).await.is_err() {
                    return Ok(());
                }
            }
        }
    }
}
