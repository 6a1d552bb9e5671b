// media_intake - video ingestion daemon
// Local media ingestion service accessible via Unix Domain Socket

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use media_intake::config::IngestConfig;
use media_intake::ffmpeg;
use media_intake::service::{Handler, IngestService, Request, Response};

/// Requests larger than this are rejected and the connection dropped
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

#[derive(Parser)]
#[command(name = "media_intake", version, about = "Media Intake Daemon - local video ingestion")]
struct Args {
    /// Unix socket path for UDS server
    #[arg(long, default_value = "/tmp/media_intake.sock")]
    socket_path: String,

    /// JSON config file (missing keys use defaults)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => IngestConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => IngestConfig::default(),
    };

    info!("🎬 Starting Media Intake Daemon");
    info!("   Socket: {}", args.socket_path);

    for program in [&config.ffprobe_bin, &config.ffmpeg_bin] {
        if !ffmpeg::is_installed(program).await {
            warn!("   {} not found; ingestion requests will fail", program);
        }
    }

    // Track startup time for health checks
    let start_time = std::time::Instant::now();

    let service = Arc::new(IngestService::new(&config));
    info!(
        "   ✓ Ingestion pipeline initialized (canvas {}x{})",
        config.canvas.initial.width, config.canvas.initial.height
    );

    // Remove old socket if exists
    let socket_path = PathBuf::from(&args.socket_path);
    if socket_path.exists() {
        std::fs::remove_file(&socket_path)
            .context("Failed to remove old socket")?;
    }

    let listener = UnixListener::bind(&socket_path)
        .context("Failed to bind Unix socket")?;

    info!("   ✓ Listening on {}", args.socket_path);

    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, service, start_time).await {
                        error!("Connection error: {:#}", e);
                    }
                });
            }
            Err(e) => {
                error!("Accept error: {}", e);
            }
        }
    }
}

/// Handle a single UDS connection: 4-byte big-endian length, then JSON body
async fn handle_connection(
    mut stream: UnixStream,
    service: Arc<IngestService>,
    start_time: std::time::Instant,
) -> Result<()> {
    let mut buffer = vec![0u8; 65536];

    loop {
        let mut len_buf = [0u8; 4];
        match stream.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!("Client disconnected");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_FRAME_LEN {
            anyhow::bail!("Request of {} bytes exceeds limit", len);
        }
        if len > buffer.len() {
            buffer.resize(len, 0);
        }

        stream.read_exact(&mut buffer[..len]).await?;

        let request: Request = serde_json::from_slice(&buffer[..len])
            .context("Failed to parse request")?;

        debug!("Received: op={}", request.op);

        // Health check needs no pipeline work
        let response = if request.op == "health" {
            Response {
                ok: true,
                output: serde_json::json!({
                    "status": "healthy",
                    "service": "media_intake",
                    "version": env!("CARGO_PKG_VERSION"),
                    "uptime_ms": start_time.elapsed().as_millis() as u64,
                }),
                latency_ms: 0,
            }
        } else {
            match service.handle(request).await {
                Ok(resp) => resp,
                Err(e) => {
                    error!("Handler error: {:?}", e);
                    Response {
                        ok: false,
                        output: serde_json::json!({
                            "error": e.kind(),
                            "message": e.to_string(),
                        }),
                        latency_ms: 0,
                    }
                }
            }
        };

        let response_bytes = serde_json::to_vec(&response)
            .context("Failed to serialize response")?;

        let len_bytes = (response_bytes.len() as u32).to_be_bytes();
        stream.write_all(&len_bytes).await?;
        stream.write_all(&response_bytes).await?;
        stream.flush().await?;

        debug!("Sent: ok={}, latency={}ms", response.ok, response.latency_ms);
    }
}
