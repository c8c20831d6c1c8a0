//! Foreground downloads: `rapid download` and `rapid resume`.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use rapid_core::{Cookie, DownloadEvent, DownloadId, Request};
use rapid_download::DownloadEngine;
use tokio::sync::mpsc;
use url::Url;

use crate::bootstrap::{CliConfig, bootstrap};
use crate::presentation::progress::{ChannelEmitter, ChunkBars, Outcome, size_label};

/// Arguments for `rapid download`.
#[derive(Debug, Clone, Default)]
pub struct DownloadArgs {
    pub url: String,
    pub provider: Option<String>,
    pub chunks: Option<u32>,
    pub cookies: Vec<String>,
    pub user_agent: Option<String>,
}

/// Build the transfer request. Cookies are scoped to the URL's host.
pub fn build_request(args: DownloadArgs) -> Result<Request> {
    let url = Url::parse(&args.url).with_context(|| format!("invalid URL '{}'", args.url))?;
    let host = url.host_str().unwrap_or_default().to_string();

    let mut request = Request::new(args.url);
    if let Some(provider) = args.provider {
        request = request.with_provider(provider);
    }
    if let Some(chunks) = args.chunks {
        request = request.with_chunks(chunks);
    }
    if let Some(user_agent) = args.user_agent {
        request = request.with_user_agent(user_agent);
    }
    for raw in &args.cookies {
        let (name, value) = raw
            .split_once('=')
            .ok_or_else(|| anyhow!("cookie '{raw}' is not NAME=VALUE"))?;
        let name = name.trim();
        if name.is_empty() {
            bail!("cookie '{raw}' has an empty name");
        }
        request = request.with_cookie(Cookie::new(name, value.trim()).with_domain(host.clone()));
    }
    Ok(request)
}

/// Create a download and follow it until it stops.
pub async fn download(config: CliConfig, args: DownloadArgs) -> Result<()> {
    let request = build_request(args)?;
    let (emitter, mut events) = ChannelEmitter::new();
    let ctx = bootstrap(config, Arc::new(emitter)).await?;

    let created = ctx.engine.create(request).await;
    let download = match created {
        Ok(download) => download,
        Err(e) => {
            ctx.engine.shutdown().await;
            bail!(e.user_message());
        }
    };
    println!(
        "Downloading {} ({}, {} chunk{}) as {}",
        download.name,
        size_label(download.size),
        download.chunk_len,
        if download.chunk_len == 1 { "" } else { "s" },
        download.id
    );

    let outcome = follow(&ctx.engine, &download.id, &mut events).await;
    ctx.engine.shutdown().await;
    report(&download.id, outcome?)
}

/// Resume a persisted download and follow it until it stops.
pub async fn resume(config: CliConfig, id: &str) -> Result<()> {
    let id: DownloadId = id.parse()?;
    let (emitter, mut events) = ChannelEmitter::new();
    let ctx = bootstrap(config, Arc::new(emitter)).await?;

    let download = match ctx.engine.start(&id).await {
        Ok(download) => download,
        Err(e) => {
            ctx.engine.shutdown().await;
            bail!(e.user_message());
        }
    };
    println!(
        "Resuming {} ({}/{} chunks done)",
        download.name,
        download.downloaded_chunks.len(),
        download.chunk_len
    );

    let outcome = follow(&ctx.engine, &id, &mut events).await;
    ctx.engine.shutdown().await;
    report(&id, outcome?)
}

/// Render events until the download stops. Ctrl-C pauses it.
async fn follow(
    engine: &DownloadEngine,
    id: &DownloadId,
    events: &mut mpsc::UnboundedReceiver<DownloadEvent>,
) -> Result<Outcome> {
    let mut bars = ChunkBars::new(id.as_str());
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = events.recv() => {
                let event = event.ok_or_else(|| anyhow!("engine stopped unexpectedly"))?;
                if let Some(outcome) = bars.apply(&event) {
                    return Ok(outcome);
                }
            }
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                signal?;
                interrupted = true;
                tracing::debug!(target: "rapid.cli", id = %id, "Interrupted, pausing download");
                // On conflict the download already stopped and its event is queued.
                if let Err(e) = engine.pause(id).await {
                    tracing::debug!(target: "rapid.cli", id = %id, error = %e, "Pause after interrupt rejected");
                }
            }
        }
    }
}

fn report(id: &DownloadId, outcome: Outcome) -> Result<()> {
    match outcome {
        Outcome::Completed(path) => {
            println!("Saved to {path}");
            Ok(())
        }
        Outcome::Paused => {
            println!("Paused. Resume with: rapid resume {id}");
            Ok(())
        }
        Outcome::Removed => {
            println!("Removed.");
            Ok(())
        }
        Outcome::Expired(reason) => bail!(
            "Download link expired: {reason}. Supply a fresh request via PUT /entries/{id}/resolve."
        ),
        Outcome::Failed(reason) => bail!("Download failed: {reason}"),
    }
}
