//! The transfer viewer: metadata for one transfer, plus per-file and
//! zip downloads.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use futures_util::StreamExt;
use kdam::BarExt;
use log::debug;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use common::data::{Millis, Transfer};
use common::resolve_transfer_id;

use crate::api::{ApiClient, ApiError};
use crate::config::Settings;
use crate::helpers::{human_size, local_time, now_ms};
use crate::upload::make_bar;

pub struct FetchArgs {
    /// Zero-based indexes into the transfer's file list; empty means
    /// all files.
    pub files: Vec<usize>,
    pub zip: bool,
    pub out: PathBuf,
}

/// Fetches and normalizes one transfer by id or share link.
pub async fn load_transfer(
    api: &ApiClient,
    settings: &Settings,
    input: &str,
) -> Result<Transfer> {
    let id = resolve_transfer_id(input)
        .ok_or_else(|| anyhow!("{input} is not a transfer id or share link"))?;
    let raw = api.transfer(&id).await?;
    raw.normalize(&settings.share_origin, now_ms())
        .ok_or_else(|| anyhow!(ApiError::MissingField("id")))
}

pub async fn show(api: &ApiClient, settings: &Settings, input: &str) -> Result<()> {
    let transfer = load_transfer(api, settings, input).await?;
    print!("{}", render(&transfer, now_ms()));
    Ok(())
}

fn render(t: &Transfer, now: Millis) -> String {
    let mut out = String::new();
    out.push_str(&format!("Transfer {} ({})\n", t.id, t.status));
    out.push_str(&format!("  share link: {}\n", t.share_url));
    out.push_str(&format!("  created:    {}\n", local_time(t.created_at)));
    out.push_str(&format!("  completed:  {}\n", local_time(t.completed_at)));
    let expiry_note = if t.is_expired(now) { " (expired)" } else { "" };
    out.push_str(&format!(
        "  expires:    {}{expiry_note}\n",
        local_time(t.expires_at)
    ));
    out.push_str(&format!(
        "  files:      {}, {} total\n",
        t.files.len(),
        human_size(t.total_size())
    ));
    for (i, file) in t.files.iter().enumerate() {
        out.push_str(&format!(
            "    [{i}] {}  {}  {}\n",
            file.name,
            file.content_type,
            human_size(file.size)
        ));
    }
    out
}

/// Expiry gates every download action, whatever the stored status says.
fn ensure_downloadable(t: &Transfer, now: Millis) -> Result<()> {
    if t.is_expired(now) {
        bail!(
            "transfer {} expired on {}; downloads are disabled",
            t.id,
            local_time(t.expires_at)
        );
    }
    Ok(())
}

pub async fn fetch(
    api: &ApiClient,
    settings: &Settings,
    input: &str,
    args: FetchArgs,
    cancel: &CancellationToken,
    tty: bool,
) -> Result<()> {
    let transfer = load_transfer(api, settings, input).await?;
    ensure_downloadable(&transfer, now_ms())?;
    tokio::fs::create_dir_all(&args.out)
        .await
        .with_context(|| format!("cannot create {}", args.out.display()))?;

    if args.zip {
        let name = format!("transfer-{}.zip", transfer.id);
        let res = api.fetch_zip(&transfer.id).await?;
        save_stream(res, &args.out.join(&name), None, tty).await?;
        eprintln!("Saved {name}.");
        return Ok(());
    }

    let indexes: Vec<usize> = if args.files.is_empty() {
        (0..transfer.files.len()).collect()
    } else {
        args.files.clone()
    };
    let total = indexes.len();
    for (n, index) in indexes.into_iter().enumerate() {
        if cancel.is_cancelled() {
            bail!("cancelled after {n} of {total} files");
        }
        let file = transfer.files.get(index).ok_or_else(|| {
            anyhow!(
                "no file at index {index}; transfer has {} files",
                transfer.files.len()
            )
        })?;
        debug!("downloading [{index}] {}", file.name);
        let url = api.file_download_url(&transfer.id, index).await?;
        let res = api.fetch_bytes(&url).await?;
        let name = safe_file_name(&file.name);
        save_stream(res, &args.out.join(&name), Some(file.size), tty).await?;
        eprintln!("Saved {name} ({}/{total}).", n + 1);
    }
    Ok(())
}

/// Strips any path components a hostile record might carry.
fn safe_file_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")
        .unwrap_or("download")
        .to_string()
}

async fn save_stream(
    res: reqwest::Response,
    dest: &Path,
    size_hint: Option<u64>,
    tty: bool,
) -> Result<()> {
    let total = size_hint.or_else(|| res.content_length());
    let name = dest
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("download")
        .to_string();
    let mut bar = match (tty, total) {
        (true, Some(total)) => Some(make_bar(&name, total)),
        _ => None,
    };

    let mut out = tokio::fs::File::create(dest)
        .await
        .with_context(|| format!("cannot create {}", dest.display()))?;
    let mut body = res.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(ApiError::from)?;
        out.write_all(&chunk).await?;
        if let Some(bar) = bar.as_mut() {
            let _ = bar.update(chunk.len());
        }
    }
    out.flush().await?;
    if let Some(mut bar) = bar {
        let _ = bar.clear();
    }
    Ok(())
}
