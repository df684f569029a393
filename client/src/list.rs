//! The uploads list: every transfer owned by the signed-in user, plus
//! the share-link actions (copy, open).

use anyhow::Result;
use log::debug;

use common::data::Transfer;

use crate::api::ApiClient;
use crate::config::Settings;
use crate::external::{copy_to_clipboard, open_in_browser};
use crate::helpers::{human_size, local_time, now_ms};
use crate::show::load_transfer;

pub async fn list(api: &ApiClient, settings: &Settings) -> Result<()> {
    let response = api.my_transfers().await?;
    let now = now_ms();
    let mut transfers: Vec<Transfer> = response
        .transfers
        .into_iter()
        .filter_map(|raw| raw.normalize(&settings.share_origin, now))
        .collect();
    if transfers.is_empty() {
        eprintln!("No transfers.");
        return Ok(());
    }
    transfers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    debug!("{} transfers", transfers.len());

    println!(
        "{:<28} {:<8} {:>5} {:>10} {:<17} {:<17} SHARE LINK",
        "ID", "STATUS", "FILES", "SIZE", "CREATED", "EXPIRES"
    );
    for t in &transfers {
        println!(
            "{:<28} {:<8} {:>5} {:>10} {:<17} {:<17} {}",
            t.id,
            t.status.to_string(),
            t.files.len(),
            human_size(t.total_size()),
            local_time(t.created_at),
            local_time(t.expires_at),
            t.share_url
        );
    }
    Ok(())
}

/// Prints a transfer's share link; `copy` puts it on the clipboard,
/// `open` hands it to the default browser.
pub async fn link(
    api: &ApiClient,
    settings: &Settings,
    input: &str,
    copy: bool,
    open: bool,
) -> Result<()> {
    let transfer = load_transfer(api, settings, input).await?;
    println!("{}", transfer.share_url);
    if copy {
        if copy_to_clipboard(&transfer.share_url) {
            eprintln!("Copied to clipboard.");
        } else {
            eprintln!("No clipboard utility found; link printed above.");
        }
    }
    if open && !open_in_browser(&transfer.share_url) {
        eprintln!("No browser opener found; link printed above.");
    }
    Ok(())
}
