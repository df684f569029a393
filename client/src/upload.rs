//! The upload orchestrator: initialize, PUT each file to its pre-signed
//! URL in selection order, then complete and surface the share link.
//!
//! Uploads are deliberately serialized. One file finishes before the
//! next begins, so progress is linear and a failure names exactly one
//! file. Nothing already uploaded is rolled back, and nothing is
//! retried automatically; the user retries by re-running the command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_stream::stream;
use bytes::BytesMut;
use kdam::{tqdm, BarExt, Column, RichProgress, Spinner};
use log::debug;
use tokio::io::AsyncReadExt;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio::{select, spawn};
use tokio_util::sync::CancellationToken;

use common::data::FileDescriptor;
use common::payloads::{CompleteRequest, EmailRequest};
use common::transfer_id_from_share_url;

use crate::api::{ApiClient, ApiError};
use crate::mimetype::content_type_for;
use crate::state::{Phase, SelectedFile, UploadState};

const CHUNK_SIZE: usize = 1024 * 1024;

/// Stats local files and adds them to the selection in argument order.
pub async fn gather(paths: &[PathBuf], state: &mut UploadState) -> Result<()> {
    for path in paths {
        let meta = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("cannot read {}", path.display()))?;
        if !meta.is_file() {
            bail!("{} is not a regular file", path.display());
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("{} has no usable file name", path.display()))?;
        let content_type = content_type_for(&name).to_string();
        state.add_file(path.clone(), name, content_type, meta.len());
    }
    Ok(())
}

/// Drives the three-step exchange. Returns the share URL on success.
pub async fn run(
    api: &ApiClient,
    state: &mut UploadState,
    cancel: &CancellationToken,
    tty: bool,
) -> Result<String> {
    if state.files().is_empty() {
        bail!("no files selected");
    }

    state.set_phase(Phase::Uploading, "initializing transfer");
    eprintln!("Initializing transfer ({} files)...", state.files().len());
    let init = api.init(&state.init_request()).await?;
    if init.files.len() != state.files().len() {
        bail!(
            "backend returned {} upload targets for {} files",
            init.files.len(),
            state.files().len()
        );
    }
    debug!("transfer {} initialized", init.transfer_id);

    let files = state.files().to_vec();
    let total = files.len();
    for (i, (file, target)) in files.iter().zip(&init.files).enumerate() {
        // Cancellation is checked between files, never mid-request.
        if cancel.is_cancelled() {
            bail!("cancelled before {}", file.name);
        }
        state.set_phase(
            Phase::Uploading,
            format!("uploading {} ({}/{})", file.name, i + 1, total),
        );
        put_file(api, file, &target.upload_url, tty)
            .await
            .map_err(|e| anyhow!("{}", upload_failure(&file.name, &e)))?;
        eprintln!("Uploaded {} ({}/{}).", file.name, i + 1, total);
    }

    state.set_phase(Phase::Finalizing, "finalizing transfer");
    eprintln!("Finalizing transfer...");
    let descriptors: Vec<FileDescriptor> = files
        .iter()
        .zip(&init.files)
        .map(|(file, target)| FileDescriptor {
            name: file.name.clone(),
            content_type: file.content_type.clone(),
            size: file.size,
            path: Some(target.path.clone()),
        })
        .collect();
    let done = api
        .complete(&CompleteRequest {
            transfer_id: init.transfer_id.clone(),
            files: descriptors,
        })
        .await?;
    let share_url = done
        .share_url
        .ok_or_else(|| anyhow!(ApiError::MissingField("shareUrl")))?;
    state.finish(share_url.clone());
    Ok(share_url)
}

/// Emails an existing share link. Independent of the upload sequence;
/// safe to re-run without re-uploading.
pub async fn send_link_email(
    api: &ApiClient,
    share_url: &str,
    to: &str,
    message: Option<String>,
) -> Result<()> {
    let id = transfer_id_from_share_url(share_url)
        .ok_or_else(|| anyhow!("share link {share_url} carries no transfer id"))?;
    api.send_email(
        &id,
        &EmailRequest {
            to: to.to_string(),
            message,
        },
    )
    .await
}

fn upload_failure(name: &str, err: &anyhow::Error) -> String {
    format!("upload of {name} failed: {err:#}")
}

async fn put_file(api: &ApiClient, file: &SelectedFile, url: &str, tty: bool) -> Result<()> {
    let fh = tokio::fs::File::open(&file.path)
        .await
        .with_context(|| format!("cannot open {}", file.path.display()))?;

    let (sender, receiver) = watch::channel(0u64);
    let token = CancellationToken::new();
    let bar = tty.then(|| make_bar(&file.name, file.size));
    let refresher = spawn(refresh_bar(bar, token.clone(), receiver));

    let result = api
        .upload_presigned(url, &file.content_type, file.size, upload_body(fh, sender))
        .await;

    token.cancel();
    if let Some(mut bar) = refresher.await? {
        let _ = bar.clear();
    }
    result
}

/// Streams the file as the request body, reporting cumulative bytes
/// through the watch channel as each chunk is handed to the transport.
fn upload_body(mut file: tokio::fs::File, progress: watch::Sender<u64>) -> reqwest::Body {
    let body = stream! {
        let mut sent = 0u64;
        loop {
            let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
            match file.read_buf(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    sent += n as u64;
                    let _ = progress.send(sent);
                    yield Ok::<_, std::io::Error>(buf.freeze());
                }
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    };
    reqwest::Body::wrap_stream(body)
}

pub(crate) fn make_bar(name: &str, total: u64) -> RichProgress {
    RichProgress::new(
        tqdm!(
            total = total as usize,
            unit_scale = true,
            unit_divisor = 1024,
            unit = "iB"
        ),
        vec![
            Column::Spinner(Spinner::new(
                &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"],
                80.0,
                1.0,
            )),
            Column::Text(format!("[bold blue]{name}")),
            Column::Animation,
            Column::Percentage(1),
            Column::Text("•".to_owned()),
            Column::CountTotal,
            Column::Text("•".to_owned()),
            Column::Rate,
            Column::Text("•".to_owned()),
            Column::RemainingTime,
        ],
    )
}

pub(crate) async fn refresh_bar(
    mut bar: Option<RichProgress>,
    token: CancellationToken,
    progress: watch::Receiver<u64>,
) -> Option<RichProgress> {
    let mut timer = tokio::time::interval(Duration::from_millis(100));
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        select! {
            _ = timer.tick() => {
                if let Some(bar) = bar.as_mut() {
                    let done = *progress.borrow();
                    let _ = bar.update_to(done as usize);
                }
            }
            _ = token.cancelled() => {
                return bar;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_names_file_and_status() {
        let err = anyhow!(ApiError::Status {
            status: 403,
            message: "signature expired".to_string(),
        });
        let text = upload_failure("report.pdf", &err);
        assert!(text.contains("report.pdf"));
        assert!(text.contains("403"));
        assert!(text.contains("signature expired"));
    }

    #[tokio::test]
    async fn gather_rejects_missing_files() {
        let mut state = UploadState::new();
        let missing = PathBuf::from("/definitely/not/here.bin");
        assert!(gather(&[missing], &mut state).await.is_err());
        assert!(state.files().is_empty());
    }

    #[tokio::test]
    async fn gather_records_name_type_and_size() {
        let dir = std::env::temp_dir().join("skiff-gather-test");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("notes.txt");
        tokio::fs::write(&path, b"hello").await.unwrap();

        let mut state = UploadState::new();
        gather(&[path], &mut state).await.unwrap();
        let files = state.files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "notes.txt");
        assert_eq!(files[0].content_type, "text/plain");
        assert_eq!(files[0].size, 5);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
