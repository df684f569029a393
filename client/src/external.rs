//! Desktop integration: clipboard copy and opening links in a browser.
//!
//! Both shell out to whatever platform utility is present. Neither is
//! allowed to fail the calling command; the clipboard falls back to
//! printing the text so the user can copy it by hand.

use std::io::Write;
use std::process::{Command, Stdio};

use log::debug;

const CLIPBOARD_TOOLS: &[&[&str]] = &[
    &["wl-copy"],
    &["xclip", "-selection", "clipboard"],
    &["xsel", "--clipboard", "--input"],
    &["pbcopy"],
    &["clip"],
];

const OPENERS: &[&str] = &["xdg-open", "open"];

/// Places `text` on the system clipboard. Returns false when no
/// clipboard utility worked and the text was printed instead.
pub fn copy_to_clipboard(text: &str) -> bool {
    for argv in CLIPBOARD_TOOLS {
        if pipe_to_tool(argv, text) {
            debug!("copied via {}", argv[0]);
            return true;
        }
    }
    fallback_copy(&mut std::io::stdout(), text);
    false
}

/// Opens `url` in the default browser. Returns false when no opener
/// worked; the caller has already printed the URL.
pub fn open_in_browser(url: &str) -> bool {
    for opener in OPENERS {
        let spawned = Command::new(opener)
            .arg(url)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if matches!(spawned, Ok(s) if s.success()) {
            debug!("opened via {opener}");
            return true;
        }
    }
    false
}

fn pipe_to_tool(argv: &[&str], text: &str) -> bool {
    let child = Command::new(argv[0])
        .args(&argv[1..])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    let Ok(mut child) = child else {
        return false;
    };
    let Some(mut stdin) = child.stdin.take() else {
        let _ = child.kill();
        return false;
    };
    if stdin.write_all(text.as_bytes()).is_err() {
        let _ = child.kill();
        let _ = child.wait();
        return false;
    }
    drop(stdin);
    matches!(child.wait(), Ok(s) if s.success())
}

/// The no-clipboard fallback: the exact string, one line, never fails.
fn fallback_copy<W: Write>(out: &mut W, text: &str) {
    let _ = writeln!(out, "{text}");
}
