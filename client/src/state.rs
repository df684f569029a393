//! Selection and progress state for one `send` invocation.

use std::path::PathBuf;

use common::payloads::{InitFile, InitRequest};

/// A locally chosen file. The `uid` is generated client-side for
/// listing and removal; nothing here is ever persisted.
#[derive(Clone, Debug)]
pub struct SelectedFile {
    pub uid: u64,
    pub path: PathBuf,
    pub name: String,
    pub content_type: String,
    pub size: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Uploading,
    Finalizing,
    Done,
    Failed,
}

pub struct UploadState {
    next_uid: u64,
    files: Vec<SelectedFile>,
    pub phase: Phase,
    pub status_text: String,
    pub error_text: Option<String>,
    pub share_url: Option<String>,
}

impl UploadState {
    pub fn new() -> Self {
        Self {
            next_uid: 1,
            files: Vec::new(),
            phase: Phase::Idle,
            status_text: String::new(),
            error_text: None,
            share_url: None,
        }
    }

    pub fn files(&self) -> &[SelectedFile] {
        &self.files
    }

    /// Adds a file to the selection. Any previously produced share link
    /// belonged to a different set, so the outcome state is reset.
    pub fn add_file(
        &mut self,
        path: PathBuf,
        name: String,
        content_type: String,
        size: u64,
    ) -> u64 {
        self.reset_outcome();
        let uid = self.next_uid;
        self.next_uid += 1;
        self.files.push(SelectedFile {
            uid,
            path,
            name,
            content_type,
            size,
        });
        uid
    }

    /// Removes by uid; returns whether anything was removed. The outcome
    /// reset only happens when the selection actually changed.
    pub fn remove_file(&mut self, uid: u64) -> bool {
        let before = self.files.len();
        self.files.retain(|f| f.uid != uid);
        let removed = self.files.len() != before;
        if removed {
            self.reset_outcome();
        }
        removed
    }

    fn reset_outcome(&mut self) {
        self.phase = Phase::Idle;
        self.status_text.clear();
        self.error_text = None;
        self.share_url = None;
    }

    pub fn set_phase(&mut self, phase: Phase, status: impl Into<String>) {
        self.phase = phase;
        self.status_text = status.into();
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.phase = Phase::Failed;
        self.error_text = Some(error.into());
    }

    pub fn finish(&mut self, share_url: String) {
        self.phase = Phase::Done;
        self.status_text = "done".to_string();
        self.share_url = Some(share_url);
    }

    /// The init payload: one entry per selected file, selection order.
    pub fn init_request(&self) -> InitRequest {
        InitRequest {
            files: self
                .files
                .iter()
                .map(|f| InitFile {
                    name: f.name.clone(),
                    content_type: f.content_type.clone(),
                    size: f.size,
                })
                .collect(),
        }
    }
}

impl Default for UploadState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(state: &mut UploadState, name: &str, size: u64) -> u64 {
        state.add_file(
            PathBuf::from(format!("/tmp/{name}")),
            name.to_string(),
            "application/octet-stream".to_string(),
            size,
        )
    }

    #[test]
    fn init_request_preserves_selection_order_and_count() {
        let mut state = UploadState::new();
        for (name, size) in [("a.bin", 1), ("b.bin", 2), ("c.bin", 3)] {
            add(&mut state, name, size);
        }
        let req = state.init_request();
        assert_eq!(req.files.len(), 3);
        let names: Vec<_> = req.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a.bin", "b.bin", "c.bin"]);
    }

    #[test]
    fn uids_are_unique_even_across_removal() {
        let mut state = UploadState::new();
        let first = add(&mut state, "a.bin", 1);
        state.remove_file(first);
        let second = add(&mut state, "a.bin", 1);
        assert_ne!(first, second);
    }

    #[test]
    fn adding_a_file_clears_the_previous_outcome() {
        let mut state = UploadState::new();
        add(&mut state, "a.bin", 1);
        state.finish("https://send.example.com/t/tr_1".into());
        state.status_text = "done".into();

        add(&mut state, "b.bin", 2);
        assert_eq!(state.phase, Phase::Idle);
        assert!(state.share_url.is_none());
        assert!(state.status_text.is_empty());
        assert!(state.error_text.is_none());
    }

    #[test]
    fn removing_a_file_clears_the_previous_outcome() {
        let mut state = UploadState::new();
        let uid = add(&mut state, "a.bin", 1);
        state.finish("https://send.example.com/t/tr_2".into());

        assert!(state.remove_file(uid));
        assert!(state.share_url.is_none());
        assert!(state.status_text.is_empty());
    }

    #[test]
    fn removing_nothing_leaves_the_outcome_alone() {
        let mut state = UploadState::new();
        add(&mut state, "a.bin", 1);
        state.finish("https://send.example.com/t/tr_3".into());

        assert!(!state.remove_file(999));
        assert_eq!(
            state.share_url.as_deref(),
            Some("https://send.example.com/t/tr_3")
        );
    }
}
