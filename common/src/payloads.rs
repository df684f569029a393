use serde::{Deserialize, Serialize};

use crate::data::{derive_status, FileDescriptor, Millis, Transfer};
use crate::share_url_for;

// Request payloads

/// Body of `POST /api/transfers/init`. Files are listed in selection
/// order; the backend answers with one upload target per entry, in the
/// same order.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct InitRequest {
    pub files: Vec<InitFile>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InitFile {
    pub name: String,
    pub content_type: String,
    pub size: u64,
}

/// Body of `POST /api/transfers/complete`: the id from initialization
/// plus the same files, now carrying their assigned storage paths.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    pub transfer_id: String,
    pub files: Vec<FileDescriptor>,
}

/// Body of `POST /api/transfers/:id/email`.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EmailRequest {
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// Response payloads

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct InitResponse {
    pub transfer_id: String,
    pub files: Vec<UploadTarget>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UploadTarget {
    /// Storage object path assigned by the backend.
    pub path: String,
    /// Pre-signed URL; the URL itself is the write credential.
    pub upload_url: String,
}

/// `shareUrl` is nominally always present on success; it is optional
/// here so its absence surfaces as a malformed-response error instead
/// of a decode failure.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct CompleteResponse {
    #[serde(default)]
    pub share_url: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct DownloadUrlResponse {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TransferListResponse {
    pub transfers: Vec<RawTransferRecord>,
}

/// Failure envelope: every failing response carries an `error` field.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

/// Best-effort extraction of the `error` field from a response body.
pub fn extract_error(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body).ok()?.error
}

/// A transfer record as the backend actually returns it. Field names
/// and shapes vary between deployments, so everything is optional and
/// [`normalize`](Self::normalize) produces the canonical [`Transfer`].
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawTransferRecord {
    #[serde(default)]
    pub id: Option<String>,
    /// Some deployments use this name instead of `id`.
    #[serde(default)]
    pub transfer_id: Option<String>,
    /// Stored status string; only `"ready"` is meaningful.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub share_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<Millis>,
    #[serde(default)]
    pub completed_at: Option<Millis>,
    #[serde(default)]
    pub expires_at: Option<Millis>,
    #[serde(default)]
    pub files: Vec<FileDescriptor>,
}

impl RawTransferRecord {
    /// Normalizes a backend record: id from either field name, share URL
    /// synthesized from `origin` when absent, status derived from the
    /// expiry timestamp and the stored `"ready"` marker. Returns `None`
    /// when the record carries no id under either name.
    pub fn normalize(self, origin: &str, now: Millis) -> Option<Transfer> {
        let id = self.id.or(self.transfer_id)?;
        let ready = self.status.as_deref() == Some("ready");
        let share_url = self
            .share_url
            .unwrap_or_else(|| share_url_for(origin, &id));
        Some(Transfer {
            status: derive_status(ready, self.expires_at, now),
            id,
            created_at: self.created_at,
            completed_at: self.completed_at,
            expires_at: self.expires_at,
            files: self.files,
            share_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TransferStatus;

    const ORIGIN: &str = "https://send.example.com";

    #[test]
    fn normalize_accepts_either_id_field() {
        let by_id: RawTransferRecord =
            serde_json::from_str(r#"{"id": "tr_a", "status": "ready"}"#).unwrap();
        let by_transfer_id: RawTransferRecord =
            serde_json::from_str(r#"{"transferId": "tr_b"}"#).unwrap();

        let a = by_id.normalize(ORIGIN, Millis(0)).unwrap();
        let b = by_transfer_id.normalize(ORIGIN, Millis(0)).unwrap();
        assert_eq!(a.id, "tr_a");
        assert_eq!(b.id, "tr_b");
        // `id` wins when both are present.
        let both: RawTransferRecord =
            serde_json::from_str(r#"{"id": "tr_c", "transferId": "tr_d"}"#).unwrap();
        assert_eq!(both.normalize(ORIGIN, Millis(0)).unwrap().id, "tr_c");
    }

    #[test]
    fn normalize_without_any_id_is_rejected() {
        let record: RawTransferRecord = serde_json::from_str(r#"{"status": "ready"}"#).unwrap();
        assert!(record.normalize(ORIGIN, Millis(0)).is_none());
    }

    #[test]
    fn normalize_synthesizes_missing_share_url() {
        let record = RawTransferRecord {
            id: Some("tr_e".into()),
            ..Default::default()
        };
        let t = record.normalize(ORIGIN, Millis(0)).unwrap();
        assert_eq!(t.share_url, "https://send.example.com/t/tr_e");

        let with_url = RawTransferRecord {
            id: Some("tr_f".into()),
            share_url: Some("https://elsewhere.example.com/t/tr_f".into()),
            ..Default::default()
        };
        let t = with_url.normalize(ORIGIN, Millis(0)).unwrap();
        assert_eq!(t.share_url, "https://elsewhere.example.com/t/tr_f");
    }

    #[test]
    fn normalize_status_rules() {
        let record = |status: Option<&str>, expires_at| RawTransferRecord {
            id: Some("tr_g".into()),
            status: status.map(str::to_string),
            expires_at,
            ..Default::default()
        };
        let now = Millis(500);

        let expired = record(Some("ready"), Some(Millis(100)));
        assert_eq!(
            expired.normalize(ORIGIN, now).unwrap().status,
            TransferStatus::Expired
        );

        let ready = record(Some("ready"), Some(Millis(900)));
        assert_eq!(
            ready.normalize(ORIGIN, now).unwrap().status,
            TransferStatus::Ready
        );

        let draft = record(None, None);
        assert_eq!(
            draft.normalize(ORIGIN, now).unwrap().status,
            TransferStatus::Draft
        );
    }

    #[test]
    fn normalize_coerces_rich_timestamps() {
        let record: RawTransferRecord = serde_json::from_str(
            r#"{"id": "tr_h", "createdAt": {"_seconds": 3, "_nanoseconds": 0}, "expiresAt": 9000}"#,
        )
        .unwrap();
        let t = record.normalize(ORIGIN, Millis(0)).unwrap();
        assert_eq!(t.created_at, Some(Millis(3_000)));
        assert_eq!(t.expires_at, Some(Millis(9_000)));
    }

    #[test]
    fn error_extraction_is_best_effort() {
        assert_eq!(
            extract_error(r#"{"error": "transfer not found"}"#).unwrap(),
            "transfer not found"
        );
        assert!(extract_error(r#"{"ok": true}"#).is_none());
        assert!(extract_error("<html>504</html>").is_none());
    }

    #[test]
    fn init_request_wire_shape() {
        let req = InitRequest {
            files: vec![InitFile {
                name: "notes.txt".into(),
                content_type: "text/plain".into(),
                size: 9,
            }],
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["files"][0]["contentType"], "text/plain");

        let resp: InitResponse = serde_json::from_str(
            r#"{"transferId": "tr_i", "files": [{"path": "transfers/tr_i/notes.txt", "uploadUrl": "https://storage.example.com/x?sig=y"}]}"#,
        )
        .unwrap();
        assert_eq!(resp.transfer_id, "tr_i");
        assert_eq!(resp.files[0].path, "transfers/tr_i/notes.txt");
    }

    #[test]
    fn complete_response_share_url_may_be_absent() {
        let missing: CompleteResponse = serde_json::from_str("{}").unwrap();
        assert!(missing.share_url.is_none());
        let present: CompleteResponse =
            serde_json::from_str(r#"{"shareUrl": "https://send.example.com/t/tr_j"}"#).unwrap();
        assert_eq!(
            present.share_url.as_deref(),
            Some("https://send.example.com/t/tr_j")
        );
    }
}
