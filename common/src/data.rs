use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Epoch milliseconds.
///
/// The backend emits timestamps either as plain numbers or as rich
/// objects carrying seconds and nanoseconds; both forms coerce to
/// milliseconds on deserialization. Serialization always writes the
/// plain number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Millis(pub u64);

#[derive(Deserialize)]
struct RichTimestamp {
    #[serde(alias = "_seconds")]
    seconds: u64,
    #[serde(default, alias = "_nanoseconds", alias = "nanos")]
    nanoseconds: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    Number(f64),
    Rich(RichTimestamp),
}

impl From<WireTimestamp> for Millis {
    fn from(value: WireTimestamp) -> Self {
        match value {
            WireTimestamp::Number(ms) => Millis(ms.max(0.0) as u64),
            WireTimestamp::Rich(rich) => {
                Millis(rich.seconds * 1_000 + u64::from(rich.nanoseconds) / 1_000_000)
            }
        }
    }
}

impl<'de> Deserialize<'de> for Millis {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        WireTimestamp::deserialize(deserializer).map(Into::into)
    }
}

impl Serialize for Millis {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

/// One file inside a transfer. The storage `path` is assigned by the
/// backend at initialization time; until then it is absent.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub name: String,
    pub content_type: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    /// Initialized but not yet completed.
    Draft,
    /// Completed; the share link is live.
    Ready,
    /// Past its expiry timestamp. Derived locally, never stored.
    Expired,
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Ready => "ready",
            Self::Expired => "expired",
        };
        write!(f, "{s}")
    }
}

/// Derives the displayed status. Expiry wins over whatever the backend
/// reported; a transfer with no expiry timestamp never expires.
pub fn derive_status(ready: bool, expires_at: Option<Millis>, now: Millis) -> TransferStatus {
    if expires_at.is_some_and(|e| e < now) {
        TransferStatus::Expired
    } else if ready {
        TransferStatus::Ready
    } else {
        TransferStatus::Draft
    }
}

/// A normalized transfer record. Built from backend responses via
/// [`crate::payloads::RawTransferRecord::normalize`]; the client never
/// mutates one after completion.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub id: String,
    pub status: TransferStatus,
    pub created_at: Option<Millis>,
    pub completed_at: Option<Millis>,
    pub expires_at: Option<Millis>,
    pub files: Vec<FileDescriptor>,
    pub share_url: String,
}

impl Transfer {
    /// Sum of the declared sizes of all files.
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    pub fn is_expired(&self, now: Millis) -> bool {
        self.expires_at.is_some_and(|e| e < now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_from_plain_number() {
        let ts: Millis = serde_json::from_str("1722470400000").unwrap();
        assert_eq!(ts, Millis(1_722_470_400_000));
    }

    #[test]
    fn millis_from_rich_object_forms() {
        let underscored: Millis =
            serde_json::from_str(r#"{"_seconds": 1722470400, "_nanoseconds": 500000000}"#).unwrap();
        assert_eq!(underscored, Millis(1_722_470_400_500));

        let plain: Millis =
            serde_json::from_str(r#"{"seconds": 1722470400, "nanoseconds": 250000000}"#).unwrap();
        assert_eq!(plain, Millis(1_722_470_400_250));

        let no_nanos: Millis = serde_json::from_str(r#"{"seconds": 10}"#).unwrap();
        assert_eq!(no_nanos, Millis(10_000));
    }

    #[test]
    fn millis_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Millis(42)).unwrap(), "42");
    }

    #[test]
    fn status_derivation() {
        let now = Millis(1_000_000);
        // Expiry in the past wins regardless of the reported status.
        assert_eq!(
            derive_status(true, Some(Millis(999_999)), now),
            TransferStatus::Expired
        );
        assert_eq!(
            derive_status(false, Some(Millis(999_999)), now),
            TransferStatus::Expired
        );
        // Future expiry leaves the backend's word standing.
        assert_eq!(
            derive_status(true, Some(Millis(2_000_000)), now),
            TransferStatus::Ready
        );
        assert_eq!(derive_status(false, None, now), TransferStatus::Draft);
    }

    #[test]
    fn no_expiry_never_expires() {
        let t = Transfer {
            id: "tr_1".into(),
            status: TransferStatus::Ready,
            created_at: None,
            completed_at: None,
            expires_at: None,
            files: vec![],
            share_url: "https://send.example.com/t/tr_1".into(),
        };
        assert!(!t.is_expired(Millis(u64::MAX)));
    }

    #[test]
    fn total_size_sums_files() {
        let file = |size| FileDescriptor {
            name: "f".into(),
            content_type: "application/octet-stream".into(),
            size,
            path: None,
        };
        let t = Transfer {
            id: "tr_2".into(),
            status: TransferStatus::Draft,
            created_at: None,
            completed_at: None,
            expires_at: None,
            files: vec![file(10), file(32)],
            share_url: String::new(),
        };
        assert_eq!(t.total_size(), 42);
    }

    #[test]
    fn file_descriptor_wire_casing() {
        let f = FileDescriptor {
            name: "report.pdf".into(),
            content_type: "application/pdf".into(),
            size: 123,
            path: Some("transfers/tr_1/report.pdf".into()),
        };
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["contentType"], "application/pdf");
        assert_eq!(json["path"], "transfers/tr_1/report.pdf");
        let back: FileDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(back, f);
    }
}
