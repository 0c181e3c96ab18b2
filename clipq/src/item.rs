use bytes::Bytes;
use chrono::{DateTime, Utc};
use compact_str::{CompactString, ToCompactString};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

const TITLE_MAX_CHARS: usize = 50;

/// Clipboard representation tag of a single payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PayloadKind {
    Text,
    RichText,
    Html,
    FileUrl,
    Png,
    Tiff,
    Custom(CompactString),

    /// Stamped on every clipboard write made by the queue engine itself
    Marker,

    /// Source-application modification stamp; changes on every copy
    Modified,
}

impl PayloadKind {
    /// Volatile kinds never take part in structural equality.
    #[inline]
    pub fn is_volatile(&self) -> bool {
        matches!(self, PayloadKind::Marker | PayloadKind::Modified)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub kind: PayloadKind,
    pub data: Bytes,
}

impl Payload {
    pub fn new(kind: PayloadKind, data: impl Into<Bytes>) -> Self {
        Self {
            kind,
            data: data.into(),
        }
    }

    pub fn text(text: &str) -> Self {
        Self::new(PayloadKind::Text, Bytes::copy_from_slice(text.as_bytes()))
    }
}

/// One captured copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub id: Uuid,
    pub payloads: SmallVec<[Payload; 4]>,
    pub first_copied_at: DateTime<Utc>,
    pub last_copied_at: DateTime<Utc>,
    pub copy_count: u32,
    pub title: CompactString,
}

impl HistoryItem {
    pub fn new(payloads: impl IntoIterator<Item = Payload>) -> Self {
        let payloads: SmallVec<[Payload; 4]> = payloads.into_iter().collect();
        let now = Utc::now();
        let title = derive_title(&payloads);

        Self {
            id: Uuid::new_v4(),
            payloads,
            first_copied_at: now,
            last_copied_at: now,
            copy_count: 1,
            title,
        }
    }

    pub fn from_text(text: &str) -> Self {
        Self::new([Payload::text(text)])
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payloads.push(payload);
        self.title = derive_title(&self.payloads);
        self
    }

    pub fn content(&self) -> impl Iterator<Item = &Payload> {
        self.payloads.iter().filter(|p| !p.kind.is_volatile())
    }

    /// A capture with no non-volatile payload carries nothing worth keeping.
    pub fn is_empty(&self) -> bool {
        self.content().next().is_none()
    }

    pub fn text(&self) -> Option<&str> {
        self.payloads
            .iter()
            .find(|p| p.kind == PayloadKind::Text)
            .and_then(|p| std::str::from_utf8(&p.data).ok())
    }

    pub fn is_engine_write(&self) -> bool {
        self.payloads.iter().any(|p| p.kind == PayloadKind::Marker)
    }

    /// Copy of this item as the engine writes it to the clipboard.
    #[must_use]
    pub fn marked(&self) -> Self {
        if self.is_engine_write() {
            return self.clone();
        }
        let mut item = self.clone();
        item.payloads.push(Payload::new(PayloadKind::Marker, Bytes::new()));
        item
    }

    /// Every non-volatile payload of `other` is also present here.
    pub fn supersedes(&self, other: &HistoryItem) -> bool {
        other
            .content()
            .all(|wanted| self.content().any(|have| have == wanted))
    }

    pub fn structurally_equal(&self, other: &HistoryItem) -> bool {
        self.supersedes(other) || other.supersedes(self)
    }

    /// Fold an earlier equal entry into this newer capture.
    ///
    /// Keeps the earlier identity and first capture time, sums copy counts and
    /// retains whichever payload set is richer.
    #[must_use]
    pub fn merge_earlier(mut self, earlier: HistoryItem) -> Self {
        if !self.supersedes(&earlier) {
            self.payloads = earlier.payloads;
            self.title = earlier.title;
        }
        self.id = earlier.id;
        self.first_copied_at = self.first_copied_at.min(earlier.first_copied_at);
        self.copy_count = self.copy_count.saturating_add(earlier.copy_count);
        self
    }
}

fn derive_title(payloads: &[Payload]) -> CompactString {
    let text = payloads
        .iter()
        .find(|p| p.kind == PayloadKind::Text)
        .and_then(|p| std::str::from_utf8(&p.data).ok());

    if let Some(text) = text {
        let line = text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
        if line.chars().count() > TITLE_MAX_CHARS {
            let mut title: CompactString = line.chars().take(TITLE_MAX_CHARS).collect();
            title.push('…');
            return title;
        }
        return line.to_compact_string();
    }

    for payload in payloads.iter().filter(|p| !p.kind.is_volatile()) {
        match &payload.kind {
            PayloadKind::FileUrl => {
                let url = String::from_utf8_lossy(&payload.data);
                let name = url.trim_end_matches('/').rsplit('/').next().unwrap_or("");
                return name.to_compact_string();
            }
            PayloadKind::Png | PayloadKind::Tiff => return CompactString::const_new("Image"),
            PayloadKind::Custom(tag) => return tag.clone(),
            _ => {}
        }
    }

    CompactString::default()
}
