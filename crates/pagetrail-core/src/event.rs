use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Largest dwell time a store can hold. Stored documents carry a signed
/// 64-bit value, so anything above this is clamped on write.
pub const MAX_DWELL_MS: u64 = i64::MAX as u64;

/// Body of `POST /api/navigation/view`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PageViewPayload {
    pub user_id: String,
    pub current_page: String,
    pub previous_page: Option<String>,
    pub session_id: String,
    pub user_email: Option<String>,
}

/// Body of `POST /api/navigation/exit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PageExitPayload {
    pub user_id: String,
    pub exit_page: String,
    pub session_id: String,
    /// Milliseconds on the page. Missing means the client did not measure it.
    pub time_spent_on_page: Option<u64>,
    pub user_email: Option<String>,
}

/// A validated page-navigation event as read back from a collection.
///
/// Every stored record carries at least one of `current_page` or
/// `exit_page`; [`PageEvent::try_from`] rejects documents that do not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEvent {
    pub id: String,
    pub user_id: String,
    pub previous_page: Option<String>,
    pub current_page: Option<String>,
    pub exit_page: Option<String>,
    pub session_id: String,
    /// Server-assigned at insert time.
    pub timestamp: DateTime<Utc>,
    /// Dwell time in milliseconds. `Some(0)` on plain navigation records.
    pub time_spent_on_page: Option<u64>,
    pub user_email: Option<String>,
    pub is_exit: bool,
}

impl PageEvent {
    /// The page this record is "about": `current_page`, falling back to `exit_page`.
    pub fn page(&self) -> Option<&str> {
        self.current_page.as_deref().or(self.exit_page.as_deref())
    }
}

/// The write-side record produced by the logger. Id and timestamp are
/// assigned by the store on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPageEvent {
    pub user_id: String,
    pub previous_page: Option<String>,
    pub current_page: Option<String>,
    pub exit_page: Option<String>,
    pub session_id: String,
    pub time_spent_on_page: Option<u64>,
    pub user_email: Option<String>,
    pub is_exit: bool,
}

impl NewPageEvent {
    pub fn page_view(
        user_id: &str,
        current_page: &str,
        previous_page: Option<&str>,
        session_id: &str,
        user_email: Option<&str>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            previous_page: previous_page.map(str::to_string),
            current_page: Some(current_page.to_string()),
            exit_page: None,
            session_id: session_id.to_string(),
            time_spent_on_page: Some(0),
            user_email: user_email.map(str::to_string),
            is_exit: false,
        }
    }

    pub fn page_exit(
        user_id: &str,
        exit_page: &str,
        session_id: &str,
        time_spent_on_page: u64,
        user_email: Option<&str>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            previous_page: None,
            current_page: None,
            exit_page: Some(exit_page.to_string()),
            session_id: session_id.to_string(),
            time_spent_on_page: Some(time_spent_on_page.min(MAX_DWELL_MS)),
            user_email: user_email.map(str::to_string),
            is_exit: true,
        }
    }

    /// Materialise the stored form once the store has assigned identity.
    pub fn into_stored(self, id: String, timestamp: DateTime<Utc>) -> PageEvent {
        PageEvent {
            id,
            user_id: self.user_id,
            previous_page: self.previous_page,
            current_page: self.current_page,
            exit_page: self.exit_page,
            session_id: self.session_id,
            timestamp,
            time_spent_on_page: self.time_spent_on_page,
            user_email: self.user_email,
            is_exit: self.is_exit,
        }
    }
}

/// A raw document as it comes out of a collection, before validation.
///
/// Stores hand these back instead of [`PageEvent`] so that malformed rows are
/// caught in one place rather than defaulted field by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDocument {
    pub id: String,
    pub user_id: Option<String>,
    pub previous_page: Option<String>,
    pub current_page: Option<String>,
    pub exit_page: Option<String>,
    pub session_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub time_spent_on_page: Option<i64>,
    pub user_email: Option<String>,
    pub is_exit: Option<bool>,
}

impl From<PageEvent> for PageDocument {
    fn from(event: PageEvent) -> Self {
        Self {
            id: event.id,
            user_id: Some(event.user_id),
            previous_page: event.previous_page,
            current_page: event.current_page,
            exit_page: event.exit_page,
            session_id: Some(event.session_id),
            timestamp: Some(event.timestamp),
            time_spent_on_page: event
                .time_spent_on_page
                .map(|ms| i64::try_from(ms).unwrap_or(i64::MAX)),
            user_email: event.user_email,
            is_exit: Some(event.is_exit),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TryFrom<PageDocument> for PageEvent {
    type Error = CoreError;

    fn try_from(doc: PageDocument) -> Result<Self, Self::Error> {
        let malformed = |reason| CoreError::MalformedEvent {
            id: doc.id.clone(),
            reason,
        };

        let user_id = non_blank(doc.user_id.clone()).ok_or_else(|| malformed("missing userId"))?;
        let session_id =
            non_blank(doc.session_id.clone()).ok_or_else(|| malformed("missing sessionId"))?;
        let timestamp = doc.timestamp.ok_or_else(|| malformed("missing timestamp"))?;
        let time_spent_on_page = match doc.time_spent_on_page {
            Some(ms) if ms < 0 => return Err(malformed("negative timeSpentOnPage")),
            Some(ms) => Some(ms as u64),
            None => None,
        };
        let current_page = non_blank(doc.current_page.clone());
        let exit_page = non_blank(doc.exit_page.clone());
        if current_page.is_none() && exit_page.is_none() {
            return Err(malformed("neither currentPage nor exitPage set"));
        }

        Ok(PageEvent {
            id: doc.id,
            user_id,
            previous_page: non_blank(doc.previous_page),
            current_page,
            exit_page,
            session_id,
            timestamp,
            time_spent_on_page,
            user_email: non_blank(doc.user_email),
            is_exit: doc.is_exit.unwrap_or(false),
        })
    }
}

/// Outcome of running a batch of documents through boundary validation.
#[derive(Debug, Default)]
pub struct Validated {
    pub events: Vec<PageEvent>,
    pub quarantined: usize,
}

/// Validate every document, keeping delivery order. Malformed documents are
/// logged and counted, never repaired.
pub fn validate_documents(docs: Vec<PageDocument>) -> Validated {
    let mut out = Validated {
        events: Vec::with_capacity(docs.len()),
        quarantined: 0,
    };
    for doc in docs {
        match PageEvent::try_from(doc) {
            Ok(event) => out.events.push(event),
            Err(e) => {
                tracing::warn!(error = %e, "Quarantined malformed page event");
                out.quarantined += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str) -> PageDocument {
        PageDocument {
            id: id.to_string(),
            user_id: Some("u1".to_string()),
            current_page: Some("/home".to_string()),
            session_id: Some("s1".to_string()),
            timestamp: Some(Utc::now()),
            time_spent_on_page: Some(0),
            ..Default::default()
        }
    }

    #[test]
    fn well_formed_document_converts() {
        let event = PageEvent::try_from(doc("d1")).expect("valid");
        assert_eq!(event.user_id, "u1");
        assert_eq!(event.page(), Some("/home"));
        assert!(!event.is_exit);
    }

    #[test]
    fn missing_user_id_is_rejected() {
        let mut d = doc("d1");
        d.user_id = None;
        let err = PageEvent::try_from(d).expect_err("must reject");
        assert!(err.to_string().contains("missing userId"));
    }

    #[test]
    fn document_without_any_page_is_rejected() {
        let mut d = doc("d1");
        d.current_page = Some("  ".to_string());
        let err = PageEvent::try_from(d).expect_err("must reject");
        assert!(err.to_string().contains("neither currentPage nor exitPage"));
    }

    #[test]
    fn negative_dwell_time_is_rejected() {
        let mut d = doc("d1");
        d.time_spent_on_page = Some(-5);
        assert!(PageEvent::try_from(d).is_err());
    }

    #[test]
    fn exit_only_document_falls_back_to_exit_page() {
        let mut d = doc("d1");
        d.current_page = None;
        d.exit_page = Some("/pricing".to_string());
        d.is_exit = Some(true);
        let event = PageEvent::try_from(d).expect("valid");
        assert_eq!(event.page(), Some("/pricing"));
        assert!(event.is_exit);
    }

    #[test]
    fn validate_documents_counts_quarantined_and_keeps_order() {
        let mut bad = doc("bad");
        bad.timestamp = None;
        let validated = validate_documents(vec![doc("a"), bad, doc("b")]);
        assert_eq!(validated.quarantined, 1);
        let ids: Vec<&str> = validated.events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn page_exit_record_carries_dwell_time() {
        let exit = NewPageEvent::page_exit("u1", "/pricing", "s1", 4200, None);
        assert!(exit.is_exit);
        assert_eq!(exit.current_page, None);
        assert_eq!(exit.time_spent_on_page, Some(4200));
    }

    #[test]
    fn view_payload_uses_camel_case() {
        let payload: PageViewPayload = serde_json::from_str(
            r#"{"userId":"u1","currentPage":"/home","sessionId":"s1"}"#,
        )
        .expect("parse");
        assert_eq!(payload.user_id, "u1");
        assert_eq!(payload.previous_page, None);
    }

    #[test]
    fn payload_with_unknown_field_is_rejected() {
        let res = serde_json::from_str::<PageExitPayload>(
            r#"{"userId":"u1","exitPage":"/home","sessionId":"s1","ref":"x"}"#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn oversized_dwell_time_is_clamped_not_quarantined() {
        let exit = NewPageEvent::page_exit("u1", "/pricing", "s1", u64::MAX, None);
        assert_eq!(exit.time_spent_on_page, Some(MAX_DWELL_MS));

        let doc = PageDocument::from(exit.into_stored("e1".to_string(), Utc::now()));
        assert_eq!(doc.time_spent_on_page, Some(i64::MAX));
        let event = PageEvent::try_from(doc).expect("valid");
        assert_eq!(event.time_spent_on_page, Some(MAX_DWELL_MS));
    }
}
