use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod embed;

/// A registered livestream link
///
/// This is the wire and storage shape: `{ id, title, url, isLive, createdAt }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Live {
    pub id: String,
    pub title: String,
    /// Canonical embeddable URL, already normalized
    pub url: String,
    pub is_live: bool,
    pub created_at: DateTime<Utc>,
}

impl Live {
    /// Build a record from a creation request, assigning a fresh id and
    /// normalizing the URL into its embeddable form.
    pub fn create(new: NewLive, created_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: new.title,
            url: embed::normalize_url(&new.url),
            is_live: new.is_live,
            created_at,
        }
    }
}

/// Fields an admin supplies when registering a livestream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLive {
    pub title: String,
    pub url: String,
    #[serde(default = "default_is_live")]
    pub is_live: bool,
}

fn default_is_live() -> bool {
    true
}

/// An admin account allowed to manage lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    /// Stored lowercased
    pub email: String,
    pub salt: String,
    pub password_hash: String,
}

/// Newest first, ties broken by id so the order is total
pub fn sort_newest_first(lives: &mut [Live]) {
    lives.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn create_normalizes_url_and_assigns_id() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let live = Live::create(
            NewLive {
                title: "Sunday service".to_string(),
                url: "https://youtu.be/abc123".to_string(),
                is_live: true,
            },
            now,
        );

        assert_eq!(live.url, "https://www.youtube.com/embed/abc123");
        assert_eq!(live.created_at, now);
        assert!(!live.id.is_empty());
    }

    #[test]
    fn ids_are_unique() {
        let now = Utc::now();
        let new = NewLive {
            title: "a".to_string(),
            url: "b".to_string(),
            is_live: false,
        };
        let a = Live::create(new.clone(), now);
        let b = Live::create(new, now);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn is_live_defaults_to_true() {
        let new: NewLive =
            serde_json::from_str(r#"{"title":"t","url":"https://example.com"}"#).unwrap();
        assert!(new.is_live);
    }

    #[test]
    fn serializes_camel_case() {
        let live = Live {
            id: "1".to_string(),
            title: "t".to_string(),
            url: "u".to_string(),
            is_live: true,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };
        let value = serde_json::to_value(&live).unwrap();
        assert_eq!(value["isLive"], true);
        assert_eq!(value["createdAt"], "2024-01-01T00:00:00Z");
    }

    #[test]
    fn sort_breaks_ties_by_id() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mk = |id: &str, secs: i64| Live {
            id: id.to_string(),
            title: id.to_string(),
            url: String::new(),
            is_live: false,
            created_at: t + chrono::Duration::seconds(secs),
        };
        let mut lives = vec![mk("b", 0), mk("a", 0), mk("c", 5)];
        sort_newest_first(&mut lives);
        let ids: Vec<_> = lives.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }
}
