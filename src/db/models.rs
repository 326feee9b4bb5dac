use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    /// Opaque subject identifier issued by the external identity provider.
    pub subject: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tasting {
    pub id: Uuid,
    pub host_id: Uuid,
    pub host_name: String,
    pub name: String,
    pub item_count: i32,
    pub item_names: Json<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub closed: bool,
}

impl Tasting {
    pub fn status(&self) -> &'static str {
        if self.closed { "closed" } else { "open" }
    }

    /// Item names padded/truncated to exactly `item_count` entries. A stored
    /// list that disagrees with the item count is repaired on read, never
    /// trusted as-is.
    pub fn item_names_padded(&self) -> Vec<String> {
        let mut names = self.item_names.0.clone();
        names.resize(self.item_count as usize, String::new());
        names
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TastingResponse {
    pub tasting_id: Uuid,
    pub user_id: Uuid,
    pub display_name: String,
    /// One entry per item; None means "not yet rated" and is excluded from
    /// averages.
    pub ratings: Json<Vec<Option<u8>>>,
    pub notes: Json<Vec<String>>,
    pub submitted_at: DateTime<Utc>,
}

/// Whether the acting user is the tasting's host or a participant. Resolved
/// once per request and carried along, not re-derived per call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessRole {
    Host,
    Participant,
}

impl AccessRole {
    pub fn resolve(tasting: &Tasting, user_id: Uuid) -> Self {
        if tasting.host_id == user_id {
            AccessRole::Host
        } else {
            AccessRole::Participant
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tasting(item_count: i32, item_names: Vec<String>) -> Tasting {
        Tasting {
            id: Uuid::new_v4(),
            host_id: Uuid::new_v4(),
            host_name: "Host".to_string(),
            name: "Cellar night".to_string(),
            item_count,
            item_names: Json(item_names),
            created_at: Utc::now(),
            closed: false,
        }
    }

    #[test]
    fn item_names_are_padded_to_item_count() {
        let t = tasting(4, vec!["Merlot".to_string()]);
        let names = t.item_names_padded();
        assert_eq!(names.len(), 4);
        assert_eq!(names[0], "Merlot");
        assert_eq!(names[3], "");
    }

    #[test]
    fn item_names_are_truncated_to_item_count() {
        let t = tasting(1, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(t.item_names_padded(), vec!["a".to_string()]);
    }

    #[test]
    fn role_resolves_host_and_participant() {
        let t = tasting(2, vec![]);
        assert_eq!(AccessRole::resolve(&t, t.host_id), AccessRole::Host);
        assert_eq!(
            AccessRole::resolve(&t, Uuid::new_v4()),
            AccessRole::Participant
        );
    }
}
