//! Row -> API model conversions shared by the handlers.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use cohort_db::clock;
use cohort_db::models::{MediaRow, ReactionRow};
use cohort_types::api::{MediaItem, ReactionGroup, UserSummary};
use cohort_types::models::ReactionKind;

pub(crate) fn uuid(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} id '{}': {}", what, raw, e);
        Uuid::default()
    })
}

pub(crate) fn opt_uuid(raw: Option<&str>, what: &str) -> Option<Uuid> {
    raw.map(|r| uuid(r, what))
}

pub(crate) fn timestamp(raw: &str) -> DateTime<Utc> {
    clock::parse(raw).unwrap_or_else(|| {
        warn!("Corrupt timestamp '{}'", raw);
        DateTime::default()
    })
}

pub(crate) fn opt_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.map(timestamp)
}

pub(crate) fn enum_value<T: FromStr>(raw: &str, fallback: T) -> T {
    raw.parse().unwrap_or_else(|_| {
        warn!("Unknown enum value '{}'", raw);
        fallback
    })
}

/// Authors whose account was deleted still render, as an anonymous user.
pub(crate) fn summary(id: Option<&str>, name: Option<String>, avatar: Option<String>) -> UserSummary {
    match id {
        Some(id) => UserSummary {
            id: uuid(id, "user"),
            name: name.unwrap_or_default(),
            avatar,
        },
        None => UserSummary {
            id: Uuid::nil(),
            name: "deleted user".to_string(),
            avatar: None,
        },
    }
}

pub(crate) fn group_media(rows: Vec<MediaRow>) -> HashMap<String, Vec<MediaItem>> {
    let mut map: HashMap<String, Vec<MediaItem>> = HashMap::new();
    for row in rows {
        map.entry(row.owner_id).or_default().push(MediaItem {
            url: row.url,
            media_type: row.media_type,
        });
    }
    map
}

/// Reactions of many targets, grouped per target and per kind.
pub(crate) struct ReactionIndex {
    groups: HashMap<String, Vec<ReactionGroup>>,
    mine: HashMap<String, ReactionKind>,
}

impl ReactionIndex {
    pub(crate) fn new(rows: Vec<ReactionRow>, viewer_id: &str) -> Self {
        let mut by_target: HashMap<String, HashMap<ReactionKind, Vec<Uuid>>> = HashMap::new();
        let mut mine = HashMap::new();

        for row in rows {
            let Ok(kind) = row.kind.parse::<ReactionKind>() else {
                warn!("Unknown reaction kind '{}' on {}", row.kind, row.target_id);
                continue;
            };
            if row.user_id == viewer_id {
                mine.insert(row.target_id.clone(), kind);
            }
            by_target
                .entry(row.target_id)
                .or_default()
                .entry(kind)
                .or_default()
                .push(uuid(&row.user_id, "user"));
        }

        // Stable order: kinds in declaration order.
        let groups = by_target
            .into_iter()
            .map(|(target_id, mut kinds)| {
                let groups = ReactionKind::ALL
                    .iter()
                    .filter_map(|kind| {
                        kinds.remove(kind).map(|user_ids| ReactionGroup {
                            kind: *kind,
                            count: user_ids.len(),
                            user_ids,
                        })
                    })
                    .collect();
                (target_id, groups)
            })
            .collect();

        Self { groups, mine }
    }

    pub(crate) fn groups(&mut self, target_id: &str) -> Vec<ReactionGroup> {
        self.groups.remove(target_id).unwrap_or_default()
    }

    pub(crate) fn mine(&self, target_id: &str) -> Option<ReactionKind> {
        self.mine.get(target_id).copied()
    }
}
