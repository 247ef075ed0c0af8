//! Presence Data Structures
//!
//! One presence record exists per account. It is created lazily the first
//! time the account authenticates and is never deleted, only toggled.
//!
//! The activity payload is an explicitly enumerated structure. Unknown keys
//! are rejected at every level, and a heartbeat merges the fields it carries
//! into the stored activity one field at a time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::SharedError;

/// Coarse presence status
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Online,
    #[default]
    Offline,
    Away,
}

impl PresenceStatus {
    /// Convert to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceStatus::Online => "online",
            PresenceStatus::Offline => "offline",
            PresenceStatus::Away => "away",
        }
    }

    /// Parse from string (database)
    pub fn from_db(s: &str) -> Self {
        match s {
            "online" => PresenceStatus::Online,
            "away" => PresenceStatus::Away,
            _ => PresenceStatus::Offline,
        }
    }
}

/// What the account is currently playing
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GameInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Milliseconds since the epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
}

/// Handles on external gaming networks
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LinkedAccounts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steam: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xbox: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psn: Option<String>,
}

/// Structured activity attached to a presence record
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Activity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_info: Option<GameInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_accounts: Option<LinkedAccounts>,
}

fn merge_field<T>(target: &mut Option<T>, update: Option<T>) {
    if update.is_some() {
        *target = update;
    }
}

impl GameInfo {
    fn merge(&mut self, update: GameInfo) {
        merge_field(&mut self.game_id, update.game_id);
        merge_field(&mut self.game_name, update.game_name);
        merge_field(&mut self.state, update.state);
        merge_field(&mut self.start_time, update.start_time);
    }
}

impl LinkedAccounts {
    fn merge(&mut self, update: LinkedAccounts) {
        merge_field(&mut self.steam, update.steam);
        merge_field(&mut self.xbox, update.xbox);
        merge_field(&mut self.psn, update.psn);
    }
}

impl Activity {
    /// Merge the fields present in `update` into `self`
    pub fn merge(&mut self, update: Activity) {
        if let Some(game_info) = update.game_info {
            self.game_info.get_or_insert_with(GameInfo::default).merge(game_info);
        }
        if let Some(linked) = update.linked_accounts {
            self.linked_accounts
                .get_or_insert_with(LinkedAccounts::default)
                .merge(linked);
        }
    }
}

/// Presence record for one account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub account_id: String,
    pub online: bool,
    pub status: PresenceStatus,
    pub last_active_at: DateTime<Utc>,
    pub status_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<Activity>,
}

impl PresenceRecord {
    /// The implicit `offline` state of an account never seen before
    pub fn offline(account_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            account_id: account_id.into(),
            online: false,
            status: PresenceStatus::Offline,
            last_active_at: at,
            status_message: String::new(),
            activity: None,
        }
    }

    /// Apply a mutation; every mutation refreshes `last_active_at`
    pub fn apply(&mut self, mutation: &PresenceMutation, at: DateTime<Utc>) {
        match mutation {
            PresenceMutation::Online => {
                self.online = true;
                if self.status == PresenceStatus::Offline {
                    self.status = PresenceStatus::Online;
                }
            }
            PresenceMutation::Offline => {
                self.online = false;
                self.status = PresenceStatus::Offline;
            }
            PresenceMutation::Heartbeat(update) => {
                self.online = true;
                self.status = update.status.unwrap_or(PresenceStatus::Online);
                if let Some(message) = &update.status_message {
                    self.status_message = message.clone();
                }
                if let Some(activity) = &update.activity {
                    self.activity
                        .get_or_insert_with(Activity::default)
                        .merge(activity.clone());
                }
            }
        }
        self.last_active_at = at;
    }
}

/// Body of `POST /api/presence` and of the realtime `heartbeat` event
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PresenceUpdate {
    #[serde(default)]
    pub status_message: Option<String>,
    #[serde(default)]
    pub activity: Option<Activity>,
    /// `online` or `away`; `offline` is reserved for connection loss
    #[serde(default)]
    pub status: Option<PresenceStatus>,
}

impl PresenceUpdate {
    pub fn validate(&self) -> Result<(), SharedError> {
        if self.status == Some(PresenceStatus::Offline) {
            return Err(SharedError::validation(
                "status",
                "offline is set by disconnecting, not by heartbeat",
            ));
        }
        Ok(())
    }
}

/// A single state transition of a presence record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceMutation {
    Online,
    Offline,
    Heartbeat(PresenceUpdate),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_online_then_offline() {
        let t0 = crate::shared::time::now();
        let mut record = PresenceRecord::offline("alice", t0);
        record.apply(&PresenceMutation::Online, t0 + Duration::seconds(1));
        assert!(record.online);
        assert_eq!(record.status, PresenceStatus::Online);

        record.apply(&PresenceMutation::Offline, t0 + Duration::seconds(2));
        assert!(!record.online);
        assert_eq!(record.status, PresenceStatus::Offline);
        assert_eq!(record.last_active_at, t0 + Duration::seconds(2));
    }

    #[test]
    fn test_online_keeps_away() {
        let t0 = crate::shared::time::now();
        let mut record = PresenceRecord::offline("alice", t0);
        record.apply(
            &PresenceMutation::Heartbeat(PresenceUpdate {
                status: Some(PresenceStatus::Away),
                ..Default::default()
            }),
            t0,
        );
        record.apply(&PresenceMutation::Online, t0);
        assert_eq!(record.status, PresenceStatus::Away);
    }

    #[test]
    fn test_heartbeat_merges_activity_fieldwise() {
        let t0 = crate::shared::time::now();
        let mut record = PresenceRecord::offline("alice", t0);
        let first: PresenceUpdate = serde_json::from_value(serde_json::json!({
            "statusMessage": "grinding",
            "activity": {"gameInfo": {"gameId": "g1", "gameName": "Quest"}}
        }))
        .unwrap();
        let second: PresenceUpdate = serde_json::from_value(serde_json::json!({
            "activity": {"gameInfo": {"state": "in lobby"}, "linkedAccounts": {"steam": "al"}}
        }))
        .unwrap();

        record.apply(&PresenceMutation::Heartbeat(first), t0);
        record.apply(&PresenceMutation::Heartbeat(second), t0);

        let activity = record.activity.unwrap();
        let game = activity.game_info.unwrap();
        assert_eq!(game.game_id.as_deref(), Some("g1"));
        assert_eq!(game.game_name.as_deref(), Some("Quest"));
        assert_eq!(game.state.as_deref(), Some("in lobby"));
        assert_eq!(activity.linked_accounts.unwrap().steam.as_deref(), Some("al"));
        assert_eq!(record.status_message, "grinding");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let top = serde_json::from_value::<PresenceUpdate>(serde_json::json!({"mood": "happy"}));
        assert!(top.is_err());

        let nested = serde_json::from_value::<PresenceUpdate>(serde_json::json!({
            "activity": {"gameInfo": {"score": 3}}
        }));
        assert!(nested.is_err());
    }

    #[test]
    fn test_offline_status_not_accepted_from_heartbeat() {
        let update = PresenceUpdate {
            status: Some(PresenceStatus::Offline),
            ..Default::default()
        };
        assert!(update.validate().is_err());
        assert!(PresenceUpdate::default().validate().is_ok());
    }
}
