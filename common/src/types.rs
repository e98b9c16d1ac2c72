//! Core data model shared by the store, ledger and REST layers: `Resource`,
//! `DynamicResourceLifeCycle` (DRLC) and the resource-scoped `UserData` patch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A caller-defined resource type, e.g. `"project"` or `"cluster"`.
pub type ResourceType = String;
/// A caller-defined state label, e.g. `"free"`, `"busy"`, `"dirty"`.
pub type State = String;
/// Opaque requester identity. Trust-on-first-use: never authenticated by the core.
pub type Owner = String;
/// Request identity supplied by a polling client.
pub type RequestId = String;

/// Terminal intermediate state marking a resource for deletion by the dynamic updater.
pub const TOMBSTONE: &str = "tombstone";
/// Default state newly-configured static resources enter when none is given.
pub const DEFAULT_STATE: &str = "free";

/// A named, leasable entity with a current state and at most one owner.
///
/// `name` is globally unique (I1); `resource_type` never changes after
/// creation (I3); `owner` is either empty (free) or a single requester (I2).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub state: State,
    #[serde(default)]
    pub owner: Owner,
    #[serde(rename = "lastupdate")]
    pub last_update: DateTime<Utc>,
    #[serde(rename = "userdata", skip_serializing_if = "Option::is_none")]
    pub user_data: Option<HashMap<String, String>>,
    /// Optimistic-concurrency counter maintained by the `Store`; bumped on every
    /// successful write, compared on update/delete to detect cross-process races.
    #[serde(default)]
    pub version: u64,
}

impl Resource {
    pub fn new(name: impl Into<String>, resource_type: impl Into<String>, state: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            resource_type: resource_type.into(),
            state: state.into(),
            owner: String::new(),
            last_update: now,
            user_data: None,
            version: 0,
        }
    }

    pub fn is_free(&self) -> bool {
        self.owner.is_empty()
    }

    pub fn is_tombstoned(&self) -> bool {
        self.state == TOMBSTONE
    }

    /// Applies a user-data patch: `None` values delete the key, `Some` values upsert it.
    pub fn apply_user_data_patch(&mut self, patch: &HashMap<String, Option<String>>) {
        if patch.is_empty() {
            return;
        }
        let data = self.user_data.get_or_insert_with(HashMap::new);
        for (key, value) in patch {
            match value {
                Some(v) => {
                    data.insert(key.clone(), v.clone());
                }
                None => {
                    data.remove(key);
                }
            }
        }
    }
}

/// Policy record describing how a pool of a given dynamic `Type` is grown and
/// shrunk automatically. Exactly one DRLC exists per dynamic type (§3 invariant).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DynamicResourceLifeCycle {
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub initial_state: State,
    pub min_count: u32,
    pub max_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "humantime_opt")]
    pub life_span: Option<std::time::Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    #[serde(default)]
    pub version: u64,
}

mod humantime_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<std::time::Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => serializer.serialize_str(&humantime::format_duration(*d).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<std::time::Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            Some(s) => humantime::parse_duration(&s)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

/// A queued acquisition attempt: `(ID, RequestedAt)`, kept FIFO per `(Type, State)`.
#[derive(Clone, Debug, PartialEq)]
pub struct QueuedRequest {
    pub id: RequestId,
    pub enqueued_at: DateTime<Utc>,
}

/// An expiration policy the Reaper evaluates on each sweep: resources of
/// `resource_type` sitting in `from_state` with no heartbeat inside `expire`
/// are moved to `to_state` and their previous owner is recorded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReaperPolicy {
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub from_state: State,
    #[serde(with = "humantime_serde_duration")]
    pub expire: std::time::Duration,
    pub to_state: State,
}

mod humantime_serde_duration {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &std::time::Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<std::time::Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
