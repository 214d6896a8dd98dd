//! Events a shard emits and the table mapping wire frames onto them.

use serde::Deserialize;
use serde_json::Value;

use crate::Result;
use crate::envelope::Frame;
use crate::normalize::{self, Options};

/// Everything a shard publishes on its event channel.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum ShardEvent {
    /// Diagnostic message about the shard's lifecycle or a frame it dropped
    Debug(String),
    /// Error reported by the daemon, or a frame the shard did not recognize
    Error(String),
    /// Every well-formed inbound frame, before it is dispatched
    RawPayload(Frame),
    /// The daemon accepted the token
    AuthSuccess,
    /// The socket opened; carries the server identifier
    ServerConnect(String),
    ServerOutput(String),
    DaemonMessage(String),
    ServerDisconnect,
    /// Resource usage, normalized to camelCase keys. See [`Stats`].
    StatsUpdate(Value),
    StatusUpdate(String),
    TransferUpdate(String),
    InstallStart,
    InstallOutput(String),
    InstallComplete,
    /// A backup finished, normalized to camelCase keys. See [`PartialBackup`].
    BackupComplete(Value),
}

impl ShardEvent {
    /// Typed view of a [`ShardEvent::StatsUpdate`] payload.
    pub fn stats(&self) -> Option<Result<Stats>> {
        match self {
            Self::StatsUpdate(value) => Some(Stats::deserialize(value).map_err(Into::into)),
            _ => None,
        }
    }

    /// Typed view of a [`ShardEvent::BackupComplete`] payload.
    pub fn backup(&self) -> Option<Result<PartialBackup>> {
        match self {
            Self::BackupComplete(value) => Some(PartialBackup::deserialize(value).map_err(Into::into)),
            _ => None,
        }
    }
}

/// Maps an inbound frame that is not part of the auth handshake onto the event it
/// represents. Unknown event names become [`ShardEvent::Error`].
#[must_use]
pub fn dispatch(event: &str, args: &[String]) -> ShardEvent {
    let joined = || args.join(" ");

    match event {
        "status" => ShardEvent::StatusUpdate(joined()),
        "console output" => ShardEvent::ServerOutput(joined()),
        "daemon message" => ShardEvent::DaemonMessage(joined()),
        "install started" => ShardEvent::InstallStart,
        "install output" => ShardEvent::InstallOutput(joined()),
        "install completed" => ShardEvent::InstallComplete,
        "stats" => match parse_json_args(args) {
            Ok(value) => ShardEvent::StatsUpdate(value),
            Err(e) => ShardEvent::Error(format!("malformed stats payload: {e}")),
        },
        "transfer logs" | "transfer status" => ShardEvent::TransferUpdate(joined()),
        "backup completed" => match parse_json_args(args) {
            Ok(value) => ShardEvent::BackupComplete(value),
            Err(e) => ShardEvent::Error(format!("malformed backup payload: {e}")),
        },
        "daemon error" | "jwt error" => ShardEvent::Error(joined()),
        unknown => ShardEvent::Error(format!("received unknown event '{unknown}'")),
    }
}

fn parse_json_args(args: &[String]) -> serde_json::Result<Value> {
    let value = serde_json::from_str(&args.concat())?;
    Ok(normalize::to_internal(value, &Options::default()))
}

/// Resource usage reported by the daemon, usually once a second while running.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Stats {
    pub memory_bytes: u64,
    pub memory_limit_bytes: u64,
    /// CPU usage in percent of one core
    pub cpu_absolute: f64,
    pub disk_bytes: u64,
    pub network: NetworkStats,
    /// Power state, e.g. `running`
    pub state: String,
    /// Milliseconds since the server process started
    pub uptime: u64,
}

#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkStats {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// The fields of a backup the daemon reports when it completes one.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PartialBackup {
    pub uuid: String,
    pub is_successful: bool,
    pub checksum: String,
    pub checksum_type: String,
    pub file_size: u64,
}
