use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::manager::Resource;
use crate::normalize::{Cast, Options};

/// A server as seen through the client API.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    /// Short identifier used in client API paths, e.g. `1a7ce997`
    pub identifier: String,
    pub internal_id: u64,
    pub uuid: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Name of the node the server runs on
    pub node: String,
    #[serde(default)]
    pub server_owner: bool,
    pub sftp_details: SftpDetails,
    pub limits: Limits,
    pub feature_limits: FeatureLimits,
    /// Installation or restore state, `None` once the server is ready
    pub status: Option<String>,
    #[serde(default)]
    pub is_suspended: bool,
    #[serde(default)]
    pub is_installing: bool,
    #[serde(default)]
    pub is_transferring: bool,
}

impl Resource for Server {
    type Id = String;

    fn id(&self) -> String {
        self.identifier.clone()
    }

    fn options() -> Options {
        Options::new().ignore("relationships")
    }
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SftpDetails {
    pub ip: String,
    pub port: u16,
}

/// Resource limits of a server. Memory and disk are in MiB, `0` meaning unlimited.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Limits {
    pub memory: u64,
    pub swap: i64,
    pub disk: u64,
    pub io: u64,
    pub cpu: u64,
    pub threads: Option<String>,
    pub oom_disabled: Option<bool>,
}

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FeatureLimits {
    pub databases: u32,
    pub allocations: u32,
    pub backups: u32,
}

/// A panel user as seen through the application API.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub external_id: Option<String>,
    pub uuid: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub root_admin: bool,
    /// Whether two-factor authentication is enabled (`2fa` on the wire)
    #[serde(default)]
    pub two_factor: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Resource for User {
    type Id = u64;

    fn id(&self) -> u64 {
        self.id
    }

    fn options() -> Options {
        Options::new()
            .ignore("relationships")
            .rename("2fa", "twoFactor")
            .cast("created_at", Cast::Date)
            .cast("updated_at", Cast::Date)
    }
}

/// Signed socket URL and token for a server's console.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WebsocketDetails {
    pub token: String,
    pub socket: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WebsocketResponse {
    pub data: WebsocketDetails,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn server_from_wire() {
        let attributes = json!({
            "server_owner": true,
            "identifier": "1a7ce997",
            "internal_id": 5,
            "uuid": "1a7ce997-259b-452e-8b4e-cecc464142ca",
            "name": "Survival",
            "node": "Node 1",
            "sftp_details": { "ip": "node.example.com", "port": 2022 },
            "description": "",
            "limits": {
                "memory": 1024, "swap": 0, "disk": 5120, "io": 500,
                "cpu": 200, "threads": null, "oom_disabled": true
            },
            "feature_limits": { "databases": 5, "allocations": 5, "backups": 2 },
            "status": null,
            "is_suspended": false,
            "is_installing": false,
            "is_transferring": false,
            "relationships": { "allocations": { "object": "list", "data": [] } }
        });

        let server = Server::from_wire(attributes).unwrap();
        assert_eq!(server.id(), "1a7ce997");
        assert_eq!(server.sftp_details.port, 2022);
        assert_eq!(server.limits.oom_disabled, Some(true));
        assert_eq!(server.feature_limits.backups, 2);
        assert!(server.status.is_none());
    }

    #[test]
    fn user_from_wire() {
        let attributes = json!({
            "id": 1,
            "external_id": null,
            "uuid": "c4022c6c-9bf1-4a23-bff9-519cceb38335",
            "username": "admin",
            "email": "admin@example.com",
            "first_name": "Ada",
            "last_name": "Admin",
            "language": "en",
            "root_admin": true,
            "2fa": false,
            "created_at": "2024-03-01T12:30:00+00:00",
            "updated_at": "2024-03-02T08:00:00+00:00"
        });

        let user = User::from_wire(attributes).unwrap();
        assert_eq!(user.id(), 1);
        assert!(user.root_admin);
        assert!(!user.two_factor);
        assert_eq!(user.created_at.to_rfc3339(), "2024-03-01T12:30:00+00:00");
    }
}
