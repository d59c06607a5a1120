//! Database kinds and per-backend configuration blocks
//!
//! A control request carries exactly one backend configuration variant, and
//! that variant must agree with the request's database kind. The set covers
//! several versions of each engine plus the protocol-translating proxies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Database under test
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DatabaseKind {
    #[serde(rename = "etcd-v2.3")]
    EtcdV2_3,
    #[serde(rename = "etcd-v3.1")]
    EtcdV3_1,
    #[serde(rename = "etcd-v3.2")]
    EtcdV3_2,
    #[serde(rename = "etcd-tip")]
    EtcdTip,
    #[serde(rename = "zookeeper-r3.4.9")]
    ZookeeperR3_4_9,
    #[serde(rename = "zookeeper-r3.5.2-alpha")]
    ZookeeperR3_5_2Alpha,
    #[serde(rename = "consul-v0.7.5")]
    ConsulV0_7_5,
    #[serde(rename = "consul-v0.8.0")]
    ConsulV0_8_0,
    /// etcd v3 API served on top of zookeeper
    #[serde(rename = "zetcd-beta")]
    ZetcdBeta,
    /// etcd v3 API served on top of consul
    #[serde(rename = "cetcd-beta")]
    CetcdBeta,
}

impl DatabaseKind {
    pub const ALL: [DatabaseKind; 10] = [
        DatabaseKind::EtcdV2_3,
        DatabaseKind::EtcdV3_1,
        DatabaseKind::EtcdV3_2,
        DatabaseKind::EtcdTip,
        DatabaseKind::ZookeeperR3_4_9,
        DatabaseKind::ZookeeperR3_5_2Alpha,
        DatabaseKind::ConsulV0_7_5,
        DatabaseKind::ConsulV0_8_0,
        DatabaseKind::ZetcdBeta,
        DatabaseKind::CetcdBeta,
    ];

    /// Stable identifier used in config files and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseKind::EtcdV2_3 => "etcd-v2.3",
            DatabaseKind::EtcdV3_1 => "etcd-v3.1",
            DatabaseKind::EtcdV3_2 => "etcd-v3.2",
            DatabaseKind::EtcdTip => "etcd-tip",
            DatabaseKind::ZookeeperR3_4_9 => "zookeeper-r3.4.9",
            DatabaseKind::ZookeeperR3_5_2Alpha => "zookeeper-r3.5.2-alpha",
            DatabaseKind::ConsulV0_7_5 => "consul-v0.7.5",
            DatabaseKind::ConsulV0_8_0 => "consul-v0.8.0",
            DatabaseKind::ZetcdBeta => "zetcd-beta",
            DatabaseKind::CetcdBeta => "cetcd-beta",
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DatabaseKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown database kind: {}", s))
    }
}

/// etcd server flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtcdFlags {
    #[serde(default = "default_etcd_snapshot_count")]
    pub snapshot_count: i64,
    /// Backend quota; 0 keeps the server default
    #[serde(default)]
    pub quota_size_bytes: i64,
}

fn default_etcd_snapshot_count() -> i64 {
    100_000
}

impl Default for EtcdFlags {
    fn default() -> Self {
        Self {
            snapshot_count: default_etcd_snapshot_count(),
            quota_size_bytes: 0,
        }
    }
}

/// Zookeeper server flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZookeeperFlags {
    /// Value passed as `-Djute.maxbuffer`
    #[serde(default = "default_jute_maxbuffer")]
    pub java_djute_maxbuffer: u64,
    #[serde(default = "default_tick_time")]
    pub tick_time: i64,
    #[serde(default = "default_init_limit")]
    pub init_limit: i64,
    #[serde(default = "default_sync_limit")]
    pub sync_limit: i64,
    #[serde(default = "default_zk_snap_count")]
    pub snap_count: i64,
    #[serde(default = "default_max_client_connections")]
    pub max_client_connections: i64,
}

fn default_jute_maxbuffer() -> u64 {
    33_554_432
}

fn default_tick_time() -> i64 {
    2000
}

fn default_init_limit() -> i64 {
    5
}

fn default_sync_limit() -> i64 {
    5
}

fn default_zk_snap_count() -> i64 {
    100_000
}

fn default_max_client_connections() -> i64 {
    5000
}

impl Default for ZookeeperFlags {
    fn default() -> Self {
        Self {
            java_djute_maxbuffer: default_jute_maxbuffer(),
            tick_time: default_tick_time(),
            init_limit: default_init_limit(),
            sync_limit: default_sync_limit(),
            snap_count: default_zk_snap_count(),
            max_client_connections: default_max_client_connections(),
        }
    }
}

/// Consul has no tunables beyond its defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsulFlags {}

/// Proxy flags; the proxy fronts the engine the agent starts alongside it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyFlags {}

/// The single populated backend block of a control request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendConfig {
    EtcdV2_3(EtcdFlags),
    EtcdV3_1(EtcdFlags),
    EtcdV3_2(EtcdFlags),
    EtcdTip(EtcdFlags),
    ZookeeperR3_4_9(ZookeeperFlags),
    ZookeeperR3_5_2Alpha(ZookeeperFlags),
    ConsulV0_7_5(ConsulFlags),
    ConsulV0_8_0(ConsulFlags),
    ZetcdBeta(ProxyFlags),
    CetcdBeta(ProxyFlags),
}

impl BackendConfig {
    /// Database kind this block configures
    pub fn kind(&self) -> DatabaseKind {
        match self {
            BackendConfig::EtcdV2_3(_) => DatabaseKind::EtcdV2_3,
            BackendConfig::EtcdV3_1(_) => DatabaseKind::EtcdV3_1,
            BackendConfig::EtcdV3_2(_) => DatabaseKind::EtcdV3_2,
            BackendConfig::EtcdTip(_) => DatabaseKind::EtcdTip,
            BackendConfig::ZookeeperR3_4_9(_) => DatabaseKind::ZookeeperR3_4_9,
            BackendConfig::ZookeeperR3_5_2Alpha(_) => DatabaseKind::ZookeeperR3_5_2Alpha,
            BackendConfig::ConsulV0_7_5(_) => DatabaseKind::ConsulV0_7_5,
            BackendConfig::ConsulV0_8_0(_) => DatabaseKind::ConsulV0_8_0,
            BackendConfig::ZetcdBeta(_) => DatabaseKind::ZetcdBeta,
            BackendConfig::CetcdBeta(_) => DatabaseKind::CetcdBeta,
        }
    }
}

/// Per-engine-family settings as read from the fleet configuration
///
/// Families without tunables (consul, proxies) have no section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSettings {
    #[serde(default)]
    pub etcd: EtcdFlags,
    #[serde(default)]
    pub zookeeper: ZookeeperFlags,
}

/// Pick and populate the backend variant for `kind`
pub fn select_backend(kind: DatabaseKind, settings: &BackendSettings) -> BackendConfig {
    match kind {
        DatabaseKind::EtcdV2_3 => BackendConfig::EtcdV2_3(settings.etcd.clone()),
        DatabaseKind::EtcdV3_1 => BackendConfig::EtcdV3_1(settings.etcd.clone()),
        DatabaseKind::EtcdV3_2 => BackendConfig::EtcdV3_2(settings.etcd.clone()),
        DatabaseKind::EtcdTip => BackendConfig::EtcdTip(settings.etcd.clone()),
        DatabaseKind::ZookeeperR3_4_9 => BackendConfig::ZookeeperR3_4_9(settings.zookeeper.clone()),
        DatabaseKind::ZookeeperR3_5_2Alpha => {
            BackendConfig::ZookeeperR3_5_2Alpha(settings.zookeeper.clone())
        }
        DatabaseKind::ConsulV0_7_5 => BackendConfig::ConsulV0_7_5(ConsulFlags::default()),
        DatabaseKind::ConsulV0_8_0 => BackendConfig::ConsulV0_8_0(ConsulFlags::default()),
        DatabaseKind::ZetcdBeta => BackendConfig::ZetcdBeta(ProxyFlags::default()),
        DatabaseKind::CetcdBeta => BackendConfig::CetcdBeta(ProxyFlags::default()),
    }
}
