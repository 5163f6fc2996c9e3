//! Proxy configuration loading.
//!
//! TOML is the sole config source; no environment variable overrides
//! besides `LOG_LVL` (read directly by `main.rs`, not through this file).
//! Default config path: `/etc/gen3plus-proxy/proxy.toml`.
//!
//! # Required fields
//! - At least one `[inverters.<key>]` entry, unless `inverters.allow_all`
//!   is set

use std::path::Path;

use gen3plus_proto::acl::Acl;
use gen3plus_proto::error::ConfigError;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Config types (validated, used by the rest of the crate)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub listen: ListenConfig,
    pub status_http: StatusHttpConfig,
    pub inverters: InvertersConfig,
    pub solarman: SolarmanConfig,
    pub acl: AclConfig,
    pub mqtt: MqttConfig,
}

#[derive(Debug, Clone)]
pub struct ListenConfig {
    pub gen3_bind: String,
    pub gen3plus_bind: String,
}

#[derive(Debug, Clone)]
pub struct StatusHttpConfig {
    pub bind: String,
}

/// One `[inverters.<key>]` table: the config-driven identity and
/// behaviour bound to a connection once its serial number matches
/// `monitor_sn` (§6, `__set_config_parms`/`__set_serial_no`).
#[derive(Debug, Clone)]
pub struct InverterEntry {
    pub monitor_sn: u32,
    pub node_id: String,
    pub suggested_area: String,
    pub modbus_polling: bool,
    pub sensor_list: u16,
    /// Opaque per-module PV array metadata (string count, azimuth, tilt,
    /// ...); the proxy core passes it through to the HA-discovery
    /// publisher rather than interpreting it.
    pub pv_module_details: toml::value::Table,
}

#[derive(Debug, Clone, Default)]
pub struct InvertersConfig {
    pub entries: Vec<InverterEntry>,
    /// A logger presenting a serial with no matching `monitor_sn` is
    /// logged and dropped unless this is set (§4.2 auth gate).
    pub allow_all: bool,
}

impl InvertersConfig {
    pub fn find(&self, serial_no: u32) -> Option<&InverterEntry> {
        self.entries.iter().find(|e| e.monitor_sn == serial_no)
    }
}

#[derive(Debug, Clone)]
pub struct SolarmanConfig {
    /// When `false`, frames are parsed and acked but never forwarded to
    /// the cloud (`no_forwarding` in the original).
    pub enabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AclConfig {
    /// ACL applied to commands issued locally (towards the logger).
    pub mqtt: Acl,
    /// ACL applied to commands the cloud sends that we're about to
    /// forward to the logger.
    pub tsun: Acl,
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub topic_prefix: String,
}

// ---------------------------------------------------------------------------
// Raw TOML deserialization types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    listen: Option<RawListenConfig>,
    status_http: Option<RawStatusHttpConfig>,
    /// Not a fixed-shape struct: `[inverters]` mixes the scalar
    /// `allow_all` flag with an arbitrary number of `<key>` sub-tables,
    /// one per inverter, keyed by an arbitrary name chosen in the config
    /// file (not by serial number).
    inverters: Option<toml::value::Table>,
    solarman: Option<RawSolarmanConfig>,
    acl: Option<RawAclConfig>,
    mqtt: Option<RawMqttConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct RawListenConfig {
    gen3_bind: Option<String>,
    gen3plus_bind: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawStatusHttpConfig {
    bind: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawSolarmanConfig {
    enabled: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct RawAclList {
    allow: Option<Vec<String>>,
    block: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct RawAclConfig {
    mqtt: Option<RawAclList>,
    tsun: Option<RawAclList>,
}

#[derive(Debug, Deserialize, Default)]
struct RawMqttConfig {
    topic_prefix: Option<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn load_config_from_path(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading config file '{}': {}", path.display(), e)))?;
    load_config_from_str(&toml_str)
}

pub fn load_config() -> Result<ProxyConfig, ConfigError> {
    load_config_from_path(Path::new("/etc/gen3plus-proxy/proxy.toml"))
}

pub fn load_config_from_str(toml_str: &str) -> Result<ProxyConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let raw_listen = raw.listen.unwrap_or_default();
    let listen = ListenConfig {
        gen3_bind: raw_listen.gen3_bind.unwrap_or_else(|| "0.0.0.0:5005".to_owned()),
        gen3plus_bind: raw_listen
            .gen3plus_bind
            .unwrap_or_else(|| "0.0.0.0:10000".to_owned()),
    };

    let status_http = StatusHttpConfig {
        bind: raw
            .status_http
            .and_then(|s| s.bind)
            .unwrap_or_else(|| "0.0.0.0:8127".to_owned()),
    };

    let raw_inverters = raw.inverters.unwrap_or_default();
    let allow_all = raw_inverters
        .get("allow_all")
        .and_then(toml::Value::as_bool)
        .unwrap_or(false);

    let mut entries = Vec::new();
    for (key, value) in &raw_inverters {
        if key.as_str() == "allow_all" {
            continue;
        }
        let table = value.as_table().ok_or_else(|| {
            ConfigError::Parse(format!("inverters.{key} must be a table"))
        })?;
        let monitor_sn = table
            .get("monitor_sn")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| ConfigError::MissingField(format!("inverters.{key}.monitor_sn")))?
            as u32;
        entries.push(InverterEntry {
            monitor_sn,
            node_id: table
                .get("node_id")
                .and_then(toml::Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            suggested_area: table
                .get("suggested_area")
                .and_then(toml::Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            modbus_polling: table
                .get("modbus_polling")
                .and_then(toml::Value::as_bool)
                .unwrap_or(false),
            sensor_list: table
                .get("sensor_list")
                .and_then(toml::Value::as_integer)
                .unwrap_or(0) as u16,
            pv_module_details: table.clone(),
        });
    }
    if !allow_all && entries.is_empty() {
        return Err(ConfigError::MissingField(
            "inverters.<key> (or set inverters.allow_all = true)".to_owned(),
        ));
    }
    let inverters = InvertersConfig { entries, allow_all };

    let solarman = SolarmanConfig {
        enabled: raw.solarman.and_then(|s| s.enabled).unwrap_or(true),
    };

    let raw_acl = raw.acl.unwrap_or_default();
    let acl = AclConfig {
        mqtt: into_acl(raw_acl.mqtt.unwrap_or_default()),
        tsun: into_acl(raw_acl.tsun.unwrap_or_default()),
    };

    let mqtt = MqttConfig {
        topic_prefix: raw
            .mqtt
            .and_then(|m| m.topic_prefix)
            .unwrap_or_else(|| "tsun/proxy/".to_owned()),
    };

    Ok(ProxyConfig {
        listen,
        status_http,
        inverters,
        solarman,
        acl,
        mqtt,
    })
}

fn into_acl(raw: RawAclList) -> Acl {
    Acl {
        allow: raw.allow.unwrap_or_default(),
        block: raw.block.unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_with_allow_all_loads() {
        let cfg = load_config_from_str("[inverters]\nallow_all = true\n").unwrap();
        assert!(cfg.inverters.allow_all);
        assert_eq!(cfg.listen.gen3plus_bind, "0.0.0.0:10000");
        assert!(cfg.solarman.enabled);
    }

    #[test]
    fn missing_inverters_without_allow_all_is_rejected() {
        let err = load_config_from_str("").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn per_inverter_table_is_parsed() {
        let toml = "[inverters.roof_west]\n\
                     monitor_sn = 305419896\n\
                     node_id = \"inv1\"\n\
                     suggested_area = \"roof\"\n\
                     modbus_polling = true\n\
                     sensor_list = 688\n";
        let cfg = load_config_from_str(toml).unwrap();
        assert!(!cfg.inverters.allow_all);
        assert_eq!(cfg.inverters.entries.len(), 1);
        let inv = &cfg.inverters.entries[0];
        assert_eq!(inv.monitor_sn, 305_419_896);
        assert_eq!(inv.node_id, "inv1");
        assert_eq!(inv.suggested_area, "roof");
        assert!(inv.modbus_polling);
        assert_eq!(inv.sensor_list, 0x02b0);
        assert_eq!(cfg.inverters.find(305_419_896).unwrap().node_id, "inv1");
        assert!(cfg.inverters.find(1).is_none());
    }

    #[test]
    fn inverter_table_missing_monitor_sn_is_rejected() {
        let toml = "[inverters.roof_west]\nnode_id = \"inv1\"\n";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn acl_lists_are_parsed_per_origin() {
        let toml = "[inverters]\nallow_all = true\n\
                     [acl.tsun]\nallow = [\"AT+\"]\nblock = [\"AT+RST\"]\n";
        let cfg = load_config_from_str(toml).unwrap();
        assert!(cfg.acl.tsun.forbidden("AT+RST1"));
        assert!(!cfg.acl.tsun.forbidden("AT+Z"));
        assert!(!cfg.acl.mqtt.forbidden("anything"));
    }

    #[test]
    fn solarman_forwarding_can_be_disabled() {
        let toml = "[inverters]\nallow_all = true\n[solarman]\nenabled = false\n";
        let cfg = load_config_from_str(toml).unwrap();
        assert!(!cfg.solarman.enabled);
    }
}
