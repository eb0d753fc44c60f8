use super::*;

/// The JSON pool configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Config {
    pub(crate) coin: CoinConfig,
    pub(crate) address: String,
    #[serde(default)]
    pub(crate) reward_recipients: BTreeMap<String, f64>,
    pub(crate) ports: BTreeMap<u16, PortConfig>,
    pub(crate) daemons: Vec<DaemonConfig>,
    #[serde(default)]
    pub(crate) p2p: Option<P2pConfig>,
    #[serde(default)]
    pub(crate) banning: Option<BanningConfig>,
    #[serde(default = "default_connection_timeout")]
    pub(crate) connection_timeout: u64,
    #[serde(default = "default_block_refresh_interval")]
    pub(crate) block_refresh_interval: u64,
    #[serde(default = "default_job_rebroadcast_timeout")]
    pub(crate) job_rebroadcast_timeout: u64,
    #[serde(default)]
    pub(crate) version_mask: Option<Version>,
    #[serde(default)]
    pub(crate) instance_id: Option<u32>,
    #[serde(default)]
    pub(crate) tcp_proxy_protocol: bool,
    #[serde(default)]
    pub(crate) emit_invalid_block_hashes: bool,
}

impl Config {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;

        let config: Config = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result {
        ensure!(
            self.coin.algorithm == "sha256",
            "unsupported algorithm '{}': only sha256 is supported",
            self.coin.algorithm
        );
        ensure!(!self.address.is_empty(), "pool address is required");
        ensure!(!self.ports.is_empty(), "at least one port is required");
        ensure!(!self.daemons.is_empty(), "at least one daemon is required");

        for (port, port_config) in &self.ports {
            ensure!(
                port_config.diff > 0.0,
                "port {port} has non-positive difficulty"
            );
        }

        ensure!(
            self.block_refresh_interval > 0,
            "blockRefreshInterval must be at least one second"
        );

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CoinConfig {
    pub(crate) name: String,
    pub(crate) symbol: String,
    #[serde(default = "default_algorithm")]
    pub(crate) algorithm: String,
    #[serde(default)]
    pub(crate) asicboost: bool,
    #[serde(default)]
    pub(crate) reward: RewardKind,
    #[serde(default)]
    pub(crate) tx_messages: bool,
    #[serde(default)]
    pub(crate) peer_magic: Option<String>,
    #[serde(default)]
    pub(crate) peer_magic_testnet: Option<String>,
    #[serde(default)]
    pub(crate) has_get_info: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub(crate) enum RewardKind {
    #[default]
    #[serde(rename = "POW")]
    Pow,
    #[serde(rename = "POS")]
    Pos,
}

impl From<RewardKind> for Reward {
    fn from(kind: RewardKind) -> Self {
        match kind {
            RewardKind::Pow => Reward::Pow,
            RewardKind::Pos => Reward::Pos,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PortConfig {
    pub(crate) diff: f64,
    #[serde(default)]
    pub(crate) var_diff: Option<VarDiffConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VarDiffConfig {
    pub(crate) min_diff: f64,
    pub(crate) max_diff: f64,
    pub(crate) target_time: f64,
    pub(crate) retarget_time: f64,
    pub(crate) variance_percent: f64,
    #[serde(default)]
    pub(crate) mode: Option<String>,
}

impl From<&VarDiffConfig> for VardiffConfig {
    fn from(config: &VarDiffConfig) -> Self {
        Self {
            min_diff: config.min_diff,
            max_diff: config.max_diff,
            target_time: config.target_time,
            retarget_time: config.retarget_time,
            variance_percent: config.variance_percent,
            x2_mode: config.mode.as_deref() == Some("x2"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DaemonConfig {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) user: String,
    pub(crate) password: String,
}

impl DaemonConfig {
    pub(crate) fn instance(&self) -> DaemonInstance {
        DaemonInstance {
            url: format!("http://{}:{}", self.host, self.port),
            user: self.user.clone(),
            password: self.password.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct P2pConfig {
    #[serde(default)]
    pub(crate) enabled: bool,
    pub(crate) host: String,
    pub(crate) port: u16,
    #[serde(default)]
    pub(crate) disable_transactions: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BanningConfig {
    #[serde(default)]
    pub(crate) enabled: bool,
    #[serde(default = "default_ban_time")]
    pub(crate) time: u64,
    #[serde(default = "default_invalid_percent")]
    pub(crate) invalid_percent: f64,
    #[serde(default = "default_check_threshold")]
    pub(crate) check_threshold: u64,
    #[serde(default = "default_purge_interval")]
    pub(crate) purge_interval: u64,
}

fn default_algorithm() -> String {
    "sha256".into()
}

fn default_connection_timeout() -> u64 {
    600
}

fn default_block_refresh_interval() -> u64 {
    30
}

fn default_job_rebroadcast_timeout() -> u64 {
    55
}

fn default_ban_time() -> u64 {
    600
}

fn default_invalid_percent() -> f64 {
    50.0
}

fn default_check_threshold() -> u64 {
    500
}

fn default_purge_interval() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Value {
        json!({
            "coin": {"name": "Bitcoin", "symbol": "BTC"},
            "address": "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa",
            "ports": {"3032": {"diff": 8}},
            "daemons": [{"host": "127.0.0.1", "port": 8332, "user": "u", "password": "p"}],
        })
    }

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config: Config = serde_json::from_value(minimal()).unwrap();

        assert_eq!(config.coin.algorithm, "sha256");
        assert_eq!(config.connection_timeout, 600);
        assert_eq!(config.job_rebroadcast_timeout, 55);
        assert_eq!(config.coin.reward, RewardKind::Pow);
        assert!(config.version_mask.is_none());
        assert!(!config.tcp_proxy_protocol);
        config.validate().unwrap();
    }

    #[test]
    fn unsupported_algorithm_is_fatal() {
        let mut value = minimal();
        value["coin"]["algorithm"] = json!("scrypt");

        let config: Config = serde_json::from_value(value).unwrap();
        assert!(config.validate().unwrap_err().to_string().contains("scrypt"));
    }

    #[test]
    fn non_positive_port_difficulty_is_fatal() {
        let mut value = minimal();
        value["ports"]["3032"]["diff"] = json!(0);

        let config: Config = serde_json::from_value(value).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn full_surface_parses() {
        let mut value = minimal();
        value["rewardRecipients"] =
            json!({"1BitcoinEaterAddressDontSendf59kuE": 1.5});
        value["ports"]["3032"]["varDiff"] = json!({
            "minDiff": 8,
            "maxDiff": 512,
            "targetTime": 15,
            "retargetTime": 90,
            "variancePercent": 30,
            "mode": "x2",
        });
        value["p2p"] = json!({"enabled": true, "host": "127.0.0.1", "port": 8333});
        value["banning"] = json!({"enabled": true, "time": 600, "invalidPercent": 50, "checkThreshold": 500, "purgeInterval": 300});
        value["coin"]["peerMagic"] = json!("f9beb4d9");
        value["coin"]["reward"] = json!("POS");
        value["versionMask"] = json!("3fffe000");
        value["instanceId"] = json!(31);

        let config: Config = serde_json::from_value(value).unwrap();
        config.validate().unwrap();

        assert_eq!(config.coin.reward, RewardKind::Pos);
        assert_eq!(config.instance_id, Some(31));
        assert_eq!(
            config.version_mask,
            Some("3fffe000".parse().unwrap())
        );

        let vardiff: VardiffConfig =
            (config.ports[&3032].var_diff.as_ref().unwrap()).into();
        assert!(vardiff.x2_mode);
        assert_eq!(vardiff.target_time, 15.0);
    }
}
