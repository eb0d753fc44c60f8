use {super::*, bitcoin::p2p::Magic};

#[derive(Debug, Clone)]
pub(crate) struct PortSettings {
    pub(crate) difficulty: Difficulty,
    pub(crate) vardiff: Option<VardiffConfig>,
}

#[derive(Debug, Clone)]
pub(crate) struct P2pSettings {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) magic: Magic,
    pub(crate) testnet_magic: Option<Magic>,
    pub(crate) relay_transactions: bool,
}

impl P2pSettings {
    /// The testnet magic applies once the daemon reveals which network it
    /// is on.
    pub(crate) fn magic_for(&self, testnet: bool) -> Magic {
        if testnet {
            self.testnet_magic.unwrap_or(self.magic)
        } else {
            self.magic
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct BanningSettings {
    pub(crate) enabled: bool,
    pub(crate) time: Duration,
    pub(crate) invalid_percent: f64,
    pub(crate) check_threshold: u64,
    pub(crate) purge_interval: Duration,
}

/// Configuration resolved into the shapes the pool actually consumes:
/// scripts instead of address strings, durations instead of second counts,
/// parsed network magic. Invalid recipients are logged and skipped; an
/// invalid pool address is caught later against the daemon's
/// `validateaddress`.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    coin_name: String,
    asicboost: bool,
    reward: Reward,
    tx_messages: bool,
    has_get_info: bool,
    address: String,
    recipients: Vec<(ScriptBuf, f64)>,
    ports: BTreeMap<u16, PortSettings>,
    daemons: Vec<DaemonInstance>,
    p2p: Option<P2pSettings>,
    banning: Option<BanningSettings>,
    connection_timeout: Duration,
    block_refresh_interval: Duration,
    job_rebroadcast_timeout: Duration,
    version_mask: Version,
    instance_id: Option<u32>,
    tcp_proxy_protocol: bool,
    emit_invalid_block_hashes: bool,
}

impl Settings {
    pub(crate) fn load(options: &Options) -> Result<Self> {
        let path = options
            .config
            .as_ref()
            .context("--config <FILE> is required")?;

        Self::from_config(Config::load(path)?)
    }

    pub(crate) fn from_config(config: Config) -> Result<Self> {
        let mut recipients = Vec::new();
        let mut fee_percent = 0.0;

        for (address, percent) in &config.reward_recipients {
            match codec::address_to_script(address) {
                Ok(script) => {
                    recipients.push((script, *percent));
                    fee_percent += percent;
                }
                Err(err) => {
                    warn!("Skipping invalid reward recipient {address}: {err}");
                }
            }
        }

        if fee_percent > 0.0 {
            info!("Pool fee recipients take {fee_percent}%");
        }

        let ports = config
            .ports
            .iter()
            .map(|(port, port_config)| {
                (
                    *port,
                    PortSettings {
                        difficulty: Difficulty::new(port_config.diff),
                        vardiff: port_config.var_diff.as_ref().map(Into::into),
                    },
                )
            })
            .collect();

        let p2p = match &config.p2p {
            Some(p2p) if p2p.enabled => match &config.coin.peer_magic {
                Some(magic_hex) => {
                    let magic = Magic::from_bytes(
                        <[u8; 4]>::from_hex(magic_hex)
                            .with_context(|| format!("invalid peerMagic '{magic_hex}'"))?,
                    );

                    let testnet_magic = config
                        .coin
                        .peer_magic_testnet
                        .as_ref()
                        .map(|hex| {
                            <[u8; 4]>::from_hex(hex)
                                .map(Magic::from_bytes)
                                .with_context(|| format!("invalid peerMagicTestnet '{hex}'"))
                        })
                        .transpose()?;

                    Some(P2pSettings {
                        host: p2p.host.clone(),
                        port: p2p.port,
                        magic,
                        testnet_magic,
                        relay_transactions: !p2p.disable_transactions,
                    })
                }
                None => {
                    warn!("p2p enabled but coin.peerMagic missing, disabling p2p");
                    None
                }
            },
            _ => None,
        };

        Self::build(config, recipients, ports, p2p)
    }

    fn build(
        config: Config,
        recipients: Vec<(ScriptBuf, f64)>,
        ports: BTreeMap<u16, PortSettings>,
        p2p: Option<P2pSettings>,
    ) -> Result<Self> {
        let banning = config.banning.as_ref().map(|banning| BanningSettings {
            enabled: banning.enabled,
            time: Duration::from_secs(banning.time),
            invalid_percent: banning.invalid_percent,
            check_threshold: banning.check_threshold,
            purge_interval: Duration::from_secs(banning.purge_interval),
        });

        Ok(Self {
            coin_name: config.coin.name.clone(),
            asicboost: config.coin.asicboost,
            reward: config.coin.reward.into(),
            tx_messages: config.coin.tx_messages,
            has_get_info: config.coin.has_get_info,
            address: config.address.clone(),
            recipients,
            ports,
            daemons: config.daemons.iter().map(DaemonConfig::instance).collect(),
            p2p,
            banning,
            connection_timeout: Duration::from_secs(config.connection_timeout),
            block_refresh_interval: Duration::from_secs(config.block_refresh_interval),
            job_rebroadcast_timeout: Duration::from_secs(config.job_rebroadcast_timeout),
            version_mask: config
                .version_mask
                .unwrap_or_else(|| Version::from(DEFAULT_VERSION_MASK)),
            instance_id: config.instance_id,
            tcp_proxy_protocol: config.tcp_proxy_protocol,
            emit_invalid_block_hashes: config.emit_invalid_block_hashes,
        })
    }

    pub(crate) fn coin_name(&self) -> &str {
        &self.coin_name
    }

    pub(crate) fn asicboost(&self) -> bool {
        self.asicboost
    }

    pub(crate) fn reward(&self) -> Reward {
        self.reward
    }

    pub(crate) fn tx_messages(&self) -> bool {
        self.tx_messages
    }

    pub(crate) fn has_get_info(&self) -> bool {
        self.has_get_info
    }

    pub(crate) fn address(&self) -> &str {
        &self.address
    }

    pub(crate) fn recipients(&self) -> &[(ScriptBuf, f64)] {
        &self.recipients
    }

    pub(crate) fn ports(&self) -> &BTreeMap<u16, PortSettings> {
        &self.ports
    }

    pub(crate) fn port_difficulty(&self, port: u16) -> Difficulty {
        self.ports
            .get(&port)
            .map(|settings| settings.difficulty)
            .unwrap_or_default()
    }

    pub(crate) fn vardiff_config(&self, port: u16) -> Option<VardiffConfig> {
        self.ports.get(&port)?.vardiff.clone()
    }

    pub(crate) fn daemon_instances(&self) -> Vec<DaemonInstance> {
        self.daemons.clone()
    }

    pub(crate) fn p2p(&self) -> Option<&P2pSettings> {
        self.p2p.as_ref()
    }

    pub(crate) fn banning(&self) -> Option<&BanningSettings> {
        self.banning.as_ref()
    }

    pub(crate) fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }

    pub(crate) fn block_refresh_interval(&self) -> Duration {
        self.block_refresh_interval
    }

    pub(crate) fn job_rebroadcast_timeout(&self) -> Duration {
        self.job_rebroadcast_timeout
    }

    pub(crate) fn version_mask(&self) -> Version {
        self.version_mask
    }

    pub(crate) fn instance_id(&self) -> Option<u32> {
        self.instance_id
    }

    pub(crate) fn tcp_proxy_protocol(&self) -> bool {
        self.tcp_proxy_protocol
    }

    pub(crate) fn emit_invalid_block_hashes(&self) -> bool {
        self.emit_invalid_block_hashes
    }
}
