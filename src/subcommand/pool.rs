use super::*;

#[derive(Debug, Parser)]
pub(crate) struct Pool {}

/// Chain facts resolved from the daemon before anything listens: the pool's
/// output script, the actual reward scheme, and which network we are on.
struct ChainContext {
    pool_script: ScriptBuf,
    reward: Reward,
    testnet: bool,
    protocol_version: Option<u64>,
}

impl Pool {
    pub(crate) async fn run(self, settings: Settings, cancel: CancellationToken) -> Result {
        let settings = Arc::new(settings);
        let mut tasks = JoinSet::new();

        // nothing starts unless at least one daemon instance answers
        let daemon = Arc::new(DaemonClient::new(settings.daemon_instances())?);
        daemon.online_check().await?;

        let chain = detect_chain(&daemon, &settings).await?;

        info!(
            "Chain ready: reward {:?}, testnet {}, protocol {:?}",
            chain.reward, chain.testnet, chain.protocol_version
        );

        let context = JobContext {
            pool_script: chain.pool_script,
            recipients: settings.recipients().to_vec(),
            reward: chain.reward,
            tx_messages: settings.tx_messages(),
            pool_sig: Some(format!("/{}/", settings.coin_name().to_lowercase())),
            version_mask: settings.version_mask(),
        };

        let jobs = Arc::new(RwLock::new(Jobs::new(context)));
        let foreman = Arc::new(Foreman::new(settings.instance_id()));

        let ban_window = settings
            .banning()
            .map(|banning| banning.time)
            .unwrap_or(Duration::from_secs(600));
        let banlist = Arc::new(Banlist::new(ban_window));

        // blocks until the daemon is synced and a first job exists
        let (block_tx, block_rx) = mpsc::unbounded_channel();
        let job_rx = Generator::new(
            daemon.clone(),
            jobs.clone(),
            settings.clone(),
            block_rx,
            cancel.clone(),
        )
        .spawn(&mut tasks)
        .await?;

        if let Some(p2p) = settings.p2p() {
            let _ = P2pListener::new(
                p2p.host.clone(),
                p2p.port,
                p2p.magic_for(chain.testnet),
                p2p.relay_transactions,
                block_tx.clone(),
                cancel.child_token(),
            )
            .spawn();
        }

        if let Some(banning) = settings.banning().filter(|banning| banning.enabled) {
            let banlist = banlist.clone();
            let purge_interval = banning.purge_interval;
            let purge_cancel = cancel.clone();

            tasks.spawn(async move {
                let mut sweep = interval(purge_interval);
                loop {
                    tokio::select! {
                        _ = purge_cancel.cancelled() => break,
                        _ = sweep.tick() => banlist.purge(),
                    }
                }
            });
        }

        let (share_tx, share_rx) = mpsc::unbounded_channel();

        tasks.spawn(share_sink(
            share_rx,
            daemon.clone(),
            foreman.clone(),
            block_tx,
            cancel.clone(),
        ));

        let authorizer: Arc<dyn Authorizer> = Arc::new(AcceptAll);

        for &port in settings.ports().keys() {
            let listener = TcpListener::bind(("0.0.0.0", port))
                .await
                .with_context(|| format!("failed to bind stratum port {port}"))?;

            info!("Stratum listening on port {port}");

            let settings = settings.clone();
            let foreman = foreman.clone();
            let banlist = banlist.clone();
            let authorizer = authorizer.clone();
            let jobs = jobs.clone();
            let job_rx = job_rx.clone();
            let share_tx = share_tx.clone();
            let cancel = cancel.clone();

            tasks.spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        accepted = listener.accept() => {
                            let (stream, remote) = match accepted {
                                Ok(accepted) => accepted,
                                Err(err) => {
                                    warn!("Accept failed on port {port}: {err}");
                                    continue;
                                }
                            };

                            if banlist.is_banned(remote.ip()) {
                                info!("Rejecting banned address {remote}");
                                continue;
                            }

                            debug!("Connection from {remote} on port {port}");

                            let mut stratifier = Stratifier::new(
                                remote,
                                port,
                                stream,
                                settings.clone(),
                                foreman.clone(),
                                banlist.clone(),
                                authorizer.clone(),
                                jobs.clone(),
                                job_rx.clone(),
                                share_tx.clone(),
                                cancel.child_token(),
                            );

                            tokio::spawn(async move {
                                if let Err(err) = stratifier.serve().await {
                                    info!("Stratifier closed: {err}");
                                }
                            });
                        }
                    }
                }
            });
        }

        info!(
            "Pool started: {} ({} port(s), instance {:08x})",
            settings.coin_name(),
            settings.ports().len(),
            foreman.instance_id(),
        );

        cancel.cancelled().await;

        info!("Waiting for {} tasks to stop...", tasks.len());
        while tasks.join_next().await.is_some() {}
        info!("All pool tasks stopped");

        Ok(())
    }
}

/// Batch RPC against the daemon to learn the reward scheme, network, and
/// the pool's output script, probing `submitblock` support along the way.
async fn detect_chain(daemon: &DaemonClient, settings: &Settings) -> Result<ChainContext> {
    let mut calls: Vec<(&str, Value)> = vec![
        ("validateaddress", json!([settings.address()])),
        ("getdifficulty", json!([])),
        ("getmininginfo", json!([])),
        ("submitblock", json!([])),
    ];

    if settings.has_get_info() {
        calls.push(("getinfo", json!([])));
    } else {
        calls.push(("getblockchaininfo", json!([])));
        calls.push(("getnetworkinfo", json!([])));
    }

    let mut results = daemon.batch(&calls).await?.into_iter();

    let validation = results
        .next()
        .unwrap()
        .context("validateaddress failed")?;
    ensure!(
        validation["isvalid"].as_bool() == Some(true),
        "daemon reports pool address {} as invalid",
        settings.address()
    );

    let difficulty = results.next().unwrap().unwrap_or(Value::Null);

    // coins that answer getdifficulty with an object split by scheme are
    // hybrid POW/POS; mining reward follows proof-of-stake there
    let reward = if difficulty.get("proof-of-stake").is_some() {
        Reward::Pos
    } else {
        settings.reward()
    };

    if let Ok(mining_info) = results.next().unwrap() {
        info!(
            "Network difficulty {}, hash rate {}",
            mining_info["difficulty"], mining_info["networkhashps"]
        );
    }

    match results.next().unwrap() {
        Err(err)
            if err
                .downcast_ref::<RpcFailure>()
                .is_some_and(|f| f.code == RpcFailure::METHOD_NOT_FOUND) =>
        {
            info!("Daemon lacks submitblock; block submission will use getblocktemplate");
        }
        _ => {}
    }

    let (testnet, protocol_version) = if settings.has_get_info() {
        let info = results.next().unwrap().context("getinfo failed")?;
        (
            info["testnet"].as_bool().unwrap_or(false),
            info["protocolversion"].as_u64(),
        )
    } else {
        let blockchain = results
            .next()
            .unwrap()
            .context("getblockchaininfo failed")?;
        let network = results.next().unwrap().context("getnetworkinfo failed")?;
        (
            blockchain["chain"].as_str() != Some("main"),
            network["protocolversion"].as_u64(),
        )
    };

    let pool_script = match reward {
        Reward::Pos => {
            let pubkey = validation["pubkey"]
                .as_str()
                .context("POS reward requires the daemon to reveal the address pubkey")?;
            codec::pubkey_to_script(pubkey)?
        }
        Reward::Pow => codec::address_to_script(settings.address())?,
    };

    Ok(ChainContext {
        pool_script,
        reward,
        testnet,
        protocol_version,
    })
}

/// Drains the share channel: solved blocks go to the daemon, acceptance is
/// verified via `getblock`, and a fresh template is forced either way.
async fn share_sink(
    mut share_rx: mpsc::UnboundedReceiver<ShareEvent>,
    daemon: Arc<DaemonClient>,
    foreman: Arc<Foreman>,
    block_tx: mpsc::UnboundedSender<BlockHash>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = share_rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let Some(solve) = event.solve else {
            continue;
        };

        info!(
            "Block candidate {} at height {} from {} (share diff {:.3}, block diff {:.3})",
            solve.hash, event.share.height, event.share.worker, event.share.share_diff,
            event.share.block_diff
        );

        match daemon.submit_block(&solve.hex).await {
            Ok(()) => {
                foreman.add_block();

                match daemon.get_block(&solve.hash).await {
                    Ok(block) => {
                        let coinbase_txid = block["tx"][0].as_str().unwrap_or_default();
                        info!(
                            "Block {} accepted (coinbase txid {coinbase_txid})",
                            solve.hash
                        );
                    }
                    Err(err) => {
                        warn!("Submitted block {} but verification failed: {err}", solve.hash);
                    }
                }
            }
            Err(err) => {
                error!("Failed to submit block {}: {err}", solve.hash);
            }
        }

        // the chain tip moved (or should have); refresh immediately
        let _ = block_tx.send(solve.hash);
    }
}
