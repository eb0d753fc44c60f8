use {
    super::*,
    bouncer::{Bouncer, Verdict},
    state::{Negotiation, SessionState, Subscription},
};

mod bouncer;
mod state;

/// One miner connection: newline-delimited JSON framing, the
/// subscribe/authorize/configure/submit state machine, job and difficulty
/// pushes, vardiff, and ban accounting.
pub(crate) struct Stratifier {
    remote: SocketAddr,
    port: u16,
    settings: Arc<Settings>,
    foreman: Arc<Foreman>,
    banlist: Arc<Banlist>,
    authorizer: Arc<dyn Authorizer>,
    jobs: Arc<RwLock<Jobs>>,
    job_rx: watch::Receiver<JobUpdate>,
    share_tx: mpsc::UnboundedSender<ShareEvent>,
    reader: FramedRead<OwnedReadHalf, LinesCodec>,
    writer: FramedWrite<OwnedWriteHalf, LinesCodec>,
    cancel: CancellationToken,
    state: SessionState,
    negotiation: Negotiation,
    vardiff: Option<Vardiff>,
    bouncer: Bouncer,
    difficulty: Difficulty,
    previous_difficulty: Option<Difficulty>,
    pending_difficulty: Option<Difficulty>,
    last_activity: Instant,
    extranonce_subscribed: bool,
}

impl Stratifier {
    pub(crate) fn new(
        remote: SocketAddr,
        port: u16,
        tcp_stream: TcpStream,
        settings: Arc<Settings>,
        foreman: Arc<Foreman>,
        banlist: Arc<Banlist>,
        authorizer: Arc<dyn Authorizer>,
        jobs: Arc<RwLock<Jobs>>,
        job_rx: watch::Receiver<JobUpdate>,
        share_tx: mpsc::UnboundedSender<ShareEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let _ = tcp_stream.set_nodelay(true);

        let (reader, writer) = tcp_stream.into_split();

        let bouncer = match settings.banning() {
            Some(banning) if banning.enabled => {
                Bouncer::new(true, banning.check_threshold, banning.invalid_percent)
            }
            _ => Bouncer::disabled(),
        };

        let vardiff = settings.vardiff_config(port).map(Vardiff::new);

        foreman.add_connection();

        Self {
            remote,
            port,
            foreman,
            banlist,
            authorizer,
            jobs,
            job_rx,
            share_tx,
            reader: FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_MESSAGE_SIZE)),
            writer: FramedWrite::new(writer, LinesCodec::new()),
            cancel,
            state: SessionState::new(),
            negotiation: Negotiation::default(),
            vardiff,
            bouncer,
            difficulty: settings.port_difficulty(port),
            previous_difficulty: None,
            pending_difficulty: None,
            last_activity: Instant::now(),
            extranonce_subscribed: false,
            settings,
        }
    }

    pub(crate) async fn serve(&mut self) -> Result {
        if self.settings.tcp_proxy_protocol() {
            self.read_proxy_header().await?;
        }

        let mut job_rx = self.job_rx.clone();
        let cancel = self.cancel.clone();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Disconnecting from {}", self.remote);
                    break;
                }
                changed = job_rx.changed() => {
                    if changed.is_err() {
                        warn!("Job channel closed, disconnecting {}", self.remote);
                        break;
                    }

                    let update = job_rx.borrow_and_update().clone();

                    if !self.state.is_subscribed() {
                        continue;
                    }

                    if self.last_activity.elapsed() > self.settings.connection_timeout() {
                        bail!("socket timeout for {}", self.remote);
                    }

                    self.send_job(&update).await?;
                }
                message = self.read_message() => {
                    let Some(message) = message? else {
                        break;
                    };

                    match message {
                        Message::Request { id, method, params } => {
                            if !self.dispatch(id, &method, params).await? {
                                break;
                            }
                        }
                        Message::Notification { method, .. } => {
                            // set_version_mask acknowledgements arrive with
                            // a null id and need no reply
                            if method != "mining.set_version_mask" {
                                warn!("Ignoring notification {method} from {}", self.remote);
                            }
                        }
                        Message::Response { .. } => {
                            warn!("Ignoring response from {}", self.remote);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Returns false when the connection should be torn down.
    async fn dispatch(&mut self, id: Id, method: &str, params: Value) -> Result<bool> {
        match method {
            "mining.configure" => {
                debug!("CONFIGURE from {} with {params}", self.remote);

                match serde_json::from_value::<Configure>(params) {
                    Ok(configure) => self.configure(id, configure).await?,
                    Err(err) => self.send_shape_error(id, err).await?,
                }
            }
            "mining.subscribe" => {
                debug!("SUBSCRIBE from {} with {params}", self.remote);

                match serde_json::from_value::<Subscribe>(params) {
                    Ok(subscribe) => self.subscribe(id, subscribe).await?,
                    Err(err) => self.send_shape_error(id, err).await?,
                }
            }
            "mining.authorize" => {
                debug!("AUTHORIZE from {} with {params}", self.remote);

                match serde_json::from_value::<Authorize>(params) {
                    Ok(authorize) => return self.authorize(id, authorize).await,
                    Err(err) => self.send_shape_error(id, err).await?,
                }
            }
            "mining.submit" => {
                match serde_json::from_value::<Submit>(params) {
                    Ok(submit) => return self.submit(id, submit).await,
                    Err(err) => self.send_shape_error(id, err).await?,
                }
            }
            "mining.extranonce.subscribe" => {
                self.extranonce_subscribed = true;
                self.send(Message::response(id, json!(true))).await?;
            }
            "mining.suggest_difficulty" => {
                match serde_json::from_value::<SuggestDifficulty>(params) {
                    Ok(suggest) => self.suggest_difficulty(id, suggest).await?,
                    Err(err) => self.send_shape_error(id, err).await?,
                }
            }
            "mining.get_transactions" => {
                // wire quirk kept for client compatibility: a bare `true`
                // in the error slot rather than an error tuple
                self.send_raw(json!({"id": id, "result": [], "error": true}))
                    .await?;
            }
            "mining.set_version_mask" => {
                // client acknowledgement, no reply
            }
            method => {
                warn!("Unknown method {method} from {}", self.remote);
                self.send(Message::error(id, &StratumError::UnknownMethod))
                    .await?;
            }
        }

        Ok(true)
    }

    async fn configure(&mut self, id: Id, configure: Configure) -> Result {
        let mut result = serde_json::Map::new();

        if configure.requests("version-rolling") {
            let client_mask = configure
                .version_rolling_mask
                .unwrap_or_else(|| Version::from(-1));
            let min_bit_count = configure.version_rolling_min_bit_count.unwrap_or(16);

            let negotiated = self.settings.version_mask() & client_mask;
            let bits_set = negotiated.count_ones();

            if bits_set >= min_bit_count {
                let previous = self.negotiation.version_mask;

                self.negotiation.asicboost = true;
                self.negotiation.version_mask = Some(negotiated);

                result.insert("version-rolling".into(), json!(true));
                result.insert("version-rolling.mask".into(), json!(negotiated.to_string()));
                result.insert("version-rolling.min-bit-count".into(), json!(bits_set));

                if let Some(previous) = previous
                    && previous != negotiated
                {
                    self.send(Message::notification(
                        "mining.set_version_mask",
                        json!([negotiated.to_string()]),
                    ))
                    .await?;
                }
            } else {
                debug!(
                    "Rejecting version rolling for {}: {bits_set} bits < {min_bit_count}",
                    self.remote
                );
                result.insert("version-rolling".into(), json!(false));
            }
        }

        if configure.requests("minimum-difficulty") {
            self.negotiation.minimum_difficulty = configure.minimum_difficulty_value;
            result.insert(
                "minimum-difficulty".into(),
                json!(configure.minimum_difficulty_value.is_some()),
            );
        }

        if configure.requests("subscribe-extranonce") {
            self.extranonce_subscribed = true;
            result.insert("subscribe-extranonce".into(), json!(true));
        }

        self.send(Message::response(id, Value::Object(result))).await
    }

    async fn subscribe(&mut self, id: Id, subscribe: Subscribe) -> Result {
        let resubscribing = self.state.is_subscribed();
        if resubscribing {
            info!("Client {} resubscribing", self.remote);
        }

        if !subscribe.user_agent.is_empty() {
            debug!("Subscribe from {} ({})", self.remote, subscribe.user_agent);
        }

        let subscription = Subscription {
            subscription_id: self.foreman.next_subscription_id(),
            extranonce1: self.foreman.next_enonce1(),
            extranonce2_size: ENONCE2_SIZE,
        };

        let result = SubscribeResult {
            subscriptions: vec![
                (
                    "mining.set_difficulty".to_string(),
                    subscription.subscription_id.clone(),
                ),
                (
                    "mining.notify".to_string(),
                    subscription.subscription_id.clone(),
                ),
            ],
            extranonce1: subscription.extranonce1.clone(),
            extranonce2_size: subscription.extranonce2_size,
        };

        self.send(Message::response(id, json!(result))).await?;

        // miners that negotiated the extension are told their new search
        // space instead of having to reconnect
        if resubscribing && self.extranonce_subscribed {
            self.send(Message::notification(
                "mining.set_extranonce",
                json!([
                    subscription.extranonce1.to_hex(),
                    subscription.extranonce2_size
                ]),
            ))
            .await?;
        }

        self.state.subscribe(subscription);

        Ok(())
    }

    async fn authorize(&mut self, id: Id, authorize: Authorize) -> Result<bool> {
        let verdict = self
            .authorizer
            .authorize(self.remote, &authorize.username, authorize.password.as_deref())
            .await;

        self.send(Message::response(id, json!(verdict.authorized)))
            .await?;

        if verdict.disconnect {
            warn!("Authorizer disconnected {} ({})", self.remote, authorize.username);
            return Ok(false);
        }

        if let Some(difficulty) = verdict.difficulty {
            self.previous_difficulty = Some(self.difficulty);
            self.difficulty = difficulty;
            self.send(Message::notification(
                "mining.set_difficulty",
                json!(SetDifficulty(difficulty)),
            ))
            .await?;
        }

        if !verdict.authorized {
            info!("Rejected worker {} from {}", authorize.username, self.remote);
            return Ok(true);
        }

        info!("Authorized worker {} from {}", authorize.username, self.remote);

        self.state.authorize(authorize.username);

        // a freshly authorized worker gets the current difficulty and job
        // right away
        if self.state.is_subscribed() {
            self.send(Message::notification(
                "mining.set_difficulty",
                json!(SetDifficulty(self.difficulty)),
            ))
            .await?;

            let current = self.jobs.read().current();
            if let Some(job) = current {
                self.send(Message::notification(
                    "mining.notify",
                    json!(job.notify(true)),
                ))
                .await?;
            }
        }

        Ok(true)
    }

    async fn submit(&mut self, id: Id, submit: Submit) -> Result<bool> {
        self.last_activity = Instant::now();

        if !self.state.is_authorized() {
            return self.reject(id, submit, StratumError::UnauthorizedWorker).await;
        }

        let Some(subscription) = self.state.subscription().cloned() else {
            return self.reject(id, submit, StratumError::NotSubscribed).await;
        };

        let context = SubmitContext {
            extranonce1: subscription.extranonce1,
            difficulty: self.difficulty,
            previous_difficulty: self.previous_difficulty,
            negotiated_version_mask: self.negotiation.version_mask,
            asicboost: self.settings.asicboost() || self.negotiation.asicboost,
            now: unix_now(),
        };

        let outcome = {
            let jobs = self.jobs.read();
            share::process_share(&jobs, &submit, &context)
        };

        match outcome {
            Ok(outcome) => {
                self.send(Message::response(id, json!(true))).await?;

                let worker = self.state.worker().unwrap_or_default().to_string();
                let mut share = Share::accepted(self.remote, self.port, worker, &outcome);

                if self.settings.emit_invalid_block_hashes() && share.block_hash.is_none() {
                    share.block_hash = Some(outcome.hash);
                }

                debug!(
                    "Accepted share from {} at diff {} (share diff {:.3})",
                    self.remote, share.difficulty, share.share_diff
                );

                self.foreman.record_share(&share);
                self.bouncer.record(true);

                let _ = self.share_tx.send(ShareEvent {
                    share,
                    solve: outcome.solve.clone(),
                });

                if let Some(vardiff) = &mut self.vardiff
                    && let Some(new_difficulty) =
                        vardiff.submit(Instant::now(), self.difficulty)
                {
                    let floored = match self.negotiation.minimum_difficulty {
                        Some(minimum) if new_difficulty < minimum => minimum,
                        _ => new_difficulty,
                    };
                    self.pending_difficulty = Some(floored);
                }

                Ok(true)
            }
            Err(error) => self.reject(id, submit, error).await,
        }
    }

    /// Answers the error tuple, records the share, and applies the ban
    /// policy. Returns false when the connection must drop.
    async fn reject(&mut self, id: Id, submit: Submit, error: StratumError) -> Result<bool> {
        self.send(Message::error(id, &error)).await?;

        let worker = self
            .state
            .worker()
            .unwrap_or(&submit.username)
            .to_string();

        debug!("Rejected share from {}: {error}", self.remote);

        let share = Share::rejected(
            self.remote,
            self.port,
            worker,
            &submit,
            self.difficulty,
            error,
        );

        self.foreman.record_share(&share);
        let _ = self.share_tx.send(ShareEvent { share, solve: None });

        if self.bouncer.record(false) == Verdict::Ban {
            warn!(
                "Banning {} ({} valid / {} invalid)",
                self.remote,
                self.bouncer.valid(),
                self.bouncer.invalid()
            );
            self.banlist.ban(self.remote.ip());
            return Ok(false);
        }

        Ok(true)
    }

    async fn suggest_difficulty(&mut self, id: Id, suggest: SuggestDifficulty) -> Result {
        let suggested = match &self.vardiff {
            Some(vardiff) => suggest.0.clamp(vardiff.min_diff(), vardiff.max_diff()),
            None => suggest.0,
        };

        self.pending_difficulty = Some(suggested);

        self.send(Message::response(id, json!(true))).await
    }

    /// Queued difficulty first, then the job: miners apply
    /// `mining.set_difficulty` to the next job they receive.
    async fn send_job(&mut self, update: &JobUpdate) -> Result {
        if let Some(pending) = self.pending_difficulty.take()
            && pending != self.difficulty
        {
            self.previous_difficulty = Some(self.difficulty);
            self.difficulty = pending;

            debug!("Difficulty {} for {}", pending, self.remote);

            self.send(Message::notification(
                "mining.set_difficulty",
                json!(SetDifficulty(pending)),
            ))
            .await?;
        }

        self.send(Message::notification(
            "mining.notify",
            json!(update.job.notify(update.clean_jobs)),
        ))
        .await
    }

    async fn read_message(&mut self) -> Result<Option<Message>> {
        match self.reader.next().await {
            Some(Ok(line)) => {
                let message = serde_json::from_str::<Message>(&line).map_err(|e| {
                    anyhow!("invalid stratum message from {}: {e}; line={line:?}", self.remote)
                })?;
                Ok(Some(message))
            }
            // oversize frames land here before any parsing
            Some(Err(e)) => Err(anyhow!("read error from {}: {e}", self.remote)),
            None => {
                info!("Connection {} disconnected", self.remote);
                Ok(None)
            }
        }
    }

    /// PROXY protocol v1: the load balancer prepends one line carrying the
    /// real remote address.
    async fn read_proxy_header(&mut self) -> Result {
        let line = match self.reader.next().await {
            Some(Ok(line)) => line,
            Some(Err(e)) => bail!("proxy header read error from {}: {e}", self.remote),
            None => bail!("connection closed before proxy header"),
        };

        let fields: Vec<&str> = line.split_whitespace().collect();

        ensure!(
            fields.len() >= 6 && fields[0] == "PROXY",
            "malformed proxy header {line:?}"
        );

        let ip: IpAddr = fields[2]
            .parse()
            .with_context(|| format!("bad proxy source address {:?}", fields[2]))?;
        let port: u16 = fields[4]
            .parse()
            .with_context(|| format!("bad proxy source port {:?}", fields[4]))?;

        info!("Proxy protocol: {} is really {ip}:{port}", self.remote);
        self.remote = SocketAddr::new(ip, port);

        Ok(())
    }

    async fn send(&mut self, message: Message) -> Result {
        self.send_raw(serde_json::to_value(&message)?).await
    }

    async fn send_raw(&mut self, value: Value) -> Result {
        self.writer.send(value.to_string()).await?;
        Ok(())
    }

    async fn send_shape_error(&mut self, id: Id, err: serde_json::Error) -> Result {
        self.send(Message::error(
            id,
            &StratumError::bad_parameter(err.to_string()),
        ))
        .await
    }
}

impl Drop for Stratifier {
    fn drop(&mut self) {
        self.foreman.sub_connection();

        info!(
            "Shutting down stratifier for {} ({} remaining, state {})",
            self.remote,
            self.foreman.connections(),
            self.state
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestMiner {
        reader: FramedRead<OwnedReadHalf, LinesCodec>,
        writer: FramedWrite<OwnedWriteHalf, LinesCodec>,
        next_request_id: u64,
        share_rx: mpsc::UnboundedReceiver<ShareEvent>,
        job_tx: watch::Sender<JobUpdate>,
        job: Arc<Job>,
        handle: JoinHandle<Result>,
    }

    /// Grinds nonces until the share difficulty clears the worker
    /// difficulty; port diff in these tests is low enough that this takes a
    /// handful of hashes.
    fn solve(job: &Job, version: Version, minimum: f64) -> Nonce {
        let extranonce1: Extranonce = "00000000".parse().unwrap();
        let extranonce2: Extranonce = "00000000".parse().unwrap();
        let ntime: Ntime = "5e4a4c3b".parse().unwrap();

        let coinbase = job.serialize_coinbase(&extranonce1, &extranonce2);
        let coinbase_hash = sha256d::Hash::hash(&coinbase);
        let merkle_root = stratum::combine_coinbase(coinbase_hash, &job.merkle_branches);

        for nonce in 0u32.. {
            let nonce = Nonce::from(nonce);
            let header = job.header(merkle_root, ntime, nonce, version);
            let hash = codec::block_hash_to_u256(header.block_hash());
            if codec::pool_difficulty(hash) >= minimum {
                return nonce;
            }
        }

        unreachable!("no nonce met difficulty {minimum}");
    }

    fn test_settings() -> Settings {
        Settings::from_config(
            serde_json::from_value(json!({
                "coin": {"name": "Bitcoin", "symbol": "BTC", "asicboost": true},
                "address": "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa",
                "ports": {"3032": {"diff": 0.00001}},
                "daemons": [{"host": "127.0.0.1", "port": 8332, "user": "u", "password": "p"}],
                "banning": {"enabled": true, "time": 600, "invalidPercent": 50, "checkThreshold": 1000, "purgeInterval": 300},
            }))
            .unwrap(),
        )
        .unwrap()
    }

    async fn spawn_miner() -> TestMiner {
        let settings = Arc::new(test_settings());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let local = listener.local_addr().unwrap();

        let client = TcpStream::connect(local).await.unwrap();
        let (server_stream, remote) = listener.accept().await.unwrap();

        let context = JobContext::new(
            codec::address_to_script("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa").unwrap(),
        );
        let mut jobs = Jobs::new(context);
        let job = jobs
            .process_template(Arc::new(BlockTemplate {
                current_time: Ntime(0x504e86b9),
                ..Default::default()
            }))
            .unwrap()
            .unwrap();

        let jobs = Arc::new(RwLock::new(jobs));
        let (job_tx, job_rx) = watch::channel(JobUpdate {
            job,
            clean_jobs: true,
        });
        let (share_tx, share_rx) = mpsc::unbounded_channel();

        let mut stratifier = Stratifier::new(
            remote,
            3032,
            server_stream,
            settings,
            Arc::new(Foreman::new(Some(0))),
            Arc::new(Banlist::new(Duration::from_secs(600))),
            Arc::new(AcceptAll),
            jobs,
            job_rx,
            share_tx,
            CancellationToken::new(),
        );

        let handle = tokio::spawn(async move { stratifier.serve().await });

        let (reader, writer) = client.into_split();

        let job = job_tx.borrow().job.clone();

        TestMiner {
            reader: FramedRead::new(reader, LinesCodec::new()),
            writer: FramedWrite::new(writer, LinesCodec::new()),
            next_request_id: 0,
            share_rx,
            job_tx,
            job,
            handle,
        }
    }

    impl TestMiner {
        async fn send(&mut self, method: &str, params: Value) -> u64 {
            self.next_request_id += 1;
            let id = self.next_request_id;
            self.writer
                .send(json!({"id": id, "method": method, "params": params}).to_string())
                .await
                .unwrap();
            id
        }

        async fn read(&mut self) -> Value {
            let line = tokio::time::timeout(Duration::from_secs(5), self.reader.next())
                .await
                .expect("read timed out")
                .expect("connection closed")
                .unwrap();
            serde_json::from_str(&line).unwrap()
        }

        /// Skips notifications until the response with the given id arrives.
        async fn response(&mut self, id: u64) -> Value {
            loop {
                let message = self.read().await;
                if message["id"] == json!(id) {
                    return message;
                }
            }
        }

        async fn notification(&mut self, method: &str) -> Value {
            loop {
                let message = self.read().await;
                if message["method"] == json!(method) {
                    return message;
                }
            }
        }

        async fn subscribe(&mut self) -> Value {
            let id = self.send("mining.subscribe", json!(["testminer/1.0"])).await;
            self.response(id).await
        }

        async fn authorize(&mut self) -> Value {
            let id = self
                .send("mining.authorize", json!(["worker.rig", "x"]))
                .await;
            self.response(id).await
        }
    }

    #[tokio::test]
    async fn subscribe_hands_out_extranonce_and_subscriptions() {
        let mut miner = spawn_miner().await;

        let response = miner.subscribe().await;
        let result = &response["result"];

        assert_eq!(result[0][0][0], "mining.set_difficulty");
        assert_eq!(result[0][1][0], "mining.notify");
        assert_eq!(result[1].as_str().unwrap().len(), ENONCE1_SIZE * 2);
        assert_eq!(result[2], json!(ENONCE2_SIZE));
    }

    #[tokio::test]
    async fn submit_before_authorize_is_code_24() {
        let mut miner = spawn_miner().await;

        let id = miner
            .send(
                "mining.submit",
                json!(["worker.rig", "1", "00000000", "5e4a4c3b", "12345678"]),
            )
            .await;

        let response = miner.response(id).await;
        assert_eq!(response["error"][0], json!(24));
    }

    #[tokio::test]
    async fn submit_without_subscribe_is_code_25() {
        let mut miner = spawn_miner().await;

        miner.authorize().await;

        let id = miner
            .send(
                "mining.submit",
                json!(["worker.rig", "1", "00000000", "5e4a4c3b", "12345678"]),
            )
            .await;

        let response = miner.response(id).await;
        assert_eq!(response["error"][0], json!(25));
    }

    #[tokio::test]
    async fn authorized_worker_receives_difficulty_then_job() {
        let mut miner = spawn_miner().await;

        miner.subscribe().await;

        let response = miner.authorize().await;
        assert_eq!(response["result"], json!(true));

        let set_difficulty = miner.notification("mining.set_difficulty").await;
        assert!(set_difficulty["params"][0].as_f64().unwrap() > 0.0);

        let notify = miner.notification("mining.notify").await;
        let params = &notify["params"];
        assert_eq!(params.as_array().unwrap().len(), 9);
        assert_eq!(params[8], json!(true), "first job is clean");
    }

    #[tokio::test]
    async fn accepted_share_reaches_the_share_channel() {
        let mut miner = spawn_miner().await;

        let subscribe = miner.subscribe().await;
        assert_eq!(
            subscribe["result"][1], json!("00000000"),
            "instance 0 hands out the zero extranonce first"
        );
        miner.authorize().await;

        let notify = miner.notification("mining.notify").await;
        let job_id = notify["params"][0].as_str().unwrap().to_string();

        let nonce = solve(&miner.job, miner.job.version(), 0.00001).to_string();

        let id = miner
            .send(
                "mining.submit",
                json!(["worker.rig", job_id, "00000000", "5e4a4c3b", nonce]),
            )
            .await;

        let response = miner.response(id).await;
        assert_eq!(response["result"], json!(true), "{response}");

        let event = miner.share_rx.recv().await.unwrap();
        assert!(event.share.is_valid());
        assert_eq!(event.share.worker, "worker.rig");
        assert_eq!(event.share.port, 3032);
        assert!(event.share.share_diff >= 0.00001);
    }

    #[tokio::test]
    async fn duplicate_share_is_code_22() {
        let mut miner = spawn_miner().await;

        miner.subscribe().await;
        miner.authorize().await;
        let notify = miner.notification("mining.notify").await;
        let job_id = notify["params"][0].as_str().unwrap().to_string();

        let nonce = solve(&miner.job, miner.job.version(), 0.00001).to_string();
        let submit = json!(["worker.rig", job_id, "00000000", "5e4a4c3b", nonce]);

        let id = miner.send("mining.submit", submit.clone()).await;
        assert_eq!(miner.response(id).await["result"], json!(true));

        let id = miner.send("mining.submit", submit).await;
        let response = miner.response(id).await;
        assert_eq!(response["error"][0], json!(22));
        assert_eq!(response["error"][1], json!("duplicate share"));
    }

    #[tokio::test]
    async fn stale_job_is_code_21() {
        let mut miner = spawn_miner().await;

        miner.subscribe().await;
        miner.authorize().await;

        let id = miner
            .send(
                "mining.submit",
                json!(["worker.rig", "fffe", "00000000", "5e4a4c3b", "12345678"]),
            )
            .await;

        let response = miner.response(id).await;
        assert_eq!(response["error"][0], json!(21));
    }

    #[tokio::test]
    async fn bad_ntime_width_is_code_20() {
        let mut miner = spawn_miner().await;

        miner.subscribe().await;
        miner.authorize().await;

        let id = miner
            .send(
                "mining.submit",
                json!(["worker.rig", "1", "00000000", "5e4a", "12345678"]),
            )
            .await;

        let response = miner.response(id).await;
        assert_eq!(response["error"][0], json!(20));
        assert!(
            response["error"][1]
                .as_str()
                .unwrap()
                .contains("incorrect size of ntime")
        );
    }

    #[tokio::test]
    async fn unknown_method_is_code_20() {
        let mut miner = spawn_miner().await;

        let id = miner.send("mining.frobnicate", json!([])).await;
        let response = miner.response(id).await;

        assert_eq!(response["error"][0], json!(20));
        assert_eq!(response["error"][1], json!("Unknown method"));
    }

    #[tokio::test]
    async fn get_transactions_keeps_the_wire_quirk() {
        let mut miner = spawn_miner().await;

        let id = miner.send("mining.get_transactions", json!([])).await;
        let response = miner.response(id).await;

        assert_eq!(response["result"], json!([]));
        assert_eq!(response["error"], json!(true));
    }

    #[tokio::test]
    async fn configure_negotiates_version_rolling() {
        let mut miner = spawn_miner().await;

        let id = miner
            .send(
                "mining.configure",
                json!([["version-rolling"], {"version-rolling.mask": "ffffffff"}]),
            )
            .await;

        let response = miner.response(id).await;
        let result = &response["result"];

        assert_eq!(result["version-rolling"], json!(true));
        assert_eq!(result["version-rolling.mask"], json!("3fffe000"));
        assert_eq!(result["version-rolling.min-bit-count"], json!(17));
    }

    #[tokio::test]
    async fn configure_refuses_narrow_masks() {
        let mut miner = spawn_miner().await;

        let id = miner
            .send(
                "mining.configure",
                json!([["version-rolling"], {"version-rolling.mask": "00006000"}]),
            )
            .await;

        let response = miner.response(id).await;
        assert_eq!(response["result"]["version-rolling"], json!(false));
    }

    #[tokio::test]
    async fn extranonce_subscribe_acknowledged() {
        let mut miner = spawn_miner().await;

        let id = miner.send("mining.extranonce.subscribe", json!([])).await;
        assert_eq!(miner.response(id).await["result"], json!(true));
    }

    #[tokio::test]
    async fn version_outside_negotiated_mask_is_code_20() {
        let mut miner = spawn_miner().await;

        let id = miner
            .send(
                "mining.configure",
                json!([["version-rolling"], {"version-rolling.mask": "1fffe000"}]),
            )
            .await;
        miner.response(id).await;

        miner.subscribe().await;
        miner.authorize().await;
        let notify = miner.notification("mining.notify").await;
        let job_id = notify["params"][0].as_str().unwrap().to_string();

        let id = miner
            .send(
                "mining.submit",
                json!(["worker.rig", job_id, "00000000", "5e4a4c3b", "12345678", "1c000000"]),
            )
            .await;

        let response = miner.response(id).await;
        assert_eq!(response["error"][0], json!(20));
        assert_eq!(
            response["error"][1],
            json!("version rolling outside allowed mask")
        );
    }

    #[tokio::test]
    async fn rolled_version_inside_mask_is_accepted() {
        let mut miner = spawn_miner().await;

        let id = miner
            .send(
                "mining.configure",
                json!([["version-rolling"], {"version-rolling.mask": "3fffe000"}]),
            )
            .await;
        miner.response(id).await;

        miner.subscribe().await;
        miner.authorize().await;
        let notify = miner.notification("mining.notify").await;
        let job_id = notify["params"][0].as_str().unwrap().to_string();

        let rolled: Version = "20002000".parse().unwrap();
        let nonce = solve(&miner.job, rolled, 0.00001).to_string();

        let id = miner
            .send(
                "mining.submit",
                json!(["worker.rig", job_id, "00000000", "5e4a4c3b", nonce, "20002000"]),
            )
            .await;

        let response = miner.response(id).await;
        assert_eq!(response["result"], json!(true), "{response}");
    }

    #[tokio::test]
    async fn oversize_frame_tears_the_socket_down() {
        let mut miner = spawn_miner().await;

        let flood = "a".repeat(MAX_MESSAGE_SIZE + 1);
        miner.writer.send(flood).await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), miner.handle)
            .await
            .expect("server did not close")
            .unwrap();

        assert!(result.is_err(), "flood should error the session");
    }

    #[tokio::test]
    async fn refresh_broadcast_is_not_clean() {
        let mut miner = spawn_miner().await;

        miner.subscribe().await;
        miner.authorize().await;
        miner.notification("mining.notify").await;

        let refreshed = {
            let current = miner.job_tx.borrow().job.clone();
            JobUpdate {
                job: current,
                clean_jobs: false,
            }
        };
        miner.job_tx.send(refreshed).unwrap();

        let notify = miner.notification("mining.notify").await;
        assert_eq!(notify["params"][8], json!(false));
    }
}

