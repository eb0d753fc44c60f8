use super::*;

/// What every session receives on the job watch channel.
#[derive(Debug, Clone)]
pub(crate) struct JobUpdate {
    pub(crate) job: Arc<Job>,
    pub(crate) clean_jobs: bool,
}

/// Polls `getblocktemplate`, reacts to p2p block notifications, and
/// rebroadcasts stale work. Startup blocks until the daemon is synced and
/// the first template produced a job.
pub(crate) struct Generator {
    daemon: Arc<DaemonClient>,
    jobs: Arc<RwLock<Jobs>>,
    settings: Arc<Settings>,
    block_rx: mpsc::UnboundedReceiver<BlockHash>,
    cancel: CancellationToken,
}

impl Generator {
    pub(crate) fn new(
        daemon: Arc<DaemonClient>,
        jobs: Arc<RwLock<Jobs>>,
        settings: Arc<Settings>,
        block_rx: mpsc::UnboundedReceiver<BlockHash>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            daemon,
            jobs,
            settings,
            block_rx,
            cancel,
        }
    }

    /// Waits out initial block download, builds the first job, and starts
    /// the polling loop. Any non-sync error on the first template is fatal.
    pub(crate) async fn spawn(
        self,
        tasks: &mut JoinSet<()>,
    ) -> Result<watch::Receiver<JobUpdate>> {
        let template = self.await_synced().await?;

        let job = self
            .jobs
            .write()
            .process_template(Arc::new(template))?
            .expect("first template is always a new block");

        info!("First job ready at height {}", job.template.height);

        let (job_tx, job_rx) = watch::channel(JobUpdate {
            job,
            clean_jobs: true,
        });

        tasks.spawn(async move {
            self.run(job_tx).await;
            info!("Shutting down generator");
        });

        Ok(job_rx)
    }

    async fn await_synced(&self) -> Result<BlockTemplate> {
        loop {
            match self.daemon.get_block_template().await {
                Ok(template) => return Ok(template),
                Err(err)
                    if err
                        .downcast_ref::<RpcFailure>()
                        .is_some_and(|f| f.code == RpcFailure::WARMING_UP) =>
                {
                    info!("Daemon is still syncing, waiting...");
                    tokio::select! {
                        _ = self.cancel.cancelled() => bail!("cancelled while waiting for sync"),
                        _ = sleep(Duration::from_secs(5)) => {}
                    }
                }
                Err(err) => return Err(err.context("failed to fetch first block template")),
            }
        }
    }

    async fn run(self, job_tx: watch::Sender<JobUpdate>) {
        let Generator {
            daemon,
            jobs,
            settings,
            mut block_rx,
            cancel,
        } = self;

        let mut poll = interval(settings.block_refresh_interval());
        poll.reset();

        let mut rebroadcast_check = interval(Duration::from_secs(1));
        let mut last_broadcast = Instant::now();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = poll.tick() => {
                    refresh(&daemon, &jobs, &job_tx, &mut last_broadcast, false).await;
                }
                block = block_rx.recv() => {
                    let Some(hash) = block else {
                        break;
                    };
                    info!("Block {hash} announced, fetching new template");
                    refresh(&daemon, &jobs, &job_tx, &mut last_broadcast, false).await;
                }
                _ = rebroadcast_check.tick() => {
                    if last_broadcast.elapsed() > settings.job_rebroadcast_timeout() {
                        refresh(&daemon, &jobs, &job_tx, &mut last_broadcast, true).await;
                    }
                }
            }
        }
    }
}

/// Fetches a template and pushes a job when warranted. A *new block*
/// broadcasts with `clean_jobs = true`; with `force` set, an unchanged
/// template still rebroadcasts as a refresh.
async fn refresh(
    daemon: &DaemonClient,
    jobs: &RwLock<Jobs>,
    job_tx: &watch::Sender<JobUpdate>,
    last_broadcast: &mut Instant,
    force: bool,
) {
    let template = match daemon.get_block_template().await {
        Ok(template) => Arc::new(template),
        Err(err) => {
            warn!("Failed to fetch block template: {err}");
            return;
        }
    };

    let update = {
        let mut jobs = jobs.write();

        match jobs.process_template(template.clone()) {
            Ok(Some(job)) => Some(JobUpdate {
                job,
                clean_jobs: true,
            }),
            Ok(None) if force => match jobs.update_current_job(template) {
                Ok(job) => Some(JobUpdate {
                    job,
                    clean_jobs: false,
                }),
                Err(err) => {
                    warn!("Failed to refresh job: {err}");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!("Failed to process template: {err}");
                None
            }
        }
    };

    if let Some(update) = update {
        *last_broadcast = Instant::now();
        let _ = job_tx.send(update);
    }
}
