use super::*;

/// Per-session inputs to the submit pipeline.
#[derive(Debug, Clone)]
pub struct SubmitContext {
    pub extranonce1: Extranonce,
    pub difficulty: Difficulty,
    pub previous_difficulty: Option<Difficulty>,
    pub negotiated_version_mask: Option<Version>,
    pub asicboost: bool,
    /// Unix seconds at submit time; the ntime window is
    /// `[template.curtime, now + 7200]`.
    pub now: u64,
}

/// A block candidate assembled from an accepted share.
#[derive(Debug, Clone)]
pub struct BlockSolve {
    pub hash: BlockHash,
    pub hex: String,
}

/// The result of a share that survived the pipeline.
#[derive(Debug, Clone)]
pub struct ShareOutcome {
    pub job: Arc<Job>,
    pub hash: BlockHash,
    pub share_diff: f64,
    /// The difficulty the share is credited at; falls back to the previous
    /// difficulty across a vardiff retarget.
    pub credited: Difficulty,
    pub solve: Option<BlockSolve>,
}

const MAX_NTIME_OFFSET: u64 = 7200;

/// Validates one submit against the valid-jobs map, in pipeline order:
/// extranonce2 size, job lookup, ntime window, version rolling, duplicate
/// detection, then proof evaluation against the network and worker targets.
pub fn process_share(
    jobs: &Jobs,
    submit: &Submit,
    context: &SubmitContext,
) -> Result<ShareOutcome, StratumError> {
    if submit.extranonce2.len() != ENONCE2_SIZE {
        return Err(StratumError::IncorrectExtranonce2Size);
    }

    let Some(job) = jobs.get_by_wire_id(&submit.job_id) else {
        return Err(StratumError::JobNotFound);
    };

    let ntime = u64::from(u32::from(submit.ntime));
    if ntime < u64::from(u32::from(job.ntime())) || ntime > context.now + MAX_NTIME_OFFSET {
        return Err(StratumError::NtimeOutOfRange);
    }

    let version = resolve_version(&job, submit, context)?;

    if !job.register_submit(
        &context.extranonce1,
        &submit.extranonce2,
        submit.ntime,
        submit.nonce,
    ) {
        return Err(StratumError::DuplicateShare);
    }

    let coinbase = job.serialize_coinbase(&context.extranonce1, &submit.extranonce2);
    let coinbase_hash = sha256d::Hash::hash(&coinbase);
    let merkle_root = stratum::combine_coinbase(coinbase_hash, &job.merkle_branches);

    let header = job.header(merkle_root, submit.ntime, submit.nonce, version);
    let hash = header.block_hash();
    let header_value = codec::block_hash_to_u256(hash);

    let share_diff = codec::pool_difficulty(header_value);

    if job.target >= header_value {
        // Block candidate. The coinbase is reused exactly as submitted; the
        // block must hash to the proven nonce/ntime/version.
        let solve = match job.serialize_block(&header, &coinbase) {
            Ok(block) => Some(BlockSolve {
                hash,
                hex: hex::encode(block),
            }),
            Err(err) => {
                error!("Failed to serialize block candidate {hash}: {err}");
                None
            }
        };

        return Ok(ShareOutcome {
            job,
            hash,
            share_diff,
            credited: context.difficulty,
            solve,
        });
    }

    let mut credited = context.difficulty;

    if share_diff / context.difficulty.as_f64() < 0.99 {
        // A share straddling a vardiff retarget is credited at the previous
        // difficulty when it still meets it.
        match context.previous_difficulty {
            Some(previous) if share_diff >= previous.as_f64() => credited = previous,
            _ => {
                return Err(StratumError::LowDifficultyShare {
                    difficulty: share_diff,
                });
            }
        }
    }

    Ok(ShareOutcome {
        job,
        hash,
        share_diff,
        credited,
        solve: None,
    })
}

fn resolve_version(
    job: &Job,
    submit: &Submit,
    context: &SubmitContext,
) -> Result<Version, StratumError> {
    if !context.asicboost {
        return Ok(job.version());
    }

    let version = match submit.version_bits {
        Some(version) if !version.is_zero() => version,
        _ => return Ok(job.version()),
    };

    if (version.to_consensus() as u32) < 4 {
        return Err(StratumError::VersionTooLow);
    }

    if version != job.version() {
        let mask = context.negotiated_version_mask.unwrap_or(job.version_mask);
        let rolled = version ^ job.version();

        if (rolled & !mask).to_consensus() != 0 {
            return Err(StratumError::VersionOutsideMask);
        }
    }

    Ok(version)
}

/// What a session hands the orchestrator per submit: the share record and,
/// when the network target was met, the assembled block.
#[derive(Debug, Clone)]
pub struct ShareEvent {
    pub share: Share,
    pub solve: Option<BlockSolve>,
}

/// One validated or rejected share, as handed to the share sink and the ban
/// accounting.
#[derive(Debug, Clone)]
pub struct Share {
    pub remote: SocketAddr,
    pub port: u16,
    pub worker: String,
    pub job_id: String,
    pub height: u64,
    pub block_reward: Amount,
    pub difficulty: Difficulty,
    pub share_diff: f64,
    pub block_diff: f64,
    pub block_hash: Option<BlockHash>,
    pub error: Option<StratumError>,
}

impl Share {
    pub fn accepted(
        remote: SocketAddr,
        port: u16,
        worker: String,
        outcome: &ShareOutcome,
    ) -> Self {
        Self {
            remote,
            port,
            worker,
            job_id: outcome.job.job_id.to_string(),
            height: outcome.job.template.height,
            block_reward: outcome.job.template.coinbase_value,
            difficulty: outcome.credited,
            share_diff: outcome.share_diff,
            block_diff: outcome.job.difficulty.as_f64(),
            block_hash: outcome.solve.as_ref().map(|solve| solve.hash),
            error: None,
        }
    }

    pub fn rejected(
        remote: SocketAddr,
        port: u16,
        worker: String,
        submit: &Submit,
        difficulty: Difficulty,
        error: StratumError,
    ) -> Self {
        Self {
            remote,
            port,
            worker,
            job_id: submit.job_id.clone(),
            height: 0,
            block_reward: Amount::ZERO,
            difficulty,
            share_diff: 0.0,
            block_diff: 0.0,
            block_hash: None,
            error: Some(error),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}
