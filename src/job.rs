use super::*;

/// Everything a job build needs besides the template itself. Owned by the
/// job manager and applied identically to every job.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub pool_script: ScriptBuf,
    pub recipients: Vec<(ScriptBuf, f64)>,
    pub reward: Reward,
    pub tx_messages: bool,
    pub pool_sig: Option<String>,
    pub version_mask: Version,
}

impl JobContext {
    pub fn new(pool_script: ScriptBuf) -> Self {
        Self {
            pool_script,
            recipients: Vec::new(),
            reward: Reward::Pow,
            tx_messages: false,
            pool_sig: None,
            version_mask: Version::from(DEFAULT_VERSION_MASK),
        }
    }
}

/// One block template turned into a broadcastable job. Jobs are immutable
/// once inserted into the valid-jobs map and are read concurrently by every
/// session; only the duplicate-submission set mutates, behind its own lock.
#[derive(Debug)]
pub struct Job {
    pub job_id: JobId,
    pub template: Arc<BlockTemplate>,
    pub target: U256,
    pub difficulty: Difficulty,
    pub version_mask: Version,
    pub coinb1: String,
    pub coinb2: String,
    pub merkle_branches: Vec<MerkleNode>,
    reward: Reward,
    submissions: Mutex<HashSet<(Extranonce, Extranonce, Ntime, Nonce)>>,
}

impl Job {
    pub fn new(template: Arc<BlockTemplate>, job_id: JobId, context: &JobContext) -> Result<Self> {
        let target = template.network_target()?;
        let difficulty = Difficulty::new(codec::pool_difficulty(target));

        let mut payees = Vec::new();
        if template.masternode_payments_started {
            for payee in &template.masternode {
                payees.push((payee.script_pubkey()?, payee.amount));
            }
        }
        for payee in &template.superblock {
            payees.push((payee.script_pubkey()?, payee.amount));
        }

        let mut builder = CoinbaseBuilder::new(
            context.pool_script.clone(),
            EXTRANONCE_PLACEHOLDER_SIZE,
            template.height,
            template.coinbase_value,
            template.default_witness_commitment.clone(),
        )
        .with_aux(template.coinbaseaux.clone())
        .with_payees(payees)
        .with_recipients(context.recipients.clone())
        .with_tx_messages(context.tx_messages);

        if context.reward == Reward::Pos {
            builder = builder.with_pos_timestamp(template.current_time.into());
        }

        if let Some(sig) = &context.pool_sig {
            builder = builder.with_pool_sig(sig.clone());
        }

        let (_coinbase_tx, coinb1, coinb2) = builder.build().context("failed to build coinbase")?;

        let merkle_branches = stratum::merkle_branches(&template.txids());

        Ok(Self {
            job_id,
            target,
            difficulty,
            version_mask: context.version_mask,
            coinb1,
            coinb2,
            merkle_branches,
            reward: context.reward,
            submissions: Mutex::new(HashSet::new()),
            template,
        })
    }

    pub fn prevhash(&self) -> PrevHash {
        PrevHash::from(self.template.previous_block_hash)
    }

    pub fn nbits(&self) -> Nbits {
        self.template.bits
    }

    pub fn ntime(&self) -> Ntime {
        self.template.current_time
    }

    pub fn version(&self) -> Version {
        self.template.version
    }

    /// True on the first occurrence of the 4-tuple, false on every replay.
    pub fn register_submit(
        &self,
        extranonce1: &Extranonce,
        extranonce2: &Extranonce,
        ntime: Ntime,
        nonce: Nonce,
    ) -> bool {
        self.submissions.lock().insert((
            extranonce1.clone(),
            extranonce2.clone(),
            ntime,
            nonce,
        ))
    }

    pub fn serialize_coinbase(&self, extranonce1: &Extranonce, extranonce2: &Extranonce) -> Vec<u8> {
        let mut coinbase = hex::decode(&self.coinb1).expect("coinb1 is valid hex");
        coinbase.extend_from_slice(extranonce1.as_bytes());
        coinbase.extend_from_slice(extranonce2.as_bytes());
        coinbase.extend_from_slice(&hex::decode(&self.coinb2).expect("coinb2 is valid hex"));
        coinbase
    }

    /// The 80-byte header: version, prevhash, merkle root, ntime, bits,
    /// nonce, each in its consensus byte order.
    pub fn header(
        &self,
        merkle_root: MerkleNode,
        ntime: Ntime,
        nonce: Nonce,
        version: Version,
    ) -> Header {
        Header {
            version: version.into(),
            prev_blockhash: self.template.previous_block_hash,
            merkle_root: merkle_root.to_raw_hash().into(),
            time: ntime.into(),
            bits: self.nbits().to_compact(),
            nonce: nonce.into(),
        }
    }

    /// Full block serialization: header, transaction count, coinbase, the
    /// template transactions in order, vote data, and the proof-of-stake
    /// signature placeholder byte.
    pub fn serialize_block(&self, header: &Header, coinbase: &[u8]) -> Result<Vec<u8>> {
        let mut block = consensus::serialize(header);

        block.extend(consensus::serialize(&VarInt(
            self.template.transactions.len() as u64 + 1,
        )));

        block.extend_from_slice(coinbase);

        for tx in &self.template.transactions {
            block.extend_from_slice(&consensus::serialize(&tx.transaction));
        }

        if !self.template.votes.is_empty() {
            block.extend(consensus::serialize(&VarInt(self.template.votes.len() as u64)));
            for vote in &self.template.votes {
                block.extend_from_slice(&hex::decode(vote).context("invalid vote hex")?);
            }
        }

        if self.reward == Reward::Pos {
            block.push(0x00);
        }

        Ok(block)
    }

    pub fn notify(&self, clean_jobs: bool) -> Notify {
        Notify {
            job_id: self.job_id,
            prevhash: self.prevhash(),
            coinb1: self.coinb1.clone(),
            coinb2: self.coinb2.clone(),
            merkle_branches: self.merkle_branches.clone(),
            version: self.version(),
            nbits: self.nbits(),
            ntime: self.ntime(),
            clean_jobs,
        }
    }
}
