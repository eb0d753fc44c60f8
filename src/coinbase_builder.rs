use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reward {
    #[default]
    Pow,
    Pos,
}

/// Builds the coinbase transaction and its Stratum split. The scriptSig
/// carries the BIP-34 height, any coinbaseaux flags, the 8-byte extranonce
/// placeholder, and the pool signature; `coinb1 ‖ extranonce1 ‖ extranonce2
/// ‖ coinb2` reassembles the exact serialized transaction.
#[derive(Clone)]
pub struct CoinbaseBuilder {
    pool_script: ScriptBuf,
    aux: BTreeMap<String, String>,
    placeholder_size: usize,
    height: u64,
    value: Amount,
    witness_commitment: ScriptBuf,
    payees: Vec<(ScriptBuf, Amount)>,
    recipients: Vec<(ScriptBuf, f64)>,
    reward: Reward,
    pos_timestamp: Option<u32>,
    tx_messages: bool,
    pool_sig: Option<String>,
    worker_label: Option<String>,
}

impl CoinbaseBuilder {
    const MAX_COINBASE_SCRIPT_SIG_SIZE: usize = 100;

    pub fn new(
        pool_script: ScriptBuf,
        placeholder_size: usize,
        height: u64,
        value: Amount,
        witness_commitment: ScriptBuf,
    ) -> Self {
        Self {
            pool_script,
            aux: BTreeMap::new(),
            placeholder_size,
            height,
            value,
            witness_commitment,
            payees: Vec::new(),
            recipients: Vec::new(),
            reward: Reward::Pow,
            pos_timestamp: None,
            tx_messages: false,
            pool_sig: None,
            worker_label: None,
        }
    }

    pub fn with_aux(mut self, aux: BTreeMap<String, String>) -> Self {
        self.aux = aux;
        self
    }

    /// Masternode and superblock payees, paid at their declared amounts.
    pub fn with_payees(mut self, payees: Vec<(ScriptBuf, Amount)>) -> Self {
        self.payees = payees;
        self
    }

    /// Fee recipients, each paid `value × percent / 100`.
    pub fn with_recipients(mut self, recipients: Vec<(ScriptBuf, f64)>) -> Self {
        self.recipients = recipients;
        self
    }

    /// Proof-of-stake coins prepend the template time after the version.
    pub fn with_pos_timestamp(mut self, timestamp: u32) -> Self {
        self.reward = Reward::Pos;
        self.pos_timestamp = Some(timestamp);
        self
    }

    pub fn with_tx_messages(mut self, tx_messages: bool) -> Self {
        self.tx_messages = tx_messages;
        self
    }

    pub fn with_pool_sig(mut self, pool_sig: String) -> Self {
        self.pool_sig = Some(pool_sig);
        self
    }

    pub fn with_worker_label(mut self, worker_label: String) -> Self {
        self.worker_label = Some(worker_label);
        self
    }

    pub fn build(self) -> Result<(Transaction, String, String)> {
        let mut buf: Vec<u8> = Vec::with_capacity(Self::MAX_COINBASE_SCRIPT_SIG_SIZE);

        buf.extend_from_slice(&codec::script_number(
            self.height.try_into().context("height exceeds i64")?,
        )?);

        for value in self.aux.values() {
            buf.extend_from_slice(hex::decode(value)?.as_slice());
        }

        let script_prefix_size = buf.len();

        buf.extend_from_slice(vec![0u8; self.placeholder_size].as_slice());

        if let Some(sig) = &self.pool_sig {
            buf.extend_from_slice(sig.as_bytes());
        }

        if let Some(label) = &self.worker_label {
            buf.push(b'/');
            buf.extend_from_slice(label.as_bytes());
            buf.push(b'/');
        }

        let script_sig = ScriptBuf::from_bytes(buf);
        let script_sig_size = script_sig.len();

        ensure!(
            script_sig_size <= Self::MAX_COINBASE_SCRIPT_SIG_SIZE,
            "script sig is {script_sig_size} bytes (max {})",
            Self::MAX_COINBASE_SCRIPT_SIG_SIZE
        );

        let mut output = Vec::new();
        let mut remainder = self.value;

        for (script_pubkey, amount) in &self.payees {
            remainder = remainder
                .checked_sub(*amount)
                .context("payee amounts exceed coinbase value")?;
            output.push(TxOut {
                value: *amount,
                script_pubkey: script_pubkey.clone(),
            });
        }

        for (script_pubkey, percent) in &self.recipients {
            let amount = Amount::from_sat((self.value.to_sat() as f64 * percent / 100.0) as u64);
            remainder = remainder
                .checked_sub(amount)
                .context("recipient percentages exceed coinbase value")?;
            output.push(TxOut {
                value: amount,
                script_pubkey: script_pubkey.clone(),
            });
        }

        output.push(TxOut {
            value: remainder,
            script_pubkey: self.pool_script.clone(),
        });

        if !self.witness_commitment.is_empty() {
            output.push(TxOut {
                value: Amount::ZERO,
                script_pubkey: self.witness_commitment.clone(),
            });
        }

        let version = if self.tx_messages || self.reward == Reward::Pos {
            2
        } else {
            1
        };

        let coinbase = Transaction {
            version: bitcoin::transaction::Version(version),
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig,
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output,
        };

        let mut bin = consensus::serialize(&coinbase);

        let mut pos_offset = 0;
        if self.reward == Reward::Pos {
            let timestamp = self.pos_timestamp.context("POS coinbase requires timestamp")?;
            bin.splice(4..4, timestamp.to_le_bytes());
            pos_offset = 4;
        }

        // offset = version (+ POS time) + input count + null outpoint
        // + scriptSig length prefix + scriptSig bytes before the placeholder
        let offset = 4
            + pos_offset
            + VarInt(coinbase.input.len().try_into().unwrap()).size()
            + 36
            + VarInt(script_sig_size.try_into().unwrap()).size()
            + script_prefix_size;

        let coinb1 = hex::encode(&bin[..offset]);
        let coinb2 = hex::encode(&bin[offset + self.placeholder_size..]);

        Ok((coinbase, coinb1, coinb2))
    }
}
