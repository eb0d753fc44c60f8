use super::*;

/// One `getblocktemplate` result, in the shape the daemon hands it over.
/// Optional sections (masternode and superblock payees, votes, an explicit
/// target) only appear on coins that use them.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct BlockTemplate {
    pub bits: Nbits,
    #[serde(rename = "previousblockhash")]
    pub previous_block_hash: BlockHash,
    #[serde(rename = "curtime", deserialize_with = "ntime_from_u64")]
    pub current_time: Ntime,
    pub height: u64,
    #[serde(deserialize_with = "version_from_i32")]
    pub version: Version,
    #[serde(default)]
    pub transactions: Vec<TemplateTransaction>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(with = "bitcoin::script::ScriptBuf", default)]
    pub default_witness_commitment: ScriptBuf,
    #[serde(default)]
    pub coinbaseaux: BTreeMap<String, String>,
    #[serde(
        rename = "coinbasevalue",
        with = "bitcoin::amount::serde::as_sat",
        default
    )]
    pub coinbase_value: Amount,
    #[serde(default)]
    pub masternode: Vec<TemplatePayee>,
    #[serde(default)]
    pub masternode_payments_started: bool,
    #[serde(default)]
    pub superblock: Vec<TemplatePayee>,
    #[serde(default)]
    pub votes: Vec<String>,
}

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct TemplateTransaction {
    pub txid: Txid,
    #[serde(rename = "data", deserialize_with = "tx_from_hex", serialize_with = "tx_to_hex")]
    pub transaction: Transaction,
}

/// Masternode or superblock payee carried by the template; paid verbatim in
/// the coinbase.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct TemplatePayee {
    pub payee: String,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub amount: Amount,
}

impl TemplatePayee {
    /// The declared script when present, otherwise the payee address.
    pub fn script_pubkey(&self) -> Result<ScriptBuf> {
        if let Some(script) = &self.script {
            return Ok(ScriptBuf::from_bytes(hex::decode(script)?));
        }
        codec::address_to_script(&self.payee)
    }
}

impl BlockTemplate {
    /// Network target, preferring the explicit `target` over decoding bits.
    pub fn network_target(&self) -> Result<U256> {
        let target = match &self.target {
            Some(hex) => U256::from_str_radix(hex, 16)
                .with_context(|| format!("invalid template target '{hex}'"))?,
            None => codec::bits_to_target(self.bits),
        };

        ensure!(!target.is_zero(), "template target is zero");
        ensure!(target <= *codec::DIFF1, "template target above diff-1");

        Ok(target)
    }

    pub fn txids(&self) -> Vec<Txid> {
        self.transactions.iter().map(|tx| tx.txid).collect()
    }
}

impl Default for BlockTemplate {
    fn default() -> Self {
        Self {
            bits: "1d00ffff".parse().expect("valid nbits"),
            previous_block_hash: BlockHash::all_zeros(),
            current_time: Ntime(0x504e86b9),
            height: 1,
            version: Version::from(0x2000_0000),
            transactions: Vec::new(),
            target: None,
            default_witness_commitment: ScriptBuf::new(),
            coinbaseaux: BTreeMap::new(),
            coinbase_value: Amount::from_sat(50 * COIN_VALUE),
            masternode: Vec::new(),
            masternode_payments_started: false,
            superblock: Vec::new(),
            votes: Vec::new(),
        }
    }
}

fn version_from_i32<'de, D>(d: D) -> Result<Version, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Version::from(i32::deserialize(d)?))
}

fn tx_from_hex<'de, D>(d: D) -> Result<Transaction, D::Error>
where
    D: Deserializer<'de>,
{
    let s = <&str>::deserialize(d)?;
    consensus::encode::deserialize_hex(s).map_err(de::Error::custom)
}

fn tx_to_hex<S>(tx: &Transaction, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&hex::encode(consensus::serialize(tx)))
}

fn ntime_from_u64<'de, D>(d: D) -> Result<Ntime, D::Error>
where
    D: Deserializer<'de>,
{
    let v = u64::deserialize(d)?;
    Ntime::try_from(v).map_err(de::Error::custom)
}
