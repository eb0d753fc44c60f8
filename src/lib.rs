use {
    anyhow::{Context, Error, anyhow, bail, ensure},
    arguments::Arguments,
    auth::{AcceptAll, Authorizer},
    banlist::Banlist,
    bitcoin::{
        Amount, BlockHash, CompactTarget, OutPoint, ScriptBuf, Sequence, Target, Transaction,
        TxIn, TxOut, Txid, VarInt, Witness,
        block::{self, Header},
        consensus,
        hashes::{Hash, sha256d},
        locktime::absolute::LockTime,
        script::{self, write_scriptint},
    },
    byteorder::{BigEndian, ByteOrder, LittleEndian},
    clap::Parser,
    coinbase_builder::{CoinbaseBuilder, Reward},
    config::{Config, DaemonConfig},
    daemon::{DaemonClient, DaemonInstance, RpcFailure},
    dashmap::DashMap,
    derive_more::Display,
    foreman::Foreman,
    futures::{SinkExt, StreamExt},
    generator::{Generator, JobUpdate},
    hex::FromHex,
    job::{Job, JobContext},
    jobs::Jobs,
    options::Options,
    p2p::P2pListener,
    parking_lot::{Mutex, RwLock},
    primitive_types::{U256, U512},
    rand::{Rng, RngCore},
    serde::{
        Deserialize, Serialize, Serializer,
        de::{self, Deserializer},
        ser::SerializeSeq,
    },
    serde_json::{Value, json},
    serde_with::{DeserializeFromStr, SerializeDisplay},
    settings::Settings,
    share::{Share, ShareEvent, SubmitContext},
    std::{
        collections::{BTreeMap, HashMap, HashSet, VecDeque},
        env,
        fmt::{self, Display, Formatter},
        fs,
        net::{IpAddr, SocketAddr},
        ops::{BitAnd, BitOr, BitXor, Not},
        path::{Path, PathBuf},
        process,
        str::FromStr,
        sync::{
            Arc, LazyLock,
            atomic::{AtomicU32, AtomicU64, Ordering},
        },
        time::{Duration, Instant, SystemTime, UNIX_EPOCH},
    },
    stratifier::Stratifier,
    stratum::{
        Authorize, Configure, Difficulty, Extranonce, Id, JobId, MerkleNode, Message, Nbits,
        Nonce, Notify, Ntime, PrevHash, SetDifficulty, StratumError, Submit, Subscribe,
        SubscribeResult, SuggestDifficulty, Version,
    },
    subcommand::Subcommand,
    template::BlockTemplate,
    tokio::{
        net::{
            TcpListener, TcpStream,
            tcp::{OwnedReadHalf, OwnedWriteHalf},
        },
        runtime::Runtime,
        sync::{mpsc, watch},
        task::{JoinHandle, JoinSet},
        time::{interval, sleep},
    },
    tokio_util::{
        codec::{FramedRead, FramedWrite, LinesCodec},
        sync::CancellationToken,
    },
    tracing::{debug, error, info, warn},
    tracing_subscriber::EnvFilter,
    vardiff::{Vardiff, VardiffConfig},
};

mod arguments;
pub mod auth;
pub mod banlist;
pub mod codec;
pub mod coinbase_builder;
mod config;
mod daemon;
pub mod foreman;
mod generator;
pub mod job;
pub mod jobs;
mod options;
mod p2p;
mod settings;
pub mod share;
mod signal;
mod stratifier;
pub mod stratum;
mod subcommand;
pub mod template;
pub mod vardiff;

pub const COIN_VALUE: u64 = 100_000_000;

/// The extranonce region of the coinbase scriptSig: 4 pool-assigned bytes
/// followed by 4 miner-chosen bytes.
pub const EXTRANONCE_PLACEHOLDER_SIZE: usize = 8;
pub const ENONCE1_SIZE: usize = 4;
pub const ENONCE2_SIZE: usize = EXTRANONCE_PLACEHOLDER_SIZE - ENONCE1_SIZE;

/// Receive-buffer cap per line; anything longer without a newline is flood.
const MAX_MESSAGE_SIZE: usize = 10_240;

/// Pool-allowed version-rolling bits (BIP 310).
pub const DEFAULT_VERSION_MASK: i32 = 0x3fff_e000;

type Result<T = (), E = Error> = std::result::Result<T, E>;

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

pub fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Arguments::parse();

    match args.run() {
        Err(err) => {
            error!("error: {err}");

            if env::var_os("RUST_BACKTRACE")
                .map(|val| val == "1")
                .unwrap_or_default()
            {
                error!("{}", err.backtrace());
            }
            process::exit(1);
        }
        Ok(_) => {
            process::exit(0);
        }
    }
}
