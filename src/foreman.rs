use super::*;

/// Fixed prefix of every subscription id; the low 8 bytes are a counter.
const SUBSCRIPTION_PREFIX: [u8; 8] = *b"galena\x00\x01";

/// Process-wide pool state: the extranonce1 counter, subscription ids, and
/// share/connection/block tallies. One per pool instance, explicit init, no
/// hidden singletons.
pub struct Foreman {
    instance_id: u32,
    enonce1_counter: AtomicU32,
    subscription_counter: AtomicU64,
    connections: AtomicU64,
    accepted: AtomicU64,
    rejected: AtomicU64,
    blocks: AtomicU64,
    workers: DashMap<String, Arc<WorkerStats>>,
}

impl Foreman {
    /// Seeds the extranonce1 counter at `instance_id << 27`, giving pool
    /// instances with distinct ids disjoint 2^27 ranges.
    pub fn new(instance_id: Option<u32>) -> Self {
        let instance_id = instance_id.unwrap_or_else(|| rand::rng().random());

        Self {
            instance_id,
            enonce1_counter: AtomicU32::new(instance_id.wrapping_shl(27)),
            subscription_counter: AtomicU64::new(0),
            connections: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            blocks: AtomicU64::new(0),
            workers: DashMap::new(),
        }
    }

    pub fn instance_id(&self) -> u32 {
        self.instance_id
    }

    /// Monotonic, wrapping draw of the next 4-byte extranonce1.
    pub fn next_enonce1(&self) -> Extranonce {
        Extranonce::from(self.enonce1_counter.fetch_add(1, Ordering::Relaxed))
    }

    pub fn next_subscription_id(&self) -> String {
        let counter = self.subscription_counter.fetch_add(1, Ordering::Relaxed);
        format!("{}{counter:016x}", hex::encode(SUBSCRIPTION_PREFIX))
    }

    pub fn worker(&self, name: &str) -> Arc<WorkerStats> {
        self.workers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(WorkerStats::default()))
            .clone()
    }

    pub fn record_share(&self, share: &Share) {
        let worker = self.worker(&share.worker);
        if share.is_valid() {
            self.accepted.fetch_add(1, Ordering::Relaxed);
            worker.accepted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            worker.rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn add_block(&self) {
        self.blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_connection(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sub_connection(&self) {
        self.connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn blocks(&self) -> u64 {
        self.blocks.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct WorkerStats {
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl WorkerStats {
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}
