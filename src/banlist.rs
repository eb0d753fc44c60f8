use super::*;

/// Process-wide ban table: remote address to ban start. Checked on accept,
/// purged by a background sweep. Bans do not survive a restart.
#[derive(Debug)]
pub struct Banlist {
    window: Duration,
    banned: DashMap<IpAddr, Instant>,
}

impl Banlist {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            banned: DashMap::new(),
        }
    }

    pub fn ban(&self, address: IpAddr) {
        self.banned.insert(address, Instant::now());
        info!("Banned {address} for {}s", self.window.as_secs());
    }

    /// True while the address is inside its ban window; expired entries are
    /// dropped on the way out.
    pub fn is_banned(&self, address: IpAddr) -> bool {
        let Some(banned_at) = self.banned.get(&address).map(|entry| *entry.value()) else {
            return false;
        };

        if banned_at.elapsed() >= self.window {
            self.banned.remove(&address);
            return false;
        }

        true
    }

    pub fn purge(&self) {
        let window = self.window;
        self.banned.retain(|_, banned_at| banned_at.elapsed() < window);
    }

    pub fn len(&self) -> usize {
        self.banned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.banned.is_empty()
    }
}
