use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    Ok,
    Ban,
}

/// Per-connection share accounting for the ban policy: once at least
/// `check_threshold` shares have been seen, an invalid fraction at or above
/// `invalid_percent` bans the remote. Counters reset after every clean
/// checkpoint.
#[derive(Debug, Clone)]
pub(crate) struct Bouncer {
    enabled: bool,
    check_threshold: u64,
    invalid_percent: f64,
    valid: u64,
    invalid: u64,
}

impl Bouncer {
    pub(crate) fn new(enabled: bool, check_threshold: u64, invalid_percent: f64) -> Self {
        Self {
            enabled,
            check_threshold,
            invalid_percent,
            valid: 0,
            invalid: 0,
        }
    }

    pub(crate) fn disabled() -> Self {
        Self::new(false, 0, 0.0)
    }

    pub(crate) fn record(&mut self, valid: bool) -> Verdict {
        if valid {
            self.valid += 1;
        } else {
            self.invalid += 1;
        }

        if !self.enabled {
            return Verdict::Ok;
        }

        let total = self.valid + self.invalid;
        if total < self.check_threshold {
            return Verdict::Ok;
        }

        let percent_bad = self.invalid as f64 / total as f64 * 100.0;
        if percent_bad < self.invalid_percent {
            self.valid = 0;
            self.invalid = 0;
            Verdict::Ok
        } else {
            Verdict::Ban
        }
    }

    pub(crate) fn valid(&self) -> u64 {
        self.valid
    }

    pub(crate) fn invalid(&self) -> u64 {
        self.invalid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_bouncer_never_bans() {
        let mut bouncer = Bouncer::disabled();
        for _ in 0..100 {
            assert_eq!(bouncer.record(false), Verdict::Ok);
        }
    }

    #[test]
    fn no_verdict_below_check_threshold() {
        let mut bouncer = Bouncer::new(true, 10, 50.0);
        for _ in 0..9 {
            assert_eq!(bouncer.record(false), Verdict::Ok);
        }
        assert_eq!(bouncer.invalid(), 9);
    }

    #[test]
    fn bans_at_invalid_percent() {
        let mut bouncer = Bouncer::new(true, 10, 50.0);
        for _ in 0..5 {
            bouncer.record(true);
        }
        for _ in 0..4 {
            assert_eq!(bouncer.record(false), Verdict::Ok);
        }
        assert_eq!(bouncer.record(false), Verdict::Ban);
    }

    #[test]
    fn clean_checkpoint_resets_counters() {
        let mut bouncer = Bouncer::new(true, 4, 50.0);
        bouncer.record(true);
        bouncer.record(true);
        bouncer.record(true);
        assert_eq!(bouncer.record(true), Verdict::Ok);

        assert_eq!(bouncer.valid(), 0);
        assert_eq!(bouncer.invalid(), 0);
    }
}
