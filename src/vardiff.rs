use super::*;

#[derive(Debug, Clone)]
pub struct VardiffConfig {
    pub min_diff: f64,
    pub max_diff: f64,
    /// Target seconds between share submissions.
    pub target_time: f64,
    /// Minimum seconds between retargets.
    pub retarget_time: f64,
    /// Width of the no-adjustment band around the target interval.
    pub variance_percent: f64,
    /// Halve or double instead of scaling proportionally.
    pub x2_mode: bool,
}

impl VardiffConfig {
    fn buffer_size(&self) -> usize {
        ((self.retarget_time / self.target_time) * 4.0).max(1.0) as usize
    }
}

impl Default for VardiffConfig {
    fn default() -> Self {
        Self {
            min_diff: 8.0,
            max_diff: 512.0,
            target_time: 15.0,
            retarget_time: 90.0,
            variance_percent: 30.0,
            x2_mode: false,
        }
    }
}

/// Per-connection retargeter: a sliding window of inter-submit intervals,
/// compared against the target interval with a variance band. New
/// difficulties are clamped to `[min_diff, max_diff]` and handed back to the
/// session to queue for the next job boundary.
#[derive(Debug, Clone)]
pub struct Vardiff {
    config: VardiffConfig,
    t_min: f64,
    t_max: f64,
    buffer: VecDeque<f64>,
    last_submit: Option<Instant>,
    last_retarget: Option<Instant>,
}

impl Vardiff {
    pub fn new(config: VardiffConfig) -> Self {
        let variance = config.target_time * config.variance_percent / 100.0;

        Self {
            t_min: config.target_time - variance,
            t_max: config.target_time + variance,
            buffer: VecDeque::with_capacity(config.buffer_size()),
            last_submit: None,
            last_retarget: None,
            config,
        }
    }

    pub fn min_diff(&self) -> Difficulty {
        Difficulty::new(self.config.min_diff)
    }

    pub fn max_diff(&self) -> Difficulty {
        Difficulty::new(self.config.max_diff)
    }

    /// Records a submit and returns the new difficulty when a retarget is
    /// due and the average interval left the variance band.
    pub fn submit(&mut self, now: Instant, current: Difficulty) -> Option<Difficulty> {
        let Some(last_submit) = self.last_submit.replace(now) else {
            // anchor the window; the first retarget is allowed after half
            // the usual wait
            self.last_retarget =
                Some(now - Duration::from_secs_f64(self.config.retarget_time / 2.0));
            return None;
        };

        if self.buffer.len() == self.config.buffer_size() {
            self.buffer.pop_front();
        }
        self.buffer.push_back(now.duration_since(last_submit).as_secs_f64());

        let last_retarget = self.last_retarget.unwrap_or(now);
        if now.duration_since(last_retarget).as_secs_f64() < self.config.retarget_time
            && !self.buffer.is_empty()
        {
            return None;
        }

        self.last_retarget = Some(now);

        let average = self.buffer.iter().sum::<f64>() / self.buffer.len() as f64;
        let current_diff = current.as_f64();
        let factor = self.config.target_time / average;

        let proposed = if average > self.t_max && current_diff > self.config.min_diff {
            let next = current_diff * if self.config.x2_mode { 0.5 } else { factor };
            next.max(self.config.min_diff)
        } else if average < self.t_min && current_diff < self.config.max_diff {
            let next = current_diff * if self.config.x2_mode { 2.0 } else { factor };
            next.min(self.config.max_diff)
        } else {
            return None;
        };

        self.buffer.clear();

        Some(Difficulty::new(proposed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> VardiffConfig {
        VardiffConfig {
            min_diff: 8.0,
            max_diff: 512.0,
            target_time: 10.0,
            retarget_time: 60.0,
            variance_percent: 30.0,
            x2_mode: false,
        }
    }

    fn drive(
        vardiff: &mut Vardiff,
        start: Instant,
        interval: f64,
        submits: u32,
        difficulty: Difficulty,
    ) -> (Option<Difficulty>, Instant) {
        let mut now = start;
        let mut result = None;
        for _ in 0..submits {
            now += Duration::from_secs_f64(interval);
            if let Some(new_diff) = vardiff.submit(now, difficulty) {
                result = Some(new_diff);
            }
        }
        (result, now)
    }

    #[test]
    fn first_submit_never_retargets() {
        let mut vardiff = Vardiff::new(config());
        assert!(vardiff.submit(Instant::now(), Difficulty::from(64u64)).is_none());
    }

    #[test]
    fn on_target_interval_leaves_difficulty_alone() {
        let mut vardiff = Vardiff::new(config());
        let (result, _) = drive(
            &mut vardiff,
            Instant::now(),
            10.0,
            20,
            Difficulty::from(64u64),
        );
        assert!(result.is_none());
    }

    #[test]
    fn fast_shares_raise_difficulty() {
        let mut vardiff = Vardiff::new(config());
        let (result, _) = drive(
            &mut vardiff,
            Instant::now(),
            1.0,
            120,
            Difficulty::from(64u64),
        );

        let new_diff = result.expect("should retarget upward");
        assert!(new_diff > Difficulty::from(64u64));
        assert!(new_diff <= Difficulty::new(512.0));
    }

    #[test]
    fn slow_shares_lower_difficulty() {
        let mut vardiff = Vardiff::new(config());
        let (result, _) = drive(
            &mut vardiff,
            Instant::now(),
            40.0,
            10,
            Difficulty::from(64u64),
        );

        let new_diff = result.expect("should retarget downward");
        assert!(new_diff < Difficulty::from(64u64));
        assert!(new_diff >= Difficulty::new(8.0));
    }

    #[test]
    fn clamps_to_configured_bounds() {
        let mut vardiff = Vardiff::new(config());
        let (result, _) = drive(
            &mut vardiff,
            Instant::now(),
            0.1,
            1000,
            Difficulty::from(500u64),
        );
        assert_eq!(result.unwrap(), Difficulty::new(512.0));

        let mut vardiff = Vardiff::new(config());
        let (result, _) = drive(
            &mut vardiff,
            Instant::now(),
            120.0,
            10,
            Difficulty::from(9u64),
        );
        assert_eq!(result.unwrap(), Difficulty::new(8.0));
    }

    #[test]
    fn x2_mode_doubles_and_halves() {
        let mut fast = Vardiff::new(VardiffConfig {
            x2_mode: true,
            ..config()
        });
        let (result, _) = drive(&mut fast, Instant::now(), 1.0, 120, Difficulty::from(64u64));
        assert_eq!(result.unwrap(), Difficulty::new(128.0));

        let mut slow = Vardiff::new(VardiffConfig {
            x2_mode: true,
            ..config()
        });
        let (result, _) = drive(&mut slow, Instant::now(), 40.0, 10, Difficulty::from(64u64));
        assert_eq!(result.unwrap(), Difficulty::new(32.0));
    }

    #[test]
    fn retargets_at_most_once_per_window() {
        let mut vardiff = Vardiff::new(config());
        let start = Instant::now();

        let mut now = start;
        let mut retargets = Vec::new();
        for _ in 0..240 {
            now += Duration::from_secs_f64(1.0);
            if vardiff.submit(now, Difficulty::from(64u64)).is_some() {
                retargets.push(now);
            }
        }

        for pair in retargets.windows(2) {
            assert!(
                pair[1].duration_since(pair[0]).as_secs_f64() >= 60.0,
                "retargets closer than the retarget window"
            );
        }
    }
}
