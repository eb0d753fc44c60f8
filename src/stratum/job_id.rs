use super::*;

/// Rolling 16-bit job counter rendered as lowercase hex. The counter wraps
/// back to 1 on overflow and never yields 0, so a job id is always a
/// non-empty, non-zero hex string on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, DeserializeFromStr, SerializeDisplay, Hash)]
#[repr(transparent)]
pub struct JobId(u16);

impl JobId {
    pub fn new(n: u16) -> Self {
        Self(n)
    }

    pub fn next(self) -> Self {
        match self.0.checked_add(1) {
            Some(n) => Self(n),
            None => Self(1),
        }
    }
}

impl FromStr for JobId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = u16::from_str_radix(s, 16)
            .with_context(|| format!("invalid job id hex string '{s}'"))?;
        Ok(JobId(id))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl From<JobId> for u16 {
    fn from(id: JobId) -> u16 {
        id.0
    }
}

impl From<u16> for JobId {
    fn from(id: u16) -> JobId {
        JobId(id)
    }
}
