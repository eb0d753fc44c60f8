use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, DeserializeFromStr, SerializeDisplay)]
pub struct Version(pub block::Version);

impl Version {
    pub fn to_consensus(self) -> i32 {
        self.0.to_consensus()
    }

    pub fn is_zero(self) -> bool {
        self.to_consensus() == 0
    }

    pub fn count_ones(self) -> u32 {
        self.to_consensus().count_ones()
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ensure!(s.len() == 8, "incorrect size of version");
        let n = u32::from_str_radix(s, 16)?;
        // The as conversion matches Bitcoin's behaviour
        Ok(Self(block::Version::from_consensus(n as i32)))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0.to_consensus())
    }
}

impl From<block::Version> for Version {
    fn from(v: block::Version) -> Self {
        Self(v)
    }
}

impl From<Version> for block::Version {
    fn from(v: Version) -> Self {
        v.0
    }
}

impl From<i32> for Version {
    fn from(value: i32) -> Self {
        Self(block::Version::from_consensus(value))
    }
}

impl BitAnd for Version {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(block::Version::from_consensus(
            self.0.to_consensus() & rhs.0.to_consensus(),
        ))
    }
}

impl BitOr for Version {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(block::Version::from_consensus(
            self.0.to_consensus() | rhs.0.to_consensus(),
        ))
    }
}

impl BitXor for Version {
    type Output = Self;
    fn bitxor(self, rhs: Self) -> Self {
        Self(block::Version::from_consensus(
            self.0.to_consensus() ^ rhs.0.to_consensus(),
        ))
    }
}

impl Not for Version {
    type Output = Self;
    fn not(self) -> Self {
        Self(block::Version::from_consensus(!self.0.to_consensus()))
    }
}
