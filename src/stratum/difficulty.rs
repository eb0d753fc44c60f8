use super::*;

/// Share difficulty in pool units: diff 1 corresponds to the classic Bitcoin
/// diff-1 target `0x00000000ffff0000...0`. Stratum carries it as a bare JSON
/// number; vardiff and the low-difficulty credit rule are defined on the
/// float, so this is a plain f64 wrapper rather than a compact target.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Difficulty(f64);

impl Difficulty {
    pub fn new(value: f64) -> Self {
        assert!(
            value.is_finite() && value > 0.0,
            "difficulty must be finite and > 0"
        );
        Self(value)
    }

    pub fn as_f64(self) -> f64 {
        self.0
    }

    pub fn clamp(self, min: Difficulty, max: Difficulty) -> Self {
        Self(self.0.clamp(min.0, max.0))
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty(1.0)
    }
}

impl From<f64> for Difficulty {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<u64> for Difficulty {
    fn from(value: u64) -> Self {
        Self::new(value as f64)
    }
}

impl Serialize for Difficulty {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        if self.0 >= 1.0 && self.0.fract() == 0.0 {
            ser.serialize_u64(self.0 as u64)
        } else {
            ser.serialize_f64(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Difficulty {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(de)?;
        if !value.is_finite() || value <= 0.0 {
            return Err(de::Error::custom("difficulty must be finite and > 0"));
        }
        Ok(Difficulty(value))
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(precision) = f.precision() {
            write!(f, "{:.*}", precision, self.0)
        } else if self.0.fract() == 0.0 {
            write!(f, "{}", self.0 as u64)
        } else {
            let s = format!("{:.8}", self.0);
            f.write_str(s.trim_end_matches('0').trim_end_matches('.'))
        }
    }
}

impl FromStr for Difficulty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().parse::<f64>()?;
        ensure!(
            value.is_finite() && value > 0.0,
            "difficulty must be finite and > 0"
        );
        Ok(Difficulty(value))
    }
}
