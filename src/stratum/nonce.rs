use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, DeserializeFromStr, SerializeDisplay)]
pub struct Nonce(u32);

impl FromStr for Nonce {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ensure!(s.len() == 8, "incorrect size of nonce");
        let nonce = u32::from_str_radix(s, 16)
            .with_context(|| format!("invalid nonce hex string '{s}'"))?;
        Ok(Nonce(nonce))
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl From<Nonce> for u32 {
    fn from(n: Nonce) -> u32 {
        n.0
    }
}

impl From<u32> for Nonce {
    fn from(n: u32) -> Nonce {
        Nonce(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        assert_eq!(Nonce::from(u32::MAX).to_string(), "ffffffff");
        assert_eq!("ffffffff".parse::<Nonce>().unwrap(), Nonce::from(u32::MAX));
        assert_eq!(Nonce::from(0).to_string(), "00000000");
        assert_eq!("00000000".parse::<Nonce>().unwrap(), Nonce::from(0));
    }

    #[test]
    fn rejects_wrong_width() {
        for s in ["", "1234", "123456789"] {
            assert_eq!(
                s.parse::<Nonce>().unwrap_err().to_string(),
                "incorrect size of nonce"
            );
        }
    }
}
