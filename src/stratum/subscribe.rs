use super::*;

#[derive(Debug, PartialEq)]
pub struct Subscribe {
    pub user_agent: String,
    pub extranonce1: Option<Extranonce>,
}

impl Serialize for Subscribe {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = if self.extranonce1.is_some() { 2 } else { 1 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.user_agent)?;
        if let Some(extranonce1) = &self.extranonce1 {
            seq.serialize_element(extranonce1)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Subscribe {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One((String,)),
            Two((String, Option<String>)),
            Other(Vec<Value>),
        }

        match Raw::deserialize(deserializer)? {
            Raw::One((user_agent,)) => Ok(Subscribe {
                user_agent,
                extranonce1: None,
            }),
            Raw::Two((user_agent, extranonce1)) => Ok(Subscribe {
                user_agent,
                extranonce1: extranonce1.and_then(|s| s.parse().ok()),
            }),
            Raw::Other(v) if v.is_empty() => Ok(Subscribe {
                user_agent: String::new(),
                extranonce1: None,
            }),
            Raw::Other(_) => Err(de::Error::custom("unexpected subscribe params")),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct SubscribeResult {
    pub subscriptions: Vec<(String, String)>,
    pub extranonce1: Extranonce,
    pub extranonce2_size: usize,
}

impl Serialize for SubscribeResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(3))?;
        seq.serialize_element(&self.subscriptions)?;
        seq.serialize_element(&self.extranonce1)?;
        seq.serialize_element(&self.extranonce2_size)?;
        seq.end()
    }
}

impl<'de> Deserialize<'de> for SubscribeResult {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (subscriptions, extranonce1, extranonce2_size) =
            <(Vec<(String, String)>, Extranonce, usize)>::deserialize(deserializer)?;

        Ok(SubscribeResult {
            subscriptions,
            extranonce1,
            extranonce2_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_user_agent() {
        let parsed: Subscribe = serde_json::from_str(r#"["cgminer/4.10"]"#).unwrap();
        assert_eq!(
            parsed,
            Subscribe {
                user_agent: "cgminer/4.10".into(),
                extranonce1: None,
            }
        );
    }

    #[test]
    fn user_agent_and_extranonce1() {
        let parsed: Subscribe = serde_json::from_str(r#"["cgminer/4.10","abcd1234"]"#).unwrap();
        assert_eq!(
            parsed,
            Subscribe {
                user_agent: "cgminer/4.10".into(),
                extranonce1: Some("abcd1234".parse().unwrap()),
            }
        );
    }

    #[test]
    fn null_and_invalid_extranonce1_normalize_to_none() {
        for json in [r#"["ua",null]"#, r#"["ua","b08cf00d1"]"#] {
            let parsed: Subscribe = serde_json::from_str(json).unwrap();
            assert_eq!(parsed.extranonce1, None, "{json}");
        }
    }

    #[test]
    fn empty_params_accepted() {
        let parsed: Subscribe = serde_json::from_str("[]").unwrap();
        assert_eq!(parsed.user_agent, "");
    }

    #[test]
    fn result_roundtrip() {
        let result = SubscribeResult {
            subscriptions: vec![
                ("mining.set_difficulty".into(), "ae6812eb4cd7735a302a8a9dd95cf71f".into()),
                ("mining.notify".into(), "ae6812eb4cd7735a302a8a9dd95cf71f".into()),
            ],
            extranonce1: "08000002".parse().unwrap(),
            extranonce2_size: 4,
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!([
                [
                    ["mining.set_difficulty", "ae6812eb4cd7735a302a8a9dd95cf71f"],
                    ["mining.notify", "ae6812eb4cd7735a302a8a9dd95cf71f"]
                ],
                "08000002",
                4
            ])
        );

        let back: SubscribeResult = serde_json::from_value(value).unwrap();
        assert_eq!(back, result);
    }
}
