use super::*;

#[derive(Debug, PartialEq, Clone)]
pub struct Submit {
    pub username: String,
    pub job_id: String,
    pub extranonce2: Extranonce,
    pub ntime: Ntime,
    pub nonce: Nonce,
    pub version_bits: Option<Version>,
}

impl Serialize for Submit {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = if self.version_bits.is_some() { 6 } else { 5 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.username)?;
        seq.serialize_element(&self.job_id)?;
        seq.serialize_element(&self.extranonce2)?;
        seq.serialize_element(&self.ntime)?;
        seq.serialize_element(&self.nonce)?;
        if let Some(version) = &self.version_bits {
            seq.serialize_element(version)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Submit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (username, job_id, extranonce2, ntime, nonce, version_bits) =
            <(String, String, Extranonce, Ntime, Nonce, Option<Version>)>::deserialize(
                deserializer,
            )?;

        Ok(Submit {
            username,
            job_id,
            extranonce2,
            ntime,
            nonce,
            version_bits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_params() {
        let parsed: Submit = serde_json::from_str(
            r#"["slush.miner1","bf","00000001","504e86ed","b2957c02"]"#,
        )
        .unwrap();
        assert_eq!(
            parsed,
            Submit {
                username: "slush.miner1".into(),
                job_id: "bf".into(),
                extranonce2: "00000001".parse().unwrap(),
                ntime: "504e86ed".parse().unwrap(),
                nonce: "b2957c02".parse().unwrap(),
                version_bits: None,
            }
        );
    }

    #[test]
    fn six_params_with_version() {
        let parsed: Submit = serde_json::from_str(
            r#"["slush.miner1","bf","00000001","504e86ed","b2957c02","20002000"]"#,
        )
        .unwrap();
        assert_eq!(parsed.version_bits, Some("20002000".parse().unwrap()));
    }

    #[test]
    fn wrong_ntime_width_is_a_parse_error() {
        let err = serde_json::from_str::<Submit>(
            r#"["slush.miner1","bf","00000001","504e","b2957c02"]"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("incorrect size of ntime"));
    }

    #[test]
    fn wrong_nonce_width_is_a_parse_error() {
        let err = serde_json::from_str::<Submit>(
            r#"["slush.miner1","bf","00000001","504e86ed","b2"]"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("incorrect size of nonce"));
    }

    #[test]
    fn serialize_shape() {
        let submit = Submit {
            username: "worker".into(),
            job_id: "1".into(),
            extranonce2: "00000000".parse().unwrap(),
            ntime: "5e4a4c3b".parse().unwrap(),
            nonce: "12345678".parse().unwrap(),
            version_bits: None,
        };
        assert_eq!(
            serde_json::to_value(&submit).unwrap(),
            json!(["worker", "1", "00000000", "5e4a4c3b", "12345678"])
        );
    }
}
