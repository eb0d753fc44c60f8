use super::*;

#[derive(Debug, PartialEq, Clone)]
pub struct Configure {
    pub extensions: Vec<String>,
    pub minimum_difficulty_value: Option<Difficulty>,
    pub version_rolling_mask: Option<Version>,
    pub version_rolling_min_bit_count: Option<u32>,
}

impl Configure {
    pub fn requests(&self, extension: &str) -> bool {
        self.extensions.iter().any(|e| e == extension)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct ConfigureOptions {
    #[serde(
        rename = "minimum-difficulty.value",
        skip_serializing_if = "Option::is_none"
    )]
    minimum_difficulty_value: Option<Difficulty>,

    #[serde(
        rename = "version-rolling.mask",
        skip_serializing_if = "Option::is_none"
    )]
    version_rolling_mask: Option<Version>,

    #[serde(
        rename = "version-rolling.min-bit-count",
        skip_serializing_if = "Option::is_none"
    )]
    version_rolling_min_bit_count: Option<u32>,
}

impl Serialize for Configure {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let opts = ConfigureOptions {
            minimum_difficulty_value: self.minimum_difficulty_value,
            version_rolling_mask: self.version_rolling_mask,
            version_rolling_min_bit_count: self.version_rolling_min_bit_count,
        };

        (&self.extensions, &opts).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Configure {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One((Vec<String>,)),
            Two((Vec<String>, ConfigureOptions)),
        }

        match Raw::deserialize(deserializer)? {
            Raw::One((extensions,)) => Ok(Configure {
                extensions,
                minimum_difficulty_value: None,
                version_rolling_mask: None,
                version_rolling_min_bit_count: None,
            }),
            Raw::Two((extensions, opts)) => Ok(Configure {
                extensions,
                minimum_difficulty_value: opts.minimum_difficulty_value,
                version_rolling_mask: opts.version_rolling_mask,
                version_rolling_min_bit_count: opts.version_rolling_min_bit_count,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_only() {
        let cfg: Configure = serde_json::from_str(
            r#"[["version-rolling"],{"version-rolling.mask":"ffffffff"}]"#,
        )
        .unwrap();
        assert_eq!(
            cfg,
            Configure {
                extensions: vec!["version-rolling".into()],
                minimum_difficulty_value: None,
                version_rolling_mask: Some("ffffffff".parse().unwrap()),
                version_rolling_min_bit_count: None,
            }
        );
        assert!(cfg.requests("version-rolling"));
        assert!(!cfg.requests("minimum-difficulty"));
    }

    #[test]
    fn all_options() {
        let cfg: Configure = serde_json::from_str(
            r#"[["minimum-difficulty","version-rolling"],{"minimum-difficulty.value":2048,"version-rolling.mask":"00fff000","version-rolling.min-bit-count":2}]"#,
        )
        .unwrap();
        assert_eq!(
            cfg,
            Configure {
                extensions: vec!["minimum-difficulty".into(), "version-rolling".into()],
                minimum_difficulty_value: Some(Difficulty::from(2048u64)),
                version_rolling_mask: Some("00fff000".parse().unwrap()),
                version_rolling_min_bit_count: Some(2),
            }
        );
    }

    #[test]
    fn one_element_normalizes() {
        let cfg: Configure = serde_json::from_str(r#"[["subscribe-extranonce"]]"#).unwrap();
        assert_eq!(cfg.extensions, vec!["subscribe-extranonce".to_string()]);
        assert_eq!(
            serde_json::to_value(&cfg).unwrap(),
            json!([["subscribe-extranonce"], {}])
        );
    }

    #[test]
    fn unknown_keys_ignored() {
        let cfg: Configure = serde_json::from_str(
            r#"[["version-rolling"],{"version-rolling.mask":"00000001","unknown":123}]"#,
        )
        .unwrap();
        assert_eq!(
            cfg.version_rolling_mask,
            Some("00000001".parse().unwrap())
        );
    }
}
