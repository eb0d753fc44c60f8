use super::*;

#[derive(Debug, PartialEq)]
pub struct Authorize {
    pub username: String,
    pub password: Option<String>,
}

impl Serialize for Authorize {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = if self.password.is_some() { 2 } else { 1 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.username)?;
        if let Some(password) = &self.password {
            seq.serialize_element(password)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Authorize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One((String,)),
            Two((String, Option<String>)),
        }

        match Raw::deserialize(deserializer)? {
            Raw::One((username,)) => Ok(Authorize {
                username,
                password: None,
            }),
            Raw::Two((username, password)) => Ok(Authorize { username, password }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_password() {
        let parsed: Authorize =
            serde_json::from_str(r#"["slush.miner1","password"]"#).unwrap();
        assert_eq!(
            parsed,
            Authorize {
                username: "slush.miner1".into(),
                password: Some("password".into()),
            }
        );
    }

    #[test]
    fn omitted_or_null_password() {
        for json in [r#"["user"]"#, r#"["user",null]"#] {
            let parsed: Authorize = serde_json::from_str(json).unwrap();
            assert_eq!(parsed.username, "user");
            assert_eq!(parsed.password, None);
        }
    }

    #[test]
    fn rejects_bad_arity() {
        assert!(serde_json::from_str::<Authorize>(r#"[]"#).is_err());
        assert!(serde_json::from_str::<Authorize>(r#"["u","p","extra"]"#).is_err());
    }
}
