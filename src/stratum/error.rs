use {super::*, snafu::Snafu};

/// Submit and protocol errors with their numeric Stratum codes. The wire
/// representation is the `[code, message, null]` error tuple.
#[derive(Debug, Clone, PartialEq, Snafu)]
pub enum StratumError {
    #[snafu(display("incorrect size of extranonce2"))]
    IncorrectExtranonce2Size,

    #[snafu(display("job not found"))]
    JobNotFound,

    #[snafu(display("ntime out of range"))]
    NtimeOutOfRange,

    #[snafu(display("version too low"))]
    VersionTooLow,

    #[snafu(display("version rolling outside allowed mask"))]
    VersionOutsideMask,

    #[snafu(display("duplicate share"))]
    DuplicateShare,

    #[snafu(display("low difficulty share of {difficulty:.8}"))]
    LowDifficultyShare { difficulty: f64 },

    #[snafu(display("unauthorized worker"))]
    UnauthorizedWorker,

    #[snafu(display("not subscribed"))]
    NotSubscribed,

    #[snafu(display("Unknown method"))]
    UnknownMethod,

    #[snafu(display("{message}"))]
    BadParameter { message: String },
}

impl StratumError {
    pub fn code(&self) -> i32 {
        match self {
            Self::IncorrectExtranonce2Size
            | Self::NtimeOutOfRange
            | Self::VersionTooLow
            | Self::VersionOutsideMask
            | Self::UnknownMethod
            | Self::BadParameter { .. } => 20,
            Self::JobNotFound => 21,
            Self::DuplicateShare => 22,
            Self::LowDifficultyShare { .. } => 23,
            Self::UnauthorizedWorker => 24,
            Self::NotSubscribed => 25,
        }
    }

    pub fn bad_parameter(message: impl Into<String>) -> Self {
        Self::BadParameter {
            message: message.into(),
        }
    }

    pub fn to_json_rpc(&self) -> JsonRpcError {
        JsonRpcError {
            code: self.code(),
            message: self.to_string(),
            traceback: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    pub traceback: Option<Value>,
}

impl Serialize for JsonRpcError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (&self.code, &self.message, &self.traceback).serialize(serializer)
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stratum error {}: {}", self.code, self.message)
    }
}
