use super::*;

#[derive(Clone, Debug, Parser)]
pub(crate) struct Options {
    #[arg(long, env = "GALENA_CONFIG", help = "Load pool configuration from <CONFIG>.")]
    pub(crate) config: Option<PathBuf>,
}
