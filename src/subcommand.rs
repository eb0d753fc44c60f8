use super::*;

pub(crate) mod pool;

#[derive(Debug, Parser)]
pub(crate) enum Subcommand {
    #[command(about = "Run the stratum pool server")]
    Pool(pool::Pool),
}

impl Subcommand {
    pub(crate) async fn run(self, settings: Settings, cancel: CancellationToken) -> Result {
        match self {
            Self::Pool(pool) => pool.run(settings, cancel).await,
        }
    }
}
