use std::time::Duration;

use clap::Parser;
use sqspipe_core::PumpConfig;

/// Pipes lines between stdin/stdout and an SQS queue.
///
/// With a terminal on stdin, messages are received and written to stdout one
/// per line. With piped input, every line read from stdin is sent as one
/// message.
///
/// Every option can also be set through its environment variable or a `.env`
/// file in the working directory.
#[derive(Parser, Debug, Clone)]
#[command(name = "sqspipe", version, disable_version_flag = true)]
pub struct CliArgs {
    /// Number of concurrent workers. `0` picks 10 per CPU.
    ///
    /// Ignored when `--num-messages` is set.
    #[arg(short, long, env = "SQSPIPE_CONCURRENCY", default_value_t = 0)]
    pub concurrency: usize,

    /// Delete each batch from the queue once it was written to stdout.
    #[arg(short, long, env = "SQSPIPE_DELETE", default_value_t = false)]
    pub delete: bool,

    /// Stop after this many messages. `0` means no limit.
    #[arg(short, long, env = "SQSPIPE_NUM_MESSAGES", default_value_t = 0)]
    pub num_messages: u64,

    /// Stop after this many seconds. `0` means no deadline.
    #[arg(short, long, env = "SQSPIPE_TIMEOUT", default_value_t = 0)]
    pub timeout: u64,

    /// Print version.
    #[arg(short = 'v', long, action = clap::ArgAction::Version)]
    pub version: Option<bool>,

    /// Name of the queue to read from or write to.
    #[arg(env = "SQSPIPE_QUEUE")]
    pub queue_name: String,
}

impl TryFrom<CliArgs> for PumpConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.queue_name.trim().is_empty() {
            anyhow::bail!("queue name must not be empty");
        }

        Ok(Self {
            concurrency: (args.concurrency > 0).then_some(args.concurrency),
            delete: args.delete,
            limit: (args.num_messages > 0).then_some(args.num_messages),
            timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        })
    }
}
