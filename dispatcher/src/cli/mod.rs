use clap::{Parser, Subcommand};

pub mod compute;
pub mod database;
pub mod queue;
pub mod server;
pub mod watch;
pub mod worker;

pub use watch::WatchCmd;

#[derive(Parser, Debug)]
#[command(
    name = "dispatcher",
    about = "Durable job dispatch for poker solver computations",
    long_about = "Runs the job dispatcher: declares the broker topology, accepts jobs over REST, \
    and processes them with a pool of queue workers.\n\n\
    Quick Start:\n  \
    dispatcher setup\n  \
    dispatcher run --database-backend memory",
    after_help = "Examples:\n  \
    dispatcher setup --allow-repair\n  \
    dispatcher run --no-server\n  \
    dispatcher watch --api-url http://127.0.0.1:3000/"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the REST server and the worker pool
    Run {
        #[command(flatten)]
        run_command: Box<RunCmd>,
    },
    /// Declare or repair exchanges, queues and bindings
    #[command(long_about = "Reconcile the broker with the declared topology.\n\n\
        Safe to run on every deploy. Queues whose arguments drifted are only \
        recreated when --allow-repair is given.")]
    Setup {
        #[command(flatten)]
        setup_command: Box<SetupCmd>,
    },
    /// Follow jobs on a running dispatcher and log each one that finishes
    Watch {
        #[command(flatten)]
        watch_command: Box<WatchCmd>,
    },
}

#[derive(Parser, Debug, Clone)]
pub struct RunCmd {
    #[clap(flatten)]
    pub queue_args: queue::QueueCliArgs,

    #[clap(flatten)]
    pub database_args: database::DatabaseCliArgs,

    #[clap(flatten)]
    pub compute_args: compute::ComputeCliArgs,

    #[clap(flatten)]
    pub server_args: server::ServerCliArgs,

    #[clap(flatten)]
    pub worker_args: worker::WorkerCliArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct SetupCmd {
    #[clap(flatten)]
    pub queue_args: queue::QueueCliArgs,

    /// Delete and recreate queues whose arguments differ from the declared ones.
    #[arg(env = "DISPATCHER_SETUP_ALLOW_REPAIR", long, default_value_t = false)]
    pub allow_repair: bool,

    /// Also recreate drifted queues that still hold messages. Those messages are lost.
    #[arg(env = "DISPATCHER_SETUP_ALLOW_PURGE_NON_EMPTY", long, default_value_t = false, requires = "allow_repair")]
    pub allow_purge_non_empty: bool,
}
