use crate::demo::{run_demo, run_rent_status, DemoArgs, RentStatusArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use rentwise::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Rentwise",
    about = "Run the rental marketplace leasing service or explore lease rules from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Inspect rent-due rules without a running service
    Rent {
        #[command(subcommand)]
        command: RentCommand,
    },
    /// Walk a lease from listing to expiry against an in-memory store
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum RentCommand {
    /// Compute the next due date and pay-rent eligibility for a payment history
    Status(RentStatusArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Rent {
            command: RentCommand::Status(args),
        } => run_rent_status(args),
        Command::Demo(args) => run_demo(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rent_status_flags() {
        let cli = Cli::try_parse_from([
            "rentwise",
            "rent",
            "status",
            "--lease-start",
            "2024-01-01",
            "--months",
            "1",
            "--months",
            "2",
            "--as-of",
            "2024-04-02",
        ])
        .expect("arguments parse");

        match cli.command {
            Some(Command::Rent {
                command: RentCommand::Status(args),
            }) => {
                assert_eq!(args.months, vec![1, 2]);
                assert!(args.lease_start.is_some());
                assert!(!args.pending);
            }
            other => panic!("expected rent status, got {other:?}"),
        }
    }

    #[test]
    fn serve_is_the_default() {
        let cli = Cli::try_parse_from(["rentwise"]).expect("arguments parse");
        assert!(cli.command.is_none());
    }
}
