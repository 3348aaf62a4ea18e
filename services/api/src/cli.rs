use crate::commands::{
    run_assess, run_completeness, run_demo, run_model_info, run_train, AssessArgs,
    CompletenessArgs, DemoArgs, TrainArgs,
};
use crate::server;
use clap::{Args, Parser, Subcommand};
use credit_advisor::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Credit Advisor",
    about = "Score credit applications, train models and serve the assessment API",
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
    /// Assess a single application read from a JSON file
    Assess(AssessArgs),
    /// Train a model from a CSV export or a generated sample and persist it
    Train(TrainArgs),
    /// Score a set of submitted document ids against the checklist
    Completeness(CompletenessArgs),
    /// Print metadata for the persisted model artifact
    ModelInfo,
    /// Generate sample history, train on it and assess a sample applicant
    Demo(DemoArgs),
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
        Command::Assess(args) => run_assess(args),
        Command::Train(args) => run_train(args),
        Command::Completeness(args) => run_completeness(args),
        Command::ModelInfo => run_model_info(),
        Command::Demo(args) => run_demo(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_defaults_to_serve() {
        let cli = Cli::try_parse_from(["credit-advisor"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn train_accepts_sample_size_and_output() {
        let cli = Cli::try_parse_from([
            "credit-advisor",
            "train",
            "--sample",
            "250",
            "--output",
            "/tmp/model.json",
        ])
        .expect("parses");

        match cli.command {
            Some(Command::Train(args)) => {
                assert_eq!(args.sample, Some(250));
                assert!(args.csv.is_none());
                assert_eq!(
                    args.output.as_deref(),
                    Some(std::path::Path::new("/tmp/model.json"))
                );
            }
            other => panic!("expected train command, got {other:?}"),
        }
    }

    #[test]
    fn train_rejects_csv_and_sample_together() {
        let result = Cli::try_parse_from([
            "credit-advisor",
            "train",
            "--csv",
            "history.csv",
            "--sample",
            "100",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn completeness_splits_document_list() {
        let cli = Cli::try_parse_from([
            "credit-advisor",
            "completeness",
            "--documents",
            "doc_id,doc_salary",
        ])
        .expect("parses");

        match cli.command {
            Some(Command::Completeness(args)) => {
                assert_eq!(args.documents, vec!["doc_id", "doc_salary"])
            }
            other => panic!("expected completeness command, got {other:?}"),
        }
    }
}
