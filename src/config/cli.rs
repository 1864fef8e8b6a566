use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, builder::BoolishValueParser};
use finquiz_api_types::VoteAction;

/// Command-line arguments for the FinQuiz binary.
#[derive(Debug, Parser)]
#[command(name = "finquiz", version, about = "FinQuiz terminal client")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "FINQUIZ_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Sign in and persist the session.
    Login(LoginArgs),
    /// Sign out and forget the stored session.
    Logout,
    /// Print the stored session.
    Whoami,
    /// Navigate to an application path and load its data.
    Open(OpenArgs),
    /// Answer the given question of a questionnaire.
    Answer(AnswerArgs),
    /// Up-vote or report a question.
    Vote(VoteArgs),
    /// Move a questionnaire to its next question.
    Advance(AdvanceArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the API base URL.
    #[arg(long = "api-base-url", value_name = "URL", global = true)]
    pub api_base_url: Option<String>,

    /// Override the API request timeout.
    #[arg(long = "api-timeout-seconds", value_name = "SECONDS", global = true)]
    pub api_timeout_seconds: Option<u64>,

    /// Override the session file location.
    #[arg(
        long = "session-file",
        value_name = "PATH",
        value_hint = ValueHint::FilePath,
        global = true
    )]
    pub session_file: Option<PathBuf>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Clone)]
pub struct LoginArgs {
    #[arg(long, value_name = "EMAIL")]
    pub email: String,

    #[arg(long, env = "FINQUIZ_PASSWORD", hide_env_values = true, value_name = "PASSWORD")]
    pub password: String,
}

#[derive(Debug, Args, Clone)]
pub struct OpenArgs {
    /// Application path, e.g. `/questionnaires/4`.
    #[arg(value_name = "PATH")]
    pub path: String,
}

#[derive(Debug, Args, Clone)]
pub struct AnswerArgs {
    #[arg(value_name = "QUESTIONNAIRE")]
    pub questionnaire_id: u64,
    #[arg(value_name = "QUESTION")]
    pub question_id: u64,
    /// Identifier of the chosen option.
    #[arg(value_name = "OPTION")]
    pub answer: u64,
}

#[derive(Debug, Args, Clone)]
pub struct VoteArgs {
    #[arg(value_name = "QUESTIONNAIRE")]
    pub questionnaire_id: u64,
    #[arg(value_name = "QUESTION")]
    pub question_id: u64,
    #[arg(value_enum, value_name = "ACTION")]
    pub action: VoteChoice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VoteChoice {
    UpVote,
    Report,
}

impl From<VoteChoice> for VoteAction {
    fn from(choice: VoteChoice) -> Self {
        match choice {
            VoteChoice::UpVote => VoteAction::UpVote,
            VoteChoice::Report => VoteAction::Report,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct AdvanceArgs {
    #[arg(value_name = "QUESTIONNAIRE")]
    pub questionnaire_id: u64,
}
