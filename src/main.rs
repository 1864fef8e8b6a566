use std::{io, process};

use finquiz::{
    app::{App, AppError, PageData},
    cache::QueryKey,
    config::{self, Command},
    infra::telemetry,
    session::Session,
};
use serde::Serialize;
use tracing::{Dispatch, Level, dispatcher, error};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    // A rejected request is shown as the server's message, like a toast.
    if let AppError::Api(api) = error {
        eprintln!("{}", api.first_message());
        return;
    }

    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;
    let app = App::new(&settings)?;

    match cli_args.command {
        Command::Login(args) => {
            let session = app.login(&args.email, &args.password).await?;
            print_json(&SignedIn {
                home: app.home_path(),
                session,
            })
        }
        Command::Logout => {
            app.logout().await?;
            print_json(&serde_json::json!({ "signed_out": true }))
        }
        Command::Whoami => {
            let session = app.session();
            print_json(&WhoAmI {
                authenticated: session.is_authenticated(),
                session,
            })
        }
        Command::Open(args) => {
            let page = app.open(&args.path).await?;
            print_json(&page)
        }
        Command::Answer(args) => {
            let answer = app
                .answer(args.questionnaire_id, args.question_id, args.answer)
                .await?;
            print_json(&answer)
        }
        Command::Vote(args) => {
            app.vote(args.questionnaire_id, args.question_id, args.action.into())
                .await?;
            print_json(&serde_json::json!({ "voted": true }))
        }
        Command::Advance(args) => {
            // The step is local, so the questionnaire has to be cached first.
            app.open(&format!("/questionnaires/{}", args.questionnaire_id))
                .await?;
            let key = QueryKey::Questionnaire {
                id: args.questionnaire_id,
            };
            let state = app
                .advance(args.questionnaire_id)
                .ok_or_else(|| AppError::unexpected(format!("{key} is not cached")))?;
            print_json(&PageData::from_state(&key, &state))
        }
    }
}

#[derive(Serialize)]
struct SignedIn {
    home: String,
    session: Session,
}

#[derive(Serialize)]
struct WhoAmI {
    authenticated: bool,
    session: Session,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;
    println!("{rendered}");
    Ok(())
}
