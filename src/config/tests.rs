use std::{ffi::OsString, io::Write};

use super::*;

#[test]
fn defaults_are_valid() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.api.base_url.as_str(), DEFAULT_API_BASE_URL);
    assert_eq!(settings.api.timeout, Duration::from_secs(DEFAULT_API_TIMEOUT_SECS));
    assert_eq!(settings.logging.level, LevelFilter::WARN);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(
        settings.session.storage_path,
        PathBuf::from(DEFAULT_SESSION_PATH)
    );
    assert_eq!(settings.session.expiry_check_interval, Duration::from_secs(60));
    assert_eq!(settings.session.default_course_id, "1");
    assert_eq!(settings.cache.gc_grace, Duration::from_secs(60));
    assert_eq!(settings.cache.consume_batch_limit.get(), 100);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.api.base_url = Some("http://file.example".to_string());
    raw.logging.level = Some("info".to_string());

    let overrides = GlobalOverrides {
        api_base_url: Some("https://cli.example/api".to_string()),
        log_level: Some("debug".to_string()),
        session_file: Some(PathBuf::from("/tmp/finquiz-session.json")),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.api.base_url.as_str(), "https://cli.example/api/");
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(
        settings.session.storage_path,
        PathBuf::from("/tmp/finquiz-session.json")
    );
}

#[test]
fn base_url_gains_trailing_slash() {
    let url = parse_base_url("http://localhost:3000").expect("url");
    assert_eq!(url.as_str(), "http://localhost:3000/");
    assert_eq!(
        url.join("api/v1/stats").expect("join").as_str(),
        "http://localhost:3000/api/v1/stats"
    );

    let nested = parse_base_url("https://example.com/finquiz").expect("url");
    assert_eq!(
        nested.join("api/v1/stats").expect("join").as_str(),
        "https://example.com/finquiz/api/v1/stats"
    );
}

#[test]
fn unsupported_scheme_is_rejected() {
    let mut raw = RawSettings::default();
    raw.api.base_url = Some("ftp://example.com".to_string());
    let err = Settings::from_raw(raw).expect_err("ftp is not an api");
    assert!(matches!(err, LoadError::Invalid { key: "api.base_url", .. }));
}

#[test]
fn zero_durations_are_rejected() {
    let mut raw = RawSettings::default();
    raw.session.expiry_check_seconds = Some(0);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "session.expiry_check_seconds",
            ..
        })
    ));

    let mut raw = RawSettings::default();
    raw.cache.consume_batch_limit = Some(0);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "cache.consume_batch_limit",
            ..
        })
    ));
}

#[test]
fn zero_grace_evicts_immediately() {
    let mut raw = RawSettings::default();
    raw.cache.gc_grace_seconds = Some(0);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.cache.gc_grace, Duration::ZERO);
}

#[test]
fn default_course_must_be_a_segment() {
    let mut raw = RawSettings::default();
    raw.session.default_course_id = Some("1/2".to_string());
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = GlobalOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn config_file_is_layered_under_cli() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("tmp file");
    writeln!(
        file,
        "[api]\nbase_url = \"http://file.example\"\ntimeout_seconds = 5\n\n[session]\ndefault_course_id = \"7\""
    )
    .expect("write config");

    let args = CliArgs::parse_from([
        OsString::from("finquiz"),
        OsString::from("--config-file"),
        file.path().as_os_str().to_os_string(),
        OsString::from("--api-timeout-seconds"),
        OsString::from("9"),
        OsString::from("whoami"),
    ]);
    let settings = load(&args).expect("settings");

    assert_eq!(settings.api.base_url.as_str(), "http://file.example/");
    assert_eq!(settings.api.timeout, Duration::from_secs(9));
    assert_eq!(settings.session.default_course_id, "7");
}

#[test]
fn parse_login_arguments() {
    let args = CliArgs::parse_from([
        "finquiz",
        "login",
        "--email",
        "ana@example.com",
        "--password",
        "secret",
    ]);

    match args.command {
        Command::Login(login) => {
            assert_eq!(login.email, "ana@example.com");
            assert_eq!(login.password, "secret");
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_vote_arguments() {
    let args = CliArgs::parse_from(["finquiz", "vote", "4", "12", "report"]);

    match args.command {
        Command::Vote(vote) => {
            assert_eq!(vote.questionnaire_id, 4);
            assert_eq!(vote.question_id, 12);
            assert_eq!(
                finquiz_api_types::VoteAction::from(vote.action),
                finquiz_api_types::VoteAction::Report
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn global_overrides_follow_the_subcommand() {
    let args = CliArgs::parse_from([
        "finquiz",
        "open",
        "/questionnaires",
        "--api-base-url",
        "http://127.0.0.1:9",
    ]);

    assert_eq!(
        args.overrides.api_base_url.as_deref(),
        Some("http://127.0.0.1:9")
    );
    assert!(matches!(args.command, Command::Open(ref open) if open.path == "/questionnaires"));
}
