// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn dbproxy_defaults() {
    let cli = Cli::try_parse_from(["almond-cloud", "dbproxy"]).unwrap();
    match cli.command {
        Some(Command::Dbproxy { port, aws_tls_cert }) => {
            assert_eq!(port, 8200);
            assert_eq!(aws_tls_cert, None);
        }
        _ => panic!("expected dbproxy subcommand"),
    }
}

#[test]
fn dbproxy_flags_parse() {
    let cli = Cli::try_parse_from([
        "almond-cloud",
        "dbproxy",
        "--port",
        "9000",
        "--aws-tls-cert",
        "/certs/rds.pem",
    ])
    .unwrap();
    match cli.command {
        Some(Command::Dbproxy { port, aws_tls_cert }) => {
            assert_eq!(port, 9000);
            assert_eq!(aws_tls_cert, Some(PathBuf::from("/certs/rds.pem")));
        }
        _ => panic!("expected dbproxy subcommand"),
    }
}

#[test]
fn controller_requires_templates() {
    assert!(Cli::try_parse_from(["almond-cloud", "controller"]).is_err());
    let cli = Cli::try_parse_from([
        "almond-cloud",
        "controller",
        "--deployment-template",
        "/etc/templates/deployment.json",
        "--service-template",
        "/etc/templates/service.json",
    ])
    .unwrap();
    assert!(matches!(cli.command, Some(Command::Controller { .. })));
}

#[test]
fn missing_subcommand_parses_to_none() {
    let cli = Cli::try_parse_from(["almond-cloud"]).unwrap();
    assert!(cli.command.is_none());
}

#[test]
fn unknown_subcommand_is_an_error() {
    assert!(Cli::try_parse_from(["almond-cloud", "frobnicate"]).is_err());
}
