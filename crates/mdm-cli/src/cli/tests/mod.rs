//! CLI parse tests.

use super::{Cli, CliCommand};
use clap::Parser;
use std::path::PathBuf;

fn parse(args: &[&str]) -> CliCommand {
    Cli::try_parse_from(args).unwrap().command
}

#[test]
fn cli_parse_get_defaults() {
    match parse(&["mdm", "get", "7", "https://cdn.example/7.mp4"]) {
        CliCommand::Get {
            id,
            url,
            quality,
            file_name,
            dir,
        } => {
            assert_eq!(id, 7);
            assert_eq!(url, "https://cdn.example/7.mp4");
            assert_eq!(quality, "sd");
            assert!(file_name.is_none());
            assert!(dir.is_none());
        }
        other => panic!("expected Get, got {other:?}"),
    }
}

#[test]
fn cli_parse_get_with_options() {
    match parse(&[
        "mdm",
        "get",
        "7",
        "https://cdn.example/7.mp4",
        "--quality",
        "hd",
        "--file-name",
        "clip.mp4",
        "--dir",
        "/tmp/videos",
    ]) {
        CliCommand::Get {
            quality,
            file_name,
            dir,
            ..
        } => {
            assert_eq!(quality, "hd");
            assert_eq!(file_name.as_deref(), Some("clip.mp4"));
            assert_eq!(dir, Some(PathBuf::from("/tmp/videos")));
        }
        other => panic!("expected Get, got {other:?}"),
    }
}

#[test]
fn cli_parse_batch() {
    match parse(&["mdm", "batch", "list.txt"]) {
        CliCommand::Batch { path, dir } => {
            assert_eq!(path, PathBuf::from("list.txt"));
            assert!(dir.is_none());
        }
        other => panic!("expected Batch, got {other:?}"),
    }
}

#[test]
fn cli_parse_list_path_remove() {
    assert!(matches!(parse(&["mdm", "list"]), CliCommand::List));
    assert!(matches!(parse(&["mdm", "path", "3"]), CliCommand::Path { id: 3 }));
    assert!(matches!(
        parse(&["mdm", "remove", "99"]),
        CliCommand::Remove { id: 99 }
    ));
}

#[test]
fn cli_parse_checksum() {
    match parse(&["mdm", "checksum", "5", "--expect", "abc123"]) {
        CliCommand::Checksum { id, expect } => {
            assert_eq!(id, 5);
            assert_eq!(expect.as_deref(), Some("abc123"));
        }
        other => panic!("expected Checksum, got {other:?}"),
    }
}

#[test]
fn cli_rejects_non_numeric_id() {
    assert!(Cli::try_parse_from(["mdm", "path", "seven"]).is_err());
}
