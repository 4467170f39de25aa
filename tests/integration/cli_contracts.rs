use holocene::tooling::cli::{CliContext, Commands, ConfigCommands, DbCommands, ResCommands};
use holocene::Identifier;
use std::fs;
use tempfile::TempDir;

use crate::integration::support::with_xdg_env;

#[test]
fn default_datadir_follows_xdg_data_home() {
    let temp = TempDir::new().unwrap();
    with_xdg_env(&temp, || {
        let cli = CliContext::new(None, None).unwrap();
        assert_eq!(
            cli.holocene().datadir(),
            temp.path().join("data").join("holocene")
        );
        let db = cli
            .execute(&Commands::Db {
                command: DbCommands::Create { name: None },
            })
            .unwrap();
        assert!(Identifier::is_valid(&db));
        assert!(temp.path().join("data").join("holocene").join(&db).is_dir());
    });
}

#[test]
fn explicit_config_file_and_flag_precedence() {
    let temp = TempDir::new().unwrap();
    with_xdg_env(&temp, || {
        let config_path = temp.path().join("holocene.toml");
        let from_file = temp.path().join("from-file");
        fs::write(
            &config_path,
            format!(
                "[storage]\ndatadir = {:?}\nsync_writes = false\n\n[logging]\nlevel = \"debug\"\n",
                from_file.to_str().unwrap()
            ),
        )
        .unwrap();

        let cli = CliContext::new(Some(config_path.clone()), None).unwrap();
        assert_eq!(cli.holocene().datadir(), from_file);
        assert!(!cli.config().storage.sync_writes);
        assert_eq!(cli.config().logging.level, "debug");

        let from_flag = temp.path().join("from-flag");
        let cli = CliContext::new(Some(config_path), Some(from_flag.clone())).unwrap();
        assert_eq!(cli.holocene().datadir(), from_flag);
    });
}

#[test]
fn environment_overrides_global_config_file() {
    let temp = TempDir::new().unwrap();
    with_xdg_env(&temp, || {
        let global_dir = temp.path().join("config").join("holocene");
        fs::create_dir_all(&global_dir).unwrap();
        fs::write(
            global_dir.join("config.toml"),
            "[storage]\ndatadir = \"/nonexistent/should-be-overridden\"\n",
        )
        .unwrap();
        let from_env = temp.path().join("from-env");
        std::env::set_var("HOLOCENE__STORAGE__DATADIR", &from_env);

        let cli = CliContext::new(None, None).unwrap();
        assert_eq!(cli.holocene().datadir(), from_env);
        let shown = cli
            .execute(&Commands::Config {
                command: ConfigCommands::Show,
            })
            .unwrap();
        assert!(shown.contains("from-env"));
    });
}

#[test]
fn missing_explicit_config_file_is_an_error() {
    let temp = TempDir::new().unwrap();
    with_xdg_env(&temp, || {
        let result = CliContext::new(Some(temp.path().join("absent.toml")), None);
        assert!(result.is_err());
    });
}

#[test]
fn resource_commands_report_missing_database() {
    let temp = TempDir::new().unwrap();
    with_xdg_env(&temp, || {
        let cli = CliContext::new(None, None).unwrap();
        let err = cli
            .execute(&Commands::Res {
                command: ResCommands::List {
                    db: Identifier::random(),
                },
            })
            .unwrap_err();
        assert!(err.to_string().contains("Not found"));
    });
}
