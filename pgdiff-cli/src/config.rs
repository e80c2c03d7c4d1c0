use std::path::PathBuf;

use clap::{ArgAction, Parser};
use pgdiff_config::shared::DiffConfig;
use pgdiff_config::{LoadOptions, load_config};

use crate::error::{CliError, CliResult};

/// Compares the catalogs of two Postgres databases and prints the SQL that would bring the
/// second database (db2) in line with the first (db1). Nothing is executed.
#[derive(Parser, Debug)]
#[command(name = "pgdiff", version, long_about = None, disable_help_flag = true)]
pub struct Args {
    /// Print help information.
    #[arg(short = '?', long = "help", action = ArgAction::Help)]
    help: Option<bool>,

    /// Log debug information to stderr.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// First postgres user.
    #[arg(short = 'U', long)]
    pub user1: Option<String>,

    /// Second postgres user.
    #[arg(short = 'u', long)]
    pub user2: Option<String>,

    /// First database host [config default: localhost].
    #[arg(short = 'H', long)]
    pub host1: Option<String>,

    /// Second database host [config default: localhost].
    #[arg(short = 'h', long)]
    pub host2: Option<String>,

    /// First port [config default: 5432].
    #[arg(short = 'P', long)]
    pub port1: Option<u16>,

    /// Second port [config default: 5432].
    #[arg(short = 'p', long)]
    pub port2: Option<u16>,

    /// First database name.
    #[arg(short = 'D', long)]
    pub dbname1: Option<String>,

    /// Second database name.
    #[arg(short = 'd', long)]
    pub dbname2: Option<String>,

    /// First schema, `*` for all user schemas [config default: *].
    #[arg(short = 'S', long)]
    pub schema1: Option<String>,

    /// Second schema, `*` for all user schemas [config default: *].
    #[arg(short = 's', long)]
    pub schema2: Option<String>,

    /// Directory holding `base.yaml` and `<environment>.yaml`.
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// Render privileges as ACL codes or SQL keywords.
    #[arg(long, value_parser = ["code", "keyword"])]
    pub privilege_style: Option<String>,

    /// Fail the run or report and continue when two comparators cannot be compared.
    #[arg(long, value_parser = ["abort", "report"])]
    pub on_structural_error: Option<String>,

    /// Object kind to diff: GRANT_ATTRIBUTE, or ALL for every supported kind.
    #[arg(value_name = "OBJECT_KIND")]
    pub object_kind: String,
}

impl Args {
    /// Turns the flags that were given into configuration overrides.
    pub fn load_options(&self) -> LoadOptions {
        let mut options = LoadOptions {
            directory: self.config_dir.clone(),
            overrides: Vec::new(),
        };

        let overrides = [
            ("source.connection.username", self.user1.clone()),
            ("source.connection.host", self.host1.clone()),
            ("source.connection.port", self.port1.map(|port| port.to_string())),
            ("source.connection.name", self.dbname1.clone()),
            ("source.schema", self.schema1.clone()),
            ("target.connection.username", self.user2.clone()),
            ("target.connection.host", self.host2.clone()),
            ("target.connection.port", self.port2.map(|port| port.to_string())),
            ("target.connection.name", self.dbname2.clone()),
            ("target.schema", self.schema2.clone()),
            ("diff.privilege_style", self.privilege_style.clone()),
            ("diff.on_structural_error", self.on_structural_error.clone()),
        ];

        for (key, value) in overrides {
            if let Some(value) = value {
                options = options.with_override(key, value);
            }
        }

        options
    }
}

/// Loads and validates the diff configuration, with flags taking precedence.
pub fn load_diff_config(args: &Args) -> CliResult<DiffConfig> {
    let config =
        load_config::<DiffConfig>(&args.load_options()).map_err(CliError::config)?;
    config.validate().map_err(CliError::config)?;

    Ok(config)
}
