use std::io::{self, Stdout};

use pgdiff::catalog::PgCatalogClient;
use pgdiff::diff::{DiffContext, DiffEngine, StatementSink, WriterSink};
use pgdiff::error::PgDiffResult;
use pgdiff::objects::ObjectSelection;
use pgdiff::session::DiffSession;
use pgdiff_config::shared::{DiffConfig, DiffConfigWithoutSecrets};
use tracing::{debug, info};

use crate::error::CliResult;

/// Connects to both databases, diffs `selection` and writes the SQL to stdout.
pub async fn run_diff(config: DiffConfig, selection: ObjectSelection) -> CliResult<()> {
    log_config(&config);

    let mut sink = WriterSink::new(io::stdout());
    write_header(&mut sink, &config, selection)?;

    let (source, target) = tokio::try_join!(
        PgCatalogClient::connect(&config.source.connection),
        PgCatalogClient::connect(&config.target.connection),
    )?;

    let session = DiffSession::new(
        source,
        target,
        DiffContext::from_config(&config),
        DiffEngine::new(config.diff.on_structural_error),
    );

    let stats = session.diff(selection, &mut sink).await?;
    sink.flush()?;

    info!(
        adds = stats.adds,
        drops = stats.drops,
        changes = stats.changes,
        statements = stats.statements,
        structural_errors = stats.structural_errors,
        "diff finished"
    );

    Ok(())
}

/// Writes the comment lines that precede the generated SQL.
fn write_header(
    sink: &mut WriterSink<Stdout>,
    config: &DiffConfig,
    selection: ObjectSelection,
) -> PgDiffResult<()> {
    sink.comment(&format!("schemaType: {selection}"))?;
    sink.comment(&format!("db1: {}", config.source.describe()))?;
    sink.comment(&format!("db2: {}", config.target.describe()))?;
    sink.comment("Run the following SQL against db2:")?;

    Ok(())
}

fn log_config(config: &DiffConfig) {
    let config = DiffConfigWithoutSecrets::from(config.clone());

    debug!(
        source_host = %config.source.connection.host,
        source_port = config.source.connection.port,
        source_dbname = %config.source.connection.name,
        source_schema = %config.source.schema,
        target_host = %config.target.connection.host,
        target_port = config.target.connection.port,
        target_dbname = %config.target.connection.name,
        target_schema = %config.target.schema,
        "source and target config"
    );
    debug!(
        privilege_style = ?config.diff.privilege_style,
        on_structural_error = ?config.diff.on_structural_error,
        "diff config"
    );
}
