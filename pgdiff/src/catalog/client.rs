use std::future::Future;
use std::io::BufReader;
use std::sync::Arc;

use futures::StreamExt;
use pgdiff_config::shared::{CATALOG_READ_OPTIONS, IntoConnectOptions, PgConnectionConfig};
use rustls::ClientConfig;
use tokio_postgres::tls::MakeTlsConnect;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Config, Connection, NoTls, Row, Socket};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{Instrument, debug, error, info};

use crate::catalog::{CatalogQuery, RowProducer, RowStream};
use crate::error::{ErrorKind, PgDiffResult};
use crate::pgdiff_error;
use crate::types::CatalogRow;

/// Spawns a background task to monitor a Postgres connection until it terminates.
fn spawn_postgres_connection<T>(connection: Connection<Socket, T::Stream>)
where
    T: MakeTlsConnect<Socket>,
    T::Stream: Send + 'static,
{
    let span = tracing::Span::current();
    let task = async move {
        let result = connection.await;

        match result {
            Err(err) => error!("an error occurred during the postgres connection: {}", err),
            Ok(()) => info!("postgres connection terminated successfully"),
        }
    }
    .instrument(span);

    // The `Client` terminates the connection when dropped, so the handle is not kept.
    tokio::spawn(task);
}

/// Reads catalog rows from a live Postgres database.
///
/// Sessions are opened with [`CATALOG_READ_OPTIONS`], so every transaction is read-only.
#[derive(Debug, Clone)]
pub struct PgCatalogClient {
    client: Arc<Client>,
}

impl PgCatalogClient {
    /// Connects with or without TLS as configured.
    pub async fn connect(pg_connection_config: &PgConnectionConfig) -> PgDiffResult<Self> {
        match pg_connection_config.tls.enabled {
            true => PgCatalogClient::connect_tls(pg_connection_config).await,
            false => PgCatalogClient::connect_no_tls(pg_connection_config).await,
        }
    }

    async fn connect_no_tls(pg_connection_config: &PgConnectionConfig) -> PgDiffResult<Self> {
        let config: Config = pg_connection_config.with_db(Some(&*CATALOG_READ_OPTIONS));

        let (client, connection) = config.connect(NoTls).await?;
        spawn_postgres_connection::<NoTls>(connection);

        info!(
            host = %pg_connection_config.host,
            database = %pg_connection_config.name,
            "connected to postgres without tls"
        );

        Ok(PgCatalogClient {
            client: Arc::new(client),
        })
    }

    async fn connect_tls(pg_connection_config: &PgConnectionConfig) -> PgDiffResult<Self> {
        let config: Config = pg_connection_config.with_db(Some(&*CATALOG_READ_OPTIONS));

        let mut root_store = rustls::RootCertStore::empty();
        let mut root_certs_reader =
            BufReader::new(pg_connection_config.tls.trusted_root_certs.as_bytes());
        for cert in rustls_pemfile::certs(&mut root_certs_reader) {
            let cert = cert?;
            root_store.add(cert)?;
        }

        let tls_config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let (client, connection) = config.connect(MakeRustlsConnect::new(tls_config)).await?;
        spawn_postgres_connection::<MakeRustlsConnect>(connection);

        info!(
            host = %pg_connection_config.host,
            database = %pg_connection_config.name,
            "connected to postgres with tls"
        );

        Ok(PgCatalogClient {
            client: Arc::new(client),
        })
    }
}

impl RowProducer for PgCatalogClient {
    fn fetch_rows(
        &self,
        query: &CatalogQuery,
    ) -> impl Future<Output = PgDiffResult<RowStream<'_>>> + Send {
        let query = query.clone();

        async move {
            debug!(sql = %query.sql, params = ?query.params, "executing catalog query");

            let params = query.params.iter().map(|param| param as &(dyn ToSql + Sync));
            let rows = self.client.query_raw(query.sql.as_str(), params).await?;

            let stream: RowStream<'_> =
                Box::pin(rows.map(|row| row.map_err(Into::into).and_then(|row| decode_row(&row))));

            Ok(stream)
        }
    }
}

/// Decodes a row whose columns are all text. `NULL` becomes the empty string.
fn decode_row(row: &Row) -> PgDiffResult<CatalogRow> {
    let mut catalog_row = CatalogRow::new();

    for (index, column) in row.columns().iter().enumerate() {
        let value: Option<String> = row.try_get(index).map_err(|err| {
            pgdiff_error!(
                ErrorKind::InvalidCatalogRow,
                "Catalog column could not be read as text",
                format!("column `{}`", column.name()),
                source: err
            )
        })?;
        catalog_row.insert(column.name(), value);
    }

    Ok(catalog_row)
}
