use crate::error::{RenderError, Result};
use loopforge_core::sheet::{parse_catalog_csv, sheet_export_url};
use loopforge_core::types::Catalog;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Supplies the ordered song catalog. Fetched once per batch.
pub trait CatalogSource: Send + Sync {
    fn fetch(&self) -> impl Future<Output = Result<Catalog>> + Send;

    /// Where the catalog comes from, for logs.
    fn describe(&self) -> String;
}

/// A sheet export saved as a local CSV file.
#[derive(Debug, Clone)]
pub struct CsvFileCatalog {
    path: PathBuf,
}

impl CsvFileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CatalogSource for CsvFileCatalog {
    async fn fetch(&self) -> Result<Catalog> {
        if !self.path.exists() {
            return Err(RenderError::FileNotFound(self.path.clone()));
        }
        let text = tokio::fs::read_to_string(&self.path).await?;
        Ok(parse_catalog_csv(&text))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// A Google Sheet (or any URL serving the same CSV layout).
#[derive(Debug, Clone)]
pub struct SheetCatalog {
    url: String,
    client: reqwest::Client,
}

impl SheetCatalog {
    /// `url` may be a sheet edit link; it is turned into the CSV export URL.
    pub fn new(url: &str) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self {
            url: sheet_export_url(url),
            client,
        })
    }

    pub fn export_url(&self) -> &str {
        &self.url
    }
}

impl CatalogSource for SheetCatalog {
    async fn fetch(&self) -> Result<Catalog> {
        tracing::info!(url = %self.url, "fetching song sheet");
        let response = self.client.get(&self.url).send().await?.error_for_status()?;
        let text = response.text().await?;
        let catalog = parse_catalog_csv(&text);
        if catalog.is_empty() {
            return Err(RenderError::Catalog(format!(
                "sheet at {} has no valid song rows",
                self.url
            )));
        }
        Ok(catalog)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
