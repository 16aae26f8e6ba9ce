//! Operator registry (CADOP) loading and last-wins deduplication.

use std::collections::HashMap;
use std::path::Path;

use etl_core::error::{EtlError, Result};
use etl_core::formatting::normalize_key;
use etl_core::models::{
    RegistryEntry, REGISTRY_CNPJ_COLUMN, REGISTRY_ID_COLUMN, REGISTRY_MODALITY_COLUMN,
    REGISTRY_NAME_COLUMN, REGISTRY_STATE_COLUMN,
};
use etl_core::text::{decode_latin1, strip_bom};
use tracing::{debug, info};

// ── Registry ──────────────────────────────────────────────────────────────────

/// Lookup table from normalized registry number to operator identity.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: HashMap<String, RegistryEntry>,
    /// Rows read from the source, before deduplication.
    pub rows_read: usize,
    /// Rows that replaced an earlier row with the same key.
    pub duplicates_replaced: usize,
}

impl Registry {
    /// Build the table from entries in file order.
    ///
    /// Deliberately last-wins: when a key repeats, the later entry replaces
    /// the earlier one.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = RegistryEntry>,
    {
        entries
            .into_iter()
            .fold(Registry::default(), |mut registry, entry| {
                registry.rows_read += 1;
                let key = normalize_key(&entry.registry_id);
                if registry.entries.insert(key, entry).is_some() {
                    registry.duplicates_replaced += 1;
                }
                registry
            })
    }

    /// Entry for `operator_id`, compared on the normalized key.
    pub fn lookup(&self, operator_id: &str) -> Option<&RegistryEntry> {
        self.entries.get(&normalize_key(operator_id))
    }

    /// Number of distinct operators.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Load a `;`-delimited, Latin-1 registry file.
///
/// Header names are trimmed before matching. `REGISTRO_OPERADORA`,
/// `Razao_Social` and `UF` are required; `CNPJ` and `Modalidade` are read
/// when present. Rows without a registry number cannot be joined and are
/// skipped.
pub fn load_registry(path: &Path) -> Result<Registry> {
    if !path.is_file() {
        return Err(EtlError::RegistryNotFound(path.to_path_buf()));
    }

    let bytes = std::fs::read(path).map_err(|source| EtlError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let content = decode_latin1(&bytes);
    let content = strip_bom(&content);

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let column = |name: &str| headers.iter().position(|h| h == name);
    let required = |name: &str| {
        column(name).ok_or_else(|| EtlError::MissingColumn {
            path: path.to_path_buf(),
            column: name.to_string(),
        })
    };
    let id_idx = required(REGISTRY_ID_COLUMN)?;
    let name_idx = required(REGISTRY_NAME_COLUMN)?;
    let state_idx = required(REGISTRY_STATE_COLUMN)?;
    let cnpj_idx = column(REGISTRY_CNPJ_COLUMN);
    let modality_idx = column(REGISTRY_MODALITY_COLUMN);

    let mut entries = Vec::new();
    let mut skipped = 0usize;

    for result in rdr.records() {
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                skipped += 1;
                debug!("Skipping unreadable registry row: {}", e);
                continue;
            }
        };
        let field = |idx: usize| row.get(idx).unwrap_or_default().trim().to_string();

        let registry_id = field(id_idx);
        if registry_id.is_empty() {
            skipped += 1;
            continue;
        }

        entries.push(RegistryEntry {
            registry_id,
            cnpj: cnpj_idx.map(field).filter(|c| !c.is_empty()),
            legal_name: field(name_idx),
            modality: modality_idx.map(field).unwrap_or_default(),
            state_code: field(state_idx),
        });
    }

    let registry = Registry::from_entries(entries);
    info!(
        "Loaded registry {}: {} rows, {} operators, {} duplicates replaced, {} skipped",
        path.display(),
        registry.rows_read,
        registry.len(),
        registry.duplicates_replaced,
        skipped
    );
    Ok(registry)
}
