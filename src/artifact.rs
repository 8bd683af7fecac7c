//! Binary persistence of a built recommender.
//!
//! An artifact file is a bincode-encoded [`ArtifactFile`]: a plain header
//! followed by the payload bytes (catalog items, vocabulary and similarity
//! values), optionally compressed. The header is readable without touching the
//! payload, and the checksum covers the payload exactly as stored on disk.
//! Files are written to a temporary sibling and renamed into place.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use lz4::{Decoder, EncoderBuilder};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::catalog::Catalog;
use crate::errors::{ArtifactVersionError, RecommenderError, RecommenderResult};
use crate::recommender::Recommender;
use crate::similarity_search::SimilarityMatrix;
use crate::types::Item;

/// Item fields stored per row, in payload order
pub const ITEM_COLUMNS: &[&str] = &["id", "title", "tags"];

/// Version information for artifact format compatibility
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataVersion {
    /// Breaking layout changes
    pub major: u32,
    /// Backward compatible additions
    pub minor: u32,
    pub patch: u32,
}

impl DataVersion {
    pub const CURRENT: DataVersion = DataVersion {
        major: 1,
        minor: 0,
        patch: 0,
    };

    /// Whether an artifact written with `other` can be read by this version
    pub fn is_compatible(&self, other: &DataVersion) -> bool {
        self.major == other.major && self.minor >= other.minor
    }

    pub fn version_string(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Default for DataVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// Payload compression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CompressionAlgorithm {
    None,
    /// Smaller files, slower
    #[default]
    Gzip,
    /// Faster, lower compression ratio
    Lz4,
}

/// How artifacts are written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub compression: CompressionAlgorithm,
    /// Store and verify a SHA-256 of the payload
    pub checksums: bool,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            compression: CompressionAlgorithm::Gzip,
            checksums: true,
        }
    }
}

/// Artifact header, validated before the payload is trusted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub version: DataVersion,
    /// Catalog rows; also the similarity matrix dimension
    pub row_count: usize,
    pub columns: Vec<String>,
    /// Attribute order the tags were built from
    pub tag_columns: Vec<String>,
    pub vocabulary_size: usize,
    pub compression: CompressionAlgorithm,
    pub checksum: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl ArtifactHeader {
    fn new(recommender: &Recommender, compression: CompressionAlgorithm) -> Self {
        Self {
            version: DataVersion::CURRENT,
            row_count: recommender.len(),
            columns: ITEM_COLUMNS.iter().map(|c| c.to_string()).collect(),
            tag_columns: recommender.catalog().tag_columns().to_vec(),
            vocabulary_size: recommender.vocabulary().len(),
            compression,
            checksum: None,
            created_at: chrono::Utc::now(),
        }
    }

    /// Reject artifacts written by an incompatible format version
    pub fn validate_compatibility(&self) -> Result<(), ArtifactVersionError> {
        if !DataVersion::CURRENT.is_compatible(&self.version) {
            return Err(ArtifactVersionError::FormatVersion {
                expected: DataVersion::CURRENT.version_string(),
                found: self.version.version_string(),
            });
        }
        let expected: Vec<String> = ITEM_COLUMNS.iter().map(|c| c.to_string()).collect();
        if self.columns != expected {
            return Err(ArtifactVersionError::ColumnSet {
                artifact: self.columns.clone(),
                catalog: expected,
            });
        }
        Ok(())
    }

    /// Reject artifacts built from a different catalog shape
    pub fn validate_against(&self, catalog: &Catalog) -> Result<(), ArtifactVersionError> {
        if self.row_count != catalog.len() {
            return Err(ArtifactVersionError::RowCount {
                artifact_rows: self.row_count,
                catalog_rows: catalog.len(),
            });
        }
        if self.tag_columns != catalog.tag_columns() {
            return Err(ArtifactVersionError::ColumnSet {
                artifact: self.tag_columns.clone(),
                catalog: catalog.tag_columns().to_vec(),
            });
        }
        Ok(())
    }
}

/// On-disk layout
#[derive(Debug, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub header: ArtifactHeader,
    pub payload: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactPayload {
    items: Vec<Item>,
    vocabulary: Vec<String>,
    similarity: Vec<f32>,
}

fn artifact_error(context: &str, error: impl std::fmt::Display) -> RecommenderError {
    RecommenderError::Artifact {
        message: format!("{}: {}", context, error),
    }
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

fn compress(data: &[u8], algorithm: CompressionAlgorithm) -> RecommenderResult<Vec<u8>> {
    match algorithm {
        CompressionAlgorithm::None => Ok(data.to_vec()),
        CompressionAlgorithm::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder
                .write_all(data)
                .map_err(|e| artifact_error("Gzip compression failed", e))?;
            encoder
                .finish()
                .map_err(|e| artifact_error("Gzip compression failed", e))
        }
        CompressionAlgorithm::Lz4 => {
            let mut encoder = EncoderBuilder::new()
                .level(1)
                .build(Vec::new())
                .map_err(|e| artifact_error("LZ4 encoder creation failed", e))?;
            encoder
                .write_all(data)
                .map_err(|e| artifact_error("LZ4 compression failed", e))?;
            let (compressed, result) = encoder.finish();
            result.map_err(|e| artifact_error("LZ4 compression finalization failed", e))?;
            Ok(compressed)
        }
    }
}

fn decompress(data: &[u8], algorithm: CompressionAlgorithm) -> RecommenderResult<Vec<u8>> {
    match algorithm {
        CompressionAlgorithm::None => Ok(data.to_vec()),
        CompressionAlgorithm::Gzip => {
            let mut decompressed = Vec::new();
            GzDecoder::new(data)
                .read_to_end(&mut decompressed)
                .map_err(|e| artifact_error("Gzip decompression failed", e))?;
            Ok(decompressed)
        }
        CompressionAlgorithm::Lz4 => {
            let mut decoder = Decoder::new(data).map_err(|e| artifact_error("LZ4 decoder creation failed", e))?;
            let mut decompressed = Vec::new();
            decoder
                .read_to_end(&mut decompressed)
                .map_err(|e| artifact_error("LZ4 decompression failed", e))?;
            Ok(decompressed)
        }
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "artifact".into());
    name.push(format!(".tmp.{}", std::process::id()));
    path.with_file_name(name)
}

/// Write `data` to a temporary sibling of `path`, then rename it into place
fn write_atomic(path: &Path, data: &[u8]) -> RecommenderResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| artifact_error("Failed to create artifact directory", e))?;
    }

    let temp_path = temp_path_for(path);
    let written = fs::File::create(&temp_path).and_then(|mut file| {
        file.write_all(data)?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(artifact_error("Failed to write temporary artifact", e));
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        artifact_error("Failed to move artifact into place", e)
    })
}

/// Persist the catalog, vocabulary and similarity matrix of `recommender`
pub fn save(path: &Path, recommender: &Recommender, config: &ArtifactConfig) -> RecommenderResult<ArtifactHeader> {
    let payload = ArtifactPayload {
        items: recommender.catalog().items().to_vec(),
        vocabulary: recommender.vocabulary().to_vec(),
        similarity: recommender.similarity().values().to_vec(),
    };
    let encoded = bincode::serialize(&payload).map_err(|e| artifact_error("Failed to encode payload", e))?;
    let stored = compress(&encoded, config.compression)?;

    let mut header = ArtifactHeader::new(recommender, config.compression);
    if config.checksums {
        header.checksum = Some(sha256_hex(&stored));
    }

    let file = ArtifactFile {
        header: header.clone(),
        payload: stored,
    };
    let bytes = bincode::serialize(&file).map_err(|e| artifact_error("Failed to encode artifact", e))?;
    write_atomic(path, &bytes)?;

    log::info!(
        "Saved artifact {} ({} rows, {} bytes, {:?})",
        path.display(),
        header.row_count,
        bytes.len(),
        header.compression
    );
    Ok(header)
}

fn read_file(path: &Path) -> RecommenderResult<ArtifactFile> {
    let bytes = fs::read(path).map_err(|e| artifact_error(&format!("Failed to read {}", path.display()), e))?;
    let file: ArtifactFile =
        bincode::deserialize(&bytes).map_err(|e| artifact_error("Failed to decode artifact", e))?;
    file.header.validate_compatibility()?;
    Ok(file)
}

/// Read only the header of an artifact
pub fn read_header(path: &Path) -> RecommenderResult<ArtifactHeader> {
    Ok(read_file(path)?.header)
}

/// Reload a recommender, validating the artifact against itself
pub fn load(path: &Path) -> RecommenderResult<Recommender> {
    decode(path, read_file(path)?)
}

/// Reload a recommender and check that it was built from `catalog`'s shape
pub fn load_for_catalog(path: &Path, catalog: &Catalog) -> RecommenderResult<Recommender> {
    let file = read_file(path)?;
    file.header.validate_against(catalog)?;
    decode(path, file)
}

fn decode(path: &Path, file: ArtifactFile) -> RecommenderResult<Recommender> {
    let ArtifactFile { header, payload } = file;

    if let Some(expected) = &header.checksum {
        if sha256_hex(&payload) != *expected {
            return Err(ArtifactVersionError::ChecksumMismatch.into());
        }
    }

    let decoded = decompress(&payload, header.compression)?;
    let payload: ArtifactPayload =
        bincode::deserialize(&decoded).map_err(|e| artifact_error("Failed to decode payload", e))?;

    if payload.items.len() != header.row_count {
        return Err(ArtifactVersionError::RowCount {
            artifact_rows: header.row_count,
            catalog_rows: payload.items.len(),
        }
        .into());
    }
    let matrix_rows = (payload.similarity.len() as f64).sqrt() as usize;
    let similarity = SimilarityMatrix::from_parts(header.row_count, payload.similarity).ok_or(
        ArtifactVersionError::MatrixShape {
            header_rows: header.row_count,
            matrix_rows,
        },
    )?;

    let catalog = Catalog::from_items(payload.items, header.tag_columns);
    let recommender = Recommender::from_parts(catalog, payload.vocabulary, similarity)?;

    log::info!("Loaded artifact {} ({} rows)", path.display(), recommender.len());
    Ok(recommender)
}
