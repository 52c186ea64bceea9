//! Challenge and team metadata, plus the files served next to each challenge.
//!
//! - [`Catalog`]: read side used by the API to validate requests.
//! - [`FileCatalog`]: JSON-file backed catalog.
//! - [`seed`]: scans challenge directories and upserts them into a catalog file.
//! - [`ArtifactStore`]: downloadable files under `challenges/<tag>/artifacts/`.

mod error;
pub use error::CatalogError;

mod store;
pub use store::{Catalog, CatalogData, FileCatalog};

mod seeder;
pub use seeder::{ScannedChallenge, SeedReport, scan_challenges, seed, upsert};

mod artifacts;
pub use artifacts::{ArtifactInfo, ArtifactStore, mime_type};
