//! External collaborators of the ad pipeline.
//!
//! Every collaborator sits behind a trait so the pipeline can be driven
//! by fakes in tests:
//! - [`ScriptGenerator`]: ad copy from a prompt
//! - [`NarrationSynthesizer`]: text to speech
//! - [`KeywordExtractor`]: search keywords from the script
//! - [`MediaSearchProvider`]: stock video/image search (Pexels, Pixabay)
//! - [`MediaDownloader`]: streaming file download

pub mod config;
pub mod download;
pub mod error;
pub mod keywords;
pub mod narration;
pub mod replicate;
pub mod script;
pub mod search;

pub use config::ServiceConfig;
pub use download::{extension_for, HttpDownloader, MediaDownloader};
pub use error::{ServiceError, ServiceResult};
pub use keywords::{parse_keyword_list, KeywordExtractor, ReplicateKeywordExtractor};
pub use narration::{NarrationSynthesizer, ReplicateNarrator};
pub use replicate::ReplicateClient;
pub use script::{ReplicateScriptGenerator, ScriptGenerator, SCRIPT_MAX_TOKENS};
pub use search::{MediaHit, MediaSearch, MediaSearchProvider, MergePolicy, PexelsProvider, PixabayProvider};

use std::time::Duration;

/// Shared HTTP client for all collaborators.
pub fn build_http_client(connect_timeout: Duration) -> ServiceResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .user_agent(concat!("adgen/", env!("CARGO_PKG_VERSION")))
        .build()?)
}
