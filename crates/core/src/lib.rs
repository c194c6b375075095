pub mod classify;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod ranking;
pub mod resource;
pub mod searcher;
pub mod streams;
pub mod testing;

pub use classify::{
    guess_languages, guess_quality, EpisodeMatcher, Language, LanguageTags, QualityGuess,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, EngineConfig,
    JackettConfig, RankingConfig, ResourceConfig, SanitizedConfig, SearchConfig, ServerConfig,
};
pub use logging::LogThrottle;
pub use ranking::{rank, Candidate, QualityFilters, RankContext, ScoredCandidate};
pub use resource::{
    ByteRange, EngineError, LibrqbitEngine, ManagerStats, Metadata, ResourceError,
    ResourceManager, ResumeStore, StreamLease, TransferEngine,
};
pub use searcher::{
    JackettProvider, SearchAggregator, SearchCategory, SearchError, SearchProvider, SearchQuery,
    SearchResult,
};
pub use streams::{
    MediaId, MediaKind, RankedSearch, StreamDescriptor, StreamService, StreamSynthesizer,
    StreamsResponse,
};
