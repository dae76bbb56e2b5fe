pub mod config;
pub mod error;
pub mod hub;
pub mod ingest;
pub mod pipeline;
pub mod source;
pub mod spectral;
pub mod types;
pub mod websocket;
pub mod window;

pub use config::{ConfigError, ServerConfig};
pub use error::{StreamError, StreamResult};
pub use hub::{BroadcastHub, SubscriberId};
pub use ingest::IngestionBridge;
pub use pipeline::{Pipeline, PipelineConfig};
pub use source::{SampleSource, SyntheticSource};
pub use spectral::SpectralAnalyzer;
pub use types::{BandDefinition, EnrichedFrame, RawSample, SpectralResult, BANDS};
pub use websocket::{router, AppState};
pub use window::WindowBuffer;
