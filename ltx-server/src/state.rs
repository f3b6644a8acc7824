use std::sync::Arc;

use ltx_core::VideoModel;

use crate::config::ServiceConfig;
use crate::encoder::Mp4Encoder;
use crate::storage::ObjectStore;

/// Shared state handed to every handler.
///
/// The model and store are optional so health checks can report on a
/// service that failed partway through startup instead of the process
/// being unreachable.
pub struct AppState {
    pub config: ServiceConfig,
    pub model: Option<Arc<dyn VideoModel>>,
    pub store: Option<Arc<dyn ObjectStore>>,
    pub encoder: Arc<dyn Mp4Encoder>,
}

pub type SharedState = Arc<AppState>;
