use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::store::DocumentStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: Config,
    pub uploads_dir: PathBuf,
}
