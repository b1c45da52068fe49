use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;

use crate::domain::value_objects::ProjectId;

/// Per-project async mutex registry.
///
/// The per-project git workspace and the mapping blob are shared, unguarded
/// resources: two concurrent pulls (or a push racing a pull) for the same
/// project would corrupt the working tree or clobber the mapping with a
/// stale last-write-wins update. Every push/pull holds the project's lock
/// from workspace preparation through the final report; concurrent callers
/// queue rather than being rejected.
#[derive(Default, Clone)]
pub struct ProjectLocks {
    inner: Arc<StdMutex<HashMap<ProjectId, Arc<Mutex<()>>>>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for `project_id`, created on first use.
    pub fn for_project(&self, project_id: &ProjectId) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().unwrap();
        Arc::clone(
            map.entry(project_id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}
