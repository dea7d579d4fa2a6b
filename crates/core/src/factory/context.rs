//! State shared by a factory and every configuration it creates.

use std::sync::{Arc, RwLock};

use crate::format::Format;
use crate::logging::{LogSink, NullLogSink};
use crate::scheme::SchemeRegistry;
use crate::search_list::SearchList;
use crate::settings::Settings;
use crate::storage::{LoadContext, Storage};
use crate::sync::{read, write};

pub(crate) struct FactoryContext {
    pub(crate) settings: Settings,
    /// Storages in priority order.
    pub(crate) storages: Vec<Arc<dyn Storage>>,
    pub(crate) reading_formats: Vec<Arc<dyn Format>>,
    pub(crate) writing_formats: Vec<Arc<dyn Format>>,
    pub(crate) search_list: RwLock<SearchList>,
    pub(crate) schemes: SchemeRegistry,
    pub(crate) log_sink: Arc<dyn LogSink>,
}

impl FactoryContext {
    /// A context with no collaborators, for configurations assembled by hand.
    pub(crate) fn standalone(settings: Settings) -> Self {
        Self {
            settings,
            storages: Vec::new(),
            reading_formats: Vec::new(),
            writing_formats: Vec::new(),
            search_list: RwLock::new(SearchList::new()),
            schemes: SchemeRegistry::new(),
            log_sink: Arc::new(NullLogSink),
        }
    }

    pub(crate) fn load_context(&self) -> LoadContext<'_> {
        LoadContext {
            settings: &self.settings,
            reading_formats: &self.reading_formats,
            writing_formats: &self.writing_formats,
        }
    }

    pub(crate) fn storage(&self, id: &str) -> Option<&Arc<dyn Storage>> {
        self.storages.iter().find(|storage| storage.id() == id)
    }

    pub(crate) fn search_list(&self) -> SearchList {
        read(&self.search_list).clone()
    }

    pub(crate) fn freeze_search_list(&self) {
        write(&self.search_list).freeze();
    }
}
