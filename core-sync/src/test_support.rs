//! In-process repository fakes for unit tests

use async_trait::async_trait;
use core_library::repositories::{ArcRepository, EpisodeRepository, Page, PageRequest};
use core_library::{ArcRange, EpisodeWithArc, LibraryError, PersistedRecord};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

type LibResult<T> = core_library::Result<T>;

fn injected(what: &str) -> LibraryError {
    LibraryError::Database(sqlx::Error::Protocol(format!("injected failure: {}", what)))
}

fn record(id: i64) -> PersistedRecord {
    PersistedRecord {
        id,
        title: format!("Episode {}", id),
        release_date: None,
        arc_id: None,
        created_at: Some(0),
        updated_at: Some(0),
    }
}

#[derive(Default)]
pub struct MemoryEpisodeRepository {
    rows: Mutex<BTreeMap<i64, PersistedRecord>>,
    id_page_calls: AtomicU32,
    failing_id_pages: HashSet<u32>,
    failing_upsert_calls: HashSet<usize>,
    stalled_upsert_calls: HashSet<usize>,
    upserts: Mutex<Vec<Vec<i64>>>,
    cancel_after: Option<(usize, CancellationToken)>,
    unreachable: bool,
}

impl MemoryEpisodeRepository {
    pub fn with_ids(ids: impl IntoIterator<Item = i64>) -> Self {
        let repo = Self::default();
        {
            let mut rows = repo.rows.lock().unwrap();
            for id in ids {
                rows.insert(id, record(id));
            }
        }
        repo
    }

    /// Fail the id page with this zero-based index
    pub fn fail_id_page(mut self, page: u32) -> Self {
        self.failing_id_pages.insert(page);
        self
    }

    /// Fail the upsert call with this zero-based index
    pub fn fail_upsert_call(mut self, call: usize) -> Self {
        self.failing_upsert_calls.insert(call);
        self
    }

    /// Block the upsert call with this index for a day before it writes
    pub fn stall_upsert_call(mut self, call: usize) -> Self {
        self.stalled_upsert_calls.insert(call);
        self
    }

    /// Cancel `token` once the upsert call with this index has run
    pub fn cancel_after_upsert(mut self, call: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((call, token));
        self
    }

    /// Every operation fails
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn id_page_calls(&self) -> u32 {
        self.id_page_calls.load(Ordering::SeqCst)
    }

    /// Ids passed to each upsert call, in call order
    pub fn upsert_calls(&self) -> Vec<Vec<i64>> {
        self.upserts.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.rows.lock().unwrap().contains_key(&id)
    }

    pub fn get(&self, id: i64) -> Option<PersistedRecord> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    fn check_reachable(&self, what: &str) -> LibResult<()> {
        if self.unreachable {
            Err(injected(what))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl EpisodeRepository for MemoryEpisodeRepository {
    async fn list_id_page(&self, page_request: PageRequest) -> LibResult<Vec<i64>> {
        self.id_page_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable("list_id_page")?;
        if self.failing_id_pages.contains(&page_request.page) {
            return Err(injected("list_id_page"));
        }

        let rows = self.rows.lock().unwrap();
        Ok(rows
            .keys()
            .skip(page_request.offset() as usize)
            .take(page_request.limit() as usize)
            .copied()
            .collect())
    }

    async fn upsert_batch(&self, records: &[PersistedRecord]) -> LibResult<u64> {
        self.check_reachable("upsert_batch")?;
        let call = {
            let mut upserts = self.upserts.lock().unwrap();
            upserts.push(records.iter().map(|r| r.id).collect());
            upserts.len() - 1
        };
        if self.stalled_upsert_calls.contains(&call) {
            tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
        }

        let result = if self.failing_upsert_calls.contains(&call) {
            Err(injected("upsert_batch"))
        } else {
            let mut rows = self.rows.lock().unwrap();
            for incoming in records {
                let created_at = rows
                    .get(&incoming.id)
                    .and_then(|existing| existing.created_at)
                    .or(Some(0));
                rows.insert(
                    incoming.id,
                    PersistedRecord {
                        created_at,
                        updated_at: Some(0),
                        ..incoming.clone()
                    },
                );
            }
            Ok(records.len() as u64)
        };

        if let Some((after, token)) = &self.cancel_after {
            if *after == call {
                token.cancel();
            }
        }
        result
    }

    async fn ping(&self) -> LibResult<()> {
        self.check_reachable("ping")
    }

    async fn find_by_id(&self, id: i64) -> LibResult<Option<PersistedRecord>> {
        self.check_reachable("find_by_id")?;
        Ok(self.get(id))
    }

    async fn count(&self) -> LibResult<i64> {
        self.check_reachable("count")?;
        Ok(self.len() as i64)
    }

    async fn id_range(&self) -> LibResult<Option<(i64, i64)>> {
        self.check_reachable("id_range")?;
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .keys()
            .next()
            .copied()
            .zip(rows.keys().next_back().copied()))
    }

    async fn query_with_arcs(&self, page_request: PageRequest) -> LibResult<Page<EpisodeWithArc>> {
        self.check_reachable("query_with_arcs")?;
        let rows = self.rows.lock().unwrap();
        let items = rows
            .values()
            .skip(page_request.offset() as usize)
            .take(page_request.limit() as usize)
            .cloned()
            .map(|episode| EpisodeWithArc {
                episode,
                arc_name: None,
            })
            .collect();
        Ok(Page::new(items, rows.len() as u64, page_request))
    }

    async fn query_by_arc(
        &self,
        arc_id: i64,
        page_request: PageRequest,
    ) -> LibResult<Page<PersistedRecord>> {
        self.check_reachable("query_by_arc")?;
        let rows = self.rows.lock().unwrap();
        let matching: Vec<PersistedRecord> = rows
            .values()
            .filter(|r| r.arc_id == Some(arc_id))
            .cloned()
            .collect();
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page_request.offset() as usize)
            .take(page_request.limit() as usize)
            .collect();
        Ok(Page::new(items, total, page_request))
    }
}

pub struct MemoryArcRepository {
    arcs: Vec<ArcRange>,
    failing: bool,
}

impl MemoryArcRepository {
    pub fn new(arcs: Vec<ArcRange>) -> Self {
        Self {
            arcs,
            failing: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            arcs: Vec::new(),
            failing: true,
        }
    }
}

#[async_trait]
impl ArcRepository for MemoryArcRepository {
    async fn list_all(&self) -> LibResult<Vec<ArcRange>> {
        if self.failing {
            return Err(injected("list_all"));
        }
        let mut arcs = self.arcs.clone();
        arcs.sort_by_key(|arc| (arc.start_episode, arc.arc_id));
        Ok(arcs)
    }

    async fn find_by_id(&self, arc_id: i64) -> LibResult<Option<ArcRange>> {
        if self.failing {
            return Err(injected("find_by_id"));
        }
        Ok(self.arcs.iter().find(|arc| arc.arc_id == arc_id).cloned())
    }

    async fn count(&self) -> LibResult<i64> {
        if self.failing {
            return Err(injected("count"));
        }
        Ok(self.arcs.len() as i64)
    }
}
