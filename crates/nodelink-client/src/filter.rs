//! Server-side filters and incremental log polling

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use nodelink_primitives::Quantity;
use parking_lot::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::client::NodeClient;
use crate::types::{FilterChanges, FilterCriteria, LogEntry, LogKey};
use crate::ClientError;

/// What a filter reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    /// Log entries matching criteria (`eth_newFilter`)
    Log,
    /// New block hashes (`eth_newBlockFilter`)
    Block,
    /// New pending transaction hashes (`eth_newPendingTransactionFilter`)
    PendingTransaction,
}

/// An installed filter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterHandle {
    id: Quantity,
    kind: FilterKind,
}

impl FilterHandle {
    /// Node-assigned id
    pub fn id(&self) -> &Quantity {
        &self.id
    }

    /// Filter kind
    pub fn kind(&self) -> FilterKind {
        self.kind
    }
}

/// Owner of a set of server-side filters
///
/// Filters installed through a subscription belong to it until uninstalled. Call
/// [`FilterSubscription::close`] when done; the node otherwise keeps them until its
/// own expiry timer fires.
pub struct FilterSubscription {
    client: NodeClient,
    owned: Mutex<HashMap<Quantity, FilterKind>>,
    retired: Mutex<RetiredIds>,
}

/// Ids uninstalled through this subscription, oldest evicted first
#[derive(Debug, Default)]
struct RetiredIds {
    ids: HashSet<Quantity>,
    order: VecDeque<Quantity>,
}

impl RetiredIds {
    const CAPACITY: usize = 1024;

    fn insert(&mut self, id: Quantity) {
        if !self.ids.insert(id.clone()) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > Self::CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }

    fn remove(&mut self, id: &Quantity) {
        if self.ids.remove(id) {
            self.order.retain(|k| k != id);
        }
    }

    fn contains(&self, id: &Quantity) -> bool {
        self.ids.contains(id)
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

impl FilterSubscription {
    /// Subscription with no filters yet
    pub fn new(client: NodeClient) -> Self {
        Self {
            client,
            owned: Mutex::new(HashMap::new()),
            retired: Mutex::new(RetiredIds::default()),
        }
    }

    fn track(&self, id: Quantity, kind: FilterKind) -> FilterHandle {
        info!(id = %id.to_hex(), ?kind, "filter installed");
        // nodes may hand out an uninstalled id again
        self.retired.lock().remove(&id);
        self.owned.lock().insert(id.clone(), kind);
        FilterHandle { id, kind }
    }

    fn retire(&self, id: &Quantity) {
        self.owned.lock().remove(id);
        self.retired.lock().insert(id.clone());
    }

    fn ensure_live(&self, handle: &FilterHandle) -> Result<(), ClientError> {
        if self.retired.lock().contains(&handle.id) {
            return Err(ClientError::FilterExpired {
                id: handle.id.clone(),
            });
        }
        Ok(())
    }

    fn expired(&self, handle: &FilterHandle, err: ClientError) -> ClientError {
        if err.is_filter_not_found() {
            debug!(id = %handle.id.to_hex(), "filter no longer known to node");
            self.retire(&handle.id);
            ClientError::FilterExpired {
                id: handle.id.clone(),
            }
        } else {
            err
        }
    }

    /// Install a log filter
    pub async fn install(&self, criteria: &FilterCriteria) -> Result<FilterHandle, ClientError> {
        let id = self.client.new_filter(criteria).await?;
        Ok(self.track(id, FilterKind::Log))
    }

    /// Install a new-block filter
    pub async fn install_block_filter(&self) -> Result<FilterHandle, ClientError> {
        let id = self.client.new_block_filter().await?;
        Ok(self.track(id, FilterKind::Block))
    }

    /// Install a pending-transaction filter
    pub async fn install_pending_transaction_filter(&self) -> Result<FilterHandle, ClientError> {
        let id = self.client.new_pending_transaction_filter().await?;
        Ok(self.track(id, FilterKind::PendingTransaction))
    }

    /// Changes since the last poll of this filter
    ///
    /// An expired or uninstalled filter yields [`ClientError::FilterExpired`]; reinstall
    /// to keep watching.
    pub async fn poll_changes(&self, handle: &FilterHandle) -> Result<FilterChanges, ClientError> {
        self.ensure_live(handle)?;
        let changes = self
            .client
            .get_filter_changes(&handle.id)
            .await
            .map_err(|e| self.expired(handle, e))?;

        match (handle.kind, changes) {
            (FilterKind::Log, FilterChanges::Hashes(h)) if h.is_empty() => {
                Ok(FilterChanges::Logs(Vec::new()))
            }
            (FilterKind::Log, logs @ FilterChanges::Logs(_)) => Ok(logs),
            (FilterKind::Block | FilterKind::PendingTransaction, hashes @ FilterChanges::Hashes(_)) => {
                Ok(hashes)
            }
            (kind, _) => Err(ClientError::decode(
                "eth_getFilterChanges",
                format!("unexpected result shape for a {kind:?} filter"),
            )),
        }
    }

    /// New logs since the last poll of a log filter
    pub async fn poll_logs(&self, handle: &FilterHandle) -> Result<Vec<LogEntry>, ClientError> {
        match self.poll_changes(handle).await? {
            FilterChanges::Logs(logs) => Ok(logs),
            FilterChanges::Hashes(_) => Err(ClientError::decode(
                "eth_getFilterChanges",
                format!("{:?} filter does not report logs", handle.kind),
            )),
        }
    }

    /// Every log matching the filter, independent of polling
    pub async fn fetch_all(&self, handle: &FilterHandle) -> Result<Vec<LogEntry>, ClientError> {
        self.ensure_live(handle)?;
        self.client
            .get_filter_logs(&handle.id)
            .await
            .map_err(|e| self.expired(handle, e))
    }

    /// Remove a filter; `false` if it was already gone
    pub async fn uninstall(&self, handle: &FilterHandle) -> Result<bool, ClientError> {
        if self.retired.lock().contains(&handle.id) {
            return Ok(false);
        }

        let removed = match self.client.uninstall_filter(&handle.id).await {
            Ok(removed) => removed,
            Err(e) if e.is_filter_not_found() => false,
            Err(e) => return Err(e),
        };
        self.retire(&handle.id);
        info!(id = %handle.id.to_hex(), removed, "filter uninstalled");
        Ok(removed)
    }

    /// Uninstall every filter still owned; returns how many the node removed
    ///
    /// Keeps going past failures and reports the first one.
    pub async fn close(&self) -> Result<usize, ClientError> {
        let mut removed = 0;
        let mut first_error = None;
        for handle in self.owned_filters() {
            match self.uninstall(&handle).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(id = %handle.id.to_hex(), error = %e, "failed to uninstall filter");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }

    /// Filters installed here and not yet uninstalled
    pub fn owned_filters(&self) -> Vec<FilterHandle> {
        self.owned
            .lock()
            .iter()
            .map(|(id, kind)| FilterHandle {
                id: id.clone(),
                kind: *kind,
            })
            .collect()
    }
}

impl Drop for FilterSubscription {
    fn drop(&mut self) {
        let owned = self.owned.get_mut().len();
        if owned > 0 {
            warn!(owned, "filter subscription dropped without close; node will expire them");
        }
    }
}

/// Bounded memory of delivered logs
///
/// Logs flagged `removed` are passed through and forgotten, so a re-inclusion after a
/// reorganisation is delivered again.
#[derive(Debug, Clone)]
pub struct LogDeduplicator {
    seen: HashSet<LogKey>,
    order: VecDeque<LogKey>,
    capacity: usize,
}

impl LogDeduplicator {
    /// Remember at most `capacity` keys (at least 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Drop logs already delivered
    ///
    /// Logs without a full position (pending logs) cannot be told apart and always
    /// pass through.
    pub fn filter(&mut self, logs: Vec<LogEntry>) -> Vec<LogEntry> {
        let mut fresh = Vec::with_capacity(logs.len());
        for log in logs {
            let key = log.key();
            if !key.is_complete() {
                fresh.push(log);
            } else if log.removed {
                if self.seen.remove(&key) {
                    self.order.retain(|k| k != &key);
                }
                fresh.push(log);
            } else if self.remember(key) {
                fresh.push(log);
            }
        }
        fresh
    }

    fn remember(&mut self, key: LogKey) -> bool {
        if !self.seen.insert(key.clone()) {
            return false;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }

    /// Keys currently remembered
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether nothing is remembered
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.seen.clear();
        self.order.clear();
    }
}

impl Default for LogDeduplicator {
    fn default() -> Self {
        Self::new(10_000)
    }
}

/// Poll loop over one log filter with duplicate suppression
pub struct LogWatcher<'a> {
    subscription: &'a FilterSubscription,
    handle: FilterHandle,
    dedup: LogDeduplicator,
    interval: Duration,
}

impl<'a> LogWatcher<'a> {
    /// Watch `handle`, sleeping `interval` between empty polls
    pub fn new(subscription: &'a FilterSubscription, handle: FilterHandle, interval: Duration) -> Self {
        Self {
            subscription,
            handle,
            dedup: LogDeduplicator::default(),
            interval,
        }
    }

    /// Filter being watched
    pub fn handle(&self) -> &FilterHandle {
        &self.handle
    }

    /// Full current match set (`eth_getFilterLogs`), marking every entry as seen
    pub async fn backfill(&mut self) -> Result<Vec<LogEntry>, ClientError> {
        let logs = self.subscription.fetch_all(&self.handle).await?;
        Ok(self.dedup.filter(logs))
    }

    /// One poll; may be empty
    pub async fn next_batch(&mut self) -> Result<Vec<LogEntry>, ClientError> {
        let logs = self.subscription.poll_logs(&self.handle).await?;
        Ok(self.dedup.filter(logs))
    }

    /// Poll until something new arrives
    ///
    /// Runs until logs appear or an error occurs; drop the future to stop.
    pub async fn next_non_empty(&mut self) -> Result<Vec<LogEntry>, ClientError> {
        loop {
            let batch = self.next_batch().await?;
            if !batch.is_empty() {
                return Ok(batch);
            }
            sleep(self.interval).await;
        }
    }
}
