//! Client-side batching of update operations.
//!
//! Operations accumulate in an ordered buffer and are sent as a single
//! update request when the buffer reaches its size, on [`BufferedUpdate::flush`]
//! or on [`BufferedUpdate::commit`]. A buffer is not meant to be shared
//! between threads; wrap it in a mutex if several producers feed it.

use std::sync::Arc;

use tracing::debug;

use sift_core::{Client, Document, Error, QueryResult, UpdateQuery};

pub const DEFAULT_BUFFER_SIZE: usize = 100;

/// A pending update operation.
#[derive(Debug, Clone, PartialEq)]
pub enum BufferedOperation {
    Add(Document),
    DeleteById(String),
    DeleteByQuery(String),
}

/// Flush about to be materialized into a request. Hooks may edit any field.
#[derive(Debug, Clone, PartialEq)]
pub struct PreFlush {
    pub buffer: Vec<BufferedOperation>,
    pub overwrite: Option<bool>,
    pub commit_within: Option<u64>,
}

/// Commit about to be materialized into a request. Hooks may edit any field.
#[derive(Debug, Clone, PartialEq)]
pub struct PreCommit {
    pub buffer: Vec<BufferedOperation>,
    pub overwrite: Option<bool>,
    pub soft_commit: Option<bool>,
    pub wait_searcher: Option<bool>,
    pub expunge_deletes: Option<bool>,
}

type PreFlushHook = Box<dyn FnMut(&mut PreFlush) + Send>;
type PreCommitHook = Box<dyn FnMut(&mut PreCommit) + Send>;
type ResultHook = Box<dyn FnMut(&QueryResult) + Send>;

pub struct BufferedUpdate {
    client: Arc<Client>,
    buffer: Vec<BufferedOperation>,
    buffer_size: usize,
    overwrite: Option<bool>,
    commit_within: Option<u64>,
    endpoint: Option<String>,
    pre_flush: Vec<PreFlushHook>,
    post_flush: Vec<ResultHook>,
    pre_commit: Vec<PreCommitHook>,
    post_commit: Vec<ResultHook>,
}

impl BufferedUpdate {
    pub fn new(client: Arc<Client>) -> Self {
        Self {
            client,
            buffer: Vec::new(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            overwrite: None,
            commit_within: None,
            endpoint: None,
            pre_flush: Vec::new(),
            post_flush: Vec::new(),
            pre_commit: Vec::new(),
            post_commit: Vec::new(),
        }
    }

    /// Number of operations that triggers an automatic flush.
    pub fn with_buffer_size(mut self, size: usize) -> Result<Self, Error> {
        if size == 0 {
            return Err(Error::invalid_argument("buffer size must be greater than zero"));
        }
        self.buffer_size = size;
        Ok(self)
    }

    /// Default `overwrite` for flushed adds.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = Some(overwrite);
        self
    }

    /// Default `commitWithin` (milliseconds) for flushed adds.
    pub fn with_commit_within(mut self, millis: u64) -> Self {
        self.commit_within = Some(millis);
        self
    }

    /// Send flushes to this endpoint instead of letting the client choose.
    pub fn with_endpoint(mut self, key: impl Into<String>) -> Self {
        self.endpoint = Some(key.into());
        self
    }

    pub fn on_pre_flush(&mut self, hook: impl FnMut(&mut PreFlush) + Send + 'static) {
        self.pre_flush.push(Box::new(hook));
    }

    pub fn on_post_flush(&mut self, hook: impl FnMut(&QueryResult) + Send + 'static) {
        self.post_flush.push(Box::new(hook));
    }

    pub fn on_pre_commit(&mut self, hook: impl FnMut(&mut PreCommit) + Send + 'static) {
        self.pre_commit.push(Box::new(hook));
    }

    pub fn on_post_commit(&mut self, hook: impl FnMut(&QueryResult) + Send + 'static) {
        self.post_commit.push(Box::new(hook));
    }

    pub fn buffer(&self) -> &[BufferedOperation] {
        &self.buffer
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop every pending operation without sending anything.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Queue an operation, flushing when the buffer is full.
    ///
    /// Returns the flush result when this call triggered one.
    pub fn add(&mut self, operation: BufferedOperation) -> Result<Option<QueryResult>, Error> {
        self.buffer.push(operation);
        if self.buffer.len() >= self.buffer_size {
            self.flush(None, None)
        } else {
            Ok(None)
        }
    }

    pub fn add_document(&mut self, document: Document) -> Result<Option<QueryResult>, Error> {
        self.add(BufferedOperation::Add(document))
    }

    pub fn delete_by_id(&mut self, id: impl Into<String>) -> Result<Option<QueryResult>, Error> {
        self.add(BufferedOperation::DeleteById(id.into()))
    }

    pub fn delete_by_query(
        &mut self,
        query: impl Into<String>,
    ) -> Result<Option<QueryResult>, Error> {
        self.add(BufferedOperation::DeleteByQuery(query.into()))
    }

    /// Send the buffered operations as one update request.
    ///
    /// `None` arguments fall back to the configured defaults. Returns
    /// `Ok(None)` without sending anything when the buffer is empty. On
    /// failure the buffer is left untouched.
    pub fn flush(
        &mut self,
        overwrite: Option<bool>,
        commit_within: Option<u64>,
    ) -> Result<Option<QueryResult>, Error> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        let mut pending = PreFlush {
            buffer: self.buffer.clone(),
            overwrite: overwrite.or(self.overwrite),
            commit_within: commit_within.or(self.commit_within),
        };
        for hook in &mut self.pre_flush {
            hook(&mut pending);
        }
        if pending.buffer.is_empty() {
            self.buffer.clear();
            return Ok(None);
        }

        let operations = pending.buffer.len();
        let mut update = UpdateQuery::new();
        append_operations(
            &mut update,
            pending.buffer,
            pending.overwrite,
            pending.commit_within,
        );
        debug!(operations, "flushing update buffer");
        let result = self.send(update)?;
        self.buffer.clear();

        for hook in &mut self.post_flush {
            hook(&result);
        }
        Ok(Some(result))
    }

    /// Send the buffered operations followed by a commit, in one request.
    ///
    /// A commit is sent even when the buffer is empty.
    pub fn commit(
        &mut self,
        overwrite: Option<bool>,
        soft_commit: Option<bool>,
        wait_searcher: Option<bool>,
        expunge_deletes: Option<bool>,
    ) -> Result<QueryResult, Error> {
        let mut pending = PreCommit {
            buffer: self.buffer.clone(),
            overwrite: overwrite.or(self.overwrite),
            soft_commit,
            wait_searcher,
            expunge_deletes,
        };
        for hook in &mut self.pre_commit {
            hook(&mut pending);
        }

        let operations = pending.buffer.len();
        let mut update = UpdateQuery::new();
        append_operations(&mut update, pending.buffer, pending.overwrite, None);
        update.add_commit(
            pending.soft_commit,
            pending.wait_searcher,
            pending.expunge_deletes,
        );
        debug!(operations, "committing update buffer");
        let result = self.send(update)?;
        self.buffer.clear();

        for hook in &mut self.post_commit {
            hook(&result);
        }
        Ok(result)
    }

    fn send(&self, update: UpdateQuery) -> Result<QueryResult, Error> {
        match &self.endpoint {
            Some(key) => self.client.execute_on(Arc::new(update), key),
            None => self.client.update(update),
        }
    }
}

/// Translate buffered operations into update commands, keeping their order.
fn append_operations(
    update: &mut UpdateQuery,
    operations: Vec<BufferedOperation>,
    overwrite: Option<bool>,
    commit_within: Option<u64>,
) {
    for operation in operations {
        match operation {
            BufferedOperation::Add(document) => {
                update.add_documents(vec![document], overwrite, commit_within);
            }
            BufferedOperation::DeleteById(id) => {
                update.add_delete_by_id(id);
            }
            BufferedOperation::DeleteByQuery(query) => {
                update.add_delete_query(query);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_core::mock::MockAdapter;
    use sift_core::{Endpoint, ErrorKind};
    use std::sync::Mutex;

    fn setup() -> (MockAdapter, Arc<Client>) {
        let adapter = MockAdapter::new().with_default_response(MockAdapter::ok_response());
        let mut client = Client::new(adapter.clone());
        client
            .add_endpoint(Endpoint::new("primary").with_core("books"))
            .unwrap();
        client
            .add_endpoint(Endpoint::new("indexer").with_core("books"))
            .unwrap();
        (adapter, Arc::new(client))
    }

    fn doc(id: &str) -> Document {
        Document::new().with_field("id", id)
    }

    #[test]
    fn zero_buffer_size_is_rejected() {
        let (_, client) = setup();
        let err = BufferedUpdate::new(client).with_buffer_size(0).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn flushes_automatically_at_threshold() {
        let (adapter, client) = setup();
        let mut buffer = BufferedUpdate::new(client).with_buffer_size(3).unwrap();

        assert!(buffer.add_document(doc("1")).unwrap().is_none());
        assert!(buffer.delete_by_id("2").unwrap().is_none());
        assert_eq!(adapter.request_count(), 0);

        let flushed = buffer.delete_by_query("stale:true").unwrap();
        assert!(flushed.is_some());
        assert!(buffer.is_empty());
        assert_eq!(adapter.request_count(), 1);

        let body = adapter.recorded_requests()[0].body.clone().unwrap();
        assert_eq!(
            body,
            r#"{"add":{"doc":{"id":"1"}},"delete":{"id":"2"},"delete":{"query":"stale:true"}}"#
        );
    }

    #[test]
    fn empty_flush_sends_nothing() {
        let (adapter, client) = setup();
        let mut buffer = BufferedUpdate::new(client);
        assert!(buffer.flush(None, None).unwrap().is_none());
        assert_eq!(adapter.request_count(), 0);
    }

    #[test]
    fn flush_applies_options() {
        let (adapter, client) = setup();
        let mut buffer = BufferedUpdate::new(client).with_commit_within(5000);
        buffer.add_document(doc("a")).unwrap();
        buffer.flush(Some(false), None).unwrap();

        let body = adapter.recorded_requests()[0].body.clone().unwrap();
        assert_eq!(
            body,
            r#"{"add":{"commitWithin":5000,"doc":{"id":"a"},"overwrite":false}}"#
        );
    }

    #[test]
    fn pre_flush_can_replace_buffer_and_options() {
        let (adapter, client) = setup();
        let mut buffer = BufferedUpdate::new(client);
        buffer.on_pre_flush(|pending| {
            pending.buffer.retain(|op| !matches!(op, BufferedOperation::DeleteById(_)));
            pending.overwrite = Some(true);
        });

        buffer.add_document(doc("keep")).unwrap();
        buffer.delete_by_id("dropped").unwrap();
        buffer.flush(None, None).unwrap();

        let body = adapter.recorded_requests()[0].body.clone().unwrap();
        assert_eq!(body, r#"{"add":{"doc":{"id":"keep"},"overwrite":true}}"#);
    }

    #[test]
    fn failed_flush_keeps_buffer() {
        let adapter = MockAdapter::new().unreachable("primary");
        let mut client = Client::new(adapter);
        client
            .add_endpoint(Endpoint::new("primary").with_core("books"))
            .unwrap();
        let mut buffer = BufferedUpdate::new(Arc::new(client));

        buffer.add_document(doc("1")).unwrap();
        assert!(buffer.flush(None, None).is_err());
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn commit_sends_operations_and_commit_together() {
        let (adapter, client) = setup();
        let mut buffer = BufferedUpdate::new(client);
        let committed = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&committed);
        buffer.on_post_commit(move |_| *counter.lock().unwrap() += 1);

        buffer.add_document(doc("1")).unwrap();
        buffer.commit(None, Some(true), None, None).unwrap();

        assert_eq!(adapter.request_count(), 1);
        assert!(buffer.is_empty());
        assert_eq!(*committed.lock().unwrap(), 1);
        let body = adapter.recorded_requests()[0].body.clone().unwrap();
        assert_eq!(
            body,
            r#"{"add":{"doc":{"id":"1"}},"commit":{"softCommit":true}}"#
        );
    }

    #[test]
    fn pre_commit_hook_decides_what_is_sent() {
        let (adapter, client) = setup();
        let mut buffer = BufferedUpdate::new(client);
        buffer.on_pre_commit(|pending| {
            pending.buffer.truncate(1);
            pending.expunge_deletes = Some(true);
        });

        for id in ["1", "2", "3"] {
            buffer.add_document(doc(id)).unwrap();
        }
        buffer.commit(None, None, None, None).unwrap();

        assert!(buffer.is_empty());
        let body = adapter.recorded_requests()[0].body.clone().unwrap();
        assert_eq!(
            body,
            r#"{"add":{"doc":{"id":"1"}},"commit":{"expungeDeletes":true}}"#
        );
    }

    #[test]
    fn commit_on_empty_buffer_still_commits() {
        let (adapter, client) = setup();
        let mut buffer = BufferedUpdate::new(client);
        buffer.commit(None, None, Some(true), None).unwrap();

        let body = adapter.recorded_requests()[0].body.clone().unwrap();
        assert_eq!(body, r#"{"commit":{"waitSearcher":true}}"#);
    }

    #[test]
    fn hooks_fire_in_order() {
        let (_, client) = setup();
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut buffer = BufferedUpdate::new(client);

        let log = Arc::clone(&events);
        buffer.on_pre_flush(move |_| log.lock().unwrap().push("pre_flush"));
        let log = Arc::clone(&events);
        buffer.on_post_flush(move |_| log.lock().unwrap().push("post_flush"));
        let log = Arc::clone(&events);
        buffer.on_pre_commit(move |pending| {
            pending.expunge_deletes = Some(true);
            log.lock().unwrap().push("pre_commit");
        });

        buffer.add_document(doc("1")).unwrap();
        buffer.flush(None, None).unwrap();
        buffer.commit(None, None, None, None).unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec!["pre_flush", "post_flush", "pre_commit"]
        );
    }

    #[test]
    fn explicit_endpoint_is_used() {
        let (adapter, client) = setup();
        let mut buffer = BufferedUpdate::new(client).with_endpoint("indexer");
        buffer.add_document(doc("1")).unwrap();
        buffer.flush(None, None).unwrap();
        assert_eq!(adapter.recorded_endpoints(), vec!["indexer"]);
    }

    #[test]
    fn clear_discards_pending_operations() {
        let (adapter, client) = setup();
        let mut buffer = BufferedUpdate::new(client);
        buffer.add_document(doc("1")).unwrap();
        buffer.clear();
        assert!(buffer.flush(None, None).unwrap().is_none());
        assert_eq!(adapter.request_count(), 0);
    }
}
