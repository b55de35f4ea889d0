//! Scripted in-memory transport for unit tests

use crate::transport::{BatchGetOutput, BatchWriteOutput, ScanInput, ScanOutput, StoreTransport};
use async_trait::async_trait;
use keyway_common::{AttributeUpdates, Error, Item, Key, Result, WriteRequest};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};

#[derive(Default)]
struct State {
    items: BTreeMap<Key, Item>,
    /// Per batch call: leave this many trailing entries unprocessed
    unprocessed_script: VecDeque<usize>,
    /// Used once the script runs dry
    unprocessed_fallback: usize,
    errors: VecDeque<Error>,
    batch_get_calls: Vec<Vec<Key>>,
    batch_write_calls: Vec<Vec<WriteRequest>>,
    consistent_batch_get: bool,
    scan_inputs: Vec<ScanInput>,
    scan_outputs: VecDeque<ScanOutput>,
}

pub(crate) struct ScriptedTransport {
    hash_key: String,
    state: Mutex<State>,
}

impl ScriptedTransport {
    pub(crate) fn new(hash_key: &str) -> Self {
        Self {
            hash_key: hash_key.to_string(),
            state: Mutex::new(State::default()),
        }
    }

    pub(crate) fn insert(&self, item: Item) {
        let key = self.key_of(&item);
        self.state.lock().items.insert(key, item);
    }

    pub(crate) fn contains(&self, key: &Key) -> bool {
        self.state.lock().items.contains_key(key)
    }

    pub(crate) fn script_unprocessed(&self, script: Vec<usize>) {
        self.state.lock().unprocessed_script = script.into();
    }

    pub(crate) fn always_leave_unprocessed(&self, entries: usize) {
        self.state.lock().unprocessed_fallback = entries;
    }

    pub(crate) fn push_error(&self, error: Error) {
        self.state.lock().errors.push_back(error);
    }

    pub(crate) fn push_scan_output(&self, output: ScanOutput) {
        self.state.lock().scan_outputs.push_back(output);
    }

    pub(crate) fn batch_get_calls(&self) -> Vec<Vec<Key>> {
        self.state.lock().batch_get_calls.clone()
    }

    pub(crate) fn batch_write_calls(&self) -> Vec<Vec<WriteRequest>> {
        self.state.lock().batch_write_calls.clone()
    }

    pub(crate) fn saw_consistent_batch_get(&self) -> bool {
        self.state.lock().consistent_batch_get
    }

    pub(crate) fn scan_inputs(&self) -> Vec<ScanInput> {
        self.state.lock().scan_inputs.clone()
    }

    fn key_of(&self, item: &Item) -> Key {
        Key::from_item(item, &[self.hash_key.as_str()]).unwrap_or_default()
    }

    /// Pops the next scripted error or leftover count
    fn next_round(state: &mut State) -> Result<usize> {
        if let Some(e) = state.errors.pop_front() {
            return Err(e);
        }
        Ok(state
            .unprocessed_script
            .pop_front()
            .unwrap_or(state.unprocessed_fallback))
    }
}

#[async_trait]
impl StoreTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    // Point operations are covered against the local store
    async fn get_item(&self, _table: &str, _key: Key, _consistent: bool) -> Result<Option<Item>> {
        unimplemented!("scripted transport only serves batch and scan calls")
    }

    async fn put_item(&self, _table: &str, _item: Item) -> Result<()> {
        unimplemented!("scripted transport only serves batch and scan calls")
    }

    async fn delete_item(&self, _table: &str, _key: Key) -> Result<()> {
        unimplemented!("scripted transport only serves batch and scan calls")
    }

    async fn update_item(&self, _table: &str, _key: Key, _updates: AttributeUpdates) -> Result<()> {
        unimplemented!("scripted transport only serves batch and scan calls")
    }

    async fn scan(&self, input: ScanInput) -> Result<ScanOutput> {
        let mut state = self.state.lock();
        state.scan_inputs.push(input);
        Ok(state.scan_outputs.pop_front().unwrap_or_default())
    }

    async fn batch_get_item(
        &self,
        _table: &str,
        keys: Vec<Key>,
        consistent: bool,
    ) -> Result<BatchGetOutput> {
        let mut state = self.state.lock();
        state.batch_get_calls.push(keys.clone());
        state.consistent_batch_get |= consistent;
        let leave = Self::next_round(&mut state)?;

        let split = keys.len().saturating_sub(leave);
        let mut keys = keys;
        let unprocessed_keys = keys.split_off(split);
        let items = keys
            .iter()
            .filter_map(|k| state.items.get(k).cloned())
            .collect();
        Ok(BatchGetOutput {
            items,
            unprocessed_keys,
        })
    }

    async fn batch_write_item(
        &self,
        _table: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<BatchWriteOutput> {
        let mut state = self.state.lock();
        state.batch_write_calls.push(requests.clone());
        let leave = Self::next_round(&mut state)?;

        let split = requests.len().saturating_sub(leave);
        let mut requests = requests;
        let unprocessed_requests = requests.split_off(split);
        for request in requests {
            match request {
                WriteRequest::Put { item } => {
                    let key = self.key_of(&item);
                    state.items.insert(key, item);
                }
                WriteRequest::Delete { key } => {
                    state.items.remove(&key);
                }
            }
        }
        Ok(BatchWriteOutput {
            unprocessed_requests,
        })
    }
}
