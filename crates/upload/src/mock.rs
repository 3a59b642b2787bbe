//! In-memory storage contract and blob broadcaster for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use w3deploy_protocol::{Address, ContractCall, FeeData, H256, Receipt, TxRequest, keccak256};

use crate::broadcaster::{BlobBroadcaster, BlobTxRequest, BroadcastFuture};
use crate::contract::{ContractFuture, StorageContract};
use crate::error::UploadError;

#[derive(Default)]
struct State {
    files: HashMap<Vec<u8>, Vec<H256>>,
    receipts: HashMap<H256, Receipt>,
    pending_nonce: u64,
    upfront_payment: u128,
    tx_counter: u64,

    nonces_used: Vec<u64>,
    call_log: Vec<String>,
    removes: Vec<String>,
    writes: usize,
    blob_txs: usize,
    hash_reads: usize,
    count_reads: usize,
    estimate_calls: usize,
    receipt_polls: usize,
    nonce_reads: usize,

    latency: Option<Duration>,
    failing_estimates: u32,
    failing_sends: u32,
    failing_hash_reads: u32,
    failing_chunk_reads: Option<u64>,
    pending_polls: u32,
    revert_removes: bool,
    revert_chunks: Vec<(Vec<u8>, u64)>,
}

/// Chunk store keyed by file name, with scripted failures.
///
/// Writes take effect when the transaction is sent; receipts are
/// available immediately unless `set_pending_polls` delays them.
pub struct MockContract {
    address: Address,
    state: Mutex<State>,
}

impl MockContract {
    pub fn new() -> Self {
        Self {
            address: Address([0xcc; 20]),
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Stores `count` chunks of distinct placeholder content under `name`.
    pub fn seed_file(&self, name: &str, count: u64) {
        let hashes = (0..count)
            .map(|i| keccak256(format!("seed-{name}-{i}").as_bytes()))
            .collect();
        self.state().files.insert(name.as_bytes().to_vec(), hashes);
    }

    /// Stores the inline hashes of `chunks` under `name`.
    pub fn seed_chunks<T: AsRef<[u8]>>(&self, name: &str, chunks: &[T]) {
        let hashes = chunks.iter().map(|c| keccak256(c.as_ref())).collect();
        self.state().files.insert(name.as_bytes().to_vec(), hashes);
    }

    pub fn set_pending_nonce(&self, nonce: u64) {
        self.state().pending_nonce = nonce;
    }

    /// Sends and receipt lookups take `latency` of (paused) time to
    /// resolve, so concurrent files suspend mid-upload. The effect of a
    /// send is applied when it is issued.
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = Some(latency);
    }

    pub fn set_upfront_payment(&self, wei: u128) {
        self.state().upfront_payment = wei;
    }

    /// The next `n` gas estimates fail transiently.
    pub fn fail_estimates(&self, n: u32) {
        self.state().failing_estimates = n;
    }

    /// The next `n` sends fail transiently.
    pub fn fail_sends(&self, n: u32) {
        self.state().failing_sends = n;
    }

    /// The next `n` hash reads fail transiently.
    pub fn fail_hash_reads(&self, n: u32) {
        self.state().failing_hash_reads = n;
    }

    /// Every hash read of chunk `index` fails transiently.
    pub fn fail_chunk_hash_reads(&self, index: u64) {
        self.state().failing_chunk_reads = Some(index);
    }

    /// Every receipt lookup returns pending `n` times before mining.
    pub fn set_pending_polls(&self, n: u32) {
        self.state().pending_polls = n;
    }

    pub fn revert_removes(&self, revert: bool) {
        self.state().revert_removes = revert;
    }

    /// Writes of chunk `index` of `name` revert.
    pub fn revert_chunk(&self, name: &str, index: u64) {
        self.state()
            .revert_chunks
            .push((name.as_bytes().to_vec(), index));
    }

    pub fn stored_hashes(&self, name: &str) -> Vec<H256> {
        self.state()
            .files
            .get(name.as_bytes())
            .cloned()
            .unwrap_or_default()
    }

    /// Nonces of accepted transactions, in send order.
    pub fn nonces_used(&self) -> Vec<u64> {
        self.state().nonces_used.clone()
    }

    /// `remove:<name>` / `write:<name>:<ids>` per accepted transaction.
    pub fn call_log(&self) -> Vec<String> {
        self.state().call_log.clone()
    }

    pub fn removes(&self) -> Vec<String> {
        self.state().removes.clone()
    }

    /// Successful write transactions (inline and blob).
    pub fn writes(&self) -> usize {
        self.state().writes
    }

    pub fn blob_txs(&self) -> usize {
        self.state().blob_txs
    }

    pub fn hash_reads(&self) -> usize {
        self.state().hash_reads
    }

    pub fn count_reads(&self) -> usize {
        self.state().count_reads
    }

    pub fn estimate_calls(&self) -> usize {
        self.state().estimate_calls
    }

    pub fn receipt_polls(&self) -> usize {
        self.state().receipt_polls
    }

    pub fn nonce_reads(&self) -> usize {
        self.state().nonce_reads
    }

    fn delayed<'a, T: Send + 'a>(&self, result: Result<T, UploadError>) -> ContractFuture<'a, T> {
        let latency = self.state().latency;
        match latency {
            Some(latency) => Box::pin(async move {
                tokio::time::sleep(latency).await;
                result
            }),
            None => ready(result),
        }
    }

    /// Records and applies one accepted transaction.
    fn accept(&self, nonce: u64, call: &ContractCall) -> H256 {
        let mut state = self.state();
        state.tx_counter += 1;
        let tx_hash = keccak256(&state.tx_counter.to_be_bytes());
        state.nonces_used.push(nonce);

        let status = match call {
            ContractCall::Remove { name } => {
                state
                    .call_log
                    .push(format!("remove:{}", String::from_utf8_lossy(name)));
                if state.revert_removes {
                    false
                } else {
                    state.files.remove(name);
                    state.removes.push(String::from_utf8_lossy(name).into_owned());
                    true
                }
            }
            ContractCall::WriteChunk {
                name,
                chunk_id,
                data,
            } => {
                state.call_log.push(format!(
                    "write:{}:{chunk_id}",
                    String::from_utf8_lossy(name)
                ));
                let reverted = state
                    .revert_chunks
                    .iter()
                    .any(|(n, i)| n == name && i == chunk_id);
                if !reverted {
                    store(&mut state.files, name, *chunk_id, keccak256(data));
                    state.writes += 1;
                }
                !reverted
            }
            ContractCall::WriteChunks {
                name,
                chunk_ids,
                chunk_hashes,
                ..
            } => {
                state.call_log.push(format!(
                    "write:{}:{chunk_ids:?}",
                    String::from_utf8_lossy(name)
                ));
                let reverted = state
                    .revert_chunks
                    .iter()
                    .any(|(n, i)| n == name && chunk_ids.contains(i));
                if !reverted {
                    for (id, hash) in chunk_ids.iter().zip(chunk_hashes) {
                        store(&mut state.files, name, *id, *hash);
                    }
                    state.writes += 1;
                }
                !reverted
            }
            _ => true,
        };

        let block = state.tx_counter;
        state.receipts.insert(
            tx_hash,
            Receipt {
                tx_hash,
                block_number: Some(block),
                status,
            },
        );
        tx_hash
    }
}

fn store(files: &mut HashMap<Vec<u8>, Vec<H256>>, name: &[u8], id: u64, hash: H256) {
    let chunks = files.entry(name.to_vec()).or_default();
    let id = id as usize;
    if chunks.len() <= id {
        chunks.resize(id + 1, H256::ZERO);
    }
    chunks[id] = hash;
}

fn take_failure(counter: &mut u32, what: &str) -> Result<(), UploadError> {
    if *counter > 0 {
        *counter -= 1;
        Err(UploadError::TransientRpc(format!("{what}: connection reset")))
    } else {
        Ok(())
    }
}

fn ready<'a, T: Send + 'a>(result: Result<T, UploadError>) -> ContractFuture<'a, T> {
    Box::pin(std::future::ready(result))
}

impl StorageContract for MockContract {
    fn address(&self) -> Address {
        self.address
    }

    fn pending_nonce(&self) -> ContractFuture<'_, u64> {
        let mut state = self.state();
        state.nonce_reads += 1;
        ready(Ok(state.pending_nonce))
    }

    fn count_chunks<'a>(&'a self, name: &'a [u8]) -> ContractFuture<'a, u64> {
        let mut state = self.state();
        state.count_reads += 1;
        ready(Ok(state.files.get(name).map(|c| c.len() as u64).unwrap_or(0)))
    }

    fn chunk_hash<'a>(&'a self, name: &'a [u8], chunk_id: u64) -> ContractFuture<'a, H256> {
        let mut state = self.state();
        if state.failing_chunk_reads == Some(chunk_id) {
            return ready(Err(UploadError::TransientRpc(format!(
                "getChunkHash({chunk_id}): connection reset"
            ))));
        }
        let result = take_failure(&mut state.failing_hash_reads, "getChunkHash").map(|()| {
            state.hash_reads += 1;
            state
                .files
                .get(name)
                .and_then(|c| c.get(chunk_id as usize).copied())
                .unwrap_or(H256::ZERO)
        });
        ready(result)
    }

    fn upfront_payment(&self) -> ContractFuture<'_, u128> {
        ready(Ok(self.state().upfront_payment))
    }

    fn estimate_gas<'a>(
        &'a self,
        _call: &'a ContractCall,
        _value: u128,
    ) -> ContractFuture<'a, u64> {
        let mut state = self.state();
        state.estimate_calls += 1;
        ready(take_failure(&mut state.failing_estimates, "estimateGas").map(|()| 100_000))
    }

    fn fee_data(&self) -> ContractFuture<'_, FeeData> {
        ready(Ok(FeeData {
            max_fee_per_gas: 3_000_000_000,
            max_priority_fee_per_gas: 1_000_000_000,
        }))
    }

    fn send_transaction<'a>(&'a self, tx: &'a TxRequest) -> ContractFuture<'a, H256> {
        let sent = take_failure(&mut self.state().failing_sends, "sendTransaction");
        self.delayed(sent.map(|()| self.accept(tx.nonce, &tx.call)))
    }

    fn transaction_receipt(&self, tx_hash: H256) -> ContractFuture<'_, Option<Receipt>> {
        let receipt = {
            let mut state = self.state();
            state.receipt_polls += 1;
            if state.pending_polls > 0 {
                state.pending_polls -= 1;
                None
            } else {
                state.receipts.get(&tx_hash).cloned()
            }
        };
        self.delayed(Ok(receipt))
    }
}

/// Blob broadcaster that applies the write to a [`MockContract`].
pub struct MockBroadcaster {
    contract: Arc<MockContract>,
}

impl MockBroadcaster {
    pub fn new(contract: Arc<MockContract>) -> Self {
        Self { contract }
    }
}

impl BlobBroadcaster for MockBroadcaster {
    fn broadcast<'a>(&'a self, tx: &'a BlobTxRequest) -> BroadcastFuture<'a> {
        let sent = take_failure(&mut self.contract.state().failing_sends, "blob-utils");
        let result = sent.map(|()| {
            self.contract.state().blob_txs += 1;
            self.contract.accept(tx.nonce, &tx.call)
        });
        self.contract.delayed(result)
    }
}
