//! In-memory chain used by the unit tests.

use activity_delivery::{BlockStream, DeliveryError, DeliveryInterface};
use activity_types::{Address, Bytes, Transaction, TransactionHash, TransactionReceipt, U256};
use alloy_primitives::B256;
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Default)]
struct MockState {
	block_number: u64,
	receipts: HashMap<TransactionHash, TransactionReceipt>,
	native_balance: U256,
	token_balances: HashMap<Address, U256>,
	allowances: HashMap<(Address, Address, Address), U256>,
	call_results: HashMap<Address, Bytes>,
	submitted: Vec<Transaction>,
	auto_mine: bool,
	reverted_submissions: HashSet<usize>,
	failed_submissions: HashSet<usize>,
	failing_receipts: HashSet<TransactionHash>,
	fail_block_number: bool,
	fail_subscribe: bool,
	heads: Option<mpsc::UnboundedReceiver<u64>>,
	receipt_queries: usize,
	block_number_queries: usize,
	nonce: u64,
	gas_price: u128,
	priority_fee: u128,
}

/// Scriptable [`DeliveryInterface`] backed by in-memory state.
///
/// Submissions get sequential hashes (`0x00..01`, `0x00..02`, ...). With
/// auto-mining enabled every submission is mined immediately, successful
/// unless its index was marked reverted.
#[derive(Default)]
pub struct MockDelivery {
	state: Mutex<MockState>,
}

impl MockDelivery {
	pub fn new() -> Self {
		Self::default()
	}

	/// Mock that mines every submission in the current block.
	pub fn auto_mining() -> Self {
		let mock = Self::new();
		mock.state.lock().unwrap().auto_mine = true;
		mock
	}

	pub fn hash(n: u8) -> TransactionHash {
		TransactionHash(B256::with_last_byte(n))
	}

	pub fn set_block_number(&self, height: u64) {
		self.state.lock().unwrap().block_number = height;
	}

	pub fn mine(&self, hash: TransactionHash, success: bool) {
		let mut state = self.state.lock().unwrap();
		let block_number = state.block_number;
		state.receipts.insert(
			hash,
			TransactionReceipt {
				hash,
				block_number,
				success,
			},
		);
	}

	pub fn set_native_balance(&self, balance: U256) {
		self.state.lock().unwrap().native_balance = balance;
	}

	pub fn set_token_balance(&self, token: Address, balance: U256) {
		self.state.lock().unwrap().token_balances.insert(token, balance);
	}

	pub fn set_allowance(&self, owner: Address, spender: Address, token: Address, amount: U256) {
		self.state
			.lock()
			.unwrap()
			.allowances
			.insert((owner, spender, token), amount);
	}

	pub fn set_call_result(&self, to: Address, output: impl Into<Bytes>) {
		self.state.lock().unwrap().call_results.insert(to, output.into());
	}

	pub fn set_fees(&self, nonce: u64, gas_price: u128, priority_fee: u128) {
		let mut state = self.state.lock().unwrap();
		state.nonce = nonce;
		state.gas_price = gas_price;
		state.priority_fee = priority_fee;
	}

	/// Marks the `index`-th submission (zero based) as reverting when mined.
	pub fn revert_submission(&self, index: usize) {
		self.state.lock().unwrap().reverted_submissions.insert(index);
	}

	/// Makes the `index`-th submission fail at broadcast.
	pub fn fail_submission(&self, index: usize) {
		self.state.lock().unwrap().failed_submissions.insert(index);
	}

	pub fn fail_receipt_queries(&self, hash: TransactionHash) {
		self.state.lock().unwrap().failing_receipts.insert(hash);
	}

	pub fn fail_block_number(&self, fail: bool) {
		self.state.lock().unwrap().fail_block_number = fail;
	}

	pub fn fail_subscribe(&self) {
		self.state.lock().unwrap().fail_subscribe = true;
	}

	/// Returns the sender feeding the next header subscription.
	pub fn head_sender(&self) -> mpsc::UnboundedSender<u64> {
		let (tx, rx) = mpsc::unbounded();
		self.state.lock().unwrap().heads = Some(rx);
		tx
	}

	pub fn submitted(&self) -> Vec<Transaction> {
		self.state.lock().unwrap().submitted.clone()
	}

	pub fn receipt_queries(&self) -> usize {
		self.state.lock().unwrap().receipt_queries
	}

	pub fn block_number_queries(&self) -> usize {
		self.state.lock().unwrap().block_number_queries
	}
}

#[async_trait]
impl DeliveryInterface for MockDelivery {
	async fn submit(&self, tx: Transaction) -> Result<TransactionHash, DeliveryError> {
		let mut state = self.state.lock().unwrap();
		let index = state.submitted.len();
		if state.failed_submissions.contains(&index) {
			return Err(DeliveryError::Network("nonce too low".into()));
		}
		state.submitted.push(tx);
		let hash = Self::hash((index + 1) as u8);
		if state.auto_mine {
			let receipt = TransactionReceipt {
				hash,
				block_number: state.block_number,
				success: !state.reverted_submissions.contains(&index),
			};
			state.receipts.insert(hash, receipt);
		}
		Ok(hash)
	}

	async fn call(&self, tx: &Transaction) -> Result<Bytes, DeliveryError> {
		let state = self.state.lock().unwrap();
		tx.to
			.and_then(|to| state.call_results.get(&to).cloned())
			.ok_or_else(|| DeliveryError::Network("execution reverted".into()))
	}

	async fn get_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, DeliveryError> {
		let mut state = self.state.lock().unwrap();
		state.receipt_queries += 1;
		if state.failing_receipts.contains(hash) {
			return Err(DeliveryError::Network("connection reset".into()));
		}
		Ok(state.receipts.get(hash).cloned())
	}

	async fn get_block_number(&self) -> Result<u64, DeliveryError> {
		let mut state = self.state.lock().unwrap();
		state.block_number_queries += 1;
		if state.fail_block_number {
			return Err(DeliveryError::Network("connection reset".into()));
		}
		Ok(state.block_number)
	}

	async fn subscribe_blocks(&self) -> Result<BlockStream, DeliveryError> {
		let mut state = self.state.lock().unwrap();
		if state.fail_subscribe {
			return Err(DeliveryError::Subscription("websocket closed".into()));
		}
		state
			.heads
			.take()
			.map(|rx| rx.boxed())
			.ok_or_else(|| DeliveryError::Subscription("no head source".into()))
	}

	async fn get_balance(
		&self,
		_address: Address,
		token: Option<Address>,
	) -> Result<U256, DeliveryError> {
		let state = self.state.lock().unwrap();
		Ok(match token {
			None => state.native_balance,
			Some(token) => state.token_balances.get(&token).copied().unwrap_or_default(),
		})
	}

	async fn get_allowance(
		&self,
		owner: Address,
		spender: Address,
		token: Address,
	) -> Result<U256, DeliveryError> {
		let state = self.state.lock().unwrap();
		Ok(state
			.allowances
			.get(&(owner, spender, token))
			.copied()
			.unwrap_or_default())
	}

	/// Pending nonce: the configured base plus every submission so far.
	async fn get_nonce(&self, _address: Address) -> Result<u64, DeliveryError> {
		let nonce = {
			let state = self.state.lock().unwrap();
			state.nonce + state.submitted.len() as u64
		};
		tokio::task::yield_now().await;
		Ok(nonce)
	}

	async fn get_gas_price(&self) -> Result<u128, DeliveryError> {
		Ok(self.state.lock().unwrap().gas_price)
	}

	async fn get_max_priority_fee(&self) -> Result<u128, DeliveryError> {
		Ok(self.state.lock().unwrap().priority_fee)
	}
}
