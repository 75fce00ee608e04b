mod block;
mod element;
mod envelope;
mod requests;
mod transaction;

pub use block::{Block, BlockTransactionRef};
pub use element::{Element, ElementPolicy, ElementStatus, ElementType, Network};
pub use envelope::{Envelope, OperationStatus, Outcome, Verb};
pub use requests::{
    BlockMineVerifyRequest, ElementCreateRequest, ElementGetRequest, ElementMetadataRequest,
    TransactionCreateRequest, TransactionGetRequest,
};
pub use transaction::{Balance, Transaction, TransactionType};

/// Ledger addresses and record ids are lowercase hex digests.
pub type Address = String;
