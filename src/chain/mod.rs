//! On-chain data collaborators

pub mod rpc;

pub use rpc::EvmRpcClient;
