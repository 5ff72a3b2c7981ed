mod metadata;
mod rpc;

pub use rpc::{RetryPolicy, RpcClient, RpcClientConfig, RpcError};
