//! Proptest strategies for cache keys and operations

use proptest::prelude::*;

/// Namespace names as they appear in policy tables
pub fn namespace_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z]{0,15}"
}

/// Identifiers, including characters that are special in glob patterns
pub fn identifier_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9:*?\\[\\]\\\\_-]{1,24}"
}

/// One local-store operation
#[derive(Debug, Clone)]
pub enum StoreOp {
    Put { namespace: usize, id: u8 },
    Get { namespace: usize, id: u8 },
    Remove { namespace: usize, id: u8 },
}

pub fn store_op_strategy(namespaces: usize) -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        3 => (0..namespaces, any::<u8>()).prop_map(|(namespace, id)| StoreOp::Put { namespace, id }),
        2 => (0..namespaces, any::<u8>()).prop_map(|(namespace, id)| StoreOp::Get { namespace, id }),
        1 => (0..namespaces, any::<u8>()).prop_map(|(namespace, id)| StoreOp::Remove { namespace, id }),
    ]
}
