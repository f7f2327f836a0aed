use serde::{Deserialize, Serialize};

/// Where a block pool places its buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryStorageType {
    Host,
    Device,
    System,
}

/// Buffer allocation strategy attached to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Allocator {
    /// Allocates on demand, no upper bound.
    Unbounded,
    /// Fixed number of preallocated, fixed-size blocks.
    BlockMemoryPool {
        storage_type: MemoryStorageType,
        block_size: u64,
        num_blocks: u32,
    },
}

/// Pool of CUDA streams handed to GPU-backed nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CudaStreamPool {
    pub dev_id: i32,
    pub stream_flags: u32,
    pub stream_priority: i32,
    pub reserved_size: u32,
    pub max_size: u32,
}

impl Default for CudaStreamPool {
    fn default() -> Self {
        Self {
            dev_id: 0,
            stream_flags: 0,
            stream_priority: 0,
            reserved_size: 1,
            max_size: 5,
        }
    }
}
