pub mod shard;

pub use shard::{Shard, ShardSpec, partition};
