//! `store` crate 入口。
//!
//! 职责：统计队列配置与快照的持久化边界。
//! 该文件只做模块装配与统一导出，具体实现位于各子模块。
//!
//! 模块分工：
//! - `protocol`：`DataStore` 存储接口。
//! - `memory`：内存实现（测试与嵌入场景）。
//! - `file`：目录 + 原子替换的文件实现。
//! - `writer`：后台线程 + 有界队列的异步快照写入。
//! - `error`：统一错误类型。

mod error;
mod file;
mod memory;
mod protocol;
mod writer;

pub use error::{SnapshotFailure, StoreError};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use protocol::DataStore;
pub use writer::{AsyncSnapshotWriter, AsyncSnapshotWriterConfig};
