//! `service` crate 入口。
//!
//! 职责：把统计队列、注册表与存储边界组装成对外服务（列举、查询、加载、处理、持久化）。
//!
//! 模块分工：
//! - `service`：`StatService` 主流程。
//! - `settings`：进程级环境变量配置。
//! - `error`：服务错误类型。

mod error;
mod service;
mod settings;

pub use error::ServiceError;
pub use service::StatService;
pub use settings::ServiceSettings;
