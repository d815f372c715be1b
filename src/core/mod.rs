//! 领域逻辑：URL 解析与改写、项目/环境编辑、快速跳转、导入导出。

pub mod env;
pub mod host;
pub mod popup;
pub mod project;
pub mod resolver;
pub mod transfer;
