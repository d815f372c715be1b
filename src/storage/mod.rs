mod file;
mod store;

pub use file::JsonFileStore;
pub use store::ProjectStore;

use serde_json::{Map, Value};

use crate::error::Result;

/// 键值存储：按键读取，整体写入若干键
pub trait KeyValueStore {
    /// 返回存在的键；缺失的键不出现在结果中
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>>;

    fn set(&mut self, items: Map<String, Value>) -> Result<()>;
}
