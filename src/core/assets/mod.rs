mod asset_index;

pub use asset_index::{index_task, AssetIndex, AssetObject, RESOURCES_URL};
