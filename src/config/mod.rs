// Re-export all items from the submodules
mod uploader_config;

pub use uploader_config::{
    effective_chunk_size,
    ProducerPolicy,
    UploaderConfig,
};
