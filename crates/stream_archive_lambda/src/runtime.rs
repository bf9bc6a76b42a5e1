pub use stream_archive_core::{attributes, category, contract, storage_keys};
