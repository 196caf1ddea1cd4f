//! S3-compatible `ObjectStore` backend (MinIO, Ceph RGW, Cloudflare R2, AWS S3).

mod config;
mod store;

pub use config::S3Config;
pub use store::S3ObjectStore;
