pub mod client;

pub use client::IpfsClient;
